use std::{
  env,
  path::PathBuf,
};

fn main() {
  println!("cargo:rerun-if-changed=src/ffi.rs");
  println!("cargo:rerun-if-changed=cbindgen.toml");

  let crate_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
  let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

  let config = cbindgen::Config::from_root_or_default(&crate_dir);
  match cbindgen::Builder::new()
    .with_crate(&crate_dir)
    .with_config(config)
    .generate()
  {
    Ok(bindings) => {
      bindings.write_to_file(out_dir.join("stacked.h"));
    }
    Err(err) => {
      println!("cargo:warning=skipping C header generation: {err}");
    }
  }
}
