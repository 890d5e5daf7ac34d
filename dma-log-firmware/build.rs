use std::{env, fs, path::PathBuf};

use dma_log_build::LogConfig;

fn main() {
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());

    let cfg = LogConfig::from_env().unwrap_or_else(|err| panic!("invalid log configuration: {err}"));
    cfg.write_consts(&out.join("log_cfg.rs")).unwrap();

    println!("cargo:rerun-if-changed=memory.x");
    fs::copy("memory.x", out.join("memory.x")).unwrap();

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-link-search={}", out.display());
}
