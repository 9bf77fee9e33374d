// Publishes the hand-maintained C header next to the build artifacts so game
// builds can pick it up from $OUT_DIR as well as from include/.

use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=include/pocketstub.h");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::copy(crate_dir.join("include").join("pocketstub.h"), out_dir.join("pocketstub.h"))
        .expect("failed to copy include/pocketstub.h to OUT_DIR");
}
