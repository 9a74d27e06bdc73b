use std::env;
use std::path::{Path, PathBuf};

fn main() {
    // OUT_DIR is target/<profile>/build/<pkg>/out; the header lands next to the library
    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap_or_default());
    let Some(target_dir) = out_path.ancestors().nth(3) else {
        return;
    };

    let header_src = "include/multi_image_picker_core.h";
    let header_dst = target_dir.join("multi_image_picker_core.h");

    if Path::new(header_src).exists() {
        if let Err(e) = std::fs::copy(header_src, &header_dst) {
            println!("cargo:warning=Failed to copy header file: {}", e);
        }
        println!("cargo:rerun-if-changed={}", header_src);
    }
}
