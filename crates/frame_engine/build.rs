// build.rs
// Compiles the GLSL shaders under shaders/ to SPIR-V in target/shaders

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: [&str; 2] = ["vert", "frag"];

/// Locate glslc, preferring the Vulkan SDK over PATH
fn find_glslc() -> Option<PathBuf> {
    if let Ok(sdk) = env::var("VULKAN_SDK") {
        let candidate = if cfg!(target_os = "windows") {
            PathBuf::from(&sdk).join("Bin").join("glslc.exe")
        } else {
            PathBuf::from(&sdk).join("bin").join("glslc")
        };
        if candidate.exists() {
            return Some(candidate);
        }
        eprintln!("warning: glslc not found at: {:?}", candidate);
    }

    let glslc = Command::new("glslc").arg("--version").output();
    match glslc {
        Ok(output) if output.status.success() => Some(PathBuf::from("glslc")),
        _ => None,
    }
}

fn is_stale(source: &Path, output: &Path) -> bool {
    let (Ok(src_meta), Ok(dst_meta)) = (std::fs::metadata(source), std::fs::metadata(output)) else {
        return true;
    };
    match (src_meta.modified(), dst_meta.modified()) {
        (Ok(src), Ok(dst)) => src > dst,
        _ => true,
    }
}

fn compile_shaders(shader_dir: &Path, target_dir: &Path, glslc: &Path) -> usize {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return 0;
        }
    };

    let mut compiled = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !SHADER_EXTENSIONS.contains(&ext) {
            continue;
        }

        // triangle.vert -> triangle.vert.spv so stages sharing a stem don't collide
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let out_file = target_dir.join(format!("{}.spv", file_name.to_string_lossy()));

        if !is_stale(&path, &out_file) {
            eprintln!("info: Shader {:?} is up to date", file_name);
            continue;
        }

        let status = Command::new(glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {:?} -> {:?}", file_name, out_file);
                compiled += 1;
            }
            Ok(s) => {
                eprintln!("error: glslc failed for {:?} with exit code: {}", path, s.code().unwrap_or(-1));
                panic!("Shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: Failed to run glslc for {:?}: {}", path, e);
                panic!("Failed to execute shader compiler");
            }
        }
    }
    compiled
}

fn main() {
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Some(glslc) = find_glslc() else {
        eprintln!("warning: glslc not available, shader compilation skipped");
        eprintln!("hint: Install the Vulkan SDK and set VULKAN_SDK");
        return;
    };

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()));
    let shader_dir = manifest_dir.join("shaders");
    // Workspace-level target/shaders, two levels above crates/frame_engine
    let target_dir = manifest_dir.join("../../target/shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create target directory: {}", e);
        return;
    }

    let compiled = compile_shaders(&shader_dir, &target_dir, &glslc);
    if compiled > 0 {
        eprintln!("info: Successfully compiled {} shader(s)", compiled);
    } else {
        eprintln!("info: All shaders are up to date");
    }
}
