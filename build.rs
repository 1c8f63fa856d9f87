//! Build script for the spintally play counter.
//!
//! Copies the `.env.example` configuration template into the local data
//! directory so users find a ready-to-edit example next to the place where
//! spintally looks for its `.env` file.

use std::{env, fs, path::PathBuf};

/// Copies `.env.example` from the crate root to `<data_local_dir>/spintally/`.
///
/// The copy is best effort: a missing template or a read-only data directory
/// (sandboxed builds, CI) produces a cargo warning instead of failing the build.
///
/// Destination by platform:
/// - Linux: `~/.local/share/spintally/.env.example`
/// - macOS: `~/Library/Application Support/spintally/.env.example`
/// - Windows: `%LOCALAPPDATA%/spintally/.env.example`
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let env_example_path = manifest_dir.join(".env.example");

    if !env_example_path.is_file() {
        println!(
            "cargo:warning=.env.example not found at {}",
            env_example_path.display()
        );
        return Ok(());
    }

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("spintally");

    let copied = fs::create_dir_all(&out_dir)
        .and_then(|_| fs::copy(&env_example_path, out_dir.join(".env.example")));
    if let Err(e) = copied {
        println!(
            "cargo:warning=could not copy .env.example to {}: {}",
            out_dir.display(),
            e
        );
    }

    Ok(())
}
