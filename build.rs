//! Build script to stamp the commit hash into the version string
//!
//! `TICKET_DESK_GIT_HASH` overrides git lookup (source tarballs, vendored
//! builds). Without a repository the hash is `unknown`.

use std::path::PathBuf;
use std::process::Command;

const HASH_OVERRIDE_VAR: &str = "TICKET_DESK_GIT_HASH";

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed={}", HASH_OVERRIDE_VAR);

    let override_hash =
        std::env::var(HASH_OVERRIDE_VAR).ok().filter(|hash| !hash.trim().is_empty());

    let git_hash = match override_hash {
        Some(hash) => hash.trim().to_string(),
        None => {
            // Watch HEAD only when it exists; a missing path makes cargo rerun every build
            if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
                let head = PathBuf::from(git_dir).join("HEAD");
                if head.exists() {
                    println!("cargo:rerun-if-changed={}", head.display());
                }
            }
            git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string())
        }
    };

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
}
