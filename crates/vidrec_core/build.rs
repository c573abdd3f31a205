//! Exposes the resolved burn version to the environment report.

use std::path::PathBuf;

fn main() {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    let lock_path = manifest_dir.join("../../Cargo.lock");

    let version = std::fs::read_to_string(&lock_path)
        .ok()
        .and_then(|lock| locked_version(&lock, "burn"))
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=VIDREC_BURN_VERSION={}", version);
    println!("cargo:rerun-if-changed={}", lock_path.display());
    println!("cargo:rerun-if-changed=build.rs");
}

/// Version of the `[[package]]` entry named `name` in a Cargo.lock.
fn locked_version(lock: &str, name: &str) -> Option<String> {
    let wanted = format!("name = \"{}\"", name);
    let mut lines = lock.lines().map(str::trim);
    while let Some(line) = lines.next() {
        if line == wanted {
            let version = lines.next()?.strip_prefix("version = ")?;
            return Some(version.trim_matches('"').to_string());
        }
    }
    None
}
