/*
 * Build script for the buildfacts CLI.
 *
 * Stamps the tool's own git hash and build date into the compilation
 * environment so `buildfacts --version` can report where it came from.
 */

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output();

    let git_hash = match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        _ => "unknown".to_string(),
    };

    println!("cargo:rustc-env=BUILDFACTS_TOOL_GIT_HASH={git_hash}");

    // Honour reproducible builds when the packager pins the clock.
    let built_at = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(chrono::Utc::now);

    println!(
        "cargo:rustc-env=BUILDFACTS_TOOL_BUILT_AT={}",
        built_at.format("%Y-%m-%d")
    );

    // Only re-run if the git HEAD changes (new commits)
    println!("cargo:rerun-if-changed=.git/HEAD");
}
