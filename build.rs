// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=DEPTH_ROI_VERSION");

    // Packagers can pin the version string
    let version = std::env::var("DEPTH_ROI_VERSION").unwrap_or_else(|_| git_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Version derived from `git describe`
///
/// - exact tag `v0.1.0` becomes `0.1.0-<hash>`
/// - `v0.1.0-5-gabcdef1` becomes `0.1.0-dirty-abcdef1`
/// - outside a git checkout this falls back to the crate version
fn git_version() -> String {
    let described = git(&["describe", "--tags", "--always", "--match", "v*"]);
    let hash = git(&["rev-parse", "--short", "HEAD"]);

    let (Some(described), Some(hash)) = (described, hash) else {
        return env!("CARGO_PKG_VERSION").to_string();
    };

    let described = described.strip_prefix('v').unwrap_or(&described);
    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    match parts.as_slice() {
        [_, _, base] => format!("{}-dirty-{}", base, hash),
        _ if described == hash => format!("{}-{}", env!("CARGO_PKG_VERSION"), hash),
        _ => format!("{}-{}", described, hash),
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
