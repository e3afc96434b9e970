// Stamps the binary with the source revision and target triple for `--version`.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed=FLOATCOV_BUILD_REV");

    // FLOATCOV_BUILD_REV wins over git: source tarballs have no .git.
    let rev = std::env::var("FLOATCOV_BUILD_REV")
        .ok()
        .filter(|r| !r.trim().is_empty())
        .or_else(|| git(&["describe", "--always", "--dirty", "--abbrev=8"]))
        .unwrap_or_else(|| "untracked".to_string());

    if let Some(git_dir) = git(&["rev-parse", "--absolute-git-dir"]) {
        println!("cargo:rerun-if-changed={git_dir}/HEAD");
        println!("cargo:rerun-if-changed={git_dir}/index");
    }

    println!("cargo:rustc-env=FLOATCOV_BUILD_REV={rev}");
    println!(
        "cargo:rustc-env=FLOATCOV_BUILD_TARGET={}",
        std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string())
    );
}
