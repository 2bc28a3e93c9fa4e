use std::path::Path;
use std::process::Command;

/// Embed the short git revision as `KOPILKA_BUILD_SHA` for `kopilka --version`.
/// A preset `KOPILKA_BUILD_SHA` (packaging without a checkout) wins over git.
fn main() {
    println!("cargo:rerun-if-env-changed=KOPILKA_BUILD_SHA");

    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let workspace = Path::new(&manifest_dir).join("..");
    let head = workspace.join(".git").join("HEAD");
    if head.exists() {
        println!("cargo:rerun-if-changed={}", head.display());
    }

    let sha = std::env::var("KOPILKA_BUILD_SHA")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| git_short_sha(&workspace))
        .unwrap_or_else(|| "dev".to_string());

    println!("cargo:rustc-env=KOPILKA_BUILD_SHA={sha}");
}

fn git_short_sha(workspace: &Path) -> Option<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(workspace)
        .args(["rev-parse", "--short=10", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}
