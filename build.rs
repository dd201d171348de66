use std::process::Command;

/// Run git and return trimmed stdout when it succeeds.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    for path in [".git/HEAD", ".git/refs/heads/", ".git/refs/tags/"] {
        println!("cargo:rerun-if-changed={path}");
    }

    let hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let dirty = git(&["status", "--porcelain"]).is_some_and(|s| !s.is_empty());
    let release = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();

    let version = if dirty { format!("{hash}-dirty") } else { hash };
    println!("cargo:rustc-env=GUARD_GIT_HASH={version}");
    println!("cargo:rustc-env=GUARD_IS_RELEASE={release}");
}
