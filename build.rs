#[allow(clippy::disallowed_macros)] // for println!
fn main() {
    #[cfg(feature = "bin")]
    {
        let git_hash = std::process::Command::new("git")
            .args(["rev-parse", "--short", "HEAD"])
            .output()
            .ok()
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .map(|hash| hash.trim().to_string())
            .unwrap_or_default();
        let build_date = chrono::Utc::now().format("%Y-%m-%d");
        let full_version = if git_hash.is_empty() {
            format!("{}_{}", env!("CARGO_PKG_VERSION"), build_date)
        } else {
            format!("{}_{}_{}", env!("CARGO_PKG_VERSION"), build_date, git_hash)
        };
        println!("cargo:rustc-env=FULL_VERSION={full_version}");
    }
    println!("cargo:rerun-if-changed=build.rs");
}
