//! Build script for quartz-mcp
//!
//! Intentionally minimal: sets version information for diagnostics and
//! configures rebuild triggers. Documentation generation is left to docs.rs.

fn main() {
    // Tell Cargo to rerun if important files change
    println!("cargo:rerun-if-changed=src/");
    println!("cargo:rerun-if-changed=Cargo.toml");

    println!(
        "cargo:rustc-env=QUARTZ_MCP_VERSION={}",
        env!("CARGO_PKG_VERSION")
    );
}
