//! Structural tests for layer boundaries.
//!
//! `domain` performs no I/O and `application` never reaches into the
//! infrastructure or presentation layers.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Non-comment lines of a file, up to its `#[cfg(test)]` module.
fn production_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .take_while(|l| !l.contains("#[cfg(test)]"))
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(String::from)
        .collect()
}

fn src(layer: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(layer)
}

fn violations(layer: &str, forbidden: &[&str]) -> Vec<String> {
    let mut found = Vec::new();
    for file in collect_rs_files(&src(layer)) {
        for line in production_lines(&file) {
            if forbidden.iter().any(|f| line.contains(f)) {
                found.push(format!("{}: {}", file.display(), line.trim()));
            }
        }
    }
    found
}

#[test]
fn test_domain_has_no_io() {
    let found = violations(
        "domain",
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio::",
            "std::fs",
            "std::process",
            "std::env",
        ],
    );
    assert!(found.is_empty(), "domain I/O or layer leaks:\n{}", found.join("\n"));
}

#[test]
fn test_application_does_not_import_outer_layers() {
    let found = violations("application", &["crate::infra", "crate::commands", "crate::output"]);
    assert!(found.is_empty(), "application layer leaks:\n{}", found.join("\n"));
}

#[test]
fn test_infra_does_not_import_presentation() {
    let found = violations("infra", &["crate::commands", "crate::output"]);
    assert!(found.is_empty(), "infra layer leaks:\n{}", found.join("\n"));
}
