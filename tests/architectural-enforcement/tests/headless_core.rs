//! Integration Test: Layer Separation
//!
//! **Policy**: `core` is a headless library. It MUST NOT import terminal or
//! rendering crates; those belong to `tui`. Conversely, `tui` MUST NOT talk
//! HTTP itself; all network access goes through the core's API and auth
//! layers.
//!
//! Keeping the boundary mechanical means the controller and its request
//! lifecycle stay testable with deterministic fakes.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Crates that must never appear in core sources
const UI_CRATES: &[&str] = &["ratatui", "crossterm"];

/// Crates that must never appear in tui sources
const NETWORK_CRATES: &[&str] = &["reqwest", "hyper"];

/// Resolve a path relative to the workspace root
fn workspace_path(relative: &str) -> PathBuf {
    // CARGO_MANIFEST_DIR is tests/architectural-enforcement
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join(relative)
}

/// Collect `use`/path references to the given crates in a source tree
fn find_crate_references(dir: &Path, crates: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("rs") {
            continue;
        }

        let Ok(contents) = fs::read_to_string(path) else {
            continue;
        };

        let mut in_test_module = false;
        for (lineno, line) in contents.lines().enumerate() {
            // Skip test-only code; the policy covers production code
            if line.trim_start().starts_with("#[cfg(test)]") {
                in_test_module = true;
            }
            if in_test_module {
                continue;
            }

            let trimmed = line.trim_start();
            for krate in crates {
                let uses_crate = trimmed.starts_with(&format!("use {krate}"))
                    || trimmed.contains(&format!("{krate}::"));
                if uses_crate {
                    violations.push(format!(
                        "{}:{}: {}",
                        path.display(),
                        lineno + 1,
                        trimmed
                    ));
                }
            }
        }
    }

    violations
}

#[test]
fn test_core_has_no_ui_imports() {
    let core_src = workspace_path("core/src");
    assert!(core_src.is_dir(), "core/src not found");

    let violations = find_crate_references(&core_src, UI_CRATES);
    assert!(
        violations.is_empty(),
        "core must stay headless; found UI crate references:\n{}",
        violations.join("\n")
    );
}

#[test]
fn test_tui_does_not_talk_http_directly() {
    let tui_src = workspace_path("tui/src");
    assert!(tui_src.is_dir(), "tui/src not found");

    let violations = find_crate_references(&tui_src, NETWORK_CRATES);
    assert!(
        violations.is_empty(),
        "tui must go through muse-core for network access; found:\n{}",
        violations.join("\n")
    );
}
