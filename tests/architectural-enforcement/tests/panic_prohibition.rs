//! Integration Test: Panic Prohibition
//!
//! **Policy**: Production code in the core library MUST NOT panic on
//! recoverable failures: no `.unwrap()` outside test code. Backend failures,
//! bad config, and wire garbage are expected inputs; they surface as
//! `Result`s or degrade the snapshot, never as a crash in the caller's
//! process.
//! **Exceptions**: Test code. `.expect()` with a reason is tolerated for
//! startup-time invariants that cannot fail after construction.

use std::fs;
use std::path::{Path, PathBuf};

/// Test that the core library propagates errors instead of unwrapping
#[test]
fn test_no_unwrap_in_core_production_code() {
    let violations = find_unwrap_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: .unwrap() found in core production code!");
        eprintln!("A panic here takes down the caller's whole session.\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n❌ FORBIDDEN in the core library:");
        eprintln!("  - .unwrap() on Result or Option in production paths");
        eprintln!("\n✅ REQUIRED:");
        eprintln!("  - ? with typed errors, or a degraded terminal snapshot");
        eprintln!("\n✅ ACCEPTABLE:");
        eprintln!("  - Test code (#[test], #[tokio::test], #[cfg(test)] modules)");
        eprintln!("  - .expect(\"reason\") for startup-time invariants");

        panic!(
            "\nFound {} unwrap violation(s) in core production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Find all unwrap calls in core production code
fn find_unwrap_violations() -> Vec<String> {
    let root = workspace_root();
    let mut violations = Vec::new();

    check_directory(&root, "tandem/core/src", &mut violations);

    violations
}

/// Resolve the workspace root from this package's manifest directory.
fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .canonicalize()
        .expect("workspace root should resolve")
}

fn check_directory(root: &Path, dir: &str, violations: &mut Vec<String>) {
    let path = root.join(dir);
    assert!(
        path.is_dir(),
        "Scanned directory {} is missing; update the enforcement test to match the tree",
        path.display()
    );

    for entry in walkdir::WalkDir::new(&path)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            check_file(entry.path(), violations);
        }
    }
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return,
    };

    let lines: Vec<&str> = content.lines().collect();
    let mut in_test_region = false;

    for (idx, line) in lines.iter().enumerate() {
        let line_number = idx + 1;

        // Everything from the test module marker to end of file is test code
        if line.trim_start().starts_with("#[cfg(test)]") {
            in_test_region = true;
        }
        if in_test_region {
            continue;
        }

        // Skip comments
        let code_part = line.split("//").next().unwrap_or(line);

        // .unwrap_or / .unwrap_or_else / .unwrap_or_default do not panic
        if code_part.contains(".unwrap()") {
            if is_in_test_function(&lines, idx) {
                continue;
            }

            violations.push(format!(
                "{}:{} - Panicking unwrap: {}",
                path.display(),
                line_number,
                line.trim()
            ));
        }
    }
}

/// Check if line is inside a test function
fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }

        if line.starts_with("fn ") && !line.contains("test") {
            return false; // Found a non-test function first
        }

        // Stop at module boundaries
        if line.starts_with("mod ") || line.starts_with("impl ") {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_detection_is_exact() {
        // This test verifies that the detector itself works
        assert!("config.validate().unwrap();".contains(".unwrap()"));

        // Non-panicking relatives must not match
        assert!(!"value.unwrap_or(fallback)".contains(".unwrap()"));
        assert!(!"value.unwrap_or_else(Vec::new)".contains(".unwrap()"));
        assert!(!"value.unwrap_or_default()".contains(".unwrap()"));
    }

    #[test]
    fn test_unwrap_detection_allows_test_functions() {
        let test_code = vec![
            "#[test]",
            "fn test_decoding() {",
            "    let frame = decode_frame(payload).unwrap();",
            "}",
        ];

        assert!(
            is_in_test_function(&test_code, 2),
            "Should detect test function"
        );
    }

    #[test]
    fn test_scanned_directories_exist() {
        let root = workspace_root();
        assert!(root.join("tandem/core/src").is_dir());
    }
}
