//! Integration Test: Terminal Output Prohibition
//!
//! **Policy**: The core library MUST NOT write to stdout or stderr directly.
//! Streamed answer text belongs to whatever frontend owns the terminal, and
//! diagnostics go through `tracing` so subscribers decide where they land.
//! **Exceptions**: Test code. The CLI crate owns its terminal and is not
//! scanned.

use std::fs;
use std::path::{Path, PathBuf};

const FORBIDDEN_MACROS: [&str; 5] = ["println!(", "eprintln!(", "print!(", "eprint!(", "dbg!("];

/// Test that the core library never prints to the terminal
#[test]
fn test_no_terminal_output_in_core_library() {
    let violations = find_terminal_output_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Direct terminal output found in the core library!");
        eprintln!("The library cannot know who owns the terminal.\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n❌ FORBIDDEN in the core library:");
        eprintln!("  - println!, print! (stdout belongs to the frontend)");
        eprintln!("  - eprintln!, eprint!, dbg! (stderr belongs to the subscriber)");
        eprintln!("\n✅ REQUIRED:");
        eprintln!("  - tracing::debug!/info!/warn!/error! with structured fields");
        eprintln!("\n✅ ACCEPTABLE:");
        eprintln!("  - Test code (#[cfg(test)] modules)");
        eprintln!("  - Frontend crates, which own their terminal");

        panic!(
            "\nFound {} terminal output violation(s) in the core library.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Find all direct terminal writes in the core library
fn find_terminal_output_violations() -> Vec<String> {
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

    let mut in_test_region = false;

    for (idx, line) in content.lines().enumerate() {
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

        if let Some(found) = forbidden_macro_in(code_part) {
            violations.push(format!(
                "{}:{} - {} {}",
                path.display(),
                line_number,
                found,
                line.trim()
            ));
        }
    }
}

/// Return the first forbidden output macro on the line, if any
fn forbidden_macro_in(code_part: &str) -> Option<&'static str> {
    FORBIDDEN_MACROS
        .iter()
        .find(|&&pattern| code_part.contains(pattern))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_macro_detection() {
        // This test verifies that the detector itself works
        assert_eq!(
            forbidden_macro_in("    println!(\"answer: {}\", merged);"),
            Some("println!(")
        );
        assert_eq!(
            forbidden_macro_in("    dbg!(&snapshot);"),
            Some("dbg!(")
        );
        assert_eq!(forbidden_macro_in("    tracing::warn!(\"lost\");"), None);
    }

    #[test]
    fn test_comment_lines_are_skipped() {
        let line = "// println!(\"kept for reference\");";
        let code_part = line.split("//").next().unwrap_or(line);
        assert_eq!(forbidden_macro_in(code_part), None);
    }

    #[test]
    fn test_scanned_directories_exist() {
        let root = workspace_root();
        assert!(root.join("tandem/core/src").is_dir());
    }
}
