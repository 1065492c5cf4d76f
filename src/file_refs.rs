// src/file_refs.rs
//! `@name.json` query references.
//!
//! Each reference is replaced by the referenced file's content wrapped in the
//! `--- Content of <name> ---` / `--- End of <name> ---` markers that
//! `terms::extract` knows how to mine. Files are looked up recursively under a
//! data directory; missing files leave a bracketed notice in the query.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{info, warn};

static RE_FILE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([a-zA-Z0-9_.-]+\.json)").expect("file ref regex"));

/// Search depth guard for the recursive lookup.
const MAX_DEPTH: usize = 8;

/// Find `file_name` under `dir` (depth-first, entries in name order).
pub fn find_file(dir: &Path, file_name: &str) -> Option<PathBuf> {
    fn walk(dir: &Path, file_name: &str, depth: usize) -> Option<PathBuf> {
        if depth > MAX_DEPTH {
            return None;
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .collect();
        entries.sort();

        for p in &entries {
            if p.is_file() && p.file_name().and_then(|n| n.to_str()) == Some(file_name) {
                return Some(p.clone());
            }
        }
        entries
            .iter()
            .filter(|p| p.is_dir())
            .find_map(|p| walk(p, file_name, depth + 1))
    }
    walk(dir, file_name, 0)
}

/// Content of `name` under `data_dir`, or `None` when missing or unreadable.
fn load_reference(data_dir: &Path, name: &str) -> Option<String> {
    let Some(path) = find_file(data_dir, name) else {
        warn!(target: "ingest", file = %name, "referenced file not found");
        return None;
    };
    match fs::read_to_string(&path) {
        Ok(body) => {
            info!(target: "ingest", file = %name, "injected file reference");
            Some(body)
        }
        Err(e) => {
            warn!(target: "ingest", error = %e, path = %path.display(), "failed to read referenced file");
            None
        }
    }
}

/// Replace every `@name.json` in `query` with the wrapped file content.
///
/// Single pass over the query: references inside injected content are left
/// as they are, and each file is read at most once.
pub fn inject_file_references(query: &str, data_dir: &Path) -> String {
    let mut loaded: HashMap<String, Option<String>> = HashMap::new();
    RE_FILE_REF
        .replace_all(query, |caps: &Captures<'_>| {
            let name = &caps[1];
            let content = loaded
                .entry(name.to_string())
                .or_insert_with(|| load_reference(data_dir, name));
            match content {
                Some(body) => {
                    format!("\n\n--- Content of {name} ---\n{body}\n--- End of {name} ---\n\n")
                }
                None => format!("[File {name} not found]"),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_nested_file_and_marks_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("config");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("stack.json"), r#"{"Context":"observability"}"#).unwrap();

        let out = inject_file_references("use @stack.json and @nope.json", tmp.path());
        assert!(out.contains("--- Content of stack.json ---"));
        assert!(out.contains(r#"{"Context":"observability"}"#));
        assert!(out.contains("--- End of stack.json ---"));
        assert!(out.contains("[File nope.json not found]"));
        assert!(!out.contains("@stack.json"));
    }

    #[test]
    fn query_without_refs_is_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(inject_file_references("plain rust", tmp.path()), "plain rust");
    }

    #[test]
    fn longer_names_are_not_clipped_by_shorter_ones() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("x.json"), "short").unwrap();
        fs::write(tmp.path().join("x.json.json"), "long").unwrap();

        let out = inject_file_references("@x.json and @x.json.json", tmp.path());
        assert!(out.contains("--- Content of x.json ---\nshort\n"));
        assert!(out.contains("--- Content of x.json.json ---\nlong\n"));
        assert!(!out.contains('@'));
    }

    #[test]
    fn references_inside_injected_content_stay_literal() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("outer.json"), r#"{"see": "@inner.json"}"#).unwrap();
        fs::write(tmp.path().join("inner.json"), "secret").unwrap();

        let out = inject_file_references("@outer.json @outer.json", tmp.path());
        assert!(out.contains(r#"{"see": "@inner.json"}"#));
        assert!(!out.contains("secret"));
        assert_eq!(out.matches("--- Content of outer.json ---").count(), 2);
    }
}
