use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::{schema_of, Tool};

const MAX_SEARCH_DEPTH: usize = 10;
const MAX_RESULTS: usize = 100;

// Directories that are never worth searching.
const IGNORED_DIRS: [&str; 8] = [
    "__pycache__",
    "node_modules",
    "dist",
    "build",
    "target",
    "vendor",
    ".git",
    ".idea",
];

#[derive(Deserialize, JsonSchema)]
pub struct FindFileParams {
    #[schemars(
        description = "Glob pattern to match file names against (e.g. '*.rs', 'config.*', 'README.md')"
    )]
    pattern: String,

    #[schemars(
        description = "Optional. The directory where the recursive search should begin. Defaults to the current working directory."
    )]
    search_path: Option<String>,

    #[schemars(
        description = "Optional. Whether to search inside hidden directories (like '.config'). Defaults to false."
    )]
    include_hidden: Option<bool>,
}

/// Recursive file search by name pattern, offered to the backend.
pub struct FindFileTool;

impl Default for FindFileTool {
    fn default() -> Self {
        Self
    }
}

impl FindFileTool {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_files(
        pattern: &str,
        search_path: &Path,
        include_hidden: bool,
        depth: usize,
        matches: &mut Vec<PathBuf>,
    ) {
        if depth > MAX_SEARCH_DEPTH || matches.len() >= MAX_RESULTS {
            return;
        }
        if !search_path.is_dir() {
            return;
        }

        let entries = match fs::read_dir(search_path) {
            Ok(entries) => entries,
            Err(_) => return, // unreadable directories are silently skipped
        };

        for entry in entries.flatten() {
            if matches.len() >= MAX_RESULTS {
                return;
            }

            let path = entry.path();
            let file_name_os = entry.file_name();
            let Some(file_name) = file_name_os.to_str() else {
                continue;
            };

            if path.is_dir() {
                if !include_hidden && file_name.starts_with('.') {
                    continue;
                }
                if IGNORED_DIRS.contains(&file_name) {
                    continue;
                }
                Self::find_files(pattern, &path, include_hidden, depth + 1, matches);
            } else if glob_match::glob_match(pattern, file_name) {
                matches.push(path);
            }
        }
    }
}

#[async_trait]
impl Tool for FindFileTool {
    fn name(&self) -> &'static str {
        "find_file"
    }

    fn description(&self) -> &'static str {
        "Recursively search for files whose name matches a glob pattern.

HOW TO USE:
1. Set 'pattern' to a glob matched against file names (e.g. '*.toml', 'main.rs')
2. Optionally set 'search_path' to the directory to start from (defaults to the current directory)
3. Optionally set 'include_hidden' to true to also look inside hidden directories

FEATURES:
- Skips common noise directories (node_modules, target, .git, ...)
- Search depth is capped at 10 levels; results are capped at 100 files

TIPS:
- Combine with the 'file' tool: find a file first, then read it by its full path"
    }

    fn parameter_schema(&self) -> serde_json::Value {
        schema_of::<FindFileParams>()
    }

    async fn call(&self, args: serde_json::Value) -> Result<String> {
        let params: FindFileParams =
            serde_json::from_value(args).context("Invalid parameters for the find_file tool")?;

        let root = match &params.search_path {
            Some(p) => PathBuf::from(p),
            None => env::current_dir().context("Failed to get current directory")?,
        };

        if !root.is_dir() {
            anyhow::bail!("Search path '{}' is not a directory", root.display());
        }

        let mut matches = Vec::new();
        Self::find_files(
            &params.pattern,
            &root,
            params.include_hidden.unwrap_or(false),
            0,
            &mut matches,
        );

        if matches.is_empty() {
            return Ok(format!(
                "No files matching '{}' found under '{}'",
                params.pattern,
                root.display()
            ));
        }

        let mut listing: Vec<String> = matches
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        listing.sort();

        let mut out = format!(
            "Found {} file(s) matching '{}':\n",
            listing.len(),
            params.pattern
        );
        out.push_str(&listing.join("\n"));
        if listing.len() >= MAX_RESULTS {
            out.push_str("\n(result list truncated)");
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[tokio::test]
    async fn test_finds_by_glob() -> Result<()> {
        let dir = tempdir()?;
        touch(&dir.path().join("a.rs"));
        touch(&dir.path().join("sub/b.rs"));
        touch(&dir.path().join("sub/c.txt"));

        let tool = FindFileTool::new();
        let out = tool
            .call(serde_json::json!({
                "pattern": "*.rs",
                "search_path": dir.path().to_str().unwrap()
            }))
            .await?;

        assert!(out.contains("Found 2 file(s)"));
        assert!(out.contains("a.rs"));
        assert!(out.contains("b.rs"));
        assert!(!out.contains("c.txt"));
        Ok(())
    }

    #[tokio::test]
    async fn test_skips_hidden_and_noise_dirs() -> Result<()> {
        let dir = tempdir()?;
        touch(&dir.path().join(".hidden/secret.rs"));
        touch(&dir.path().join("node_modules/dep.rs"));
        touch(&dir.path().join("visible.rs"));

        let tool = FindFileTool::new();
        let out = tool
            .call(serde_json::json!({
                "pattern": "*.rs",
                "search_path": dir.path().to_str().unwrap()
            }))
            .await?;

        assert!(out.contains("Found 1 file(s)"));
        assert!(out.contains("visible.rs"));

        let with_hidden = tool
            .call(serde_json::json!({
                "pattern": "*.rs",
                "search_path": dir.path().to_str().unwrap(),
                "include_hidden": true
            }))
            .await?;
        assert!(with_hidden.contains("secret.rs"));
        // node_modules stays excluded even with hidden dirs on.
        assert!(!with_hidden.contains("dep.rs"));
        Ok(())
    }

    #[tokio::test]
    async fn test_no_matches_message() -> Result<()> {
        let dir = tempdir()?;
        let tool = FindFileTool::new();
        let out = tool
            .call(serde_json::json!({
                "pattern": "*.nothing",
                "search_path": dir.path().to_str().unwrap()
            }))
            .await?;
        assert!(out.contains("No files matching"));
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_search_path_fails() {
        let tool = FindFileTool::new();
        let result = tool
            .call(serde_json::json!({
                "pattern": "*.rs",
                "search_path": "/definitely/not/a/dir"
            }))
            .await;
        assert!(result.is_err());
    }
}
