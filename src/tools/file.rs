use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;

use super::{schema_of, Tool};

const MAX_OUTPUT_LENGTH: usize = 30000;

#[derive(Deserialize, JsonSchema)]
pub struct FileParams {
    #[schemars(description = "The operation to perform: 'read', 'write', 'exists', or 'delete'")]
    operation: String,

    #[schemars(description = "The path to the file to read, write, check, or delete")]
    path: String,

    #[schemars(description = "The content to write to the file (for the write operation)")]
    content: Option<String>,

    #[schemars(
        description = "Whether to append to the file instead of overwriting it (for the write operation)"
    )]
    append: Option<bool>,
}

/// Local file access offered to the backend: read, write, exists, delete.
pub struct FileTool;

impl Default for FileTool {
    fn default() -> Self {
        Self
    }
}

impl FileTool {
    pub fn new() -> Self {
        Self::default()
    }

    // The backend often sends relative paths; anchor them to the cwd.
    fn resolve_path(path_str: &str) -> Result<PathBuf> {
        let path = Path::new(path_str);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let current_dir = env::current_dir().context("Failed to get current directory")?;
        Ok(current_dir.join(path))
    }

    fn truncate_output(content: &str) -> String {
        if content.len() <= MAX_OUTPUT_LENGTH {
            return content.to_string();
        }

        // The halfway offsets can land inside a multi-byte character; snap
        // them to char boundaries before slicing.
        let half_length = MAX_OUTPUT_LENGTH / 2;
        let mut head_end = half_length;
        while !content.is_char_boundary(head_end) {
            head_end -= 1;
        }
        let mut tail_start = content.len() - half_length;
        while !content.is_char_boundary(tail_start) {
            tail_start += 1;
        }

        let middle_content = &content[head_end..tail_start];
        let truncated_lines_count = middle_content.chars().filter(|&c| c == '\n').count();

        format!(
            "{}\n\n... [{} lines truncated] ...\n\n{}",
            &content[..head_end],
            truncated_lines_count,
            &content[tail_start..]
        )
    }

    async fn read_file(path_str: &str) -> Result<String> {
        let path = Self::resolve_path(path_str)?;

        if !path.exists() {
            bail!("File '{}' does not exist", path.display());
        }
        if !path.is_file() {
            bail!("Path '{}' is not a file", path.display());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Error reading file '{}'", path.display()))?;
        Ok(Self::truncate_output(&content))
    }

    async fn write_file(path_str: &str, content: &str, append: bool) -> Result<String> {
        let path = Self::resolve_path(path_str)?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create '{}'", parent.display()))?;
            }
        }

        let mut file = if append {
            TokioFile::options()
                .append(true)
                .create(true)
                .open(&path)
                .await?
        } else {
            TokioFile::create(&path).await?
        };

        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        Ok(format!(
            "Successfully {} file: {}",
            if append { "appended to" } else { "wrote" },
            path.display()
        ))
    }

    async fn file_exists(path_str: &str) -> Result<String> {
        let path = Self::resolve_path(path_str)?;
        let exists = path.exists();

        Ok(format!(
            "Path '{}' {} exist",
            path.display(),
            if exists { "does" } else { "does not" }
        ))
    }

    async fn delete_file(path_str: &str) -> Result<String> {
        let path = Self::resolve_path(path_str)?;

        if !path.exists() {
            bail!("Path '{}' does not exist", path.display());
        }

        if path.is_file() {
            fs::remove_file(&path)?;
            Ok(format!("Successfully deleted file: {}", path.display()))
        } else {
            bail!("Path '{}' is not a file", path.display());
        }
    }
}

#[async_trait]
impl Tool for FileTool {
    fn name(&self) -> &'static str {
        "file"
    }

    fn description(&self) -> &'static str {
        "File operations tool to read, write, check existence of, and delete files.

SUPPORTED OPERATIONS (must use exactly these keywords):
- 'read' - Read content from a file
- 'write' - Write content to a file (creates a new file or overwrites an existing one)
- 'exists' - Check whether a file exists
- 'delete' - Delete a file

HOW TO USE:
1. Set the 'operation' parameter to one of the values above (e.g., 'write' not 'create')
2. Provide 'path' for every operation, plus 'content' for write (with optional 'append')

FEATURES:
- Creates parent directories when writing
- Large file content is truncated beyond 30,000 characters

TIPS:
- Use 'exists' to check a file before reading or modifying it
- Use 'append: true' with 'write' to add to an existing file"
    }

    fn parameter_schema(&self) -> serde_json::Value {
        schema_of::<FileParams>()
    }

    async fn call(&self, args: serde_json::Value) -> Result<String> {
        let params: FileParams =
            serde_json::from_value(args).context("Invalid parameters for the file tool")?;

        match params.operation.to_lowercase().as_str() {
            "read" => Self::read_file(&params.path).await,
            "write" => {
                let content = params
                    .content
                    .as_deref()
                    .context("'content' is required for the 'write' operation")?;
                Self::write_file(&params.path, content, params.append.unwrap_or(false)).await
            }
            "exists" => Self::file_exists(&params.path).await,
            "delete" => Self::delete_file(&params.path).await,
            other => bail!(
                "Unknown operation '{}'. Valid operations are: 'read', 'write', 'exists', 'delete'",
                other
            ),
        }
    }
}
