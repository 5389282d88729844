//! File read tool: returns the contents of a file.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use yugent_core::error::ToolError;
use yugent_core::schema::PropertyMap;
use yugent_core::tool::Tool;

use crate::DeclaredInput;

pub const NAME: &str = "read_file";

static INPUT: DeclaredInput = DeclaredInput::new(
    r#"
    interface ReadFile {
      /**
       * Absolute path of the file to read.
       */
      path: string
    }
    "#,
);

#[derive(Debug, Deserialize)]
struct ReadFileInput {
    path: String,
}

#[derive(Debug, Default)]
pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Reads and returns the content of a file."
    }

    fn parameters(&self) -> Option<&PropertyMap> {
        INPUT.properties()
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let input: ReadFileInput =
            serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        // A missing file reads as empty.
        if !tokio::fs::try_exists(&input.path).await.unwrap_or(false) {
            return Ok(json!({ "content": "" }));
        }

        let content = tokio::fs::read_to_string(&input.path).await.map_err(|e| {
            ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: format!("failed to read {}: {e}", input.path),
            }
        })?;
        Ok(json!({ "content": content }))
    }
}
