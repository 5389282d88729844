//! File write tool: appends to or overwrites a file.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use yugent_core::error::ToolError;
use yugent_core::schema::PropertyMap;
use yugent_core::tool::Tool;

use crate::DeclaredInput;

pub const NAME: &str = "write_file";

static INPUT: DeclaredInput = DeclaredInput::new(
    r#"
    interface WriteFile {
      /**
       * Absolute path of the file to write.
       */
      path: string
      /**
       * Should overwrite the contents of the file.
       */
      overwrite?: boolean
      /**
       * Content to write into file
       */
      content: string
    }
    "#,
);

#[derive(Debug, Deserialize)]
struct WriteFileInput {
    path: String,
    #[serde(default)]
    overwrite: bool,
    content: String,
}

#[derive(Debug, Default)]
pub struct WriteFileTool;

impl WriteFileTool {
    pub fn new() -> Self {
        Self
    }
}

fn failed(path: &str, e: std::io::Error) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: NAME.into(),
        reason: format!("{path}: {e}"),
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Writes content to a file, appending unless asked to overwrite. Returns the file's new content."
    }

    fn parameters(&self) -> Option<&PropertyMap> {
        INPUT.properties()
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let input: WriteFileInput =
            serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        if input.overwrite {
            tokio::fs::write(&input.path, input.content.as_bytes())
                .await
                .map_err(|e| failed(&input.path, e))?;
        } else {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&input.path)
                .await
                .map_err(|e| failed(&input.path, e))?;
            file.write_all(input.content.as_bytes())
                .await
                .map_err(|e| failed(&input.path, e))?;
            file.flush().await.map_err(|e| failed(&input.path, e))?;
        }

        let content = tokio::fs::read_to_string(&input.path)
            .await
            .map_err(|e| failed(&input.path, e))?;
        tracing::debug!(path = %input.path, bytes = content.len(), "Wrote file");
        Ok(json!({ "success": true, "content": content }))
    }
}
