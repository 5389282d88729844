//! Built-in tool implementations for yugent.
//!
//! Each tool declares its input as interface text; the parameter schema
//! advertised to the model is derived from that text the first time it is
//! needed.

pub mod get_weather;
pub mod read_file;
pub mod write_file;

use std::sync::{Arc, OnceLock};

use tracing::warn;
use yugent_config::ToolsConfig;
use yugent_core::schema::{PropertyMap, derive_properties};
use yugent_core::tool::ToolLayer;

pub use get_weather::WeatherTool;
pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;

/// A tool's input declaration and its lazily derived properties.
pub struct DeclaredInput {
    source: &'static str,
    derived: OnceLock<Option<PropertyMap>>,
}

impl DeclaredInput {
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            derived: OnceLock::new(),
        }
    }

    /// Derived properties, or `None` if the declaration does not parse.
    pub fn properties(&self) -> Option<&PropertyMap> {
        self.derived
            .get_or_init(|| match derive_properties(self.source) {
                Ok(properties) => Some(properties),
                Err(e) => {
                    warn!(error = %e, "Tool input declaration did not parse");
                    None
                }
            })
            .as_ref()
    }
}

/// Build the tool layers enabled in the configuration, in a fixed order.
pub fn default_tool_layers(config: &ToolsConfig) -> Vec<ToolLayer> {
    let mut layers = Vec::new();
    if config.is_enabled(read_file::NAME) {
        layers.push(ToolLayer::from_tool(Arc::new(ReadFileTool::new())));
    }
    if config.is_enabled(write_file::NAME) {
        layers.push(ToolLayer::from_tool(Arc::new(WriteFileTool::new())));
    }
    if config.is_enabled(get_weather::NAME) {
        layers.push(ToolLayer::from_tool(Arc::new(WeatherTool::from_env(
            &config.weather_base_url,
            &config.weather_api_key_env,
        ))));
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_tools_enabled_by_default() {
        let layers = default_tool_layers(&ToolsConfig::default());
        let ids: Vec<&str> = layers.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["read_file", "write_file", "get_weather"]);
    }

    #[test]
    fn disabled_tools_are_skipped() {
        let config = ToolsConfig {
            enabled: vec!["get_weather".into()],
            ..ToolsConfig::default()
        };
        let layers = default_tool_layers(&config);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].tool.name(), "get_weather");
    }

    #[test]
    fn declared_input_derives_once() {
        let input = DeclaredInput::new("interface A { /** The name */ name: string; age?: number }");
        let first = input.properties().unwrap();
        assert_eq!(first.names(), vec!["name", "age"]);
        assert_eq!(first.required(), vec!["name"]);
        assert!(std::ptr::eq(first, input.properties().unwrap()));
    }

    #[test]
    fn unparseable_declaration_exports_no_properties() {
        let input = DeclaredInput::new("not a declaration");
        assert!(input.properties().is_none());
    }
}
