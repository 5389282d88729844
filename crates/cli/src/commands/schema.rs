//! `yugent schema`: Print the parameter schema derived from a declaration.

use std::path::Path;

use yugent_core::schema::{PropertySchema, derive_properties};

pub fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    println!("{}", render(&source)?);
    Ok(())
}

/// The derived properties as a pretty-printed object schema.
fn render(source: &str) -> Result<String, Box<dyn std::error::Error>> {
    let properties = derive_properties(source)?;
    Ok(serde_json::to_string_pretty(&PropertySchema::object(properties))?)
}
