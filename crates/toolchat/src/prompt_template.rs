use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Error as TeraError, Tera};

use crate::systems::System;

const DEFAULT_SYSTEM_PROMPT: &str = include_str!("prompts/system.md");

#[derive(Clone, Debug, Serialize)]
struct SystemInfo {
    name: String,
    description: String,
    instructions: String,
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Render a system prompt template with the given systems in scope as `systems`.
///
/// `None` renders the built-in prompt.
pub fn render_system_prompt<'a>(
    template: Option<&str>,
    systems: impl Iterator<Item = &'a dyn System>,
) -> Result<String, TeraError> {
    let systems: Vec<SystemInfo> = systems
        .map(|system| SystemInfo {
            name: system.name().to_string(),
            description: system.description().to_string(),
            instructions: system.instructions().to_string(),
        })
        .collect();

    let mut context = HashMap::new();
    context.insert("systems", systems);
    let rendered = load_prompt(template.unwrap_or(DEFAULT_SYSTEM_PROMPT), &context)?;
    Ok(rendered.trim().to_string())
}
