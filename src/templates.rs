//! Message templates.
//!
//! Every user-facing string lives in `templates.yaml`, compiled into the
//! binary. Keys are dotted paths into the YAML tree (`visibility.now_public`)
//! and values may reference `{name}` placeholders.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use yaml_rust2::{Yaml, YamlLoader};

const TEMPLATE_SOURCE: &str = include_str!("templates.yaml");

lazy_static::lazy_static! {
    static ref TEMPLATES: HashMap<String, String> = match load_templates(TEMPLATE_SOURCE) {
        Ok(templates) => templates,
        Err(e) => {
            tracing::error!("Failed to load message templates: {:#}", e);
            HashMap::new()
        }
    };

    static ref PLACEHOLDER: regex::Regex =
        regex::Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("valid placeholder pattern");
}

/// Parse a YAML document into a flat map of dotted keys to template strings
pub fn load_templates(source: &str) -> Result<HashMap<String, String>> {
    let docs = YamlLoader::load_from_str(source).context("Failed to parse templates YAML")?;
    let mut templates = HashMap::new();

    if let Some(doc) = docs.first() {
        if !matches!(doc, Yaml::Hash(_)) {
            bail!("Templates document must be a mapping");
        }
        flatten("", doc, &mut templates);
    }

    Ok(templates)
}

fn flatten(prefix: &str, node: &Yaml, out: &mut HashMap<String, String>) {
    match node {
        Yaml::Hash(map) => {
            for (key, value) in map {
                let Some(key) = key.as_str() else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, value, out);
            }
        }
        Yaml::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        _ => {}
    }
}

/// Substitute `{name}` placeholders; unknown placeholders are left untouched
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

/// Look up and render a template by key. Unknown keys render as the key itself.
pub fn t(key: &str, vars: &[(&str, &str)]) -> String {
    match TEMPLATES.get(key) {
        Some(template) => render(template, vars),
        None => {
            tracing::warn!("Missing message template: {}", key);
            key.to_string()
        }
    }
}
