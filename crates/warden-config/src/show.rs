//! Rendering for `warden config show`: the merged configuration, with each
//! leaf tagged by the layer that set it.

use std::fmt::{self, Write as _};

use crate::merge::FieldSources;
use crate::types::Config;

/// The outcome of loading: the merged config plus where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Merged and validated configuration.
    pub config: Config,
    /// Layer that set each leaf, keyed by dotted path (`engine.on_abstain`).
    pub field_sources: FieldSources,
    /// Files that contributed, lowest precedence first.
    pub loaded_files: Vec<String>,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML, each leaf followed by a `# [layer]` comment.
    Toml,
    /// Plain JSON without source annotations.
    Json,
}

impl ResolvedConfig {
    /// Format the resolved config, optionally restricted to one section.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the section does not
    /// exist.
    pub fn show(&self, format: ShowFormat, section: Option<&str>) -> Result<String, fmt::Error> {
        match format {
            ShowFormat::Toml => self.show_toml(section),
            ShowFormat::Json => self.show_json(section),
        }
    }

    fn section_value(&self, section: &str) -> Result<toml::Value, fmt::Error> {
        let val = toml::Value::try_from(&self.config).map_err(|_| fmt::Error)?;
        let table = val.as_table().ok_or(fmt::Error)?;
        table.get(section).cloned().ok_or(fmt::Error)
    }

    fn show_toml(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        let toml_str = if let Some(section_name) = section {
            let mut wrapper = toml::map::Map::new();
            wrapper.insert(section_name.to_owned(), self.section_value(section_name)?);
            toml::to_string_pretty(&toml::Value::Table(wrapper)).map_err(|_| fmt::Error)?
        } else {
            toml::to_string_pretty(&self.config).map_err(|_| fmt::Error)?
        };

        let mut output = String::new();
        output.push_str("# Resolved warden configuration\n");
        output.push_str("# Each value is tagged with the layer that set it.\n");

        for (i, path) in self.loaded_files.iter().enumerate() {
            if i == 0 {
                output.push_str("#\n# Files, lowest precedence first:\n");
            }
            let _ = writeln!(output, "#   {path}");
        }
        output.push('\n');

        let mut table = String::new();
        for line in toml_str.lines() {
            let trimmed = line.trim();
            if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                table = header.trim_matches(|c| c == '[' || c == ']').to_owned();
            }
            if let Some(annotation) = self.annotate_line(trimmed, &table) {
                let _ = writeln!(output, "{line}  # {annotation}");
            } else {
                output.push_str(line);
                output.push('\n');
            }
        }

        Ok(output)
    }

    fn show_json(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        if let Some(section_name) = section {
            serde_json::to_string_pretty(&self.section_value(section_name)?)
                .map_err(|_| fmt::Error)
        } else {
            serde_json::to_string_pretty(&self.config).map_err(|_| fmt::Error)
        }
    }

    /// Source annotation for a `key = value` line inside `table`.
    fn annotate_line(&self, trimmed: &str, table: &str) -> Option<String> {
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }
        let key = trimmed.split('=').next()?.trim();
        let field_path = if table.is_empty() {
            key.to_owned()
        } else {
            format!("{table}.{key}")
        };
        self.field_sources
            .get(&field_path)
            .map(|layer| format!("[{layer}]"))
    }
}
