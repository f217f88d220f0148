//! On-disk file formats for configuration storage.

use std::fmt;

use anyhow::Context as _;

use crate::{
    model::ConfigModel,
    value::{Map, Value},
};

/// Text format used by storage agents to persist configuration dictionaries.
pub trait FileFormat: 'static + Send + Sync + fmt::Debug {
    /// Returns the file extension, without the leading dot.
    fn extension(&self) -> &'static str;

    /// Parses file contents into a configuration dictionary. Empty input parses to an
    /// empty dictionary.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or its top level is not a mapping.
    fn parse(&self, text: &str) -> anyhow::Result<Map>;

    /// Renders a configuration dictionary to file contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the dictionary cannot be represented in this format.
    fn render(&self, data: &Map) -> anyhow::Result<String>;

    /// Decorates rendered output with field metadata from the model (e.g., comments).
    /// `section` is the top-level key holding the model's fields, if the rendered
    /// document nests multiple models. The default implementation is a no-op.
    fn annotate(&self, rendered: String, model: &ConfigModel, section: Option<&str>) -> String {
        let _ = (model, section);
        rendered
    }
}

/// YAML file format. Field help and declared choices are emitted as `#` comments
/// above the corresponding keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct Yaml;

impl FileFormat for Yaml {
    fn extension(&self) -> &'static str {
        "yml"
    }

    fn parse(&self, text: &str) -> anyhow::Result<Map> {
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        let raw: serde_yaml::Value =
            serde_yaml::from_str(text).context("failed deserializing YAML")?;
        match Value::from_yaml(raw)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => anyhow::bail!(
                "expected a mapping at the top level, got {}",
                other.basic_type().map_or_else(|| "null".to_owned(), |ty| ty.to_string())
            ),
        }
    }

    fn render(&self, data: &Map) -> anyhow::Result<String> {
        serde_yaml::to_string(&Value::Object(data.clone()).into_yaml())
            .context("failed serializing YAML")
    }

    fn annotate(&self, rendered: String, model: &ConfigModel, section: Option<&str>) -> String {
        // Model fields sit at the top level, or one indent step below `section`.
        let key_indent = if section.is_some() { "  " } else { "" };
        let mut in_section = section.is_none();
        let mut out = String::with_capacity(rendered.len());

        for line in rendered.lines() {
            if let Some(section) = section
                && !line.starts_with([' ', '#'])
            {
                in_section = line.trim_end() == format!("{section}:");
            }
            if in_section {
                let annotated = model.fields().iter().find(|field| {
                    line.strip_prefix(key_indent)
                        .and_then(|rest| rest.strip_prefix(field.name()))
                        .is_some_and(|rest| rest.starts_with(':'))
                });
                if let Some(field) = annotated {
                    if !field.help().is_empty() {
                        out.push_str(key_indent);
                        out.push_str("# ");
                        out.push_str(field.help());
                        out.push('\n');
                    }
                    if !field.choices().is_empty() {
                        out.push_str(key_indent);
                        out.push_str("# one of: ");
                        out.push_str(&field.choices().join(", "));
                        out.push('\n');
                    }
                }
            }
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Pretty-printed JSON file format. Carries no comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl FileFormat for Json {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn parse(&self, text: &str) -> anyhow::Result<Map> {
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        let raw: serde_json::Value =
            serde_json::from_str(text).context("failed deserializing JSON")?;
        match Value::from(raw) {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => anyhow::bail!(
                "expected an object at the top level, got {}",
                other.basic_type().map_or_else(|| "null".to_owned(), |ty| ty.to_string())
            ),
        }
    }

    fn render(&self, data: &Map) -> anyhow::Result<String> {
        let raw = serde_json::Value::from(Value::Object(data.clone()));
        let mut rendered =
            serde_json::to_string_pretty(&raw).context("failed serializing JSON")?;
        rendered.push('\n');
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigRecord, testonly::ServerConfig};

    #[test]
    fn yaml_round_trip() {
        let data = Map::from([
            ("host".to_owned(), Value::String("localhost".into())),
            ("port".to_owned(), Value::Number(8080.into())),
        ]);
        let rendered = Yaml.render(&data).unwrap();
        assert_eq!(Yaml.parse(&rendered).unwrap(), data);
    }

    #[test]
    fn yaml_parses_empty_input() {
        assert_eq!(Yaml.parse("").unwrap(), Map::new());
        assert_eq!(Yaml.parse("  \n").unwrap(), Map::new());
    }

    #[test]
    fn yaml_comments_from_field_help() {
        let model = ServerConfig::model();
        let data = model.defaults().unwrap();
        let rendered = Yaml.render(&data).unwrap();
        let annotated = Yaml.annotate(rendered, &model, None);

        let lines: Vec<_> = annotated.lines().collect();
        let host_idx = lines.iter().position(|line| line.starts_with("host:")).unwrap();
        assert_eq!(lines[host_idx - 1], "# Hostname to bind to");
        let port_idx = lines.iter().position(|line| line.starts_with("port:")).unwrap();
        assert_eq!(lines[port_idx - 1], "# Port to listen on");
    }

    #[test]
    fn yaml_comments_within_section() {
        let model = ServerConfig::model();
        let section_data = Map::from([(
            "ServerConfig".to_owned(),
            Value::Object(model.defaults().unwrap()),
        )]);
        let rendered = Yaml.render(&section_data).unwrap();
        let annotated = Yaml.annotate(rendered, &model, Some("ServerConfig"));

        assert!(annotated.contains("  # Port to listen on\n  port:"));
        // Nothing is annotated at the top level.
        assert!(!annotated.contains("\n# "));
    }

    #[test]
    fn json_round_trip() {
        let data = Map::from([
            ("enabled".to_owned(), Value::Bool(true)),
            (
                "tags".to_owned(),
                Value::Array(vec![Value::String("a".into()), Value::String("b".into())]),
            ),
        ]);
        let rendered = Json.render(&data).unwrap();
        assert_eq!(Json.parse(&rendered).unwrap(), data);
    }

    #[test]
    fn top_level_must_be_a_mapping() {
        assert!(Yaml.parse("- 1\n- 2\n").is_err());
        assert!(Json.parse("[1, 2]").is_err());
    }
}
