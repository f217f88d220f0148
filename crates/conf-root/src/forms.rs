//! HTML form rendering for configuration records.
//!
//! Server-agnostic: [`form_fields`] flattens a record into renderable field
//! descriptions, [`render_form`] turns them into an HTML fragment, and
//! [`apply_submission`] folds decoded form pairs back into the record. Wiring these
//! into an HTTP server is left to the caller.

use std::any::Any;

use crate::{
    error::ConfigError,
    model::{ConfigModel, FieldKind},
    value::{Map, Value},
};

/// Input control kind for one form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Number,
    Checkbox,
    Select,
}

/// One renderable form field, flattened out of the record's nesting tree.
#[derive(Debug, Clone)]
pub struct FormField {
    /// Form control name; nested fields are dotted paths (`inner.a`).
    pub name: String,
    /// Help text attached to the field, or empty.
    pub help: String,
    /// Control kind, derived from the current value and declared choices.
    pub input: InputKind,
    /// Current value, rendered as text. Checkboxes use `"true"` / `""`.
    pub value: String,
    /// Options for [`InputKind::Select`] controls.
    pub choices: Vec<String>,
}

/// Flattens the record into form fields, one per leaf of the nesting tree.
///
/// # Errors
///
/// Propagates serialization errors from reading the record.
pub fn form_fields(model: &ConfigModel, record: &dyn Any) -> Result<Vec<FormField>, ConfigError> {
    let data = model.to_data(record)?;
    let mut fields = Vec::new();
    collect_fields(model, &data, "", &mut fields);
    Ok(fields)
}

fn collect_fields(model: &ConfigModel, data: &Map, prefix: &str, out: &mut Vec<FormField>) {
    for field in model.fields() {
        let name = if prefix.is_empty() {
            field.name().to_owned()
        } else {
            format!("{prefix}.{}", field.name())
        };
        let value = data.get(field.name()).unwrap_or(&Value::Null);

        // Nested models flatten recursively, unless a custom hook collapsed the
        // subtree into a scalar.
        if let (FieldKind::Nested(nested), Value::Object(nested_data)) = (field.kind(), value) {
            collect_fields(nested, nested_data, &name, out);
            continue;
        }

        let (input, rendered) = match value {
            Value::Bool(flag) => (InputKind::Checkbox, if *flag { "true".to_owned() } else { String::new() }),
            Value::Number(number) => (InputKind::Number, number.to_string()),
            Value::String(text) => (InputKind::Text, text.clone()),
            Value::Null => (InputKind::Text, String::new()),
            composite => (
                InputKind::Text,
                serde_json::to_string(&composite).unwrap_or_default(),
            ),
        };
        let input = if field.choices().is_empty() {
            input
        } else {
            InputKind::Select
        };
        out.push(FormField {
            name,
            help: field.help().to_owned(),
            input,
            value: rendered,
            choices: field.choices().to_vec(),
        });
    }
}

/// Renders the record as an HTML form fragment: one labeled control per leaf field,
/// plus a submit button. The fragment is meant to be embedded in a caller-provided
/// page and posted back for [`apply_submission`].
///
/// # Errors
///
/// Propagates serialization errors from reading the record.
pub fn render_form(model: &ConfigModel, record: &dyn Any) -> Result<String, ConfigError> {
    let fields = form_fields(model, record)?;
    let mut html = String::from("<form method=\"post\">\n");
    for field in &fields {
        let name = escape(&field.name);
        html.push_str("  <label>");
        html.push_str(&name);
        if !field.help.is_empty() {
            html.push_str(" <small>");
            html.push_str(&escape(&field.help));
            html.push_str("</small>");
        }
        html.push_str("</label>\n  ");
        match field.input {
            InputKind::Checkbox => {
                html.push_str(&format!(
                    "<input type=\"checkbox\" name=\"{name}\" value=\"true\"{}>\n",
                    if field.value.is_empty() { "" } else { " checked" }
                ));
            }
            InputKind::Select => {
                html.push_str(&format!("<select name=\"{name}\">\n"));
                for choice in &field.choices {
                    let choice_attr = escape(choice);
                    html.push_str(&format!(
                        "    <option value=\"{choice_attr}\"{}>{choice_attr}</option>\n",
                        if *choice == field.value { " selected" } else { "" }
                    ));
                }
                html.push_str("  </select>\n");
            }
            InputKind::Number => {
                html.push_str(&format!(
                    "<input type=\"number\" name=\"{name}\" value=\"{}\">\n",
                    escape(&field.value)
                ));
            }
            InputKind::Text => {
                html.push_str(&format!(
                    "<input type=\"text\" name=\"{name}\" value=\"{}\">\n",
                    escape(&field.value)
                ));
            }
        }
    }
    html.push_str("  <button type=\"submit\">Save</button>\n</form>\n");
    Ok(html)
}

/// Folds decoded form pairs (dotted name, raw value) back into the record.
///
/// Submitted values are coerced by the shape of the record's current values: numeric
/// fields parse their text, boolean fields follow checkbox semantics (an absent pair
/// means unchecked), string fields take the text verbatim, and composite fields parse
/// JSON. Unknown names are ignored. Population goes through the model, so custom
/// hooks and validators apply as usual.
///
/// # Errors
///
/// Propagates coercion and validation errors from population.
pub fn apply_submission(
    model: &ConfigModel,
    record: &mut dyn Any,
    pairs: &[(String, String)],
) -> Result<(), ConfigError> {
    let current = model.to_data(record)?;
    let update = build_update(model, &current, "", pairs);
    model.apply_data(record, &update)
}

fn build_update(model: &ConfigModel, current: &Map, prefix: &str, pairs: &[(String, String)]) -> Map {
    let mut update = Map::new();
    for field in model.fields() {
        let name = if prefix.is_empty() {
            field.name().to_owned()
        } else {
            format!("{prefix}.{}", field.name())
        };
        let current_value = current.get(field.name()).unwrap_or(&Value::Null);

        if let (FieldKind::Nested(nested), Value::Object(nested_current)) =
            (field.kind(), current_value)
        {
            let nested_update = build_update(nested, nested_current, &name, pairs);
            if !nested_update.is_empty() {
                update.insert(field.name().to_owned(), Value::Object(nested_update));
            }
            continue;
        }

        let submitted = pairs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, raw)| raw.as_str());
        let value = match (current_value, submitted) {
            // Checkboxes are omitted from the submission when unchecked.
            (Value::Bool(_), None) => Value::Bool(false),
            (Value::Bool(_), Some(raw)) => {
                Value::Bool(matches!(raw, "true" | "on" | "1" | "checked"))
            }
            (_, None) => continue,
            (Value::Number(_), Some(raw)) => Value::from_literal(raw),
            (Value::String(_) | Value::Null, Some(raw)) => Value::String(raw.to_owned()),
            (_, Some(raw)) => serde_json::from_str::<Value>(raw)
                .unwrap_or_else(|_| Value::String(raw.to_owned())),
        };
        update.insert(field.name().to_owned(), value);
    }
    update
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            ch => escaped.push(ch),
        }
    }
    escaped
}
