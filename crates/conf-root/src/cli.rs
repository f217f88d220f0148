//! Dynamic configuration records derived from `clap` command definitions.
//!
//! [`ArgsConfig`] inspects a [`clap::Command`] and builds a model whose fields mirror
//! the command's arguments: names, help text, possible values and defaults all carry
//! over. The record itself is a value map rather than a struct, opened through
//! [`ConfRoot::open_with_model`](crate::ConfRoot::open_with_model):
//!
//! ```
//! use clap::{Arg, ArgAction, Command};
//! use conf_root::{ArgsConfig, ConfRoot, MultiFileAgent};
//!
//! # fn main() -> anyhow::Result<()> {
//! let command = Command::new("app")
//!     .arg(Arg::new("host").long("host").default_value("localhost"))
//!     .arg(Arg::new("verbose").long("verbose").action(ArgAction::SetTrue));
//! let matches = command.clone().get_matches_from(["app", "--verbose"]);
//!
//! let args = ArgsConfig::from_command(&command, None);
//! let dir = tempfile::tempdir()?;
//! let root = ConfRoot::new(MultiFileAgent::new(dir.path())?);
//!
//! let mut config = root.open_with_model(args.model(), args)?;
//! // Explicitly passed arguments override stored values.
//! config.fill_from_matches(&matches);
//! config.save()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use clap::{ArgAction, ArgMatches, Command, parser::ValueSource};

use crate::{
    model::ConfigModel,
    value::{Map, Value},
};

/// Configuration record derived from a `clap` command definition.
///
/// Argument values are held in a map keyed by argument id and typed loosely as
/// [`Value`]; stored values pass through without declared-type coercion. Arguments
/// with unsupported shapes (custom actions, fixed multi-value arities outside
/// `Append`) are skipped and reported via [`Self::unsupported`]. The auto-generated
/// `help` and `version` arguments are always skipped.
#[derive(Debug)]
pub struct ArgsConfig {
    model: Arc<ConfigModel>,
    values: Map,
    specs: Vec<(String, ArgAction)>,
    unsupported: Vec<String>,
}

impl ArgsConfig {
    /// Derives a record from the command definition. The model is named after
    /// `model_name`, falling back to the command name.
    pub fn from_command(command: &Command, model_name: Option<&str>) -> Self {
        let mut command = command.clone();
        command.build();

        let model_name = model_name.unwrap_or_else(|| command.get_name());
        let mut builder = ConfigModel::builder::<Self>(model_name);
        let mut specs = Vec::new();
        let mut unsupported = Vec::new();

        for arg in command.get_arguments() {
            let name = arg.get_id().as_str().to_owned();
            if name == "help" || name == "version" {
                continue;
            }
            let action = arg.get_action().clone();
            let multi_valued = arg
                .get_num_args()
                .is_some_and(|range| range.max_values() > 1);
            let supported = matches!(
                action,
                ArgAction::Set
                    | ArgAction::Append
                    | ArgAction::SetTrue
                    | ArgAction::SetFalse
                    | ArgAction::Count
            ) && (!multi_valued || matches!(action, ArgAction::Append));
            if !supported {
                tracing::debug!(arg = %name, "skipping argument with unsupported shape");
                unsupported.push(name);
                continue;
            }

            let default = default_for(arg, &action);
            let choices: Vec<String> = arg
                .get_possible_values()
                .iter()
                .map(|value| value.get_name().to_owned())
                .collect();
            let help = arg.get_help().map(ToString::to_string).unwrap_or_default();

            let get_key = name.clone();
            let set_key = name.clone();
            let mut field = builder
                .field_opt(
                    &name,
                    move |config: &Self| config.values.get(&get_key),
                    move |config: &mut Self, value| {
                        config.values.insert(set_key.clone(), value);
                    },
                )
                // Values pass through verbatim; they are already in the object model.
                .serialize_with(Value::clone)
                .deserialize_with(|value| Ok(value.clone()))
                .default_value(default);
            if !help.is_empty() {
                field = field.help(&help);
            }
            if !choices.is_empty() {
                field = field.choices(choices);
            }
            builder = field.finish();

            specs.push((name, action));
        }

        Self {
            model: builder.build(),
            values: Map::new(),
            specs,
            unsupported,
        }
    }

    /// Returns the derived model.
    pub fn model(&self) -> Arc<ConfigModel> {
        self.model.clone()
    }

    /// Returns the current value of an argument, if set.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Sets the value of an argument.
    pub fn set_value(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Returns the ids of arguments that could not be mapped to fields.
    pub fn unsupported(&self) -> &[String] {
        &self.unsupported
    }

    /// Overwrites values with those the user passed explicitly on the command line.
    /// Arguments resolved from `clap` defaults are left alone, so stored values are
    /// not clobbered by mere defaults.
    pub fn fill_from_matches(&mut self, matches: &ArgMatches) {
        for (name, action) in &self.specs {
            let explicit = matches
                .value_source(name)
                .is_some_and(|source| source != ValueSource::DefaultValue);
            if !explicit {
                continue;
            }
            let value = match action {
                ArgAction::SetTrue | ArgAction::SetFalse => Value::Bool(matches.get_flag(name)),
                ArgAction::Count => Value::Number(u64::from(matches.get_count(name)).into()),
                ArgAction::Append => {
                    let raw = matches.get_raw(name).into_iter().flatten();
                    Value::Array(
                        raw.map(|item| Value::from_literal(&item.to_string_lossy()))
                            .collect(),
                    )
                }
                _ => {
                    let mut raw = matches.get_raw(name).into_iter().flatten();
                    match raw.next() {
                        Some(item) => Value::from_literal(&item.to_string_lossy()),
                        None => continue,
                    }
                }
            };
            self.values.insert(name.clone(), value);
        }
    }
}

fn default_for(arg: &clap::Arg, action: &ArgAction) -> Value {
    let defaults = arg.get_default_values();
    if defaults.is_empty() {
        return match action {
            ArgAction::SetTrue => Value::Bool(false),
            ArgAction::SetFalse => Value::Bool(true),
            ArgAction::Count => Value::Number(0.into()),
            _ => Value::Null,
        };
    }
    match action {
        ArgAction::Append => Value::Array(
            defaults
                .iter()
                .map(|item| Value::from_literal(&item.to_string_lossy()))
                .collect(),
        ),
        ArgAction::SetTrue | ArgAction::SetFalse => {
            Value::from_literal(&defaults[0].to_string_lossy())
        }
        _ => Value::from_literal(&defaults[0].to_string_lossy()),
    }
}

#[cfg(test)]
mod tests {
    use clap::Arg;

    use super::*;
    use crate::{ConfRoot, store::MultiFileAgent};

    fn test_command() -> Command {
        Command::new("app")
            .arg(
                Arg::new("host")
                    .long("host")
                    .default_value("localhost")
                    .help("Hostname to connect to"),
            )
            .arg(
                Arg::new("port")
                    .long("port")
                    .value_parser(clap::value_parser!(u16))
                    .default_value("8080"),
            )
            .arg(
                Arg::new("mode")
                    .long("mode")
                    .value_parser(["fast", "safe"])
                    .default_value("safe"),
            )
            .arg(Arg::new("verbose").long("verbose").action(ArgAction::SetTrue))
            .arg(Arg::new("tag").long("tag").action(ArgAction::Append))
    }

    #[test]
    fn model_mirrors_command_arguments() {
        let args = ArgsConfig::from_command(&test_command(), None);
        let model = args.model();
        assert_eq!(model.name(), "app");
        assert!(args.unsupported().is_empty());

        let host = model.field("host").unwrap();
        assert_eq!(host.help(), "Hostname to connect to");
        assert_eq!(host.default_data().unwrap().unwrap(), Value::String("localhost".into()));

        let port = model.field("port").unwrap();
        assert_eq!(port.default_data().unwrap().unwrap(), Value::Number(8080.into()));

        let mode = model.field("mode").unwrap();
        assert_eq!(mode.choices(), ["fast", "safe"]);

        let verbose = model.field("verbose").unwrap();
        assert_eq!(verbose.default_data().unwrap().unwrap(), Value::Bool(false));

        assert!(model.field("help").is_none());
    }

    #[test]
    fn explicit_arguments_override_stored_values() {
        let command = test_command();
        let matches = command
            .clone()
            .get_matches_from(["app", "--port", "9000", "--verbose"]);
        let mut args = ArgsConfig::from_command(&command, None);
        args.set_value("host", Value::String("stored.example".into()));
        args.set_value("port", Value::Number(1234.into()));

        args.fill_from_matches(&matches);
        // Explicit values win; default-sourced ones do not clobber stored data.
        assert_eq!(args.value("port"), Some(&Value::Number(9000.into())));
        assert_eq!(args.value("verbose"), Some(&Value::Bool(true)));
        assert_eq!(args.value("host"), Some(&Value::String("stored.example".into())));
    }

    #[test]
    fn append_collects_arrays() {
        let command = test_command();
        let matches = command
            .clone()
            .get_matches_from(["app", "--tag", "a", "--tag", "b"]);
        let mut args = ArgsConfig::from_command(&command, None);
        args.fill_from_matches(&matches);

        let expected = Value::Array(vec![Value::String("a".into()), Value::String("b".into())]);
        assert_eq!(args.value("tag"), Some(&expected));
    }

    #[test]
    fn derived_record_persists_like_any_other() {
        let temp = tempfile::tempdir().unwrap();
        let root = ConfRoot::new(MultiFileAgent::new(temp.path()).unwrap());

        let command = test_command();
        let matches = command.clone().get_matches_from(["app", "--port", "4444"]);
        let mut args = ArgsConfig::from_command(&command, None);
        let model = args.model();
        args.fill_from_matches(&matches);

        let config = root.open_with_model(model.clone(), args).unwrap();
        config.save().unwrap();

        // A second run without the flag picks the stored port back up.
        let fresh = ArgsConfig::from_command(&command, None);
        let reopened = root.open_with_model(model, fresh).unwrap();
        assert_eq!(reopened.value("port"), Some(&Value::Number(4444.into())));
        assert_eq!(reopened.value("host"), Some(&Value::String("localhost".into())));
    }
}
