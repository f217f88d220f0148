//! Persistent typed configuration: records bound to human-editable files.
//!
//! # Overview
//!
//! Applications describe their configuration as plain Rust structs. Each struct gets
//! a [`ConfigModel`] describing its fields (defaults, help text, validators, custom
//! conversion hooks), built once with [`ConfigModel::builder`] and exposed through
//! [`ConfigRecord`]. A [`ConfRoot`] binds record types to a storage agent and opens
//! them with load-or-create semantics: the first open writes a file populated with
//! defaults for operators to edit; later opens read the edits back, merging them over
//! the in-memory defaults so partially edited files still work.
//!
//! Storage is pluggable on two axes. The agent decides file layout, one file per
//! record ([`MultiFileAgent`]) or one shared file with a section per record
//! ([`SingleFileAgent`]), and the [`FileFormat`] decides the text encoding, YAML (the
//! default, with field help rendered as comments) or JSON.
//!
//! ```
//! use std::sync::{Arc, LazyLock};
//! use conf_root::{ConfRoot, ConfigModel, ConfigRecord, MultiFileAgent};
//!
//! #[derive(Debug)]
//! struct AppConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl Default for AppConfig {
//!     fn default() -> Self {
//!         Self {
//!             host: "localhost".into(),
//!             port: 8080,
//!         }
//!     }
//! }
//!
//! static MODEL: LazyLock<Arc<ConfigModel>> = LazyLock::new(|| {
//!     ConfigModel::builder::<AppConfig>("AppConfig")
//!         .field("host", |c| &c.host, |c, v| c.host = v)
//!         .default_value("localhost".to_owned())
//!         .help("Hostname to bind to")
//!         .field("port", |c| &c.port, |c, v| c.port = v)
//!         .default_value(8080_u16)
//!         .validate(1_u16..)
//!         .build()
//! });
//!
//! impl ConfigRecord for AppConfig {
//!     fn model() -> Arc<ConfigModel> {
//!         MODEL.clone()
//!     }
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let root = ConfRoot::new(MultiFileAgent::new(dir.path())?);
//!
//! let mut config = root.open::<AppConfig>()?;
//! assert_eq!(config.port, 8080);
//! config.port = 9000;
//! config.save()?;
//!
//! let reopened = root.open::<AppConfig>()?;
//! assert_eq!(reopened.port, 9000);
//! # Ok(())
//! # }
//! ```
//!
//! # Crate features
//!
//! - `clap`: derives configuration records from `clap` command definitions; see
//!   [`ArgsConfig`].

#[cfg(feature = "clap")]
mod cli;
mod error;
pub mod forms;
mod model;
mod registrar;
mod store;
#[cfg(test)]
pub(crate) mod testonly;
mod validation;
mod value;

#[cfg(feature = "clap")]
pub use self::cli::ArgsConfig;
pub use self::{
    error::{ConfigError, StorageError},
    model::{
        ConfigModel, ConfigRecord, FieldBuilder, FieldDescriptor, FieldKind, FieldValue,
        ModelBuilder,
    },
    registrar::{ConfRoot, Config},
    store::{
        MultiFileAgent, SingleFileAgent, StorageAgent,
        format::{FileFormat, Json, Yaml},
    },
    validation::Validate,
    value::{BasicType, Map, Value},
};
