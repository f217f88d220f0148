//! Registrar tying configuration records to a storage agent.

use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use crate::{
    error::ConfigError,
    model::{ConfigModel, ConfigRecord},
    store::StorageAgent,
};

/// Entry point of the library: opens configuration records against a storage agent.
///
/// Opening a record follows the load-or-create lifecycle. If stored data exists for
/// the record's model, it is loaded and merged over the provided instance; otherwise
/// the instance is serialized and written out, so a fresh deployment immediately gets
/// an editable file with the defaults in it. Opening the same record type repeatedly
/// is harmless; each open re-reads the store.
///
/// ```
/// use conf_root::{ConfRoot, ConfigModel, ConfigRecord, MultiFileAgent};
/// use std::sync::{Arc, LazyLock};
///
/// #[derive(Debug, Default)]
/// struct AppConfig {
///     verbose: bool,
/// }
///
/// static MODEL: LazyLock<Arc<ConfigModel>> = LazyLock::new(|| {
///     ConfigModel::builder::<AppConfig>("AppConfig")
///         .field("verbose", |c| &c.verbose, |c, v| c.verbose = v)
///         .default_value(false)
///         .build()
/// });
///
/// impl ConfigRecord for AppConfig {
///     fn model() -> Arc<ConfigModel> {
///         MODEL.clone()
///     }
/// }
///
/// # fn main() -> anyhow::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let root = ConfRoot::new(MultiFileAgent::new(dir.path())?);
/// let mut config = root.open::<AppConfig>()?;
/// // The file now exists with the defaults written out.
/// assert!(dir.path().join("AppConfig.yml").exists());
///
/// config.verbose = true;
/// config.save()?;
/// # Ok(())
/// # }
/// ```
pub struct ConfRoot {
    agent: Option<Arc<dyn StorageAgent>>,
}

impl fmt::Debug for ConfRoot {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConfRoot")
            .field("agent", &self.agent)
            .finish()
    }
}

impl ConfRoot {
    /// Creates a registrar backed by the given storage agent.
    pub fn new(agent: impl StorageAgent) -> Self {
        Self {
            agent: Some(Arc::new(agent)),
        }
    }

    /// Creates a registrar with no persistence. Opened records keep their in-memory
    /// values, and [`Config::save`] / [`Config::load`] become no-ops.
    pub fn transient() -> Self {
        Self { agent: None }
    }

    /// Opens a record type starting from its `Default` instance.
    ///
    /// # Errors
    ///
    /// Propagates storage and conversion errors from the load-or-create lifecycle.
    pub fn open<R: ConfigRecord + Default>(&self) -> Result<Config<R>, ConfigError> {
        self.open_record(R::default())
    }

    /// Opens a record, using the provided instance as the source of initial values.
    /// Stored data, if any, is merged over it; fields absent from storage keep the
    /// instance's values.
    ///
    /// # Errors
    ///
    /// Propagates storage and conversion errors from the load-or-create lifecycle.
    pub fn open_record<R: ConfigRecord>(&self, record: R) -> Result<Config<R>, ConfigError> {
        self.open_with_model(R::model(), record)
    }

    /// Opens a record with an explicitly supplied model. This is the entry point for
    /// dynamic records whose model is built at runtime rather than via
    /// [`ConfigRecord`], such as records derived from CLI definitions.
    ///
    /// # Errors
    ///
    /// Propagates storage and conversion errors from the load-or-create lifecycle.
    pub fn open_with_model<R: 'static>(
        &self,
        model: Arc<ConfigModel>,
        mut record: R,
    ) -> Result<Config<R>, ConfigError> {
        if let Some(agent) = &self.agent {
            if agent.exists(&model)? {
                let data = agent.load(&model)?;
                model.apply_data(&mut record, &data)?;
                tracing::debug!(model = model.name(), "loaded stored configuration");
            } else {
                let data = model.to_data(&record)?;
                agent.save(&model, &data)?;
                tracing::debug!(model = model.name(), "created configuration with initial values");
            }
        }
        Ok(Config {
            record,
            model,
            agent: self.agent.clone(),
        })
    }
}

/// Handle to an opened configuration record. Dereferences to the record itself;
/// mutate it in place and call [`Self::save`] to persist.
pub struct Config<R> {
    record: R,
    model: Arc<ConfigModel>,
    agent: Option<Arc<dyn StorageAgent>>,
}

impl<R: fmt::Debug> fmt::Debug for Config<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Config")
            .field("record", &self.record)
            .field("model", &self.model.name())
            .finish_non_exhaustive()
    }
}

impl<R> Deref for Config<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.record
    }
}

impl<R> DerefMut for Config<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.record
    }
}

impl<R: 'static> Config<R> {
    /// Returns the model backing this record.
    pub fn model(&self) -> &ConfigModel {
        &self.model
    }

    /// Persists the record's current values. A no-op without a storage agent.
    ///
    /// # Errors
    ///
    /// Propagates serialization and storage errors.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(agent) = &self.agent {
            let data = self.model.to_data(&self.record)?;
            agent.save(&self.model, &data)?;
        }
        Ok(())
    }

    /// Re-reads stored data and merges it over the record's current values. A no-op
    /// without a storage agent or when nothing is stored yet.
    ///
    /// # Errors
    ///
    /// Propagates storage and conversion errors.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        if let Some(agent) = &self.agent
            && agent.exists(&self.model)?
        {
            let data = agent.load(&self.model)?;
            self.model.apply_data(&mut self.record, &data)?;
        }
        Ok(())
    }

    /// Unwraps the handle into the bare record.
    pub fn into_inner(self) -> R {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::{MultiFileAgent, SingleFileAgent},
        testonly::{Outer, ServerConfig},
    };

    #[test]
    fn open_creates_file_with_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let root = ConfRoot::new(MultiFileAgent::new(temp.path()).unwrap());
        let config = root.open::<ServerConfig>().unwrap();
        assert_eq!(config.port, 8080);

        let contents = std::fs::read_to_string(temp.path().join("ServerConfig.yml")).unwrap();
        assert!(contents.contains("host: localhost"));
        assert!(contents.contains("port: 8080"));
        assert!(contents.contains("# Port to listen on"));
    }

    #[test]
    fn open_loads_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join("ServerConfig.yml"),
            "host: example.com\nport: 9000\n",
        )
        .unwrap();

        let root = ConfRoot::new(MultiFileAgent::new(temp.path()).unwrap());
        let config = root.open::<ServerConfig>().unwrap();
        assert_eq!(config.host, "example.com");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("ServerConfig.yml"), "port: 9000\n").unwrap();

        let root = ConfRoot::new(MultiFileAgent::new(temp.path()).unwrap());
        let config = root.open::<ServerConfig>().unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn save_then_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let root = ConfRoot::new(MultiFileAgent::new(temp.path()).unwrap());

        let mut config = root.open::<ServerConfig>().unwrap();
        config.port = 4242;
        config.save().unwrap();

        let reopened = root.open::<ServerConfig>().unwrap();
        assert_eq!(reopened.port, 4242);
    }

    #[test]
    fn nested_records_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let root = ConfRoot::new(SingleFileAgent::new(temp.path().join("config.yml")).unwrap());

        let mut config = root.open::<Outer>().unwrap();
        config.inner.a = 42;
        config.save().unwrap();

        let reopened = root.open::<Outer>().unwrap();
        assert_eq!(reopened.inner.a, 42);
        assert_eq!(reopened.inner.b, "one");
    }

    #[test]
    fn repeated_loads_are_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("ServerConfig.yml"), "port: 9000\n").unwrap();

        let root = ConfRoot::new(MultiFileAgent::new(temp.path()).unwrap());
        let mut config = root.open::<ServerConfig>().unwrap();
        let snapshot = config.clone();
        config.load().unwrap();
        assert_eq!(*config, snapshot);
    }

    #[test]
    fn transient_root_skips_storage() {
        let root = ConfRoot::transient();
        let mut config = root.open::<ServerConfig>().unwrap();
        config.port = 1;
        config.save().unwrap();
        config.load().unwrap();
        assert_eq!(config.port, 1);
    }

    #[test]
    fn open_record_uses_instance_values() {
        let temp = tempfile::tempdir().unwrap();
        let root = ConfRoot::new(MultiFileAgent::new(temp.path()).unwrap());

        let seeded = ServerConfig {
            host: "10.0.0.1".into(),
            port: 9999,
        };
        let config = root.open_record(seeded).unwrap();
        // No stored data, so the instance bootstraps the file.
        assert_eq!(config.host, "10.0.0.1");
        let contents = std::fs::read_to_string(temp.path().join("ServerConfig.yml")).unwrap();
        assert!(contents.contains("port: 9999"));
    }
}
