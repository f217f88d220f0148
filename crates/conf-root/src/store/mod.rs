//! Storage agents: pluggable persistence strategies for configuration models.
//!
//! An agent decides where a model's data lives and how it shares files with other
//! models. [`MultiFileAgent`] gives each model its own file in a directory;
//! [`SingleFileAgent`] keeps every model under its own top-level section of one file.
//! Both delegate text encoding to a [`FileFormat`].
//!
//! Saving is a read-modify-write of the target file, so keys a model does not know
//! about survive round trips. The read-modify-write is not synchronized; concurrent
//! writers to the same file can lose updates.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::{
    error::StorageError,
    model::ConfigModel,
    value::{Map, Value},
};

pub mod format;

use self::format::{FileFormat, Yaml};

/// Persistence strategy for configuration models.
pub trait StorageAgent: 'static + Send + Sync + fmt::Debug {
    /// Returns the file path backing the model's data.
    fn location_for(&self, model: &ConfigModel) -> PathBuf;

    /// Checks whether stored data exists for the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage location cannot be inspected.
    fn exists(&self, model: &ConfigModel) -> Result<bool, StorageError>;

    /// Loads the stored dictionary for the model. Data missing for this particular
    /// model resolves to an empty dictionary.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failures or malformed stored data.
    fn load(&self, model: &ConfigModel) -> Result<Map, StorageError>;

    /// Persists the model's dictionary, merging over any currently stored data so
    /// that unrelated keys are preserved.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failures or if existing stored data is malformed.
    fn save(&self, model: &ConfigModel, data: &Map) -> Result<(), StorageError>;
}

fn read_existing(path: &Path, format: &impl FileFormat) -> Result<Map, StorageError> {
    let text = fs::read_to_string(path).map_err(|err| StorageError::io(path, err))?;
    format.parse(&text).map_err(|err| StorageError::new(path, err))
}

fn merge_into(current: &mut Map, data: &Map) {
    for (key, value) in data {
        match current.get_mut(key) {
            Some(existing) => existing.deep_merge(value.clone()),
            None => {
                current.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Agent storing each model in its own file, named after the model, inside one
/// directory.
#[derive(Debug)]
pub struct MultiFileAgent<F: FileFormat = Yaml> {
    dir: PathBuf,
    format: F,
}

impl MultiFileAgent {
    /// Creates an agent storing YAML files under `dir`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::with_format(dir, Yaml)
    }
}

impl<F: FileFormat> MultiFileAgent<F> {
    /// Creates an agent with a custom file format.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_format(dir: impl Into<PathBuf>, format: F) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| StorageError::io(&dir, err))?;
        Ok(Self { dir, format })
    }

    /// Returns the directory the agent stores files under.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl<F: FileFormat> StorageAgent for MultiFileAgent<F> {
    /// One file per model. The format extension is appended unless the model name
    /// already carries it.
    fn location_for(&self, model: &ConfigModel) -> PathBuf {
        let suffix = format!(".{}", self.format.extension());
        let name = model.name();
        if name.ends_with(&suffix) {
            self.dir.join(name)
        } else {
            self.dir.join(format!("{name}{suffix}"))
        }
    }

    fn exists(&self, model: &ConfigModel) -> Result<bool, StorageError> {
        Ok(self.location_for(model).exists())
    }

    fn load(&self, model: &ConfigModel) -> Result<Map, StorageError> {
        let path = self.location_for(model);
        if !path.exists() {
            return Ok(Map::new());
        }
        read_existing(&path, &self.format)
    }

    fn save(&self, model: &ConfigModel, data: &Map) -> Result<(), StorageError> {
        let path = self.location_for(model);
        let mut current = if path.exists() {
            read_existing(&path, &self.format)?
        } else {
            Map::new()
        };
        merge_into(&mut current, data);

        let rendered = self
            .format
            .render(&current)
            .map_err(|err| StorageError::new(&path, err))?;
        let rendered = self.format.annotate(rendered, model, None);
        fs::write(&path, rendered).map_err(|err| StorageError::io(&path, err))?;
        tracing::debug!(model = model.name(), path = %path.display(), "saved configuration");
        Ok(())
    }
}

/// Agent storing every model as a top-level section of a single file, keyed by the
/// model name.
#[derive(Debug)]
pub struct SingleFileAgent<F: FileFormat = Yaml> {
    path: PathBuf,
    format: F,
}

impl SingleFileAgent {
    /// Creates an agent storing all models in the YAML file at `path`, creating
    /// parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if a parent directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::with_format(path, Yaml)
    }
}

impl<F: FileFormat> SingleFileAgent<F> {
    /// Creates an agent with a custom file format.
    ///
    /// # Errors
    ///
    /// Returns an error if a parent directory cannot be created.
    pub fn with_format(path: impl Into<PathBuf>, format: F) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| StorageError::io(parent, err))?;
        }
        Ok(Self { path, format })
    }

    /// Returns the shared file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map, StorageError> {
        if self.path.exists() {
            read_existing(&self.path, &self.format)
        } else {
            Ok(Map::new())
        }
    }
}

impl<F: FileFormat> StorageAgent for SingleFileAgent<F> {
    /// All models share the one file.
    fn location_for(&self, model: &ConfigModel) -> PathBuf {
        let _ = model;
        self.path.clone()
    }

    fn exists(&self, model: &ConfigModel) -> Result<bool, StorageError> {
        // A model exists only once its section key is present; other models sharing
        // the file do not make it exist.
        if !self.path.exists() {
            return Ok(false);
        }
        let all = read_existing(&self.path, &self.format)?;
        Ok(all.contains_key(model.name()))
    }

    fn load(&self, model: &ConfigModel) -> Result<Map, StorageError> {
        let mut all = self.read_all()?;
        match all.remove(model.name()) {
            Some(Value::Object(section)) => Ok(section),
            Some(other) => Err(StorageError::new(
                &self.path,
                anyhow::anyhow!(
                    "expected section `{}` to be a mapping, got {}",
                    model.name(),
                    other
                        .basic_type()
                        .map_or_else(|| "null".to_owned(), |ty| ty.to_string())
                ),
            )),
            None => Ok(Map::new()),
        }
    }

    fn save(&self, model: &ConfigModel, data: &Map) -> Result<(), StorageError> {
        let mut all = self.read_all()?;
        let section = all
            .entry(model.name().to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !matches!(section, Value::Object(_)) {
            *section = Value::Object(Map::new());
        }
        section.deep_merge(Value::Object(data.clone()));

        let rendered = self
            .format
            .render(&all)
            .map_err(|err| StorageError::new(&self.path, err))?;
        let rendered = self.format.annotate(rendered, model, Some(model.name()));
        fs::write(&self.path, rendered).map_err(|err| StorageError::io(&self.path, err))?;
        tracing::debug!(
            model = model.name(),
            path = %self.path.display(),
            "saved configuration section"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigModel;

    fn test_model(name: &str) -> std::sync::Arc<ConfigModel> {
        #[derive(Debug, Default)]
        struct Dummy;
        ConfigModel::builder::<Dummy>(name).build()
    }

    #[test]
    fn multi_file_paths() {
        let temp = tempfile::tempdir().unwrap();
        let agent = MultiFileAgent::new(temp.path().join("conf")).unwrap();
        assert!(temp.path().join("conf").is_dir());

        let path = agent.location_for(&test_model("App"));
        assert_eq!(path, temp.path().join("conf").join("App.yml"));
        // The extension is appended at most once.
        let path = agent.location_for(&test_model("App.yml"));
        assert_eq!(path, temp.path().join("conf").join("App.yml"));
    }

    #[test]
    fn multi_file_save_preserves_unknown_keys() {
        let temp = tempfile::tempdir().unwrap();
        let agent = MultiFileAgent::new(temp.path()).unwrap();
        let model = test_model("App");

        fs::write(temp.path().join("App.yml"), "legacy: kept\n").unwrap();
        let data = Map::from([("port".to_owned(), Value::Number(8080.into()))]);
        agent.save(&model, &data).unwrap();

        let loaded = agent.load(&model).unwrap();
        assert_eq!(loaded["legacy"], Value::String("kept".into()));
        assert_eq!(loaded["port"], Value::Number(8080.into()));
    }

    #[test]
    fn single_file_sections_are_isolated() {
        let temp = tempfile::tempdir().unwrap();
        let agent = SingleFileAgent::new(temp.path().join("config.yml")).unwrap();
        let first = test_model("First");
        let second = test_model("Second");

        agent
            .save(&first, &Map::from([("x".to_owned(), Value::Number(1.into()))]))
            .unwrap();
        assert!(agent.exists(&first).unwrap());
        // The file now exists, but the second model's section does not.
        assert!(!agent.exists(&second).unwrap());

        agent
            .save(&second, &Map::from([("y".to_owned(), Value::Number(2.into()))]))
            .unwrap();
        assert_eq!(
            agent.load(&first).unwrap(),
            Map::from([("x".to_owned(), Value::Number(1.into()))])
        );
        assert_eq!(
            agent.load(&second).unwrap(),
            Map::from([("y".to_owned(), Value::Number(2.into()))])
        );
    }

    #[test]
    fn multi_file_load_of_missing_file_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let agent = MultiFileAgent::new(temp.path()).unwrap();
        assert_eq!(agent.load(&test_model("Absent")).unwrap(), Map::new());
    }

    #[test]
    fn single_file_load_of_missing_section_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let agent = SingleFileAgent::new(temp.path().join("config.yml")).unwrap();
        assert_eq!(agent.load(&test_model("Absent")).unwrap(), Map::new());
    }
}
