//! Configuration models: field descriptor tables plus the recursive conversion engine.
//!
//! A [`ConfigModel`] describes one registered record type: an ordered table of
//! [`FieldDescriptor`]s, each carrying the field's default factory, optional custom
//! serialize / deserialize hooks, validators and display metadata. The model drives
//! two-way conversion between record instances and the persisted object model
//! ([`Value`] / [`Map`]): [`ConfigModel::to_data`] and [`ConfigModel::apply_data`].
//!
//! Models are built once per record type via the typed [`ModelBuilder`] and exposed
//! through the [`ConfigRecord`] trait, typically from a `LazyLock` static:
//!
//! ```
//! use std::sync::{Arc, LazyLock};
//! use conf_root::{ConfigModel, ConfigRecord};
//!
//! #[derive(Debug)]
//! struct DbConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl Default for DbConfig {
//!     fn default() -> Self {
//!         Self {
//!             host: "localhost".into(),
//!             port: 5432,
//!         }
//!     }
//! }
//!
//! static MODEL: LazyLock<Arc<ConfigModel>> = LazyLock::new(|| {
//!     ConfigModel::builder::<DbConfig>("DbConfig")
//!         .field("host", |c| &c.host, |c, v| c.host = v)
//!         .default_value("localhost".to_owned())
//!         .help("Hostname the database listens on")
//!         .field("port", |c| &c.port, |c, v| c.port = v)
//!         .default_value(5432_u16)
//!         .build()
//! });
//!
//! impl ConfigRecord for DbConfig {
//!     fn model() -> Arc<ConfigModel> {
//!         MODEL.clone()
//!     }
//! }
//! ```

use std::{any::Any, fmt, marker::PhantomData, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    error::ConfigError,
    validation::{NamedPredicate, Validate},
    value::{self, Map, Value},
};

/// Marks a type as a persistable configuration record and exposes its model.
///
/// Nested configurations are expressed through this trait as well: a field whose type
/// implements `ConfigRecord` can be registered with [`ModelBuilder::nested`], and the
/// conversion engine recurses through the nested type's own model. A record type must
/// not reference itself directly or transitively through nested fields.
pub trait ConfigRecord: 'static {
    /// Returns the model for this record type. Expected to return a clone of a shared
    /// (usually `LazyLock`-backed) instance.
    fn model() -> Arc<ConfigModel>;
}

/// Leaf field value: anything serde can move in and out of the persisted object model.
pub trait FieldValue: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T: Serialize + DeserializeOwned + Send + Sync + 'static> FieldValue for T {}

/// Kind of a configuration field.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum FieldKind {
    /// Plain value converted through serde (or custom hooks).
    Leaf,
    /// Nested configuration record with its own model.
    Nested(Arc<ConfigModel>),
}

type ReadFn = Box<dyn Fn(&dyn Any) -> Result<Option<Value>, ConfigError> + Send + Sync>;
type WriteFn = Box<dyn Fn(&mut dyn Any, &Value) -> Result<(), ConfigError> + Send + Sync>;
type DefaultFn = Box<dyn Fn() -> Result<Value, ConfigError> + Send + Sync>;

/// Describes one named, typed slot of a configuration record.
///
/// Created by the [`ModelBuilder`] at registration time and immutable afterwards;
/// this is a read-only description, not per-instance state.
pub struct FieldDescriptor {
    name: String,
    help: String,
    choices: Vec<String>,
    kind: FieldKind,
    default: Option<DefaultFn>,
    read: ReadFn,
    write: WriteFn,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("help", &self.help)
            .field("choices", &self.choices)
            .field("kind", &self.kind)
            .field("has_default", &self.default.is_some())
            .finish_non_exhaustive()
    }
}

impl FieldDescriptor {
    /// Returns the field name, unique within the owning model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the human-readable field comment, or an empty string.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Returns the enumerated allowed values, if any were declared.
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    /// Returns the field kind.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Checks whether the field has a default factory.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Computes the persisted form of the field default, if the field has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the default value fails serialization.
    pub fn default_data(&self) -> Option<Result<Value, ConfigError>> {
        self.default.as_ref().map(|default| default())
    }
}

/// Model for one registered configuration record type: a logical section name plus the
/// ordered field-descriptor table, with the recursive conversion operations.
pub struct ConfigModel {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl fmt::Debug for ConfigModel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConfigModel")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Replaces characters that are reserved in file names on common filesystems.
fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_whitespace() || ch.is_control() => '_',
            ch => ch,
        })
        .collect()
}

impl ConfigModel {
    /// Starts building a model for the record type `R` under the given section name.
    ///
    /// The name is used as the top-level key in single-file storage and as the filename
    /// stem in multi-file storage; reserved path characters are replaced with `_`.
    pub fn builder<R: 'static>(name: &str) -> ModelBuilder<R> {
        ModelBuilder {
            name: sanitize_name(name),
            fields: Vec::new(),
            _record: PhantomData,
        }
    }

    /// Returns the sanitized section name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field descriptors in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field descriptor by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Computes the persisted dictionary of all field defaults.
    ///
    /// Fields without a default factory are omitted entirely; they are never written
    /// as null, so their later population from constructor arguments is not blocked.
    ///
    /// # Errors
    ///
    /// Returns an error if a default value fails serialization.
    pub fn defaults(&self) -> Result<Map, ConfigError> {
        let mut data = Map::new();
        for field in &self.fields {
            if let Some(default) = &field.default {
                data.insert(field.name.clone(), default()?);
            }
        }
        Ok(data)
    }

    /// Converts a record instance into its persisted dictionary.
    ///
    /// A custom serialize hook, where declared, takes precedence and stops recursion;
    /// nested registered records recurse through their own models; plain leaves are
    /// serialized via serde.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialization`] if a field value cannot be represented in
    /// the object model, or [`ConfigError::MissingField`] if a field without a default
    /// has no value (only possible for dynamic records registered with optional
    /// accessors).
    ///
    /// # Panics
    ///
    /// Panics if `record` is not an instance of the type this model was built for.
    pub fn to_data(&self, record: &dyn Any) -> Result<Map, ConfigError> {
        let mut data = Map::new();
        for field in &self.fields {
            match (field.read)(record)? {
                Some(value) => {
                    data.insert(field.name.clone(), value);
                }
                None => {
                    if let Some(default) = &field.default {
                        data.insert(field.name.clone(), default()?);
                    } else {
                        return Err(ConfigError::MissingField {
                            field: field.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(data)
    }

    /// Populates a record instance from a persisted dictionary, in place.
    ///
    /// Population is an additive merge: fields absent from `data` (or stored as null)
    /// keep their current values, at every level of the nesting tree. A custom
    /// deserialize hook, where declared, takes precedence and suppresses both type
    /// coercion and recursion. After each field value is resolved, its validators run
    /// in declaration order; the first failure aborts immediately, leaving fields
    /// declared after the failing one untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TypeCoercion`] or [`ConfigError::Validation`] as
    /// described above.
    ///
    /// # Panics
    ///
    /// Panics if `record` is not an instance of the type this model was built for.
    pub fn apply_data(&self, record: &mut dyn Any, data: &Map) -> Result<(), ConfigError> {
        for field in &self.fields {
            match data.get(&field.name) {
                // Absence never zeroes a field.
                None | Some(Value::Null) => continue,
                Some(value) => (field.write)(record, value)?,
            }
        }
        Ok(())
    }
}

/// Builder for a [`ConfigModel`]. See [`ConfigModel::builder`] and the
/// [module docs](self) for usage.
pub struct ModelBuilder<R> {
    name: String,
    fields: Vec<FieldDescriptor>,
    _record: PhantomData<fn(R)>,
}

impl<R> fmt::Debug for ModelBuilder<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ModelBuilder")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

impl<R: 'static> ModelBuilder<R> {
    /// Declares a leaf field with its accessor pair.
    ///
    /// # Panics
    ///
    /// Panics if a field with the same name was already declared.
    pub fn field<T: FieldValue>(
        self,
        name: &str,
        get: impl Fn(&R) -> &T + Send + Sync + 'static,
        set: impl Fn(&mut R, T) + Send + Sync + 'static,
    ) -> FieldBuilder<R, T> {
        self.field_opt(name, move |record| Some(get(record)), set)
    }

    /// Declares a leaf field whose value may be absent from the instance (used for
    /// dynamic records backed by a value map). A required field resolving to `None`
    /// at conversion time is a [`ConfigError::MissingField`].
    ///
    /// # Panics
    ///
    /// Panics if a field with the same name was already declared.
    pub fn field_opt<T: FieldValue>(
        self,
        name: &str,
        get: impl Fn(&R) -> Option<&T> + Send + Sync + 'static,
        set: impl Fn(&mut R, T) + Send + Sync + 'static,
    ) -> FieldBuilder<R, T> {
        self.assert_unique(name);
        let field_name = name.to_owned();
        let ser = {
            let field_name = field_name.clone();
            Arc::new(move |field: &T| {
                value::to_value(field).map_err(|err| ConfigError::serialization(&field_name, err))
            }) as SerFn<T>
        };
        let de = {
            let field_name = field_name.clone();
            DeBinding::Construct(Arc::new(move |value: &Value| {
                value::from_value(value)
                    .or_else(|err| match value {
                        // Hand-edited scalars like "9000" or "true" still populate
                        // typed fields.
                        Value::String(literal) => {
                            value::from_value(&Value::from_literal(literal)).map_err(|_| err)
                        }
                        _ => Err(err),
                    })
                    .map_err(|err| ConfigError::coercion(&field_name, err))
            }))
        };
        FieldBuilder {
            model: self,
            name: field_name,
            help: String::new(),
            choices: Vec::new(),
            kind: FieldKind::Leaf,
            get: Arc::new(get),
            set: Arc::new(set),
            ser,
            de,
            default: None,
            validators: Vec::new(),
        }
    }

    /// Declares a nested configuration field. The nested type's own model drives
    /// recursion in both conversion directions.
    ///
    /// # Panics
    ///
    /// Panics if a field with the same name was already declared.
    pub fn nested<C: ConfigRecord>(
        self,
        name: &str,
        get: impl Fn(&R) -> &C + Send + Sync + 'static,
        get_mut: impl Fn(&mut R) -> &mut C + Send + Sync + 'static,
    ) -> FieldBuilder<R, C> {
        self.assert_unique(name);
        let field_name = name.to_owned();
        let nested_model = C::model();
        let get_mut = Arc::new(get_mut);

        let ser = {
            let field_name = field_name.clone();
            let model = nested_model.clone();
            Arc::new(move |nested: &C| {
                model
                    .to_data(nested)
                    .map(Value::Object)
                    .map_err(|err| err.nest(&field_name))
            }) as SerFn<C>
        };
        let de = {
            let field_name = field_name.clone();
            let model = nested_model.clone();
            let get_mut = get_mut.clone();
            DeBinding::InPlace(Arc::new(move |record: &mut R, value: &Value| {
                let nested = get_mut(record);
                match value {
                    Value::Object(map) => model
                        .apply_data(nested, map)
                        .map_err(|err| err.nest(&field_name)),
                    other => Err(ConfigError::coercion(
                        &field_name,
                        anyhow::anyhow!(
                            "expected an object for nested configuration, got {}",
                            other
                                .basic_type()
                                .map_or_else(|| "null".to_owned(), |ty| ty.to_string())
                        ),
                    )),
                }
            }))
        };
        FieldBuilder {
            model: self,
            name: field_name,
            help: String::new(),
            choices: Vec::new(),
            kind: FieldKind::Nested(nested_model),
            get: Arc::new(move |record: &R| Some(get(record))),
            set: Arc::new(move |record: &mut R, nested: C| *get_mut(record) = nested),
            ser,
            de,
            default: None,
            validators: Vec::new(),
        }
    }

    /// Finishes the model.
    pub fn build(self) -> Arc<ConfigModel> {
        Arc::new(ConfigModel {
            name: self.name,
            fields: self.fields,
        })
    }

    fn assert_unique(&self, name: &str) {
        assert!(
            self.fields.iter().all(|field| field.name != name),
            "field `{name}` is declared twice in model `{}`",
            self.name
        );
    }
}

type GetFn<R, T> = Arc<dyn for<'a> Fn(&'a R) -> Option<&'a T> + Send + Sync>;
type SetFn<R, T> = Arc<dyn Fn(&mut R, T) + Send + Sync>;
type SerFn<T> = Arc<dyn Fn(&T) -> Result<Value, ConfigError> + Send + Sync>;

enum DeBinding<R, T> {
    /// Constructs the full field value, then commits it via the setter.
    Construct(Arc<dyn Fn(&Value) -> Result<T, ConfigError> + Send + Sync>),
    /// Merges into the current field value in place (nested configurations).
    InPlace(Arc<dyn Fn(&mut R, &Value) -> Result<(), ConfigError> + Send + Sync>),
}

/// Builder for one field of a [`ConfigModel`]; returned by [`ModelBuilder::field`] and
/// friends. Finish the field by declaring the next one or calling [`Self::build`].
pub struct FieldBuilder<R, T> {
    model: ModelBuilder<R>,
    name: String,
    help: String,
    choices: Vec<String>,
    kind: FieldKind,
    get: GetFn<R, T>,
    set: SetFn<R, T>,
    ser: SerFn<T>,
    de: DeBinding<R, T>,
    default: Option<Arc<dyn Fn() -> T + Send + Sync>>,
    validators: Vec<Box<dyn Validate<T>>>,
}

impl<R, T> fmt::Debug for FieldBuilder<R, T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FieldBuilder")
            .field("model", &self.model.name)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<R: 'static, T: 'static> FieldBuilder<R, T> {
    /// Attaches a default factory, invoked whenever a fresh default value is needed.
    ///
    /// At most one default may be set; calling this twice replaces the earlier one.
    pub fn default_factory(mut self, factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(factory));
        self
    }

    /// Attaches a default value; shorthand for a factory cloning `value` on each use,
    /// so defaults are never shared between instances.
    pub fn default_value(self, value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        self.default_factory(move || value.clone())
    }

    /// Attaches a human-readable comment, surfaced as a `#` comment by the YAML
    /// storage format and as a label hint by the form renderer.
    pub fn help(mut self, help: &str) -> Self {
        self.help = help.to_owned();
        self
    }

    /// Declares the enumerated values this field is expected to take. Display
    /// metadata only: not enforced unless a matching validator is attached.
    pub fn choices(mut self, choices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Attaches a validator, run against the resolved field value on population.
    /// Validators run in declaration order.
    pub fn validate(mut self, validation: impl Validate<T>) -> Self {
        self.validators.push(Box::new(validation));
        self
    }

    /// Attaches a predicate validator with a human-readable description.
    pub fn validate_fn(
        self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        description: &'static str,
    ) -> Self {
        self.validate(NamedPredicate::new(predicate, description))
    }

    /// Overrides serialization for this field. The hook's output is persisted as-is;
    /// no recursion happens into the value, even for nested configurations.
    pub fn serialize_with(mut self, serialize: impl Fn(&T) -> Value + Send + Sync + 'static) -> Self {
        self.ser = Arc::new(move |field| Ok(serialize(field)));
        self
    }

    /// Overrides deserialization for this field. The hook fully materializes the field
    /// value from the stored one; declared-type coercion and nested recursion are both
    /// suppressed.
    pub fn deserialize_with(
        mut self,
        deserialize: impl Fn(&Value) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        let field_name = self.name.clone();
        self.de = DeBinding::Construct(Arc::new(move |value| {
            deserialize(value).map_err(|err| ConfigError::coercion(&field_name, err))
        }));
        self
    }

    /// Declares the next leaf field, finishing this one.
    ///
    /// # Panics
    ///
    /// Panics if a field with the same name was already declared.
    pub fn field<U: FieldValue>(
        self,
        name: &str,
        get: impl Fn(&R) -> &U + Send + Sync + 'static,
        set: impl Fn(&mut R, U) + Send + Sync + 'static,
    ) -> FieldBuilder<R, U> {
        self.finish().field(name, get, set)
    }

    /// Declares the next optional-accessor leaf field, finishing this one.
    ///
    /// # Panics
    ///
    /// Panics if a field with the same name was already declared.
    pub fn field_opt<U: FieldValue>(
        self,
        name: &str,
        get: impl Fn(&R) -> Option<&U> + Send + Sync + 'static,
        set: impl Fn(&mut R, U) + Send + Sync + 'static,
    ) -> FieldBuilder<R, U> {
        self.finish().field_opt(name, get, set)
    }

    /// Declares the next nested configuration field, finishing this one.
    ///
    /// # Panics
    ///
    /// Panics if a field with the same name was already declared.
    pub fn nested<C: ConfigRecord>(
        self,
        name: &str,
        get: impl Fn(&R) -> &C + Send + Sync + 'static,
        get_mut: impl Fn(&mut R) -> &mut C + Send + Sync + 'static,
    ) -> FieldBuilder<R, C> {
        self.finish().nested(name, get, get_mut)
    }

    /// Finishes this field and the model.
    pub fn build(self) -> Arc<ConfigModel> {
        self.finish().build()
    }

    /// Finishes this field, erasing the typed pieces into the descriptor table.
    pub fn finish(self) -> ModelBuilder<R> {
        let Self {
            mut model,
            name,
            help,
            choices,
            kind,
            get,
            set,
            ser,
            de,
            default,
            validators,
        } = self;

        let read: ReadFn = {
            let get = get.clone();
            let ser = ser.clone();
            Box::new(move |record: &dyn Any| {
                // The engine is only invoked with the record type the model was built for.
                let record = record.downcast_ref::<R>().expect("record type mismatch");
                match get(record) {
                    Some(field) => ser(field).map(Some),
                    None => Ok(None),
                }
            })
        };

        let write: WriteFn = {
            let field_name = name.clone();
            Box::new(move |record: &mut dyn Any, value: &Value| {
                let record = record.downcast_mut::<R>().expect("record type mismatch");
                match &de {
                    DeBinding::Construct(construct) => {
                        let resolved = construct(value)?;
                        run_validators(&validators, &field_name, &resolved, value)?;
                        set(record, resolved);
                    }
                    DeBinding::InPlace(apply) => {
                        apply(record, value)?;
                        if !validators.is_empty()
                            && let Some(current) = get(record)
                        {
                            run_validators(&validators, &field_name, current, value)?;
                        }
                    }
                }
                Ok(())
            })
        };

        let default = default.map(|factory| -> DefaultFn {
            let ser = ser.clone();
            Box::new(move || ser(&factory()))
        });

        model.fields.push(FieldDescriptor {
            name,
            help,
            choices,
            kind,
            default,
            read,
            write,
        });
        model
    }
}

fn run_validators<T: 'static>(
    validators: &[Box<dyn Validate<T>>],
    field: &str,
    target: &T,
    stored: &Value,
) -> Result<(), ConfigError> {
    for (index, validation) in validators.iter().enumerate() {
        if !validation.is_valid(target) {
            tracing::warn!(field, index, %validation, "validation failed");
            return Err(ConfigError::Validation {
                field: field.to_owned(),
                value: stored.clone(),
                index,
                description: validation.to_string(),
            });
        }
    }
    Ok(())
}
