//! Per-field validation.
//!
//! Validators are simple predicates over the resolved (deserialized) field value,
//! run in declaration order when a record is populated from stored data. The first
//! failing validator aborts population with [`ConfigError::Validation`], leaving
//! fields declared after the failing one untouched.
//!
//! [`ConfigError::Validation`]: crate::ConfigError::Validation
//!
//! # Examples
//!
//! ```
//! use std::sync::{Arc, LazyLock};
//! use conf_root::{ConfigModel, ConfigRecord};
//!
//! #[derive(Debug, Default)]
//! struct ApiConfig {
//!     port: u16,
//! }
//!
//! static MODEL: LazyLock<Arc<ConfigModel>> = LazyLock::new(|| {
//!     ConfigModel::builder::<ApiConfig>("ApiConfig")
//!         .field("port", |c| &c.port, |c, v| c.port = v)
//!         .default_value(8080_u16)
//!         // Ranges implement `Validate` out of the box:
//!         .validate(1024_u16..)
//!         // ...as do named predicates:
//!         .validate_fn(|port: &u16| *port != 8080, "must not use the default port")
//!         .build()
//! });
//!
//! impl ConfigRecord for ApiConfig {
//!     fn model() -> Arc<ConfigModel> {
//!         MODEL.clone()
//!     }
//! }
//! ```

use std::{fmt, ops};

/// Validation predicate for a configuration field.
///
/// # Implementations
///
/// Implemented for [`Range`](ops::Range), [`RangeInclusive`](ops::RangeInclusive) and the
/// other range types (checks that the value is within bounds). Arbitrary predicates can be
/// attached via [`FieldBuilder::validate_fn`](crate::model::FieldBuilder::validate_fn).
pub trait Validate<T: ?Sized>: 'static + Send + Sync {
    /// Describes this validation.
    ///
    /// # Errors
    ///
    /// Should propagate formatting errors.
    fn describe(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result;

    /// Checks a field value.
    fn is_valid(&self, target: &T) -> bool;
}

impl<T: 'static + ?Sized> fmt::Debug for dyn Validate<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("Validate")
            .field(&self.to_string())
            .finish()
    }
}

impl<T: 'static + ?Sized> fmt::Display for dyn Validate<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(formatter)
    }
}

macro_rules! impl_validate_for_range {
    ($range:path) => {
        impl<T> Validate<T> for $range
        where
            T: 'static + Send + Sync + PartialOrd + fmt::Debug,
        {
            fn describe(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "must be in range {self:?}")
            }

            fn is_valid(&self, target: &T) -> bool {
                self.contains(target)
            }
        }
    };
}

impl_validate_for_range!(ops::Range<T>);
impl_validate_for_range!(ops::RangeInclusive<T>);
impl_validate_for_range!(ops::RangeTo<T>);
impl_validate_for_range!(ops::RangeToInclusive<T>);
impl_validate_for_range!(ops::RangeFrom<T>);

/// Predicate with an attached human-readable description.
pub(crate) struct NamedPredicate<T> {
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
    description: &'static str,
}

impl<T> NamedPredicate<T> {
    pub(crate) fn new(
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        description: &'static str,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            description,
        }
    }
}

impl<T: 'static> Validate<T> for NamedPredicate<T> {
    fn describe(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.description)
    }

    fn is_valid(&self, target: &T) -> bool {
        (self.predicate)(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_validations() {
        let validation: &dyn Validate<u16> = &(1024_u16..);
        assert!(validation.is_valid(&8080));
        assert!(!validation.is_valid(&80));
        assert_eq!(validation.to_string(), "must be in range 1024..");

        let validation: &dyn Validate<u16> = &(1..=10);
        assert!(validation.is_valid(&10));
        assert!(!validation.is_valid(&11));
    }

    #[test]
    fn named_predicates() {
        let validation = NamedPredicate::new(|s: &String| !s.is_empty(), "must not be empty");
        let validation: &dyn Validate<String> = &validation;
        assert!(validation.is_valid(&"x".to_owned()));
        assert!(!validation.is_valid(&String::new()));
        assert_eq!(validation.to_string(), "must not be empty");
    }
}
