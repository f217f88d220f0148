//! Shared test records.

use std::sync::{Arc, LazyLock};

use crate::{ConfigModel, ConfigRecord};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServerConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8080,
        }
    }
}

static SERVER_MODEL: LazyLock<Arc<ConfigModel>> = LazyLock::new(|| {
    ConfigModel::builder::<ServerConfig>("ServerConfig")
        .field("host", |c: &ServerConfig| &c.host, |c, v| c.host = v)
        .default_value("localhost".to_owned())
        .help("Hostname to bind to")
        .field("port", |c: &ServerConfig| &c.port, |c, v| c.port = v)
        .default_value(8080_u16)
        .help("Port to listen on")
        .build()
});

impl ConfigRecord for ServerConfig {
    fn model() -> Arc<ConfigModel> {
        SERVER_MODEL.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Inner {
    pub(crate) a: i64,
    pub(crate) b: String,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            a: 1,
            b: "one".into(),
        }
    }
}

static INNER_MODEL: LazyLock<Arc<ConfigModel>> = LazyLock::new(|| {
    ConfigModel::builder::<Inner>("Inner")
        .field("a", |c: &Inner| &c.a, |c, v| c.a = v)
        .default_value(1_i64)
        .field("b", |c: &Inner| &c.b, |c, v| c.b = v)
        .default_value("one".to_owned())
        .build()
});

impl ConfigRecord for Inner {
    fn model() -> Arc<ConfigModel> {
        INNER_MODEL.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Outer {
    pub(crate) inner: Inner,
}

static OUTER_MODEL: LazyLock<Arc<ConfigModel>> = LazyLock::new(|| {
    ConfigModel::builder::<Outer>("Outer")
        .nested("inner", |c: &Outer| &c.inner, |c| &mut c.inner)
        .build()
});

impl ConfigRecord for Outer {
    fn model() -> Arc<ConfigModel> {
        OUTER_MODEL.clone()
    }
}
