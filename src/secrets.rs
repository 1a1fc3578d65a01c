//! Credential lookup.
//!
//! Secrets are addressed by `(namespace, key)`, e.g. `("openai", "api_key")`.
//! A secrets file is YAML with one mapping per namespace:
//!
//! ```yaml
//! openai:
//!   api_key: sk-...
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Namespace of the API credential.
pub const API_KEY_NAMESPACE: &str = "openai";
/// Key of the API credential.
pub const API_KEY_NAME: &str = "api_key";
/// Secrets file read when none is given.
pub const DEFAULT_SECRETS_PATH: &str = "secrets.yaml";

/// A read-only key-value store of secrets.
pub trait SecretStore: Send + Sync {
    /// Returns the secret stored under `namespace` and `key`.
    ///
    /// A missing secret is an [`Error::Configuration`].
    fn get(&self, namespace: &str, key: &str) -> Result<String>;
}

/// Secrets parsed from a YAML file.
#[derive(Debug, Clone, Default)]
pub struct YamlSecrets {
    source: Option<PathBuf>,
    entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl YamlSecrets {
    /// Loads secrets from `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        let mut secrets = Self::from_yaml(&content)?;
        secrets.source = Some(path.to_path_buf());
        Ok(secrets)
    }

    /// Parses secrets from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let entries = if content.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_yaml::from_str(content)?
        };
        Ok(Self {
            source: None,
            entries,
        })
    }
}

impl SecretStore for YamlSecrets {
    fn get(&self, namespace: &str, key: &str) -> Result<String> {
        self.entries
            .get(namespace)
            .and_then(|table| table.get(key))
            .cloned()
            .ok_or_else(|| {
                let origin = self
                    .source
                    .as_ref()
                    .map(|p| format!(" in {}", p.display()))
                    .unwrap_or_default();
                Error::configuration(format!("secret {namespace}.{key} not found{origin}"))
            })
    }
}

/// Secrets read from environment variables named `NAMESPACE_KEY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl EnvSecrets {
    /// The variable consulted for `namespace` and `key`.
    pub fn variable_name(namespace: &str, key: &str) -> String {
        format!("{namespace}_{key}").to_uppercase().replace('-', "_")
    }
}

impl SecretStore for EnvSecrets {
    fn get(&self, namespace: &str, key: &str) -> Result<String> {
        let name = Self::variable_name(namespace, key);
        match std::env::var(&name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::configuration(format!(
                "secret {namespace}.{key} not found (environment variable {name} not set)"
            ))),
        }
    }
}

/// Consults several stores in order; the first hit wins.
#[derive(Default)]
pub struct LayeredSecrets {
    layers: Vec<Box<dyn SecretStore>>,
}

impl LayeredSecrets {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a store consulted after the existing ones.
    pub fn with_layer(mut self, store: impl SecretStore + 'static) -> Self {
        self.layers.push(Box::new(store));
        self
    }
}

impl SecretStore for LayeredSecrets {
    fn get(&self, namespace: &str, key: &str) -> Result<String> {
        let mut misses = Vec::new();
        for layer in &self.layers {
            match layer.get(namespace, key) {
                Ok(value) => return Ok(value),
                Err(err) => misses.push(err.to_string()),
            }
        }
        if misses.is_empty() {
            Err(Error::configuration(format!(
                "secret {namespace}.{key} not found (no secret stores configured)"
            )))
        } else {
            Err(Error::configuration(misses.join("; ")))
        }
    }
}

/// Builds the store the binaries use: the environment first, then the file.
///
/// An explicit `path` must exist; the default path is optional.
pub fn default_store(path: Option<&Path>) -> Result<LayeredSecrets> {
    let store = LayeredSecrets::new().with_layer(EnvSecrets);
    match path {
        Some(path) => Ok(store.with_layer(YamlSecrets::from_file(path)?)),
        None => {
            let path = Path::new(DEFAULT_SECRETS_PATH);
            if path.exists() {
                Ok(store.with_layer(YamlSecrets::from_file(path)?))
            } else {
                Ok(store)
            }
        }
    }
}
