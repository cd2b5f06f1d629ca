//! Configuration resolution
//!
//! Loads a branding configuration document and resolves its `inheritFrom`
//! chain into one flattened configuration. Inheritance is a shallow override:
//! each top-level section present in a child document fully replaces the
//! parent's section of the same name. There is no field-level deep merge
//! across the inheritance boundary.

mod profile;

pub use profile::{
    resolve_ipv4, ArtifactNames, BrandingProfile, EffectiveEndpoint, NetworkProfile,
    PersistenceProfile, ProvisioningProfile, ProxyConfig, ScheduledTask, VersionInfo, Watchdog,
    WmiSubscription,
};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// The top-level sections a configuration document may carry.
pub const SECTIONS: &[&str] = &[
    "branding",
    "network",
    "persistence",
    "provisioning",
    "artifacts",
];

/// Key naming the parent document in an inheritance chain.
pub const INHERIT_KEY: &str = "inheritFrom";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config not found: {path}")]
    NotFound { path: PathBuf },

    #[error("config parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("inheritance cycle: {chain}")]
    InheritanceCycle { chain: String },

    #[error("IO error reading {path}: {message}")]
    Io { path: PathBuf, message: String },
}

/// A contributing config document, in chain order (base parent first).
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSource {
    /// Path of the document as it was read
    pub path: String,

    /// SHA-256 digest of the raw file bytes
    pub digest: String,
}

/// The fully resolved configuration after inheritance merge, with no
/// remaining reference to a parent document.
#[derive(Debug, Clone)]
pub struct FlatConfig {
    /// Path the resolution started from
    pub origin: PathBuf,

    /// The merged configuration document
    pub document: Value,

    /// When this config was resolved
    pub resolved_at: DateTime<Utc>,

    /// Contributing documents in chain order
    pub sources: Vec<ConfigSource>,
}

impl FlatConfig {
    /// Get a top-level section, if present.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.document.get(name)
    }

    /// Branding view of the `branding` section.
    pub fn branding(&self) -> Result<BrandingProfile, ConfigError> {
        self.section_view("branding")
    }

    /// Network view of the `network` section.
    pub fn network(&self) -> Result<NetworkProfile, ConfigError> {
        self.section_view("network")
    }

    /// Persistence view of the `persistence` section.
    pub fn persistence(&self) -> Result<PersistenceProfile, ConfigError> {
        self.section_view("persistence")
    }

    /// Provisioning view of the `provisioning` section.
    pub fn provisioning(&self) -> Result<ProvisioningProfile, ConfigError> {
        self.section_view("provisioning")
    }

    /// Optional artifact file names from the `artifacts` section.
    pub fn artifact_names(&self) -> Result<ArtifactNames, ConfigError> {
        self.section_view("artifacts")
    }

    fn section_view<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, ConfigError> {
        match self.document.get(name) {
            None => Ok(T::default()),
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|e| ConfigError::Parse {
                    path: self.origin.clone(),
                    message: format!("section '{}': {}", name, e),
                })
            }
        }
    }
}

/// Resolve the document at `path` and its inheritance chain into a
/// [`FlatConfig`].
///
/// A document that declares `inheritFrom` has the referenced sibling resolved
/// first; the current document's sections are then overlaid onto it with
/// shallow per-section replacement and the `inheritFrom` key is dropped.
/// Cyclic chains fail with [`ConfigError::InheritanceCycle`].
pub fn resolve(path: &Path) -> Result<FlatConfig, ConfigError> {
    let mut visited: Vec<PathBuf> = Vec::new();
    let mut sources: Vec<ConfigSource> = Vec::new();
    let document = resolve_chain(path, &mut visited, &mut sources)?;

    Ok(FlatConfig {
        origin: path.to_path_buf(),
        document,
        resolved_at: Utc::now(),
        sources,
    })
}

fn resolve_chain(
    path: &Path,
    visited: &mut Vec<PathBuf>,
    sources: &mut Vec<ConfigSource>,
) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if visited.contains(&canonical) {
        let mut chain: Vec<String> = visited
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        chain.push(canonical.display().to_string());
        return Err(ConfigError::InheritanceCycle {
            chain: chain.join(" -> "),
        });
    }
    visited.push(canonical);

    let (mut document, digest) = load_document(path)?;

    let inherit = document
        .as_object_mut()
        .and_then(|map| map.remove(INHERIT_KEY));

    let merged = match inherit {
        Some(Value::String(parent_name)) => {
            let parent_path = path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(parent_name);
            let parent = resolve_chain(&parent_path, visited, sources)?;
            overlay_sections(parent, document, path)?
        }
        Some(other) => {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: format!("{} must be a string, got {}", INHERIT_KEY, other),
            });
        }
        None => document,
    };

    sources.push(ConfigSource {
        path: path.display().to_string(),
        digest,
    });

    Ok(merged)
}

/// Shallow per-section overlay: each top-level key present in `child` fully
/// replaces the parent's value for that key.
fn overlay_sections(parent: Value, child: Value, path: &Path) -> Result<Value, ConfigError> {
    let mut base = match parent {
        Value::Object(map) => map,
        other => {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: format!("parent document must be a mapping, got {}", other),
            });
        }
    };

    let overlay = match child {
        Value::Object(map) => map,
        other => {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: format!("document must be a mapping, got {}", other),
            });
        }
    };

    for (key, value) in overlay {
        base.insert(key, value);
    }

    Ok(Value::Object(base))
}

/// Load a single document as a JSON value plus the digest of its raw bytes.
///
/// `.toml` files are parsed with the TOML parser and converted; everything
/// else is treated as JSON.
fn load_document(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let contents = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("invalid UTF-8: {}", e),
    })?;

    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let value = if is_toml {
        let toml_value: toml::Value =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: format!("TOML parse error: {}", e),
            })?;
        toml_to_json(toml_value)
    } else {
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: format!("JSON parse error: {}", e),
        })?
    };

    if !value.is_object() {
        return Err(ConfigError::Parse {
            path: path.to_path_buf(),
            message: "top level must be a mapping".to_string(),
        });
    }

    Ok((value, digest))
}

/// Convert a TOML value to a JSON value.
fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            Value::Object(map)
        }
    }
}
