use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{ConfigError, SourceError};

/// Product, company and distribution identity of the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppIdentity {
    pub product_id: String,
    pub product_name: String,
    pub company_id: String,
    pub company_name: String,
    pub bundle_identifier: String,
    /// Distribution channel (app store) tag, e.g. `GooglePlay`.
    pub channel: String,
}

impl AppIdentity {
    /// Explicit bundle identifier, or `com.<company_id>.<product_id>` when both ids are set.
    pub fn derived_bundle_identifier(&self) -> String {
        if !self.bundle_identifier.is_empty() {
            self.bundle_identifier.clone()
        } else if !self.company_id.is_empty() && !self.product_id.is_empty() {
            format!("com.{}.{}", self.company_id, self.product_id)
        } else {
            String::new()
        }
    }
}

/// Version string and numeric codes. Values `<= 0` mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionInfo {
    pub bundle_version: String,
    pub bundle_version_code: i64,
    pub build_number: i64,
}

/// Player build flags understood by the engine binding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildOption {
    Development,
    AllowDebugging,
    ConnectProfiler,
    CompressWithLz4,
    StrictMode,
}

impl fmt::Display for BuildOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildOption::Development => write!(f, "Development"),
            BuildOption::AllowDebugging => write!(f, "AllowDebugging"),
            BuildOption::ConnectProfiler => write!(f, "ConnectProfiler"),
            BuildOption::CompressWithLz4 => write!(f, "CompressWithLz4"),
            BuildOption::StrictMode => write!(f, "StrictMode"),
        }
    }
}

/// Android key store credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningCredentials {
    pub keystore_name: String,
    pub keystore_pass: String,
    pub keyalias_name: String,
    pub keyalias_pass: String,
}

pub const REDACTED: &str = "***";

impl SigningCredentials {
    /// Copy with both passwords replaced by [`REDACTED`] when set.
    pub fn redacted(&self) -> Self {
        let mask = |secret: &str| {
            if secret.is_empty() {
                String::new()
            } else {
                REDACTED.to_string()
            }
        };
        Self {
            keystore_name: self.keystore_name.clone(),
            keystore_pass: mask(&self.keystore_pass),
            keyalias_name: self.keyalias_name.clone(),
            keyalias_pass: mask(&self.keyalias_pass),
        }
    }
}

/// Filesystem locations used while building.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// Root folder for build results.
    pub output_dir: String,
    /// Folder holding the `<config_name>*.toml` files.
    pub config_dir: String,
    /// File name prefix of the config files.
    pub config_name: String,
    /// Path to the version tool executable.
    pub version_tool: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Target platform identifier, e.g. `Android` or `StandaloneWindows64`.
    pub target: String,
    pub options: BTreeSet<BuildOption>,
    pub scenes: Vec<String>,
    pub defines: BTreeSet<String>,
    pub signing: SigningCredentials,
    pub paths: ToolPaths,
}

/// A build configuration: either one partial source or the merged result.
///
/// Any field may be empty. Keys not covered by the schema are kept in
/// `extras` so projects can carry their own settings alongside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(flatten)]
    pub app: AppIdentity,
    #[serde(flatten)]
    pub version: VersionInfo,
    #[serde(flatten)]
    pub build: BuildSettings,
    #[serde(flatten)]
    pub extras: BTreeMap<String, toml::Value>,
}

impl BuildConfig {
    /// Parse a config from TOML text. `origin` names the text in errors.
    pub fn parse(contents: &str, origin: &str) -> Result<Self, SourceError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(contents).map_err(|e| SourceError::parse(origin, e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {:?}", path))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        // Going through `Value` emits plain keys before tables regardless of field order.
        let value =
            toml::Value::try_from(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        toml::to_string_pretty(&value).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The config with signing passwords masked, for printing.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.build.signing = self.build.signing.redacted();
        config
    }

    pub fn is_development(&self) -> bool {
        self.build.options.contains(&BuildOption::Development)
    }

    /// Deserialize the extension fields into a caller-defined schema.
    pub fn extension<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let table: toml::Table = self
            .extras
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Extension(e.to_string()))
    }
}

/// Scripting define symbols are C-style identifiers.
pub const DEFINE_SYMBOL_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Settings group the engine files platform-specific player settings under.
pub fn target_group(target: &str) -> &'static str {
    match target {
        "Android" => "Android",
        "iOS" => "iOS",
        "tvOS" => "tvOS",
        "WebGL" => "WebGL",
        _ => "Standalone",
    }
}

/// The store a target ships to when no channel is given.
pub fn default_channel(target: &str) -> Option<&'static str> {
    match target {
        "Android" => Some("GooglePlay"),
        "iOS" | "tvOS" => Some("AppleAppStore"),
        t if t.starts_with("StandaloneOSX") => Some("MacAppStore"),
        t if t.starts_with("StandaloneWindows") => Some("WinRT"),
        _ => None,
    }
}

/// Whether `channel` needs its own config file and output folder for `target`.
pub fn is_custom_channel(target: &str, channel: &str) -> bool {
    !channel.is_empty() && default_channel(target) != Some(channel)
}

pub fn executable_extension(target: &str) -> &'static str {
    match target {
        "Android" => ".apk",
        "iOS" => ".app",
        _ => ".exe",
    }
}
