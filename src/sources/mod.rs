//! Origins of partial build configuration.
//!
//! Every source produces a [`BuildConfig`] in which any field may be empty.
//! A source that has nothing to offer reports [`SourceError::Unavailable`]
//! and the resolver moves on without it.

use crate::config::BuildConfig;
use crate::error::SourceError;

mod environment;
mod file;
mod version_tool;

pub use environment::{EnvVar, EnvironmentSource};
pub use file::{platform_config_candidates, shared_config_path, FileSource};
pub use version_tool::{
    version_code, VersionTool, VersionToolOutput, VersionToolSource, DEFAULT_TOOL_TIMEOUT,
};

pub const DEFAULT_VERSION_TOOL: &str = "../../Tools/GitVersion/GitVersion.exe";
pub const DEFAULT_OUTPUT_DIR: &str = "../../Builds";
pub const DEFAULT_CONFIG_DIR: &str = "";
pub const DEFAULT_CONFIG_NAME: &str = "BuildConfig";

pub trait ConfigSource {
    /// Human readable origin used in logs and errors.
    fn name(&self) -> String;
    fn load(&self) -> Result<BuildConfig, SourceError>;
}

/// A partial config that was built in memory (command line, tests).
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    config: BuildConfig,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, config: BuildConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

impl ConfigSource for StaticSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> Result<BuildConfig, SourceError> {
        Ok(self.config.clone())
    }
}

/// Built-in path defaults, lowest precedence.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultsSource;

impl DefaultsSource {
    pub fn config() -> BuildConfig {
        let mut config = BuildConfig::default();
        config.build.paths.version_tool = DEFAULT_VERSION_TOOL.to_string();
        config.build.paths.output_dir = DEFAULT_OUTPUT_DIR.to_string();
        config.build.paths.config_dir = DEFAULT_CONFIG_DIR.to_string();
        config.build.paths.config_name = DEFAULT_CONFIG_NAME.to_string();
        config
    }
}

impl ConfigSource for DefaultsSource {
    fn name(&self) -> String {
        "defaults".to_string()
    }

    fn load(&self) -> Result<BuildConfig, SourceError> {
        Ok(Self::config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_only_cover_paths() {
        let config = DefaultsSource.load().unwrap();
        assert_eq!(config.build.paths.config_name, "BuildConfig");
        assert_eq!(config.build.paths.output_dir, "../../Builds");
        assert!(config.build.paths.version_tool.ends_with("GitVersion.exe"));
        assert!(config.app.product_id.is_empty());
        assert!(config.version.bundle_version.is_empty());
    }

    #[test]
    fn static_source_returns_its_config() {
        let mut config = BuildConfig::default();
        config.app.product_id = "game".into();
        let source = StaticSource::new("command line", config.clone());

        assert_eq!(source.name(), "command line");
        assert_eq!(source.load().unwrap(), config);
    }
}
