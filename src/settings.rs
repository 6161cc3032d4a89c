use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::config::BuildConfig;
use crate::resolver::{coalesce_str, ParseErrorPolicy};
use crate::sources::{
    shared_config_path, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_NAME, DEFAULT_TOOL_TIMEOUT,
    DEFAULT_VERSION_TOOL,
};

pub const DEFAULT_MAINLINE_BRANCH: &str = "master";

/// Values needed before any file can be read: where the config files live,
/// which platform to load, and how to run the version tool.
///
/// Built once per invocation from command-line overrides, the environment
/// and built-in defaults, then passed explicitly to whoever needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_dir: PathBuf,
    pub config_name: String,
    pub version_tool: PathBuf,
    pub target: String,
    pub channel: String,
    pub mainline_branch: String,
    pub tool_timeout: Duration,
    pub parse_errors: ParseErrorPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_name: DEFAULT_CONFIG_NAME.to_string(),
            version_tool: PathBuf::from(DEFAULT_VERSION_TOOL),
            target: String::new(),
            channel: String::new(),
            mainline_branch: DEFAULT_MAINLINE_BRANCH.to_string(),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            parse_errors: ParseErrorPolicy::default(),
        }
    }
}

impl Settings {
    /// Take each bootstrap value from `overrides`, then `environment`, then the default.
    pub fn from_layers(overrides: &BuildConfig, environment: &BuildConfig) -> Result<Self> {
        let (o, e) = (&overrides.build.paths, &environment.build.paths);

        let config_dir = coalesce_str(&o.config_dir, &e.config_dir, DEFAULT_CONFIG_DIR);
        let config_name = coalesce_str(&o.config_name, &e.config_name, DEFAULT_CONFIG_NAME);
        let version_tool = coalesce_str(&o.version_tool, &e.version_tool, DEFAULT_VERSION_TOOL);

        Ok(Self {
            config_dir: expand_path(&config_dir)?,
            config_name,
            version_tool: expand_path(&version_tool)?,
            target: coalesce_str(&overrides.build.target, &environment.build.target, ""),
            channel: coalesce_str(&overrides.app.channel, &environment.app.channel, ""),
            ..Self::default()
        })
    }

    pub fn with_mainline_branch(mut self, branch: Option<String>) -> Self {
        if let Some(branch) = branch.filter(|b| !b.is_empty()) {
            self.mainline_branch = branch;
        }
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_parse_errors(mut self, policy: ParseErrorPolicy) -> Self {
        self.parse_errors = policy;
        self
    }

    pub fn shared_config(&self) -> PathBuf {
        shared_config_path(&self.config_dir, &self.config_name)
    }

    /// Write the bootstrap values that were actually used back into `config`.
    ///
    /// Target and channel chose which platform files were read and how the
    /// version tool formats the bundle version, so a value coming from a file
    /// is replaced by the bootstrap one, even when that is empty.
    pub fn record_bootstrap(&self, config: &mut BuildConfig) {
        let paths = &mut config.build.paths;
        paths.config_dir = self.config_dir.display().to_string();
        paths.config_name = self.config_name.clone();
        paths.version_tool = self.version_tool.display().to_string();

        for (field, value, used) in [
            ("target", &mut config.build.target, &self.target),
            ("channel", &mut config.app.channel, &self.channel),
        ] {
            if !value.is_empty() && value != used {
                warn!(
                    field,
                    configured = %value,
                    used = %used,
                    "ignoring {field} from config file; set it with a flag or environment variable"
                );
            }
            value.clone_from(used);
        }
    }
}

/// Expand `~` and `$VAR` references in a configured path.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Failed to expand path '{}'", raw))?;
    Ok(Path::new(expanded.as_ref()).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::platform_config_candidates;
    use serial_test::serial;
    use std::env;

    fn layer(f: impl FnOnce(&mut BuildConfig)) -> BuildConfig {
        let mut config = BuildConfig::default();
        f(&mut config);
        config
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = Settings::from_layers(&BuildConfig::default(), &BuildConfig::default())
            .unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.shared_config(), PathBuf::from("BuildConfig.toml"));
        assert!(platform_config_candidates(
            &settings.config_dir,
            &settings.config_name,
            &settings.target,
            &settings.channel
        )
        .is_empty());
    }

    #[test]
    fn overrides_beat_environment() {
        let overrides = layer(|c| {
            c.build.target = "iOS".into();
            c.build.paths.config_name = "Game".into();
        });
        let environment = layer(|c| {
            c.build.target = "Android".into();
            c.build.paths.config_name = "Env".into();
            c.build.paths.config_dir = "config".into();
            c.app.channel = "Amazon".into();
        });

        let settings = Settings::from_layers(&overrides, &environment).unwrap();
        assert_eq!(settings.target, "iOS");
        assert_eq!(settings.config_name, "Game");
        assert_eq!(settings.config_dir, PathBuf::from("config"));
        assert_eq!(settings.channel, "Amazon");
        assert_eq!(
            platform_config_candidates(
                &settings.config_dir,
                &settings.config_name,
                &settings.target,
                &settings.channel
            ),
            vec![
                PathBuf::from("config/Game.iOS.Amazon.toml"),
                PathBuf::from("config/Game.iOS.toml")
            ]
        );
    }

    #[test]
    fn builder_overrides() {
        let settings = Settings::default()
            .with_mainline_branch(Some("main".into()))
            .with_tool_timeout(Duration::from_secs(5))
            .with_parse_errors(ParseErrorPolicy::Skip);
        assert_eq!(settings.mainline_branch, "main");
        assert_eq!(settings.tool_timeout, Duration::from_secs(5));
        assert_eq!(settings.parse_errors, ParseErrorPolicy::Skip);

        let settings = Settings::default().with_mainline_branch(Some(String::new()));
        assert_eq!(settings.mainline_branch, DEFAULT_MAINLINE_BRANCH);
    }

    #[test]
    fn record_bootstrap_reports_bootstrap_values() {
        let settings = Settings {
            config_dir: PathBuf::from("cfg"),
            target: "Android".into(),
            channel: "Amazon".into(),
            ..Settings::default()
        };
        let mut config = BuildConfig::default();
        settings.record_bootstrap(&mut config);

        assert_eq!(config.build.paths.config_dir, "cfg");
        assert_eq!(config.build.paths.config_name, "BuildConfig");
        assert!(config.build.paths.version_tool.ends_with("GitVersion.exe"));
        assert_eq!(config.build.target, "Android");
        assert_eq!(config.app.channel, "Amazon");
    }

    #[test]
    fn file_target_does_not_survive_an_empty_bootstrap() {
        let mut config = layer(|c| {
            c.build.target = "iOS".into();
            c.app.channel = "AppleAppStore".into();
        });
        Settings::default().record_bootstrap(&mut config);

        assert!(config.build.target.is_empty());
        assert!(config.app.channel.is_empty());
    }

    #[test]
    #[serial]
    fn expands_environment_references() {
        env::set_var("BUILDCFG_TEST_ROOT", "/opt/project");
        let path = expand_path("$BUILDCFG_TEST_ROOT/config").unwrap();
        env::remove_var("BUILDCFG_TEST_ROOT");

        assert_eq!(path, PathBuf::from("/opt/project/config"));
    }

    #[test]
    #[serial]
    fn undefined_variable_is_an_error() {
        env::remove_var("BUILDCFG_TEST_UNDEFINED");
        assert!(expand_path("$BUILDCFG_TEST_UNDEFINED/config").is_err());
    }
}
