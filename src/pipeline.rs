use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::BuildConfig;
use crate::error::{ConfigError, SourceError};
use crate::plan::ApplySink;
use crate::resolver::{validate, ParseErrorPolicy, Resolver};
use crate::settings::Settings;
use crate::sources::{
    ConfigSource, DefaultsSource, EnvVar, EnvironmentSource, FileSource, StaticSource,
    VersionTool, VersionToolSource,
};

/// One resolution run: bootstrap settings plus the in-memory partials that
/// outrank every file.
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: Settings,
    overrides: BuildConfig,
    environment: BuildConfig,
}

impl Pipeline {
    pub fn new(settings: Settings, overrides: BuildConfig, environment: BuildConfig) -> Self {
        Self {
            settings,
            overrides,
            environment,
        }
    }

    /// Read the environment once and derive settings from it and `overrides`.
    pub fn bootstrap(
        overrides: BuildConfig,
        env: &EnvironmentSource,
        parse_errors: ParseErrorPolicy,
    ) -> Result<Self> {
        let environment = load_environment(env, parse_errors)?;
        let settings = Settings::from_layers(&overrides, &environment)?
            .with_mainline_branch(env.var(EnvVar::MainlineBranch))
            .with_parse_errors(parse_errors);

        debug!(
            env_prefix = %env.prefix(),
            config_dir = %settings.config_dir.display(),
            config_name = %settings.config_name,
            target = %settings.target,
            "bootstrapped settings"
        );

        Ok(Self::new(settings, overrides, environment))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn version_tool(&self) -> VersionTool {
        VersionTool::new(&self.settings.version_tool).with_timeout(self.settings.tool_timeout)
    }

    /// Sources in precedence order, highest first.
    pub fn sources(&self) -> Vec<Box<dyn ConfigSource>> {
        let s = &self.settings;
        let sources: Vec<Box<dyn ConfigSource>> = vec![
            Box::new(StaticSource::new("command line", self.overrides.clone())),
            Box::new(StaticSource::new("environment", self.environment.clone())),
            Box::new(FileSource::platform(
                &s.config_dir,
                &s.config_name,
                &s.target,
                &s.channel,
            )),
            Box::new(FileSource::shared(&s.config_dir, &s.config_name)),
            Box::new(VersionToolSource::new(
                self.version_tool(),
                s.target.clone(),
                s.mainline_branch.clone(),
            )),
            Box::new(DefaultsSource),
        ];
        sources
    }

    pub fn resolve(&self) -> Result<BuildConfig, ConfigError> {
        let mut config = Resolver::new()
            .with_parse_errors(self.settings.parse_errors)
            .resolve(&self.sources())?;
        self.settings.record_bootstrap(&mut config);
        Ok(config)
    }

    /// Resolve, validate, then hand the result to `sink`.
    ///
    /// The sink is never called with a config that failed validation.
    pub fn run(&self, sink: &mut dyn ApplySink) -> Result<BuildConfig> {
        let config = self.resolve()?;
        validate(&config)?;
        sink.apply(&config)
            .context("Failed to apply build configuration")?;
        Ok(config)
    }
}

fn load_environment(
    env: &EnvironmentSource,
    parse_errors: ParseErrorPolicy,
) -> Result<BuildConfig, ConfigError> {
    match env.load() {
        Ok(config) => Ok(config),
        Err(SourceError::Unavailable { .. }) => Ok(BuildConfig::default()),
        Err(error) if parse_errors == ParseErrorPolicy::Skip => {
            warn!(%error, "ignoring unreadable environment");
            Ok(BuildConfig::default())
        }
        Err(error) => Err(ConfigError::Source {
            name: env.name(),
            error,
        }),
    }
}
