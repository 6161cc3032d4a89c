use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fmt;

use super::ConfigSource;
use crate::config::{BuildConfig, BuildOption, DEFINE_SYMBOL_PATTERN};
use crate::error::SourceError;

const SOURCE_NAME: &str = "environment";

/// Environment variables consumed by the build. Names are case-sensitive and
/// may carry a common prefix (see [`EnvironmentSource::new`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvVar {
    VersionToolPath,
    BuildPath,
    /// CI job URL, used as output directory when `BUILD_PATH` is unset.
    BuildUrl,
    ConfigPath,
    ConfigName,
    KeystoreName,
    KeystorePass,
    KeyaliasName,
    KeyaliasPass,
    BuildTarget,
    DevelopmentBuild,
    Store,
    BundleVersion,
    BundleVersionCode,
    BuildNumber,
    ProductId,
    ProductName,
    CompanyId,
    CompanyName,
    BundleIdentifier,
    ScriptingDefines,
    MainlineBranch,
}

impl EnvVar {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvVar::VersionToolPath => "GITVERSION_PATH",
            EnvVar::BuildPath => "BUILD_PATH",
            EnvVar::BuildUrl => "BUILD_URL",
            EnvVar::ConfigPath => "BUILD_CONFIG_PATH",
            EnvVar::ConfigName => "BUILD_CONFIG_NAME",
            EnvVar::KeystoreName => "KEYSTORE_NAME",
            EnvVar::KeystorePass => "KEYSTORE_PASS",
            EnvVar::KeyaliasName => "KEYALIAS_NAME",
            EnvVar::KeyaliasPass => "KEYALIAS_PASS",
            EnvVar::BuildTarget => "BUILD_TARGET",
            EnvVar::DevelopmentBuild => "DEVELOPMENT_BUILD",
            EnvVar::Store => "STORE",
            EnvVar::BundleVersion => "BUNDLE_VERSION",
            EnvVar::BundleVersionCode => "BUNDLE_VERSION_CODE",
            EnvVar::BuildNumber => "BUILD_NUMBER",
            EnvVar::ProductId => "PRODUCT_ID",
            EnvVar::ProductName => "PRODUCT_NAME",
            EnvVar::CompanyId => "COMPANY_ID",
            EnvVar::CompanyName => "COMPANY_NAME",
            EnvVar::BundleIdentifier => "BUNDLE_IDENTIFIER",
            EnvVar::ScriptingDefines => "SCRIPTING_DEFINES",
            EnvVar::MainlineBranch => "MAINLINE_BRANCH",
        }
    }
}

type Lookup = Box<dyn Fn(&str) -> Option<String>>;

/// Reads build overrides from environment variables.
pub struct EnvironmentSource {
    prefix: String,
    lookup: Lookup,
}

impl fmt::Debug for EnvironmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentSource")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl EnvironmentSource {
    /// Read from the process environment. `prefix` is prepended to every name.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            lookup: Box::new(|name| env::var(name).ok()),
        }
    }

    /// Read from a fixed set of variables instead of the process environment.
    pub fn from_vars(prefix: impl Into<String>, vars: HashMap<String, String>) -> Self {
        Self {
            prefix: prefix.into(),
            lookup: Box::new(move |name| vars.get(name).cloned()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Value of `var`, treating empty values as unset.
    pub fn var(&self, var: EnvVar) -> Option<String> {
        let name = format!("{}{}", self.prefix, var.as_str());
        (self.lookup)(&name).filter(|value| !value.is_empty())
    }

    fn string(&self, var: EnvVar) -> String {
        self.var(var).unwrap_or_default()
    }

    fn number(&self, var: EnvVar) -> Result<i64, SourceError> {
        match self.var(var) {
            None => Ok(0),
            Some(raw) => raw.trim().parse().map_err(|_| {
                SourceError::parse(
                    format!("{}{}", self.prefix, var.as_str()),
                    format!("'{raw}' is not an integer"),
                )
            }),
        }
    }

    fn defines(&self) -> Result<BTreeSet<String>, SourceError> {
        let Some(raw) = self.var(EnvVar::ScriptingDefines) else {
            return Ok(BTreeSet::new());
        };

        let origin = format!("{}{}", self.prefix, EnvVar::ScriptingDefines.as_str());
        let symbol = Regex::new(DEFINE_SYMBOL_PATTERN)
            .map_err(|e| SourceError::parse(&origin, e.to_string()))?;

        let mut defines = BTreeSet::new();
        for item in raw
            .split([';', ','])
            .map(str::trim)
            .filter(|item| !item.is_empty())
        {
            if !symbol.is_match(item) {
                return Err(SourceError::parse(
                    &origin,
                    format!("'{item}' is not a valid define symbol"),
                ));
            }
            defines.insert(item.to_string());
        }

        Ok(defines)
    }
}

impl ConfigSource for EnvironmentSource {
    fn name(&self) -> String {
        SOURCE_NAME.to_string()
    }

    fn load(&self) -> Result<BuildConfig, SourceError> {
        let mut config = BuildConfig::default();

        let app = &mut config.app;
        app.product_id = self.string(EnvVar::ProductId);
        app.product_name = self.string(EnvVar::ProductName);
        app.company_id = self.string(EnvVar::CompanyId);
        app.company_name = self.string(EnvVar::CompanyName);
        app.bundle_identifier = self.string(EnvVar::BundleIdentifier);
        app.channel = self.string(EnvVar::Store);

        let version = &mut config.version;
        version.bundle_version = self.string(EnvVar::BundleVersion);
        version.bundle_version_code = self.number(EnvVar::BundleVersionCode)?;
        version.build_number = self.number(EnvVar::BuildNumber)?;

        let build = &mut config.build;
        build.target = self.string(EnvVar::BuildTarget);
        if self.var(EnvVar::DevelopmentBuild).is_some() {
            build.options.insert(BuildOption::Development);
            build.options.insert(BuildOption::AllowDebugging);
        }
        build.defines = self.defines()?;

        let signing = &mut build.signing;
        signing.keystore_name = self.string(EnvVar::KeystoreName);
        signing.keystore_pass = self.string(EnvVar::KeystorePass);
        signing.keyalias_name = self.string(EnvVar::KeyaliasName);
        signing.keyalias_pass = self.string(EnvVar::KeyaliasPass);

        let paths = &mut build.paths;
        paths.version_tool = self.string(EnvVar::VersionToolPath);
        paths.output_dir = self
            .var(EnvVar::BuildPath)
            .or_else(|| self.var(EnvVar::BuildUrl))
            .unwrap_or_default();
        paths.config_dir = self.string(EnvVar::ConfigPath);
        paths.config_name = self.string(EnvVar::ConfigName);

        Ok(config)
    }
}
