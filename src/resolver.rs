use std::collections::BTreeSet;
use tracing::{debug, info, trace, warn};

use crate::config::{
    AppIdentity, BuildConfig, BuildSettings, SigningCredentials, ToolPaths, VersionInfo,
};
use crate::error::{ConfigError, SourceError};
use crate::sources::ConfigSource;

/// First non-empty of `primary`, `fallback`, `default`.
pub fn coalesce_str(primary: &str, fallback: &str, default: &str) -> String {
    if !primary.is_empty() {
        primary.to_string()
    } else if !fallback.is_empty() {
        fallback.to_string()
    } else {
        default.to_string()
    }
}

/// First strictly positive of `primary`, `fallback`, else `default`.
///
/// Zero and negative values both read as "unset"; a legitimate zero cannot be
/// expressed by any source.
pub fn coalesce_num(primary: i64, fallback: i64, default: i64) -> i64 {
    if primary > 0 {
        primary
    } else if fallback > 0 {
        fallback
    } else {
        default
    }
}

fn fill_str(field: &'static str, primary: &str, fallback: &str) -> String {
    if primary.is_empty() && !fallback.is_empty() {
        trace!(field, "filled from fallback source");
    }
    coalesce_str(primary, fallback, "")
}

fn fill_num(field: &'static str, primary: i64, fallback: i64) -> i64 {
    if primary <= 0 && fallback > 0 {
        trace!(field, "filled from fallback source");
    }
    coalesce_num(primary, fallback, 0)
}

fn fill_list<T: Clone>(field: &'static str, primary: &[T], fallback: &[T]) -> Vec<T> {
    if primary.is_empty() {
        if !fallback.is_empty() {
            trace!(field, "filled from fallback source");
        }
        fallback.to_vec()
    } else {
        primary.to_vec()
    }
}

/// Combine `accumulated` with a lower-precedence `fallback`.
///
/// Scalars keep the accumulated value when it is set. Scenes and options are
/// taken whole from the fallback only when the accumulated value is empty.
/// Defines are the union of both sides. Extension keys are filled per key.
/// Neither operand is modified.
pub fn merge(accumulated: &BuildConfig, fallback: &BuildConfig) -> BuildConfig {
    let (a, f) = (&accumulated.app, &fallback.app);
    let app = AppIdentity {
        product_id: fill_str("product_id", &a.product_id, &f.product_id),
        product_name: fill_str("product_name", &a.product_name, &f.product_name),
        company_id: fill_str("company_id", &a.company_id, &f.company_id),
        company_name: fill_str("company_name", &a.company_name, &f.company_name),
        bundle_identifier: fill_str(
            "bundle_identifier",
            &a.bundle_identifier,
            &f.bundle_identifier,
        ),
        channel: fill_str("channel", &a.channel, &f.channel),
    };

    let (a, f) = (&accumulated.version, &fallback.version);
    let version = VersionInfo {
        bundle_version: fill_str("bundle_version", &a.bundle_version, &f.bundle_version),
        bundle_version_code: fill_num(
            "bundle_version_code",
            a.bundle_version_code,
            f.bundle_version_code,
        ),
        build_number: fill_num("build_number", a.build_number, f.build_number),
    };

    let (a, f) = (&accumulated.build, &fallback.build);
    let options = if a.options.is_empty() {
        f.options.clone()
    } else {
        a.options.clone()
    };
    let defines: BTreeSet<String> = a.defines.union(&f.defines).cloned().collect();

    let (sa, sf) = (&a.signing, &f.signing);
    let signing = SigningCredentials {
        keystore_name: fill_str("keystore_name", &sa.keystore_name, &sf.keystore_name),
        keystore_pass: fill_str("keystore_pass", &sa.keystore_pass, &sf.keystore_pass),
        keyalias_name: fill_str("keyalias_name", &sa.keyalias_name, &sf.keyalias_name),
        keyalias_pass: fill_str("keyalias_pass", &sa.keyalias_pass, &sf.keyalias_pass),
    };

    let (pa, pf) = (&a.paths, &f.paths);
    let paths = ToolPaths {
        output_dir: fill_str("output_dir", &pa.output_dir, &pf.output_dir),
        config_dir: fill_str("config_dir", &pa.config_dir, &pf.config_dir),
        config_name: fill_str("config_name", &pa.config_name, &pf.config_name),
        version_tool: fill_str("version_tool", &pa.version_tool, &pf.version_tool),
    };

    let build = BuildSettings {
        target: fill_str("target", &a.target, &f.target),
        options,
        scenes: fill_list("scenes", &a.scenes, &f.scenes),
        defines,
        signing,
        paths,
    };

    let mut extras = accumulated.extras.clone();
    for (key, value) in &fallback.extras {
        extras.entry(key.clone()).or_insert_with(|| value.clone());
    }

    BuildConfig {
        app,
        version,
        build,
        extras,
    }
}

/// Fold already-loaded partial configs, first entry highest precedence.
///
/// The bundle identifier is derived from the company and product ids when no
/// source set one.
pub fn resolve_partials<'a, I>(partials: I) -> BuildConfig
where
    I: IntoIterator<Item = &'a BuildConfig>,
{
    let mut result = partials
        .into_iter()
        .fold(BuildConfig::default(), |acc, partial| merge(&acc, partial));

    if result.app.bundle_identifier.is_empty() {
        result.app.bundle_identifier = result.app.derived_bundle_identifier();
    }

    result
}

/// What to do when a source exists but cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseErrorPolicy {
    /// Abort resolution with [`ConfigError::Source`].
    #[default]
    Fail,
    /// Log the failure and treat the source as empty.
    Skip,
}

/// Loads sources in precedence order and folds them into an effective config.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    parse_errors: ParseErrorPolicy,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parse_errors(mut self, policy: ParseErrorPolicy) -> Self {
        self.parse_errors = policy;
        self
    }

    pub fn resolve(&self, sources: &[Box<dyn ConfigSource>]) -> Result<BuildConfig, ConfigError> {
        let mut partials = Vec::with_capacity(sources.len());

        for source in sources {
            let name = source.name();
            match source.load() {
                Ok(partial) => {
                    debug!(source = %name, "loaded configuration source");
                    partials.push(partial);
                }
                Err(SourceError::Unavailable { reason, .. }) => {
                    debug!(source = %name, %reason, "source unavailable, skipping");
                }
                Err(error) => match self.parse_errors {
                    ParseErrorPolicy::Skip => {
                        warn!(source = %name, %error, "ignoring unreadable source");
                    }
                    ParseErrorPolicy::Fail => {
                        return Err(ConfigError::Source { name, error });
                    }
                },
            }
        }

        let config = resolve_partials(&partials);
        info!(
            sources = partials.len(),
            target = %config.build.target,
            version = %config.version.bundle_version,
            "resolved build configuration"
        );
        Ok(config)
    }
}

/// Require every field the player build needs.
///
/// Checks product name, company name, bundle identifier (explicit or
/// derived), bundle version, version code and build number. All missing
/// fields are reported together.
pub fn validate(config: &BuildConfig) -> Result<(), ConfigError> {
    let mut missing = Vec::new();

    if config.app.product_name.is_empty() {
        missing.push("product_name");
    }
    if config.app.company_name.is_empty() {
        missing.push("company_name");
    }
    if config.app.derived_bundle_identifier().is_empty() {
        missing.push("bundle_identifier");
    }
    if config.version.bundle_version.is_empty() {
        missing.push("bundle_version");
    }
    if config.version.bundle_version_code <= 0 {
        missing.push("bundle_version_code");
    }
    if config.version.build_number <= 0 {
        missing.push("build_number");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid { missing })
    }
}
