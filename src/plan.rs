use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

use crate::config::{
    executable_extension, is_custom_channel, target_group, BuildConfig, BuildOption,
};
use crate::settings::expand_path;

/// Consumer of a validated effective configuration.
///
/// The engine binding layer implements this to push values into the host's
/// player settings; the crate itself ships [`PlanWriter`].
pub trait ApplySink {
    fn apply(&mut self, config: &BuildConfig) -> Result<()>;
}

/// Everything the engine binding layer has to set, computed from an effective config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPlan {
    pub metadata: PlanMetadata,
    pub player: PlayerSettings,
    pub build: BuildPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// When the plan was produced (RFC 3339)
    pub resolved_at: String,
    /// SHA-256 of the effective configuration
    pub fingerprint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_identifier: Option<String>,
    pub target_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_version: Option<String>,
    /// Android `bundleVersionCode`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<i64>,
    /// iOS, macOS and tvOS build number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub signing: SigningPlan,
    /// Define symbols joined with `;`. Empty clears the symbols.
    pub scripting_defines: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_pass: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyalias_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyalias_pass: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub target: String,
    pub output_dir: PathBuf,
    pub executable: String,
    pub location: PathBuf,
    pub scenes: Vec<String>,
    pub options: Vec<BuildOption>,
    pub development: bool,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn first_non_empty(primary: &str, fallback: &str) -> Option<String> {
    non_empty(primary).or_else(|| non_empty(fallback))
}

/// SHA-256 over the JSON form of `config`.
pub fn fingerprint(config: &BuildConfig) -> Result<String> {
    let bytes = serde_json::to_vec(config).context("Failed to serialize build configuration")?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Output folder for a build: `<output>/<product>_v<version>/<target>[.<channel>]`.
pub fn output_dir(config: &BuildConfig) -> Result<PathBuf> {
    let root = expand_path(&config.build.paths.output_dir)?;

    let version = &config.version.bundle_version;
    let release = if config.app.product_id.is_empty() {
        format!("v{version}")
    } else {
        format!("{}_v{version}", config.app.product_id)
    };

    let mut target = config.build.target.clone();
    if is_custom_channel(&config.build.target, &config.app.channel) {
        target.push('.');
        target.push_str(&config.app.channel);
    }

    Ok(root.join(release).join(target))
}

pub fn executable_name(config: &BuildConfig) -> String {
    let stem = if config.app.product_id.is_empty() {
        "app"
    } else {
        config.app.product_id.as_str()
    };
    format!("{stem}{}", executable_extension(&config.build.target))
}

impl ApplyPlan {
    pub fn from_config(config: &BuildConfig) -> Result<Self> {
        let app = &config.app;
        let version = &config.version;
        let signing = &config.build.signing;

        let player = PlayerSettings {
            product_name: first_non_empty(&app.product_name, &app.product_id),
            company_name: first_non_empty(&app.company_name, &app.company_id),
            application_identifier: non_empty(&app.derived_bundle_identifier()),
            target_group: target_group(&config.build.target).to_string(),
            bundle_version: non_empty(&version.bundle_version),
            version_code: (version.bundle_version_code > 0).then_some(version.bundle_version_code),
            build_number: (version.build_number > 0).then(|| version.build_number.to_string()),
            channel: non_empty(&app.channel),
            signing: SigningPlan {
                keystore_name: non_empty(&signing.keystore_name),
                keystore_pass: non_empty(&signing.keystore_pass),
                keyalias_name: non_empty(&signing.keyalias_name),
                keyalias_pass: non_empty(&signing.keyalias_pass),
            },
            scripting_defines: config
                .build
                .defines
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(";"),
        };

        let output_dir = output_dir(config)?;
        let executable = executable_name(config);
        let build = BuildPlan {
            target: config.build.target.clone(),
            location: output_dir.join(&executable),
            output_dir,
            executable,
            scenes: config.build.scenes.clone(),
            options: config.build.options.iter().copied().collect(),
            development: config.is_development(),
        };

        Ok(Self {
            metadata: PlanMetadata {
                resolved_at: chrono::Utc::now().to_rfc3339(),
                fingerprint: fingerprint(config)?,
            },
            player,
            build,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize apply plan")
    }
}

/// Writes the [`ApplyPlan`] as JSON to a file, or to stdout when no path is given.
#[derive(Debug, Default)]
pub struct PlanWriter {
    destination: Option<PathBuf>,
    written: Option<ApplyPlan>,
}

impl PlanWriter {
    pub fn new(destination: Option<PathBuf>) -> Self {
        Self {
            destination,
            written: None,
        }
    }

    /// The last plan written, if any.
    pub fn written(&self) -> Option<&ApplyPlan> {
        self.written.as_ref()
    }
}

impl ApplySink for PlanWriter {
    fn apply(&mut self, config: &BuildConfig) -> Result<()> {
        let plan = ApplyPlan::from_config(config)?;
        let json = plan.to_json()?;

        match &self.destination {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent).with_context(|| {
                            format!("Failed to create plan directory {:?}", parent)
                        })?;
                    }
                }
                fs::write(path, json)
                    .with_context(|| format!("Failed to write apply plan to {:?}", path))?;
            }
            None => println!("{json}"),
        }

        self.written = Some(plan);
        Ok(())
    }
}
