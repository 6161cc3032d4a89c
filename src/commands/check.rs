use crate::config::{BuildConfig, DEFINE_SYMBOL_PATTERN};
use crate::{ui, Pipeline};
use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfigIssue {
    source: PathBuf,
    field: Option<String>,
    message: String,
}

impl ConfigIssue {
    fn general(source: &Path, message: impl Into<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            field: None,
            message: message.into(),
        }
    }

    fn field(source: &Path, field: &str, message: impl Into<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            field: Some(field.to_string()),
            message: message.into(),
        }
    }
}

pub fn execute(pipeline: &Pipeline) -> Result<()> {
    let settings = pipeline.settings();
    let dir = if settings.config_dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        settings.config_dir.as_path()
    };

    let files = config_files(dir, &settings.config_name)?;
    let symbol = Regex::new(DEFINE_SYMBOL_PATTERN).context("Invalid define symbol pattern")?;

    let mut issues = Vec::new();
    for path in &files {
        issues.extend(check_file(path, &settings.config_name, &symbol)?);
    }

    if issues.is_empty() {
        if files.is_empty() {
            ui::info(format!(
                "No {}*.toml files found in {}",
                settings.config_name,
                dir.display()
            ));
        } else {
            ui::success(
                "Check",
                format!("Validated {} config file(s) without issues.", files.len()),
            );
        }
        Ok(())
    } else {
        for issue in &issues {
            let location = match &issue.field {
                Some(field) => format!("{} ({field})", issue.source.display()),
                None => issue.source.display().to_string(),
            };
            ui::error(format!("{location}: {}", issue.message));
        }
        anyhow::bail!("Config validation failed ({} issue(s)).", issues.len());
    }
}

/// `<name>.toml` and `<name>.<target>[.<channel>].toml` directly inside `dir`, sorted.
fn config_files(dir: &Path, name: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if file_name_parts(&file_name, name).is_some() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Target and channel encoded in a config file name, `None` if it is not one of ours.
fn file_name_parts<'a>(file_name: &'a str, name: &str) -> Option<(Option<&'a str>, Option<&'a str>)> {
    let stem = file_name.strip_suffix(".toml")?;
    if stem == name {
        return Some((None, None));
    }

    let rest = stem.strip_prefix(name)?.strip_prefix('.')?;
    let mut parts = rest.split('.');
    let target = parts.next().filter(|t| !t.is_empty())?;
    let channel = parts.next();
    if parts.next().is_some() || channel.is_some_and(str::is_empty) {
        return None;
    }

    Some((Some(target), channel))
}

fn check_file(path: &Path, name: &str, symbol: &Regex) -> Result<Vec<ConfigIssue>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let config = match BuildConfig::parse(&contents, &path.display().to_string()) {
        Ok(config) => config,
        Err(error) => return Ok(vec![ConfigIssue::general(path, error.to_string())]),
    };

    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (target, channel) = file_name_parts(&file_name, name).unwrap_or((None, None));

    Ok(check_config(path, &config, target, channel, symbol))
}

fn check_config(
    path: &Path,
    config: &BuildConfig,
    target: Option<&str>,
    channel: Option<&str>,
    symbol: &Regex,
) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    // Target and channel pick the files to read, so only the file name may carry them.
    for (field, value, from_name, env_var) in [
        ("target", &config.build.target, target, "BUILD_TARGET"),
        ("channel", &config.app.channel, channel, "STORE"),
    ] {
        if value.is_empty() {
            continue;
        }
        match from_name {
            Some(expected) if value != expected => issues.push(ConfigIssue::field(
                path,
                field,
                format!("'{value}' does not match file {field} '{expected}'"),
            )),
            Some(_) => {}
            None => issues.push(ConfigIssue::field(
                path,
                field,
                format!("'{value}' is ignored here; set the {field} with --{field} or {env_var}"),
            )),
        }
    }

    for (field, value) in [
        ("bundle_version_code", config.version.bundle_version_code),
        ("build_number", config.version.build_number),
    ] {
        if value < 0 {
            issues.push(ConfigIssue::field(
                path,
                field,
                format!("{value} is negative; leave it out to keep it unset"),
            ));
        }
    }

    for define in &config.build.defines {
        if !symbol.is_match(define) {
            issues.push(ConfigIssue::field(
                path,
                "defines",
                format!("'{define}' is not a valid define symbol"),
            ));
        }
    }

    if config.build.scenes.iter().any(|scene| scene.trim().is_empty()) {
        issues.push(ConfigIssue::field(path, "scenes", "contains an empty scene path"));
    }

    issues
}
