use std::fs;
use std::path::{Path, PathBuf};

use super::ConfigSource;
use crate::config::{is_custom_channel, BuildConfig};
use crate::error::SourceError;

const EXTENSION: &str = "toml";

/// Path of the config shared by all platforms: `<dir>/<name>.toml`.
pub fn shared_config_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{EXTENSION}"))
}

/// Platform config paths in lookup order.
///
/// With a channel other than the target's default store, the channel-specific
/// file `<name>.<target>.<channel>.toml` is tried before `<name>.<target>.toml`.
/// Without a target there is no platform file.
pub fn platform_config_candidates(
    dir: &Path,
    name: &str,
    target: &str,
    channel: &str,
) -> Vec<PathBuf> {
    if target.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::with_capacity(2);
    if is_custom_channel(target, channel) {
        candidates.push(dir.join(format!("{name}.{target}.{channel}.{EXTENSION}")));
    }
    candidates.push(dir.join(format!("{name}.{target}.{EXTENSION}")));
    candidates
}

/// A TOML config file. A missing file is unavailable, an empty one is empty.
#[derive(Debug, Clone)]
pub struct FileSource {
    label: String,
    path: Option<PathBuf>,
}

impl FileSource {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: Some(path.into()),
        }
    }

    pub fn shared(dir: &Path, name: &str) -> Self {
        Self::new("shared config", shared_config_path(dir, name))
    }

    /// The first existing platform candidate, or the most generic one when none exists.
    pub fn platform(dir: &Path, name: &str, target: &str, channel: &str) -> Self {
        let candidates = platform_config_candidates(dir, name, target, channel);
        let path = candidates
            .iter()
            .find(|path| path.is_file())
            .or_else(|| candidates.last())
            .cloned();

        Self {
            label: "platform config".to_string(),
            path,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl ConfigSource for FileSource {
    fn name(&self) -> String {
        match &self.path {
            Some(path) => format!("{} {}", self.label, path.display()),
            None => self.label.clone(),
        }
    }

    fn load(&self) -> Result<BuildConfig, SourceError> {
        let Some(path) = &self.path else {
            return Err(SourceError::unavailable(&self.label, "no build target set"));
        };

        if !path.is_file() {
            return Err(SourceError::unavailable(
                self.name(),
                format!("{} not found", path.display()),
            ));
        }

        let contents = fs::read_to_string(path).map_err(|error| SourceError::Io {
            path: path.clone(),
            error,
        })?;

        BuildConfig::parse(&contents, &path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn shared_path_uses_prefix() {
        let path = shared_config_path(Path::new("config"), "BuildConfig");
        assert_eq!(path, Path::new("config/BuildConfig.toml"));
    }

    #[test]
    fn platform_candidates_prefer_channel() {
        let candidates =
            platform_config_candidates(Path::new("cfg"), "BuildConfig", "Android", "Amazon");
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("cfg/BuildConfig.Android.Amazon.toml"),
                PathBuf::from("cfg/BuildConfig.Android.toml"),
            ]
        );

        let candidates = platform_config_candidates(Path::new("cfg"), "BuildConfig", "iOS", "");
        assert_eq!(candidates, vec![PathBuf::from("cfg/BuildConfig.iOS.toml")]);

        let candidates =
            platform_config_candidates(Path::new("cfg"), "BuildConfig", "Android", "GooglePlay");
        assert_eq!(candidates, vec![PathBuf::from("cfg/BuildConfig.Android.toml")]);

        assert!(platform_config_candidates(Path::new("cfg"), "BuildConfig", "", "x").is_empty());
    }

    #[test]
    fn missing_file_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let error = FileSource::shared(temp.path(), "BuildConfig")
            .load()
            .unwrap_err();
        assert!(error.is_unavailable());
    }

    #[test]
    fn platform_without_target_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let source = FileSource::platform(temp.path(), "BuildConfig", "", "");
        assert!(source.path().is_none());
        assert!(source.load().unwrap_err().is_unavailable());
    }

    #[test]
    fn platform_falls_back_to_channel_free_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("BuildConfig.Android.toml"),
            "product_name = \"Generic\"\n",
        )
        .unwrap();

        let source = FileSource::platform(temp.path(), "BuildConfig", "Android", "Amazon");
        assert_eq!(source.load().unwrap().app.product_name, "Generic");

        fs::write(
            temp.path().join("BuildConfig.Android.Amazon.toml"),
            "product_name = \"Amazon\"\n",
        )
        .unwrap();

        let source = FileSource::platform(temp.path(), "BuildConfig", "Android", "Amazon");
        assert_eq!(source.load().unwrap().app.product_name, "Amazon");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("BuildConfig.toml"), "scenes = [\n").unwrap();

        let error = FileSource::shared(temp.path(), "BuildConfig")
            .load()
            .unwrap_err();
        assert!(matches!(error, SourceError::Parse { .. }));
    }

    #[test]
    fn empty_file_is_empty_config() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("BuildConfig.toml"), "").unwrap();

        let config = FileSource::shared(temp.path(), "BuildConfig").load().unwrap();
        assert!(config.is_empty());
    }
}
