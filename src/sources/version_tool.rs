use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::ConfigSource;
use crate::config::BuildConfig;
use crate::error::SourceError;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const SOURCE_NAME: &str = "version tool";

/// `100000000*major + 1000000*minor + 10000*patch + commits`
///
/// `None` when a component is negative or the code does not fit in an `i64`.
pub fn version_code(major: i64, minor: i64, patch: i64, commits: i64) -> Option<i64> {
    if [major, minor, patch, commits].iter().any(|n| *n < 0) {
        return None;
    }

    100_000_000i64
        .checked_mul(major)?
        .checked_add(1_000_000i64.checked_mul(minor)?)?
        .checked_add(10_000i64.checked_mul(patch)?)?
        .checked_add(commits)
}

/// The subset of GitVersion's JSON output the build uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionToolOutput {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
    #[serde(default)]
    pub commits_since_version_source: Option<i64>,
    #[serde(default)]
    pub branch_name: String,
    #[serde(default)]
    pub sem_ver: String,
    #[serde(default)]
    pub major_minor_patch: String,
}

impl VersionToolOutput {
    /// Parse the tool's JSON. Version numbers that cannot form a version
    /// code are rejected here rather than when the code is first used.
    pub fn parse(text: &str) -> Result<Self, SourceError> {
        let output: Self = serde_json::from_str(text)
            .map_err(|e| SourceError::parse(SOURCE_NAME, e.to_string()))?;
        output.version_code()?;
        Ok(output)
    }

    pub fn commits(&self) -> i64 {
        self.commits_since_version_source.unwrap_or(0)
    }

    pub fn version_code(&self) -> Result<i64, SourceError> {
        version_code(self.major, self.minor, self.patch, self.commits()).ok_or_else(|| {
            SourceError::parse(
                SOURCE_NAME,
                format!(
                    "version {}.{}.{} with {} commits has no valid version code",
                    self.major,
                    self.minor,
                    self.patch,
                    self.commits()
                ),
            )
        })
    }

    /// Release builds come from `release*` branches or the mainline branch.
    pub fn is_release(&self, mainline: &str) -> bool {
        self.branch_name.contains("release") || self.branch_name == mainline
    }

    /// Release builds use `MajorMinorPatch.commits` (plain `MajorMinorPatch`
    /// on iOS), everything else the full semantic version.
    pub fn bundle_version(&self, target: &str, mainline: &str) -> String {
        if !self.is_release(mainline) {
            return self.sem_ver.clone();
        }

        if target.eq_ignore_ascii_case("ios") {
            self.major_minor_patch.clone()
        } else {
            format!("{}.{}", self.major_minor_patch, self.commits())
        }
    }

    pub fn to_config(&self, target: &str, mainline: &str) -> Result<BuildConfig, SourceError> {
        let mut config = BuildConfig::default();
        config.version.bundle_version = self.bundle_version(target, mainline);
        config.version.bundle_version_code = self.version_code()?;
        config.version.build_number = self.commits();
        Ok(config)
    }
}

/// How to launch the version tool.
#[derive(Debug, Clone)]
pub struct VersionTool {
    path: PathBuf,
    runner: Option<String>,
    timeout: Duration,
}

impl VersionTool {
    /// `.exe` tools are launched through `mono` on hosts other than Windows.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_exe = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
        let runner = (is_exe && !cfg!(windows)).then(|| "mono".to_string());

        Self {
            path,
            runner,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn runner(&self) -> Option<&str> {
        self.runner.as_deref()
    }

    fn command(&self) -> Command {
        match &self.runner {
            Some(runner) => {
                let mut command = Command::new(runner);
                command.arg(&self.path);
                command
            }
            None => Command::new(&self.path),
        }
    }

    /// Run the tool and return its standard output.
    ///
    /// A missing tool, a failed launch, a non-zero exit and a timeout are all
    /// reported as [`SourceError::Unavailable`]; the child is killed on timeout.
    /// The deadline also bounds reading the output, so a descendant that keeps
    /// stdout open after the tool exits cannot stall the caller.
    pub fn run(&self) -> Result<String, SourceError> {
        if !self.path.is_file() {
            return Err(SourceError::unavailable(
                SOURCE_NAME,
                format!("{} not found", self.path.display()),
            ));
        }

        let mut child = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SourceError::unavailable(
                    SOURCE_NAME,
                    format!("failed to launch {}: {e}", self.path.display()),
                )
            })?;

        // Drained on its own thread; a full pipe would stall the child.
        let (sender, output) = mpsc::channel();
        if let Some(mut stdout) = child.stdout.take() {
            thread::spawn(move || {
                let mut buffer = Vec::new();
                let _ = sender.send(stdout.read_to_end(&mut buffer).map(|_| buffer));
            });
        }

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!(tool = %self.path.display(), timeout = ?self.timeout, "version tool timed out");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SourceError::unavailable(
                        SOURCE_NAME,
                        format!("timed out after {:?}", self.timeout),
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(SourceError::unavailable(
                        SOURCE_NAME,
                        format!("failed to wait for {}: {e}", self.path.display()),
                    ));
                }
            }
        };

        let remaining = self
            .timeout
            .saturating_sub(started.elapsed())
            .max(POLL_INTERVAL);
        let bytes = match output.recv_timeout(remaining) {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                return Err(SourceError::Io {
                    path: self.path.clone(),
                    error: e,
                })
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(tool = %self.path.display(), timeout = ?self.timeout, "version tool output still open");
                return Err(SourceError::unavailable(
                    SOURCE_NAME,
                    format!("timed out after {:?} waiting for output", self.timeout),
                ));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Vec::new(),
        };

        if !status.success() {
            warn!(tool = %self.path.display(), %status, "version tool failed");
            return Err(SourceError::unavailable(
                SOURCE_NAME,
                format!("exited with {status}"),
            ));
        }

        debug!(tool = %self.path.display(), bytes = bytes.len(), "version tool finished");
        String::from_utf8(bytes)
            .map_err(|_| SourceError::parse(SOURCE_NAME, "output is not valid UTF-8"))
    }

    pub fn query(&self) -> Result<VersionToolOutput, SourceError> {
        VersionToolOutput::parse(&self.run()?)
    }
}

/// Version data derived from the repository, lowest precedence in practice.
#[derive(Debug, Clone)]
pub struct VersionToolSource {
    tool: VersionTool,
    target: String,
    mainline: String,
}

impl VersionToolSource {
    pub fn new(tool: VersionTool, target: impl Into<String>, mainline: impl Into<String>) -> Self {
        Self {
            tool,
            target: target.into(),
            mainline: mainline.into(),
        }
    }
}

impl ConfigSource for VersionToolSource {
    fn name(&self) -> String {
        format!("{SOURCE_NAME} {}", self.tool.path().display())
    }

    fn load(&self) -> Result<BuildConfig, SourceError> {
        self.tool.query()?.to_config(&self.target, &self.mainline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RELEASE_OUTPUT: &str = r#"{
  "Major": 1,
  "Minor": 2,
  "Patch": 0,
  "MajorMinorPatch": "1.2.0",
  "SemVer": "1.2.0-beta.5",
  "BranchName": "release/1.2",
  "CommitsSinceVersionSource": 5,
  "Sha": "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12"
}"#;

    fn output(branch: &str) -> VersionToolOutput {
        let mut output = VersionToolOutput::parse(RELEASE_OUTPUT).unwrap();
        output.branch_name = branch.to_string();
        output
    }

    #[test]
    fn version_code_formula() {
        assert_eq!(version_code(1, 2, 3, 4), Some(102030004));
        assert_eq!(version_code(1, 2, 0, 5), Some(102000005));
        assert_eq!(version_code(0, 0, 0, 0), Some(0));
    }

    #[rstest]
    #[case(100_000_000_000, 0, 0, 0)]
    #[case(i64::MAX / 100_000_000, 99, 99, i64::MAX)]
    #[case(-1, 2, 0, 0)]
    #[case(1, 2, 0, -5)]
    fn version_code_rejects_out_of_range_components(
        #[case] major: i64,
        #[case] minor: i64,
        #[case] patch: i64,
        #[case] commits: i64,
    ) {
        assert_eq!(version_code(major, minor, patch, commits), None);
    }

    #[rstest]
    #[case(r#"{"Major":100000000000,"Minor":0,"Patch":0}"#)]
    #[case(r#"{"Major":1,"Minor":-2,"Patch":0}"#)]
    #[case(r#"{"Major":1,"Minor":0,"Patch":0,"CommitsSinceVersionSource":-1}"#)]
    fn unusable_version_numbers_are_parse_errors(#[case] text: &str) {
        let error = VersionToolOutput::parse(text).unwrap_err();
        assert!(matches!(error, SourceError::Parse { .. }));
        assert!(error.to_string().contains("version code"));
    }

    #[test]
    fn parses_structured_output() {
        let output = VersionToolOutput::parse(RELEASE_OUTPUT).unwrap();
        assert_eq!(output.major, 1);
        assert_eq!(output.minor, 2);
        assert_eq!(output.patch, 0);
        assert_eq!(output.commits(), 5);
        assert_eq!(output.major_minor_patch, "1.2.0");
        assert_eq!(output.sem_ver, "1.2.0-beta.5");
        assert_eq!(output.version_code().unwrap(), 102000005);
    }

    #[test]
    fn missing_commit_count_is_zero() {
        let output =
            VersionToolOutput::parse(r#"{"Major":3,"Minor":1,"Patch":4,"CommitsSinceVersionSource":null}"#)
                .unwrap();
        assert_eq!(output.commits(), 0);
        assert_eq!(output.version_code().unwrap(), 301040000);
    }

    #[test]
    fn malformed_output_is_a_parse_error() {
        let error = VersionToolOutput::parse("Major: 1").unwrap_err();
        assert!(matches!(error, SourceError::Parse { .. }));
    }

    #[rstest]
    #[case("release/1.2", true)]
    #[case("hotfix-release", true)]
    #[case("master", true)]
    #[case("main", false)]
    #[case("feature/login", false)]
    fn release_detection(#[case] branch: &str, #[case] expected: bool) {
        assert_eq!(output(branch).is_release("master"), expected);
    }

    #[test]
    fn mainline_name_is_configurable() {
        assert!(output("main").is_release("main"));
    }

    #[test]
    fn bundle_version_by_branch_and_target() {
        assert_eq!(output("release").bundle_version("Android", "master"), "1.2.0.5");
        assert_eq!(output("release").bundle_version("iOS", "master"), "1.2.0");
        assert_eq!(
            output("feature/x").bundle_version("Android", "master"),
            "1.2.0-beta.5"
        );
    }

    #[test]
    fn to_config_fills_version_group_only() {
        let config = output("release").to_config("Android", "master").unwrap();
        assert_eq!(config.version.bundle_version, "1.2.0.5");
        assert_eq!(config.version.bundle_version_code, 102000005);
        assert_eq!(config.version.build_number, 5);
        assert!(config.app.product_id.is_empty());
        assert!(config.build.target.is_empty());
    }

    #[test]
    fn exe_tools_get_a_runner_off_windows() {
        let tool = VersionTool::new("Tools/GitVersion/GitVersion.exe");
        if cfg!(windows) {
            assert_eq!(tool.runner(), None);
        } else {
            assert_eq!(tool.runner(), Some("mono"));
        }

        assert_eq!(VersionTool::new("/usr/local/bin/gitversion").runner(), None);
    }

    #[test]
    fn missing_tool_is_unavailable() {
        let error = VersionTool::new("/definitely/not/here/gitversion")
            .run()
            .unwrap_err();
        assert!(error.is_unavailable());
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use serial_test::serial;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(temp: &TempDir, body: &str) -> PathBuf {
            let path = temp.path().join("gitversion");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        #[serial]
        fn runs_tool_and_parses_output() {
            let temp = TempDir::new().unwrap();
            let path = script(&temp, &format!("cat <<'EOF'\n{RELEASE_OUTPUT}\nEOF"));

            let source = VersionToolSource::new(VersionTool::new(&path), "Android", "master");
            let config = source.load().unwrap();
            assert_eq!(config.version.bundle_version, "1.2.0.5");
            assert_eq!(config.version.bundle_version_code, 102000005);
        }

        #[test]
        #[serial]
        fn non_zero_exit_is_unavailable() {
            let temp = TempDir::new().unwrap();
            let path = script(&temp, "echo '{}'\nexit 3");

            let error = VersionTool::new(&path).run().unwrap_err();
            assert!(error.is_unavailable());
        }

        #[test]
        #[serial]
        fn hanging_tool_times_out() {
            let temp = TempDir::new().unwrap();
            let path = script(&temp, "exec sleep 10");

            let started = Instant::now();
            let error = VersionTool::new(&path)
                .with_timeout(Duration::from_millis(200))
                .run()
                .unwrap_err();

            assert!(error.is_unavailable());
            assert!(error.to_string().contains("timed out"));
            assert!(started.elapsed() < Duration::from_secs(5));
        }

        #[test]
        #[serial]
        fn descendant_holding_stdout_does_not_outlive_timeout() {
            let temp = TempDir::new().unwrap();
            let path = script(
                &temp,
                "(sleep 6) &\necho '{\"Major\":1,\"Minor\":0,\"Patch\":0}'",
            );

            let started = Instant::now();
            let error = VersionTool::new(&path)
                .with_timeout(Duration::from_millis(300))
                .run()
                .unwrap_err();

            assert!(error.is_unavailable());
            assert!(error.to_string().contains("timed out"));
            assert!(started.elapsed() < Duration::from_secs(5));
        }

        #[test]
        #[serial]
        fn oversized_version_from_tool_is_a_parse_error() {
            let temp = TempDir::new().unwrap();
            let path = script(&temp, "echo '{\"Major\":100000000000,\"Minor\":0,\"Patch\":0}'");

            let source = VersionToolSource::new(VersionTool::new(&path), "Android", "master");
            let error = source.load().unwrap_err();
            assert!(matches!(error, SourceError::Parse { .. }));
        }

        #[test]
        #[serial]
        fn garbage_output_is_a_parse_error() {
            let temp = TempDir::new().unwrap();
            let path = script(&temp, "echo 'not json'");

            let error = VersionTool::new(&path).query().unwrap_err();
            assert!(matches!(error, SourceError::Parse { .. }));
        }
    }
}
