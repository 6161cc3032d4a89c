use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Build configuration resolver for game player builds
///
/// buildcfg merges command-line flags, environment variables, platform and
/// shared config files (`BuildConfig[.<target>[.<channel>]].toml`) and
/// GitVersion output into one effective configuration. The earliest source
/// that sets a field wins.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// Values that outrank every other source.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Folder holding the config files
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<String>,

    /// File name prefix of the config files
    #[arg(long, global = true, value_name = "NAME")]
    pub config_name: Option<String>,

    /// Target platform (Android, iOS, StandaloneWindows64, ...)
    #[arg(short, long, global = true, value_name = "TARGET")]
    pub target: Option<String>,

    /// Distribution channel (GooglePlay, Amazon, ...)
    #[arg(long, global = true, value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Path to the GitVersion executable
    #[arg(long, global = true, value_name = "PATH")]
    pub version_tool: Option<String>,

    /// Root folder for build results
    #[arg(short, long, global = true, value_name = "DIR")]
    pub output_dir: Option<String>,

    /// Development build (implies debugging support)
    #[arg(long, global = true)]
    pub development: bool,

    /// Prefix prepended to every environment variable name
    #[arg(long, global = true, value_name = "PREFIX", env = "BUILDCFG_ENV_PREFIX", default_value = "")]
    pub env_prefix: String,

    /// Skip malformed sources instead of failing
    #[arg(long, global = true)]
    pub skip_malformed: bool,

    /// Seconds to wait for the version tool
    #[arg(long, global = true, value_name = "SECS")]
    pub tool_timeout: Option<u64>,

    /// Branch treated as a release branch besides `release*`
    #[arg(long, global = true, value_name = "BRANCH")]
    pub mainline_branch: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective configuration
    Resolve {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Toml)]
        format: Format,

        /// Print even when required fields are missing
        #[arg(long)]
        no_validate: bool,
    },

    /// Resolve, validate and write the apply plan
    ///
    /// The plan lists every player setting and the build location the
    /// engine integration should use.
    Apply {
        /// Write the plan to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Validate the config files in the config folder
    Check,

    /// Run the version tool and show the derived version
    Version,

    /// Write a template shared config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Toml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_overrides_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "buildcfg",
            "resolve",
            "--target",
            "Android",
            "--format",
            "json",
            "--tool-timeout",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.overrides.target.as_deref(), Some("Android"));
        assert_eq!(cli.overrides.tool_timeout, Some(5));
        match cli.command {
            Commands::Resolve { format, no_validate } => {
                assert_eq!(format, Format::Json);
                assert!(!no_validate);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
