use crate::cli::{Cli, Commands, Overrides};
use crate::config::{BuildConfig, BuildOption};
use crate::resolver::ParseErrorPolicy;
use crate::sources::EnvironmentSource;
use crate::Pipeline;
use anyhow::Result;
use std::time::Duration;

mod apply;
mod check;
mod init;
mod resolve;
mod version;

pub fn execute(cli: Cli) -> Result<()> {
    // Bootstrap once; every command works from the same settings
    let pipeline = bootstrap(&cli.overrides)?;

    match cli.command {
        Commands::Resolve {
            format,
            no_validate,
        } => resolve::execute(&pipeline, format, no_validate),

        Commands::Apply { output } => apply::execute(&pipeline, output),

        Commands::Check => check::execute(&pipeline),

        Commands::Version => version::execute(&pipeline),

        Commands::Init { force } => init::execute(&pipeline, force),
    }
}

fn bootstrap(overrides: &Overrides) -> Result<Pipeline> {
    let policy = if overrides.skip_malformed {
        ParseErrorPolicy::Skip
    } else {
        ParseErrorPolicy::Fail
    };

    let env = EnvironmentSource::new(overrides.env_prefix.clone());
    let mut pipeline = Pipeline::bootstrap(command_line_config(overrides), &env, policy)?;

    let settings = pipeline.settings_mut();
    let mut updated = settings
        .clone()
        .with_mainline_branch(overrides.mainline_branch.clone());
    if let Some(secs) = overrides.tool_timeout {
        updated = updated.with_tool_timeout(Duration::from_secs(secs));
    }
    *settings = updated;

    Ok(pipeline)
}

/// The partial config contributed by command-line flags.
fn command_line_config(overrides: &Overrides) -> BuildConfig {
    let mut config = BuildConfig::default();
    let value = |v: &Option<String>| v.clone().unwrap_or_default();

    config.build.target = value(&overrides.target);
    config.app.channel = value(&overrides.channel);
    config.build.paths.config_dir = value(&overrides.config_dir);
    config.build.paths.config_name = value(&overrides.config_name);
    config.build.paths.version_tool = value(&overrides.version_tool);
    config.build.paths.output_dir = value(&overrides.output_dir);
    if overrides.development {
        config.build.options.insert(BuildOption::Development);
        config.build.options.insert(BuildOption::AllowDebugging);
    }

    config
}
