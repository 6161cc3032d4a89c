// Public API
pub mod cli;
pub mod commands;

// Core domain types
mod config;
mod error;
mod pipeline;
mod plan;
mod resolver;
mod settings;
mod sources;
mod ui;

// Re-export main types
pub use config::{
    AppIdentity, BuildConfig, BuildOption, BuildSettings, SigningCredentials, ToolPaths,
    VersionInfo,
};
pub use error::{ConfigError, SourceError};
pub use pipeline::Pipeline;
pub use plan::{ApplyPlan, ApplySink, PlanWriter};
pub use resolver::{coalesce_num, coalesce_str, merge, validate, ParseErrorPolicy, Resolver};
pub use settings::Settings;
pub use sources::{
    version_code, ConfigSource, DefaultsSource, EnvVar, EnvironmentSource, FileSource,
    StaticSource, VersionTool, VersionToolOutput, VersionToolSource,
};
