use crate::cli::Format;
use crate::resolver::validate;
use crate::{ui, Pipeline};
use anyhow::{Context, Result};

pub fn execute(pipeline: &Pipeline, format: Format, no_validate: bool) -> Result<()> {
    let config = pipeline.resolve()?;

    if no_validate {
        if let Err(error) = validate(&config) {
            ui::warn(error);
        }
    } else {
        validate(&config)?;
    }

    // Output lands in CI logs; the apply sink still gets the real passwords.
    let shown = config.redacted();
    let output = match format {
        Format::Toml => shown.to_toml()?,
        Format::Json => {
            serde_json::to_string_pretty(&shown).context("Failed to serialize configuration")?
        }
    };
    println!("{}", output.trim_end());
    Ok(())
}
