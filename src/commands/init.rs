use crate::{ui, Pipeline};
use anyhow::{Context, Result};
use std::fs;

const TEMPLATE: &str = r#"# Shared build configuration.
#
# Platform files named <name>.<target>.toml (and <name>.<target>.<channel>.toml)
# in the same folder take precedence over this file. Environment variables and
# command-line flags take precedence over both. Leave a value out to let a
# lower source fill it.

product_id = ""
product_name = ""
company_id = ""
company_name = ""
# bundle_identifier = "com.company.product"

# Filled from GitVersion when left out.
# bundle_version = "1.0.0"
# bundle_version_code = 1
# build_number = 1

scenes = []
defines = []
options = []

[signing]
# keystore_name = "release.keystore"
# keyalias_name = "release"

[paths]
# output_dir = "../../Builds"
"#;

pub fn execute(pipeline: &Pipeline, force: bool) -> Result<()> {
    let path = pipeline.settings().shared_config();

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }

    fs::write(&path, TEMPLATE)
        .with_context(|| format!("Failed to write config template {:?}", path))?;
    ui::success("Created", path.display());
    Ok(())
}
