use crate::{ui, Pipeline};
use anyhow::{Context, Result};

pub fn execute(pipeline: &Pipeline) -> Result<()> {
    let settings = pipeline.settings();
    let tool = pipeline.version_tool();

    let label = match tool.runner() {
        Some(runner) => format!("{runner} {}", tool.path().display()),
        None => tool.path().display().to_string(),
    };
    let progress = ui::Progress::new("Running", label);
    let output = match tool.query() {
        Ok(output) => {
            progress.success("Finished", Some(output.sem_ver.clone()));
            output
        }
        Err(error) => {
            progress.fail("Failed", &error);
            return Err(error).context("Version tool did not produce version data");
        }
    };

    let release = output.is_release(&settings.mainline_branch);
    println!("branch:              {}", output.branch_name);
    println!("release:             {release}");
    println!(
        "bundle_version:      {}",
        output.bundle_version(&settings.target, &settings.mainline_branch)
    );
    println!("bundle_version_code: {}", output.version_code()?);
    println!("build_number:        {}", output.commits());
    Ok(())
}
