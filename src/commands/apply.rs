use crate::plan::PlanWriter;
use crate::{ui, Pipeline};
use anyhow::Result;
use std::path::PathBuf;

pub fn execute(pipeline: &Pipeline, output: Option<PathBuf>) -> Result<()> {
    let mut writer = PlanWriter::new(output.clone());
    let config = pipeline.run(&mut writer)?;

    // Plan JSON owns stdout when no file is given
    if let Some(path) = output {
        let location = writer
            .written()
            .map(|plan| plan.build.location.display().to_string())
            .unwrap_or_default();
        ui::success(
            "Applied",
            format!(
                "{} {} -> {}",
                config.app.product_id,
                config.version.bundle_version,
                path.display()
            ),
        );
        if !location.is_empty() {
            ui::info(format!("Build location {location}"));
        }
    }

    Ok(())
}
