use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::RunManifest;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.artifacts_root.join("manifests");

    info!(artifacts_root = %args.artifacts_root.display(), "status requested");

    let Some(manifest_path) = newest_manifest(&manifest_dir)? else {
        warn!(path = %manifest_dir.display(), "no run manifests found");
        return Ok(());
    };

    let raw = fs::read(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let manifest: RunManifest = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

    info!(
        run_id = %manifest.run_id,
        status = %manifest.status,
        suite = %manifest.suite,
        generated_at = %manifest.generated_at,
        operator = %manifest.operator,
        threshold = manifest.threshold,
        questions = manifest.counts.question_count,
        answered = manifest.counts.answered_count,
        errors = manifest.counts.error_count,
        pass = manifest.counts.pass_count,
        fail = manifest.counts.fail_count,
        report = %manifest.paths.report_path,
        "loaded run manifest"
    );

    for warning in &manifest.warnings {
        warn!(warning = %warning, "recorded run warning");
    }

    if !Path::new(&manifest.paths.report_path).exists() {
        warn!(path = %manifest.paths.report_path, "report file missing");
    }

    Ok(())
}

fn newest_manifest(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|metadata| metadata.modified())
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if newest
            .as_ref()
            .is_none_or(|(timestamp, _)| modified > *timestamp)
        {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
