use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::cli::ScoreArgs;
use crate::commands::run::ERROR_SENTINEL;
use crate::model::{Outcome, RunCounts, RunManifest, RunPaths};
use crate::report;
use crate::semantic;
use crate::table;
use crate::util::{
    now_utc_string, resolve_operator, resolve_suite, sha256_file, utc_compact_string, utc_string,
    write_json_pretty,
};

/// Re-scores a previously captured answer table without touching a browser.
/// Takes the same scorer, assembler, and export path as a live run, so
/// threshold or scorer changes can be validated against recorded answers.
pub fn run(args: ScoreArgs) -> Result<()> {
    let started_ts = Utc::now();
    let run_id = format!("score-{}", utc_compact_string(started_ts));
    let suite = resolve_suite(args.suite.as_deref(), &args.input);

    info!(
        run_id = %run_id,
        suite = %suite,
        input = %args.input.display(),
        "starting offline scoring"
    );

    let (pairs, answers) = table::load_answered_table(&args.input)?;
    let input_sha256 = sha256_file(&args.input)?;
    let model = semantic::resolve_model_config(&args.model_id);
    let operator = resolve_operator();

    let references: Vec<String> = pairs
        .iter()
        .map(|pair| pair.reference_answer.clone())
        .collect();
    let scores = semantic::score_pairs(&answers, &references, &model)?;

    let run_date = utc_string(started_ts);
    let rows = report::assemble_rows(
        &pairs,
        &answers,
        &scores,
        args.threshold,
        &operator,
        &run_date,
    )?;

    let report_path = report::report_path(&args.artifacts_root, &suite, started_ts);
    table::write_report(&report_path, &rows)?;

    let error_count = answers
        .iter()
        .filter(|answer| answer.as_str() == ERROR_SENTINEL)
        .count();
    let pass_count = rows
        .iter()
        .filter(|row| row.outcome == Outcome::Pass)
        .count();
    let fail_count = rows.len() - pass_count;

    let duration_ms = (Utc::now() - started_ts).num_milliseconds().max(0) as u64;
    let manifest = RunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        command: format!(
            "chatcheck score --input {} --threshold {}",
            args.input.display(),
            args.threshold
        ),
        status: "completed".to_string(),
        generated_at: now_utc_string(),
        duration_ms,
        suite,
        target_url: "offline".to_string(),
        operator,
        threshold: args.threshold,
        model,
        input_sha256,
        paths: RunPaths {
            input_path: args.input.display().to_string(),
            artifacts_root: args.artifacts_root.display().to_string(),
            report_path: report_path.display().to_string(),
        },
        counts: RunCounts {
            question_count: pairs.len(),
            answered_count: pairs.len() - error_count,
            error_count,
            pass_count,
            fail_count,
        },
        warnings: Vec::new(),
    };
    let manifest_path = args
        .artifacts_root
        .join("manifests")
        .join(format!("{run_id}.json"));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        report = %report_path.display(),
        manifest = %manifest_path.display(),
        pass = pass_count,
        fail = fail_count,
        "scoring complete"
    );
    Ok(())
}
