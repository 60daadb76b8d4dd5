use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use crate::model::{Outcome, QaPair, ReportRow};
use crate::semantic::PairScore;
use crate::util;

pub const DEFAULT_THRESHOLD: f64 = 90.0;

pub fn classify(confidence: f64, threshold: f64) -> Outcome {
    if confidence >= threshold {
        Outcome::Pass
    } else {
        Outcome::Fail
    }
}

pub fn confidence_percent(score: PairScore) -> f64 {
    score.f1 * 100.0
}

pub fn assemble_rows(
    pairs: &[QaPair],
    answers: &[String],
    scores: &[PairScore],
    threshold: f64,
    operator: &str,
    run_date: &str,
) -> Result<Vec<ReportRow>> {
    if pairs.len() != answers.len() {
        bail!(
            "question/answer count mismatch: {} questions vs {} answers",
            pairs.len(),
            answers.len()
        );
    }
    if pairs.len() != scores.len() {
        bail!(
            "question/score count mismatch: {} questions vs {} scores",
            pairs.len(),
            scores.len()
        );
    }

    let mut rows = Vec::<ReportRow>::with_capacity(pairs.len());
    for ((pair, answer), score) in pairs.iter().zip(answers.iter()).zip(scores.iter()) {
        let confidence = confidence_percent(*score);
        rows.push(ReportRow {
            question: pair.question.clone(),
            reference_answer: pair.reference_answer.clone(),
            chatbot_answer: answer.clone(),
            confidence,
            outcome: classify(confidence, threshold),
            operator: operator.to_string(),
            run_date: run_date.to_string(),
        });
    }

    Ok(rows)
}

pub fn report_path(artifacts_root: &Path, suite: &str, generated_at: DateTime<Utc>) -> PathBuf {
    artifacts_root.join("reports").join(format!(
        "{}_report_{}.csv",
        suite,
        util::utc_compact_string(generated_at)
    ))
}
