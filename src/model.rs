use serde::{Deserialize, Serialize};

use crate::semantic::SimilarityModelConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub index: usize,
    pub question: String,
    pub reference_answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub question: String,
    pub reference_answer: String,
    pub chatbot_answer: String,
    pub confidence: f64,
    pub outcome: Outcome,
    pub operator: String,
    pub run_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPaths {
    pub input_path: String,
    pub artifacts_root: String,
    pub report_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCounts {
    pub question_count: usize,
    pub answered_count: usize,
    pub error_count: usize,
    pub pass_count: usize,
    pub fail_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub command: String,
    pub status: String,
    pub generated_at: String,
    pub duration_ms: u64,
    pub suite: String,
    pub target_url: String,
    pub operator: String,
    pub threshold: f64,
    pub model: SimilarityModelConfig,
    pub input_sha256: String,
    pub paths: RunPaths,
    pub counts: RunCounts,
    pub warnings: Vec<String>,
}
