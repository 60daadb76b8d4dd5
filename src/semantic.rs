use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL_ID: &str = "token-hash-f1-local-v1";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_EMBEDDING_DIM: usize = 256;
pub const DEFAULT_NORMALIZATION: &str = "l2";
pub const DEFAULT_BACKEND: &str = "local-hash-v1";

const TOKEN_FEATURE_WEIGHT: f32 = 2.0;
const CONTEXT_FEATURE_WEIGHT: f32 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityModelConfig {
    pub model_id: String,
    pub language: String,
    pub dimensions: usize,
    pub normalization: String,
    pub backend: String,
}

pub fn resolve_model_config(model_id: &str) -> SimilarityModelConfig {
    let trimmed = model_id.trim();
    let resolved_id = if trimmed.is_empty() {
        DEFAULT_MODEL_ID
    } else {
        trimmed
    };

    SimilarityModelConfig {
        model_id: resolved_id.to_string(),
        language: DEFAULT_LANGUAGE.to_string(),
        dimensions: DEFAULT_EMBEDDING_DIM,
        normalization: DEFAULT_NORMALIZATION.to_string(),
        backend: DEFAULT_BACKEND.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl PairScore {
    pub fn zero() -> Self {
        Self {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        }
    }
}

pub fn score_pairs(
    candidates: &[String],
    references: &[String],
    model: &SimilarityModelConfig,
) -> Result<Vec<PairScore>> {
    if candidates.len() != references.len() {
        bail!(
            "candidate/reference count mismatch: {} candidates vs {} references",
            candidates.len(),
            references.len()
        );
    }
    if candidates.is_empty() {
        bail!("similarity scoring requires at least one candidate/reference pair");
    }

    let dimensions = model.dimensions.max(8);
    Ok(candidates
        .iter()
        .zip(references.iter())
        .map(|(candidate, reference)| score_pair(candidate, reference, dimensions))
        .collect())
}

fn score_pair(candidate: &str, reference: &str, dimensions: usize) -> PairScore {
    let candidate_vectors = token_embeddings(candidate, dimensions);
    let reference_vectors = token_embeddings(reference, dimensions);

    if candidate_vectors.is_empty() || reference_vectors.is_empty() {
        return PairScore::zero();
    }

    let precision = best_match_mean(&candidate_vectors, &reference_vectors);
    let recall = best_match_mean(&reference_vectors, &candidate_vectors);
    let f1 = if precision + recall <= 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    PairScore {
        precision,
        recall,
        f1,
    }
}

fn best_match_mean(from: &[Vec<f32>], to: &[Vec<f32>]) -> f64 {
    let total: f64 = from
        .iter()
        .map(|vector| {
            to.iter()
                .map(|other| cosine_similarity(vector, other))
                .fold(0.0_f64, f64::max)
                .min(1.0)
        })
        .sum();

    total / from.len() as f64
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    left.iter()
        .zip(right.iter())
        .map(|(left_value, right_value)| f64::from(*left_value) * f64::from(*right_value))
        .sum::<f64>()
}

fn token_embeddings(text: &str, dimensions: usize) -> Vec<Vec<f32>> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut vectors = Vec::<Vec<f32>>::with_capacity(tokens.len());
    for (index, token) in tokens.iter().enumerate() {
        let mut vector = vec![0_f32; dimensions];

        accumulate_feature(&mut vector, &format!("w:{token}"), TOKEN_FEATURE_WEIGHT);
        if index > 0 {
            let previous = &tokens[index - 1];
            accumulate_feature(
                &mut vector,
                &format!("l:{previous}_{token}"),
                CONTEXT_FEATURE_WEIGHT,
            );
        }
        if let Some(next) = tokens.get(index + 1) {
            accumulate_feature(
                &mut vector,
                &format!("r:{token}_{next}"),
                CONTEXT_FEATURE_WEIGHT,
            );
        }

        normalize_vector(&mut vector);
        vectors.push(vector);
    }

    vectors
}

fn accumulate_feature(vector: &mut [f32], feature: &str, scale: f32) {
    let hash = stable_hash(feature);
    let index = (hash as usize) % vector.len();
    let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
    let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
    vector[index] += sign * weight * scale;
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|value| {
            value
                .chars()
                .filter(|character| character.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|value| !value.is_empty())
        .collect()
}

fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    if norm == 0.0 {
        return;
    }

    for value in values {
        *value /= norm;
    }
}
