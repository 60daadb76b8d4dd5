use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use tracing::warn;

use crate::model::{QaPair, ReportRow};
use crate::util;

pub const QUESTION_COLUMN: &str = "QUESTION";
pub const REFERENCE_COLUMN: &str = "EXPECTED ANSWER";
pub const ANSWER_COLUMN: &str = "CHATBOT ANSWER";
pub const CONFIDENCE_COLUMN: &str = "CONFIDENCE";
pub const OUTCOME_COLUMN: &str = "OUTCOME";
pub const OPERATOR_COLUMN: &str = "OPERATOR";
pub const RUN_DATE_COLUMN: &str = "RUN DATE";

pub const REPORT_COLUMNS: [&str; 7] = [
    QUESTION_COLUMN,
    REFERENCE_COLUMN,
    ANSWER_COLUMN,
    CONFIDENCE_COLUMN,
    OUTCOME_COLUMN,
    OPERATOR_COLUMN,
    RUN_DATE_COLUMN,
];

pub fn load_question_table(path: &Path) -> Result<Vec<QaPair>> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let question_index = require_column(&headers, QUESTION_COLUMN, path)?;
    let reference_index = require_column(&headers, REFERENCE_COLUMN, path)?;

    let mut pairs = Vec::<QaPair>::new();
    for (record_number, record) in reader.records().enumerate() {
        let record = record.with_context(|| {
            format!(
                "failed to read record {} from {}",
                record_number + 2,
                path.display()
            )
        })?;

        let question = field(&record, question_index);
        if question.is_empty() {
            warn!(
                line = record_number + 2,
                "skipping row with empty question cell"
            );
            continue;
        }

        pairs.push(QaPair {
            index: pairs.len() + 1,
            question,
            reference_answer: field(&record, reference_index),
        });
    }

    if pairs.is_empty() {
        bail!(
            "no usable question rows found in {} (need a non-empty {} cell)",
            path.display(),
            QUESTION_COLUMN
        );
    }

    Ok(pairs)
}

pub fn load_answered_table(path: &Path) -> Result<(Vec<QaPair>, Vec<String>)> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let question_index = require_column(&headers, QUESTION_COLUMN, path)?;
    let reference_index = require_column(&headers, REFERENCE_COLUMN, path)?;
    let answer_index = require_column(&headers, ANSWER_COLUMN, path)?;

    let mut pairs = Vec::<QaPair>::new();
    let mut answers = Vec::<String>::new();
    for (record_number, record) in reader.records().enumerate() {
        let record = record.with_context(|| {
            format!(
                "failed to read record {} from {}",
                record_number + 2,
                path.display()
            )
        })?;

        let question = field(&record, question_index);
        if question.is_empty() {
            warn!(
                line = record_number + 2,
                "skipping row with empty question cell"
            );
            continue;
        }

        pairs.push(QaPair {
            index: pairs.len() + 1,
            question,
            reference_answer: field(&record, reference_index),
        });
        answers.push(field(&record, answer_index));
    }

    if pairs.is_empty() {
        bail!(
            "no usable answered rows found in {} (need a non-empty {} cell)",
            path.display(),
            QUESTION_COLUMN
        );
    }

    Ok((pairs, answers))
}

pub fn write_report(path: &Path, rows: &[ReportRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        util::ensure_directory(parent)?;
    }

    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("failed to create report file: {}", path.display()))?;

    writer
        .write_record(REPORT_COLUMNS)
        .with_context(|| format!("failed to write report header to {}", path.display()))?;

    for row in rows {
        let confidence = format_confidence(row.confidence);
        writer
            .write_record([
                row.question.as_str(),
                row.reference_answer.as_str(),
                row.chatbot_answer.as_str(),
                confidence.as_str(),
                row.outcome.as_str(),
                row.operator.as_str(),
                row.run_date.as_str(),
            ])
            .with_context(|| format!("failed to write report row to {}", path.display()))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush report file: {}", path.display()))?;
    Ok(())
}

// Truncates instead of rounding so a just-below-threshold confidence never
// renders as the threshold value next to a fail outcome.
fn format_confidence(value: f64) -> String {
    format!("{:.2}", (value * 100.0).floor() / 100.0)
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open input table: {}", path.display()))
}

fn read_headers(reader: &mut csv::Reader<std::fs::File>, path: &Path) -> Result<StringRecord> {
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header row from {}", path.display()))?;
    Ok(headers.clone())
}

fn require_column(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .with_context(|| {
            format!(
                "input table {} is missing required column {:?} (found: {})",
                path.display(),
                name,
                headers.iter().collect::<Vec<&str>>().join(", ")
            )
        })
}

fn field(record: &StringRecord, index: usize) -> String {
    record.get(index).unwrap_or("").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;
    use std::fs;
    use tempfile::TempDir;

    fn write_input(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("test input should write");
        path
    }

    #[test]
    fn loads_question_and_reference_columns() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = write_input(
            &dir,
            "suite.csv",
            "QUESTION,EXPECTED ANSWER\nWhat is 2+2?,4\nCapital of France?,Paris\n",
        );

        let pairs = load_question_table(&path).expect("table should load");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].index, 1);
        assert_eq!(pairs[0].question, "What is 2+2?");
        assert_eq!(pairs[0].reference_answer, "4");
        assert_eq!(pairs[1].index, 2);
        assert_eq!(pairs[1].reference_answer, "Paris");
    }

    #[test]
    fn ignores_extra_columns_and_trims_cells() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = write_input(
            &dir,
            "suite.csv",
            "ID,QUESTION,EXPECTED ANSWER,NOTES\n7,  What is 2+2?  ,  4 ,draft\n",
        );

        let pairs = load_question_table(&path).expect("table should load");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].question, "What is 2+2?");
        assert_eq!(pairs[0].reference_answer, "4");
    }

    #[test]
    fn skips_rows_with_empty_question_cells() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = write_input(
            &dir,
            "suite.csv",
            "QUESTION,EXPECTED ANSWER\nWhat is 2+2?,4\n,orphan reference\nCapital of France?,Paris\n",
        );

        let pairs = load_question_table(&path).expect("table should load");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].index, 2);
        assert_eq!(pairs[1].question, "Capital of France?");
    }

    #[test]
    fn keeps_rows_with_empty_reference_cells() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = write_input(
            &dir,
            "suite.csv",
            "QUESTION,EXPECTED ANSWER\nWhat is 2+2?,\n",
        );

        let pairs = load_question_table(&path).expect("table should load");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].reference_answer, "");
    }

    #[test]
    fn missing_question_column_is_named_in_error() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = write_input(&dir, "suite.csv", "PROMPT,EXPECTED ANSWER\nhello,world\n");

        let error = load_question_table(&path).expect_err("missing column should fail");
        let message = format!("{error:#}");
        assert!(message.contains("\"QUESTION\""), "message: {message}");
        assert!(message.contains("PROMPT"), "message: {message}");
    }

    #[test]
    fn missing_reference_column_is_named_in_error() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = write_input(&dir, "suite.csv", "QUESTION,ANSWER\nhello,world\n");

        let error = load_question_table(&path).expect_err("missing column should fail");
        assert!(format!("{error:#}").contains("\"EXPECTED ANSWER\""));
    }

    #[test]
    fn column_match_is_case_sensitive() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = write_input(&dir, "suite.csv", "question,expected answer\nhello,world\n");

        load_question_table(&path).expect_err("lowercase headers should not match");
    }

    #[test]
    fn table_without_usable_rows_is_rejected() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = write_input(&dir, "suite.csv", "QUESTION,EXPECTED ANSWER\n,\n  ,ignored\n");

        let error = load_question_table(&path).expect_err("empty table should fail");
        assert!(error.to_string().contains("no usable question rows"));
    }

    #[test]
    fn answered_table_aligns_pairs_and_answers() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = write_input(
            &dir,
            "report.csv",
            "QUESTION,EXPECTED ANSWER,CHATBOT ANSWER\nWhat is 2+2?,4,4\nCapital of France?,Paris,No response\n",
        );

        let (pairs, answers) = load_answered_table(&path).expect("answered table should load");
        assert_eq!(pairs.len(), answers.len());
        assert_eq!(answers[0], "4");
        assert_eq!(answers[1], "No response");
    }

    #[test]
    fn answered_table_requires_answer_column() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = write_input(
            &dir,
            "report.csv",
            "QUESTION,EXPECTED ANSWER\nWhat is 2+2?,4\n",
        );

        let error = load_answered_table(&path).expect_err("missing answer column should fail");
        assert!(format!("{error:#}").contains("\"CHATBOT ANSWER\""));
    }

    #[test]
    fn report_round_trips_with_fixed_column_order() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = dir.path().join("reports").join("suite_report.csv");

        let rows = vec![
            ReportRow {
                question: "What is 2+2?".to_string(),
                reference_answer: "4".to_string(),
                chatbot_answer: "4".to_string(),
                confidence: 100.0,
                outcome: Outcome::Pass,
                operator: "qa-bot".to_string(),
                run_date: "2026-08-22T10:00:00Z".to_string(),
            },
            ReportRow {
                question: "Capital of France?".to_string(),
                reference_answer: "Paris".to_string(),
                chatbot_answer: "Error: Could not retrieve answer".to_string(),
                confidence: 3.141,
                outcome: Outcome::Fail,
                operator: "qa-bot".to_string(),
                run_date: "2026-08-22T10:00:00Z".to_string(),
            },
        ];

        write_report(&path, &rows).expect("report should write");

        let content = fs::read_to_string(&path).expect("report should read back");
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("QUESTION,EXPECTED ANSWER,CHATBOT ANSWER,CONFIDENCE,OUTCOME,OPERATOR,RUN DATE")
        );
        let first = lines.next().expect("first data row should exist");
        assert!(first.contains("100.00"));
        assert!(first.contains("pass"));
        let second = lines.next().expect("second data row should exist");
        assert!(second.contains("3.14"));
        assert!(second.contains("fail"));
    }

    #[test]
    fn confidence_is_truncated_not_rounded() {
        assert_eq!(format_confidence(89.999), "89.99");
        assert_eq!(format_confidence(90.0), "90.00");
        assert_eq!(format_confidence(100.0), "100.00");
        assert_eq!(format_confidence(0.0), "0.00");
    }

    #[test]
    fn near_threshold_confidence_never_renders_as_the_threshold() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = dir.path().join("suite_report.csv");

        let rows = vec![ReportRow {
            question: "What is 2+2?".to_string(),
            reference_answer: "4".to_string(),
            chatbot_answer: "four".to_string(),
            confidence: 89.999,
            outcome: Outcome::Fail,
            operator: "qa-bot".to_string(),
            run_date: "2026-08-31T10:00:00Z".to_string(),
        }];

        write_report(&path, &rows).expect("report should write");

        let content = fs::read_to_string(&path).expect("report should read back");
        let row = content.lines().nth(1).expect("data row should exist");
        assert!(row.contains("89.99,fail"), "row: {row}");
        assert!(!row.contains("90.00"), "row: {row}");
    }

    #[test]
    fn report_cells_with_commas_are_quoted() {
        let dir = TempDir::new().expect("temp dir should create");
        let path = dir.path().join("suite_report.csv");

        let rows = vec![ReportRow {
            question: "List two colors".to_string(),
            reference_answer: "red, blue".to_string(),
            chatbot_answer: "red, blue".to_string(),
            confidence: 100.0,
            outcome: Outcome::Pass,
            operator: "qa-bot".to_string(),
            run_date: "2026-08-22T10:00:00Z".to_string(),
        }];

        write_report(&path, &rows).expect("report should write");

        let (pairs, answers) = load_answered_table(&path).expect("report should parse back");
        assert_eq!(pairs[0].reference_answer, "red, blue");
        assert_eq!(answers[0], "red, blue");
    }
}
