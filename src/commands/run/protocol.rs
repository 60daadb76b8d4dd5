use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::browser::{BrowserError, Page, Session};
use crate::cli::RunArgs;
use crate::model::QaPair;

pub const ERROR_SENTINEL: &str = "Error: Could not retrieve answer";
pub const NO_RESPONSE: &str = "No response";

/// Runs the per-question protocol sequentially over one authenticated session.
/// The output always has the same length and order as `pairs`: a failed
/// question becomes the error sentinel, never a dropped row. Failing to open a
/// question's page at all is fatal; everything after that is isolated to the
/// question.
pub fn run_all(session: &mut Session, args: &RunArgs, pairs: &[QaPair]) -> Result<Vec<String>> {
    let nav_timeout = Duration::from_secs(args.nav_timeout_secs);
    let mut answers = Vec::with_capacity(pairs.len());

    for pair in pairs {
        info!(
            question = pair.index,
            total = pairs.len(),
            text = %pair.question,
            "sending query"
        );

        let mut page = session
            .open_page(&args.url, nav_timeout)
            .with_context(|| format!("failed to open page for question {}", pair.index))?;

        let answer = match ask(&mut page, args, &pair.question) {
            Ok(answer) => {
                info!(question = pair.index, chars = answer.len(), "answer captured");
                answer
            }
            Err(error) => {
                warn!(question = pair.index, error = %error, "failed to retrieve answer");
                ERROR_SENTINEL.to_string()
            }
        };

        page.close();
        answers.push(answer);
    }

    Ok(answers)
}

fn ask(page: &mut Page<'_>, args: &RunArgs, question: &str) -> Result<String, BrowserError> {
    page.wait_for_selector(
        &args.input_selector,
        Duration::from_secs(args.input_timeout_secs),
    )?;
    page.fill(&args.input_selector, question)?;
    page.press_enter()?;

    // Static waits, matching the measured behavior of the chat backend: a
    // short settle after submission, then the response-generation window.
    page.idle(Duration::from_secs(args.settle_secs))?;
    page.idle(Duration::from_secs(args.response_wait_secs))?;

    let fragments = page.inner_texts(&args.response_selector)?;
    Ok(join_answer(&fragments))
}

pub(crate) fn join_answer(fragments: &[String]) -> String {
    if fragments.is_empty() {
        NO_RESPONSE.to_string()
    } else {
        fragments.join("\n")
    }
}
