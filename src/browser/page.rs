use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::debug;

use crate::browser::cdp::CdpConnection;
use crate::browser::error::BrowserError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One browser tab scoped to a single question. Commands go over the shared
/// connection tagged with this page's flattened session id. The target is
/// closed exactly once: explicitly via `close`, or from `Drop` on every other
/// path.
pub struct Page<'a> {
    connection: &'a mut CdpConnection,
    target_id: String,
    session_id: String,
    command_timeout: Duration,
    closed: bool,
}

impl<'a> Page<'a> {
    pub(crate) fn new(
        connection: &'a mut CdpConnection,
        target_id: String,
        session_id: String,
        command_timeout: Duration,
    ) -> Self {
        Self {
            connection,
            target_id,
            session_id,
            command_timeout,
            closed: false,
        }
    }

    pub fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.command("Page.enable", json!({}))?;
        let result = self.command("Page.navigate", json!({ "url": url }))?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            if !error_text.is_empty() {
                return Err(BrowserError::Navigate(format!("{url}: {error_text}")));
            }
        }

        // Waiting on the load event rather than polling readyState: a poll
        // issued right after Page.navigate can still see the document the
        // navigation is replacing.
        self.connection
            .wait_for_event(Some(&self.session_id), "Page.loadEventFired", timeout)
            .map_err(|error| match error {
                BrowserError::Timeout { ms, .. } => BrowserError::Timeout {
                    what: format!("load of {url}"),
                    ms,
                },
                other => other,
            })?;
        Ok(())
    }

    pub fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        let expression = format!(
            "document.querySelector({}) !== null",
            js_string_literal(selector)
        );

        loop {
            if self.evaluate(&expression)?.as_bool() == Some(true) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: format!("selector {selector}"),
                    ms: timeout.as_millis() as u64,
                });
            }
            self.connection.idle(POLL_INTERVAL)?;
        }
    }

    pub fn fill(&mut self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let expression = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.focus(); if ('value' in el) el.value = ''; return true; }})()",
            js_string_literal(selector)
        );
        if self.evaluate(&expression)?.as_bool() != Some(true) {
            return Err(BrowserError::Evaluate(format!(
                "input control not found: {selector}"
            )));
        }

        self.command("Input.insertText", json!({ "text": text }))?;
        Ok(())
    }

    pub fn press_enter(&mut self) -> Result<(), BrowserError> {
        self.command(
            "Input.dispatchKeyEvent",
            json!({
                "type": "keyDown",
                "key": "Enter",
                "code": "Enter",
                "windowsVirtualKeyCode": 13,
                "nativeVirtualKeyCode": 13,
                "text": "\r",
            }),
        )?;
        self.command(
            "Input.dispatchKeyEvent",
            json!({
                "type": "keyUp",
                "key": "Enter",
                "code": "Enter",
                "windowsVirtualKeyCode": 13,
                "nativeVirtualKeyCode": 13,
            }),
        )?;
        Ok(())
    }

    pub fn idle(&mut self, duration: Duration) -> Result<(), BrowserError> {
        self.connection.idle(duration)
    }

    pub fn inner_texts(&mut self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let expression = format!(
            "Array.from(document.querySelectorAll({})).map(node => node.innerText)",
            js_string_literal(selector)
        );
        let value = self.evaluate(&expression)?;
        string_array(value)
    }

    pub fn close(mut self) {
        self.close_target();
    }

    /// Leaves the tab open past this handle's lifetime. Used for the login
    /// page, which the operator keeps for the whole run.
    pub fn detach(mut self) {
        self.closed = true;
    }

    fn evaluate(&mut self, expression: &str) -> Result<Value, BrowserError> {
        let result = self.command(
            "Runtime.evaluate",
            json!({ "expression": expression, "returnByValue": true }),
        )?;
        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("unknown script exception");
            return Err(BrowserError::Evaluate(text.to_string()));
        }

        Ok(result
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn command(&mut self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.connection
            .execute(Some(&self.session_id), method, params, self.command_timeout)
    }

    fn close_target(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let params = json!({ "targetId": self.target_id });
        if let Err(error) = self
            .connection
            .execute(None, "Target.closeTarget", params, CLOSE_TIMEOUT)
        {
            debug!(target_id = %self.target_id, error = %error, "failed to close page target");
        }
    }
}

impl Drop for Page<'_> {
    fn drop(&mut self) {
        self.close_target();
    }
}

fn string_array(value: Value) -> Result<Vec<String>, BrowserError> {
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(BrowserError::Evaluate(format!(
            "expected a string array, got: {other}"
        ))),
    }
}

pub(crate) fn js_string_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for character in text.chars() {
        match character {
            '"' => literal.push_str("\\\""),
            '\\' => literal.push_str("\\\\"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{2028}' || c == '\u{2029}' => {
                literal.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn js_literal_quotes_plain_selector() {
        assert_eq!(
            js_string_literal("textarea[data-testid='ask-textarea']"),
            "\"textarea[data-testid='ask-textarea']\""
        );
    }

    #[test]
    fn js_literal_escapes_quotes_and_backslashes() {
        assert_eq!(js_string_literal(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn js_literal_escapes_newlines_so_injection_cannot_break_out() {
        let hostile = "\"); document.title = \"pwned\n";
        let literal = js_string_literal(hostile);
        assert!(!literal.contains('\n'));
        assert!(literal.starts_with('"') && literal.ends_with('"'));
        assert_eq!(literal, "\"\\\"); document.title = \\\"pwned\\n\"");
    }

    #[test]
    fn js_literal_escapes_unicode_line_separators() {
        let literal = js_string_literal("a\u{2028}b");
        assert_eq!(literal, "\"a\\u2028b\"");
    }

    #[test]
    fn string_array_extracts_fragments() {
        let value = json!(["first paragraph", "second paragraph"]);
        let fragments = string_array(value).expect("array should convert");
        assert_eq!(fragments, vec!["first paragraph", "second paragraph"]);
    }

    #[test]
    fn string_array_treats_null_as_empty() {
        let fragments = string_array(Value::Null).expect("null should convert");
        assert!(fragments.is_empty());
    }

    #[test]
    fn string_array_rejects_scalars() {
        string_array(json!(42)).expect_err("scalar should be rejected");
    }
}
