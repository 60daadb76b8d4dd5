use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use crate::browser::cdp::CdpConnection;
use crate::browser::chrome::ChromeProcess;
use crate::browser::error::BrowserError;
use crate::browser::page::Page;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const BROWSER_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One authenticated browser: the Chrome child plus the DevTools connection.
/// Owned by the orchestrator for the whole batch; pages are short-lived
/// borrows scoped to a single question.
pub struct Session {
    connection: CdpConnection,
    chrome: Option<ChromeProcess>,
}

impl Session {
    pub fn connect(chrome: ChromeProcess) -> Result<Self, BrowserError> {
        let connection = CdpConnection::connect(chrome.ws_url())?;
        Ok(Self {
            connection,
            chrome: Some(chrome),
        })
    }

    /// Attaches to an already-running browser's DevTools endpoint. The
    /// browser process belongs to the caller and is not killed on close.
    pub fn attach(ws_url: &str) -> Result<Self, BrowserError> {
        let connection = CdpConnection::connect(ws_url)?;
        Ok(Self {
            connection,
            chrome: None,
        })
    }

    pub fn open_page(&mut self, url: &str, nav_timeout: Duration) -> Result<Page<'_>, BrowserError> {
        let created = self.connection.execute(
            None,
            "Target.createTarget",
            json!({ "url": "about:blank" }),
            COMMAND_TIMEOUT,
        )?;
        let target_id = required_string(&created, "targetId", "Target.createTarget")?;

        let attached = self.connection.execute(
            None,
            "Target.attachToTarget",
            json!({ "targetId": target_id, "flatten": true }),
            COMMAND_TIMEOUT,
        )?;
        let session_id = required_string(&attached, "sessionId", "Target.attachToTarget")?;

        let mut page = Page::new(&mut self.connection, target_id, session_id, COMMAND_TIMEOUT);
        page.navigate(url, nav_timeout)?;
        Ok(page)
    }

    pub fn close(mut self) {
        if let Err(error) =
            self.connection
                .execute(None, "Browser.close", json!({}), BROWSER_CLOSE_TIMEOUT)
        {
            debug!(error = %error, "browser close command failed; relying on process kill");
        }
        self.connection.close();
        drop(self.chrome);
    }
}

fn required_string(result: &Value, key: &str, method: &str) -> Result<String, BrowserError> {
    result
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Protocol {
            code: 0,
            message: format!("{method} returned no {key}"),
        })
}
