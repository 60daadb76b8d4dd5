use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("devtools websocket failure: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("devtools protocol error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("navigation failed: {0}")]
    Navigate(String),

    #[error("page evaluation failed: {0}")]
    Evaluate(String),

    #[error("timed out after {ms} ms waiting for {what}")]
    Timeout { what: String, ms: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
