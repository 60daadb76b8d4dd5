use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::trace;
use tungstenite::{Message, WebSocket};

use crate::browser::error::BrowserError;

/// Read slice for one socket poll; every wait loop pumps the connection in
/// increments of this so incoming events are drained instead of piling up.
const READ_SLICE: Duration = Duration::from_millis(250);

/// Blocking connection to the browser-level DevTools endpoint. One socket
/// carries browser commands and, via flattened session ids, every per-page
/// command as well. Responses are correlated to commands by id; events are
/// logged at trace level and discarded.
pub struct CdpConnection {
    socket: WebSocket<TcpStream>,
    next_id: u64,
}

impl CdpConnection {
    pub fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        let (host, port) = endpoint_from_ws_url(ws_url)?;
        let stream = TcpStream::connect((host.as_str(), port))?;
        let (socket, _response) = tungstenite::client::client(ws_url, stream)
            .map_err(|err| BrowserError::Launch(format!("devtools handshake failed: {err}")))?;
        socket.get_ref().set_read_timeout(Some(READ_SLICE))?;

        Ok(Self { socket, next_id: 0 })
    }

    pub fn execute(
        &mut self,
        session_id: Option<&str>,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        self.next_id += 1;
        let id = self.next_id;
        let mut command = json!({ "id": id, "method": method, "params": params });
        if let Some(session_id) = session_id {
            command["sessionId"] = Value::String(session_id.to_string());
        }

        trace!(method, id, "sending cdp command");
        self.socket.send(Message::Text(command.to_string()))?;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.try_read()? {
                if let Some(outcome) = command_outcome(&message, id) {
                    return outcome;
                }
                continue;
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: format!("response to {method}"),
                    ms: timeout.as_millis() as u64,
                });
            }
        }
    }

    /// Blocks until `method` fires for the given session (browser scope when
    /// `session_id` is `None`), returning the event params. Other traffic is
    /// pumped and discarded while waiting.
    pub fn wait_for_event(
        &mut self,
        session_id: Option<&str>,
        method: &str,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.try_read()? {
                if let Some(params) = event_params(&message, session_id, method) {
                    return Ok(params);
                }
                continue;
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: format!("{method} event"),
                    ms: timeout.as_millis() as u64,
                });
            }
        }
    }

    /// Waits out `duration` while still pumping the socket, so events arriving
    /// during a fixed delay are drained rather than queued ahead of the next
    /// command response.
    pub fn idle(&mut self, duration: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            self.try_read()?;
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.socket.close(None).ok();
        self.socket.flush().ok();
    }

    fn try_read(&mut self) -> Result<Option<Value>, BrowserError> {
        match self.socket.read() {
            Ok(Message::Text(raw)) => {
                let message: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
                if let Some(event) = message.get("method").and_then(Value::as_str) {
                    trace!(event, "cdp event");
                }
                Ok(Some(message))
            }
            Ok(Message::Ping(payload)) => {
                self.socket.send(Message::Pong(payload))?;
                Ok(None)
            }
            Ok(Message::Close(_)) => Err(tungstenite::Error::ConnectionClosed.into()),
            Ok(_) => Ok(None),
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn command_outcome(message: &Value, id: u64) -> Option<Result<Value, BrowserError>> {
    if message.get("id").and_then(Value::as_u64) != Some(id) {
        return None;
    }

    if let Some(error) = message.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let text = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown protocol error");
        return Some(Err(BrowserError::Protocol {
            code,
            message: text.to_string(),
        }));
    }

    Some(Ok(message.get("result").cloned().unwrap_or(Value::Null)))
}

fn event_params(message: &Value, session_id: Option<&str>, method: &str) -> Option<Value> {
    if message.get("method").and_then(Value::as_str) != Some(method) {
        return None;
    }
    if message.get("sessionId").and_then(Value::as_str) != session_id {
        return None;
    }
    Some(message.get("params").cloned().unwrap_or(Value::Null))
}

fn endpoint_from_ws_url(ws_url: &str) -> Result<(String, u16), BrowserError> {
    let rest = ws_url
        .strip_prefix("ws://")
        .ok_or_else(|| BrowserError::Launch(format!("unsupported devtools url: {ws_url}")))?;
    let authority = rest.split('/').next().unwrap_or(rest);
    let (host, port) = authority
        .rsplit_once(':')
        .ok_or_else(|| BrowserError::Launch(format!("devtools url has no port: {ws_url}")))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| BrowserError::Launch(format!("invalid devtools port in: {ws_url}")))?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_parses_host_and_port() {
        let (host, port) = endpoint_from_ws_url("ws://127.0.0.1:9222/devtools/browser/abc")
            .expect("endpoint should parse");
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 9222);
    }

    #[test]
    fn endpoint_rejects_non_ws_schemes() {
        endpoint_from_ws_url("http://127.0.0.1:9222/json").expect_err("http should be rejected");
    }

    #[test]
    fn endpoint_rejects_missing_port() {
        endpoint_from_ws_url("ws://localhost/devtools").expect_err("missing port should fail");
    }

    #[test]
    fn matching_response_yields_result_payload() {
        let message = json!({ "id": 7, "result": { "targetId": "T1" } });
        let outcome = command_outcome(&message, 7)
            .expect("matching id should resolve")
            .expect("result payload should be ok");
        assert_eq!(outcome["targetId"], "T1");
    }

    #[test]
    fn error_payload_becomes_protocol_error() {
        let message = json!({ "id": 3, "error": { "code": -32000, "message": "no such target" } });
        let error = command_outcome(&message, 3)
            .expect("matching id should resolve")
            .expect_err("error payload should fail");
        match error {
            BrowserError::Protocol { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "no such target");
            }
            other => panic!("unexpected error kind: {other}"),
        }
    }

    #[test]
    fn events_and_stale_responses_are_skipped() {
        let event = json!({ "method": "Page.loadEventFired", "params": {} });
        assert!(command_outcome(&event, 1).is_none());

        let stale = json!({ "id": 2, "result": {} });
        assert!(command_outcome(&stale, 9).is_none());
    }

    #[test]
    fn event_params_matches_method_and_session() {
        let event = json!({
            "method": "Page.loadEventFired",
            "sessionId": "S1",
            "params": { "timestamp": 1.0 },
        });
        let params =
            event_params(&event, Some("S1"), "Page.loadEventFired").expect("event should match");
        assert_eq!(params["timestamp"], 1.0);
    }

    #[test]
    fn event_params_rejects_other_sessions_and_responses() {
        let event = json!({ "method": "Page.loadEventFired", "sessionId": "S1", "params": {} });
        assert!(event_params(&event, Some("S2"), "Page.loadEventFired").is_none());
        assert!(event_params(&event, None, "Page.loadEventFired").is_none());
        assert!(event_params(&event, Some("S1"), "Page.frameNavigated").is_none());

        let response = json!({ "id": 5, "result": {} });
        assert!(event_params(&response, Some("S1"), "Page.loadEventFired").is_none());
    }

    #[test]
    fn response_without_result_defaults_to_null() {
        let message = json!({ "id": 4 });
        let outcome = command_outcome(&message, 4)
            .expect("matching id should resolve")
            .expect("missing result should default");
        assert!(outcome.is_null());
    }
}
