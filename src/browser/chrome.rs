use std::env;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tempfile::TempDir;
use tracing::{info, trace};

use crate::browser::error::BrowserError;

pub const CHROME_ENV_OVERRIDE: &str = "CHATCHECK_CHROME";

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub launch_timeout: Duration,
}

/// A Chrome child process started with an ephemeral DevTools port and a
/// throwaway profile directory. Killing the child on drop is the backstop for
/// every failure path; the profile directory is removed with the handle, so no
/// credential state outlives the run.
pub struct ChromeProcess {
    child: Child,
    ws_url: String,
    _profile_dir: TempDir,
}

impl ChromeProcess {
    pub fn launch(options: &LaunchOptions) -> Result<Self, BrowserError> {
        let executable = resolve_executable(options.executable.as_deref()).ok_or_else(|| {
            BrowserError::Launch(format!(
                "no Chrome/Chromium executable found (pass --chrome or set {CHROME_ENV_OVERRIDE})"
            ))
        })?;
        let profile_dir = TempDir::new()?;

        let mut command = Command::new(&executable);
        command
            .arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", profile_dir.path().display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if options.headless {
            command.arg("--headless=new");
        }

        info!(executable = %executable.display(), headless = options.headless, "launching chrome");
        let mut child = command.spawn().map_err(|err| {
            BrowserError::Launch(format!("failed to spawn {}: {err}", executable.display()))
        })?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BrowserError::Launch("chrome stderr was not captured".to_string()))?;

        // The reader thread outlives the scrape below so chrome never blocks
        // on a full stderr pipe mid-run.
        let (sender, receiver) = mpsc::channel::<String>();
        thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        let _ = sender.send(line);
                    }
                    Err(_) => break,
                }
            }
        });

        let deadline = Instant::now() + options.launch_timeout;
        let ws_url = loop {
            let now = Instant::now();
            if now >= deadline {
                child.kill().ok();
                return Err(BrowserError::Timeout {
                    what: "devtools websocket url on chrome stderr".to_string(),
                    ms: options.launch_timeout.as_millis() as u64,
                });
            }
            match receiver.recv_timeout(deadline - now) {
                Ok(line) => {
                    trace!(line = %line, "chrome stderr");
                    if let Some(url) = devtools_ws_url(&line) {
                        break url;
                    }
                }
                Err(_) => {
                    child.kill().ok();
                    return Err(BrowserError::Timeout {
                        what: "devtools websocket url on chrome stderr".to_string(),
                        ms: options.launch_timeout.as_millis() as u64,
                    });
                }
            }
        };

        info!(ws_url = %ws_url, "chrome devtools endpoint ready");
        Ok(Self {
            child,
            ws_url,
            _profile_dir: profile_dir,
        })
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

fn devtools_ws_url(line: &str) -> Option<String> {
    let pattern = Regex::new(r"DevTools listening on (ws://\S+)").ok()?;
    pattern
        .captures(line)
        .map(|captures| captures[1].to_string())
}

fn resolve_executable(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(raw) = env::var(CHROME_ENV_OVERRIDE) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in executable_names() {
        if let Some(path) = search_path(name) {
            return Some(path);
        }
    }

    os_specific_paths().into_iter().find(|path| path.exists())
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    let root = PathBuf::from(trimmed);
                    paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                    paths.push(root.join("Chromium/Application/chrome.exe"));
                    paths.push(root.join("Microsoft/Edge/Application/msedge.exe"));
                }
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}
