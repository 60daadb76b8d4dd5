use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::browser::{ChromeProcess, LaunchOptions, Session};
use crate::cli::RunArgs;

/// Launches the browser, opens the chat UI, and blocks until the operator
/// confirms that login succeeded. Any failure here is fatal for the whole run;
/// no partial credential state is reused.
pub fn bootstrap(args: &RunArgs) -> Result<Session> {
    let options = LaunchOptions {
        executable: args.chrome.clone(),
        headless: args.headless,
        launch_timeout: Duration::from_secs(args.launch_timeout_secs),
    };

    info!(url = %args.url, "launching browser for manual login");
    let chrome = ChromeProcess::launch(&options).context("failed to launch the browser")?;
    let mut session = Session::connect(chrome).context("failed to connect to the browser")?;

    let login_page = session
        .open_page(&args.url, Duration::from_secs(args.nav_timeout_secs))
        .context("failed to open the login page")?;
    login_page.detach();

    wait_for_operator()?;
    info!("operator confirmed login; starting the batch");
    Ok(session)
}

// Operator-gated checkpoint with no timeout: the run must not proceed until a
// human certifies that login succeeded and the chat UI is interactive.
fn wait_for_operator() -> Result<()> {
    println!("Please log in manually and ensure the chatbot interface is ready.");
    print!("Press Enter once you have logged in and the chatbot interface is ready for use...");
    io::stdout()
        .flush()
        .context("failed to flush the operator prompt")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read operator confirmation")?;
    Ok(())
}
