use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_INPUT_SELECTOR: &str = "textarea[data-testid='ask-textarea']";
pub const DEFAULT_RESPONSE_SELECTOR: &str = "div.whitespace-pre-wrap.chat-markdown-content p";

#[derive(Parser, Debug)]
#[command(
    name = "chatcheck",
    version,
    about = "Browser-driven regression harness for a web chatbot"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Run(RunArgs),
    Score(ScoreArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub url: String,

    #[arg(long)]
    pub suite: Option<String>,

    #[arg(long, default_value = ".artifacts/chatcheck")]
    pub artifacts_root: PathBuf,

    #[arg(long, default_value_t = 90.0)]
    pub threshold: f64,

    #[arg(long, default_value = "token-hash-f1-local-v1")]
    pub model_id: String,

    #[arg(long, default_value = DEFAULT_INPUT_SELECTOR)]
    pub input_selector: String,

    #[arg(long, default_value = DEFAULT_RESPONSE_SELECTOR)]
    pub response_selector: String,

    #[arg(long)]
    pub chrome: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub headless: bool,

    #[arg(long, default_value_t = 30)]
    pub launch_timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    pub nav_timeout_secs: u64,

    #[arg(long, default_value_t = 30)]
    pub input_timeout_secs: u64,

    #[arg(long, default_value_t = 5)]
    pub settle_secs: u64,

    #[arg(long, default_value_t = 30)]
    pub response_wait_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub suite: Option<String>,

    #[arg(long, default_value = ".artifacts/chatcheck")]
    pub artifacts_root: PathBuf,

    #[arg(long, default_value_t = 90.0)]
    pub threshold: f64,

    #[arg(long, default_value = "token-hash-f1-local-v1")]
    pub model_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".artifacts/chatcheck")]
    pub artifacts_root: PathBuf,
}
