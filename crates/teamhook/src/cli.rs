use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Teamhook – job notifications for Microsoft Teams incoming webhooks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Activate verbose output (-v, -vv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render and post a notification for a job event
    Notify {
        #[command(flatten)]
        event: EventArgs,

        /// Webhook URL (overrides `webhook_url` from the config file)
        #[arg(long, value_name = "URL")]
        webhook_url: Option<String>,
    },
    /// Render the notification message without sending it
    Render {
        #[command(flatten)]
        event: EventArgs,
    },
    /// Print build information
    Version {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct EventArgs {
    /// Job event (start, success, failure)
    #[arg(short, long)]
    pub trigger: String,

    /// JSON file with execution data ("-" reads stdin)
    #[arg(short, long, value_name = "FILE")]
    pub execution_data: Option<PathBuf>,

    /// Extra plugin configuration exposed to templates (key=value)
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
