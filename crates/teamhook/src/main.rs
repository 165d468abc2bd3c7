use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use tokio::runtime::Runtime;

use teamhook::cli::{Cli, Commands, EventArgs};
use teamhook::config::Config;
use teamhook::logging;
use teamhook::notifier::WEBHOOK_URL_KEY;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let rt = Runtime::new()?;
    rt.block_on(async {
        match cli.command {
            Commands::Notify { event, webhook_url } => {
                let config = Config::load(cli.config.clone())?;
                let notifier = config.notifier()?;
                let execution_data = read_execution_data(event.execution_data.as_deref())?;
                let mut options = plugin_options(&config, &event);
                if let Some(url) = webhook_url {
                    options.insert(WEBHOOK_URL_KEY.to_string(), Value::String(url));
                }

                match notifier.notify(&event.trigger, &execution_data, &options).await {
                    Ok(_) => println!("delivered"),
                    // Exit code: 2 = webhook reached but message not accepted
                    Err(err) if err.is_rejected() => {
                        eprintln!("Error: {err}");
                        std::process::exit(2);
                    }
                    Err(err) => return Err(err).context("Sending notification"),
                }
            }
            Commands::Render { event } => {
                let config = Config::load(cli.config.clone())?;
                let notifier = config.notifier()?;
                let execution_data = read_execution_data(event.execution_data.as_deref())?;
                let options = plugin_options(&config, &event);
                let message = notifier
                    .render(&event.trigger, &execution_data, &options)
                    .context("Rendering notification")?;
                println!("{message}");
            }
            Commands::Version { json } => {
                if json {
                    let info = serde_json::json!({
                        "version": env!("CARGO_PKG_VERSION"),
                        "commit": option_env!("GIT_SHA").unwrap_or("unknown"),
                        "build_date": option_env!("BUILD_DATE").unwrap_or("unknown"),
                    });
                    println!("{}", serde_json::to_string_pretty(&info)?);
                } else {
                    println!(
                        "teamhook {} (commit: {}, built: {})",
                        env!("CARGO_PKG_VERSION"),
                        option_env!("GIT_SHA").unwrap_or("unknown"),
                        option_env!("BUILD_DATE").unwrap_or("unknown"),
                    );
                }
            }
        }
        Ok(())
    })
}

/// `[options]` from the config file with `-o key=value` pairs on top.
fn plugin_options(config: &Config, event: &EventArgs) -> Map<String, Value> {
    let mut options = config.options.clone();
    for (key, value) in &event.options {
        options.insert(key.clone(), Value::String(value.clone()));
    }
    options
}

fn read_execution_data(path: Option<&Path>) -> Result<Value> {
    let raw = match path {
        None => return Ok(Value::Object(Map::new())),
        Some(p) if p == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Reading execution data from stdin")?;
            buf
        }
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("Reading execution data {}", p.display()))?,
    };
    serde_json::from_str(&raw).context("Parsing execution data JSON")
}
