//! burrow — move a file or clipboard text across an air gap as a looping
//! sequence of visual frames.

use std::path::PathBuf;

use anyhow::{Context, Result};

use burrow_core::config::BurrowConfig;

mod cmd;

fn print_usage() {
    println!("Usage: burrow <command> [options]");
    println!();
    println!("Commands:");
    println!("  send <file>              Loop the file's frames on stdout");
    println!("  send --text <text>       Loop clipboard text instead of a file");
    println!("  receive                  Read frames from stdin until complete");
    println!("  config                   Print the effective configuration");
    println!();
    println!("Send options:");
    println!("  --displays <n>           Frames shown per tick (default: 1)");
    println!();
    println!("Receive options:");
    println!("  --output-dir <dir>       Where completed files are written");
    println!();
    println!("While sending, type a comma list of frame indices to resend only");
    println!("those, an empty line to resend everything, or `quit` to stop.");
}

/// A missing config file means defaults; a broken or invalid one stops the
/// command before anything is sent or received.
fn load_config() -> Result<BurrowConfig> {
    if let Err(e) = BurrowConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    BurrowConfig::load().with_context(|| {
        format!(
            "failed to load configuration from {}",
            BurrowConfig::file_path().display()
        )
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries frames and missing lists; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut text: Option<String> = None;
    let mut output_dir: Option<PathBuf> = None;
    let mut displays: usize = 1;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--text" => {
                i += 1;
                text = Some(args.get(i).context("--text requires a value")?.clone());
            }
            "--output-dir" => {
                i += 1;
                output_dir = Some(PathBuf::from(
                    args.get(i).context("--output-dir requires a value")?,
                ));
            }
            "--displays" => {
                i += 1;
                displays = args
                    .get(i)
                    .context("--displays requires a value")?
                    .parse()
                    .context("--displays must be a number")?;
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match (remaining.as_slice(), text) {
        (["send"], Some(text)) => {
            cmd::send::run(load_config()?, cmd::send::Source::Text(text), displays).await
        }
        (["send", path], None) => {
            let source = cmd::send::Source::File(PathBuf::from(*path));
            cmd::send::run(load_config()?, source, displays).await
        }
        (["receive"], None) => {
            let mut config = load_config()?;
            if let Some(dir) = output_dir {
                config.receiver.output_dir = dir;
            }
            cmd::receive::run(config).await
        }
        (["config"], None) => {
            let config = load_config()?;
            println!("# {}", BurrowConfig::file_path().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        (["help"] | ["--help"] | ["-h"] | [], _) => {
            print_usage();
            Ok(())
        }
        (other, _) => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
