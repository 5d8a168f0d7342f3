//! Market Data Store Binary
//!
//! Inspects containers and resolves storage paths.
//!
//! # Usage
//!
//! ```bash
//! market-data-store [--config <file>] inspect <container.zip> [--json]
//! market-data-store [--config <file>] resolve <class> <symbol> <market> <YYYYMMDD> <resolution> <kind>
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log filter (overrides `observability.logging.level`)
//! - Any variable referenced as `${VAR}` in the config file

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::NaiveDate;
use serde::Serialize;

use market_data_store::config::{Config, load_config};
use market_data_store::storage::Archive;
use market_data_store::telemetry::init_tracing;
use market_data_store::{DataKind, Instrument, Resolution, SecurityType, resolve};

const USAGE: &str = "\
usage: market-data-store [--config <file>] <command>

commands:
  inspect <container> [--json]
  resolve <class> <symbol> <market> <YYYYMMDD> <resolution> <kind>";

/// Default config file, used when present and no `--config` is given.
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    config: Option<String>,
    command: Command,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Inspect {
        container: PathBuf,
        json: bool,
    },
    Resolve {
        class: String,
        symbol: String,
        market: String,
        date: String,
        resolution: String,
        kind: String,
    },
}

#[derive(Debug, Serialize)]
struct EntrySummary {
    entry: String,
    lines: usize,
    first: Option<String>,
    last: Option<String>,
}

#[derive(Debug, Serialize)]
struct ContainerSummary {
    container: String,
    entries: Vec<EntrySummary>,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = parse_args(std::env::args().skip(1))?;
    let config = load(cli.config.as_deref())?;
    init_tracing(&config.observability.logging)?;

    match cli.command {
        Command::Inspect { container, json } => inspect(&config, &container, json),
        Command::Resolve {
            class,
            symbol,
            market,
            date,
            resolution,
            kind,
        } => {
            let security_type: SecurityType = class.parse()?;
            let instrument = Instrument::new(symbol, security_type, market)?;
            let date = NaiveDate::parse_from_str(&date, "%Y%m%d")
                .with_context(|| format!("invalid date '{date}', expected YYYYMMDD"))?;
            let resolution: Resolution = resolution.parse()?;
            let kind: DataKind = kind.parse()?;

            let resolved = resolve(
                Path::new(&config.storage.data_directory),
                &instrument,
                date,
                resolution,
                kind,
            )?;
            println!("{}", resolved.container.display());
            println!("{}", resolved.entry);
            Ok(())
        }
    }
}

fn load(path: Option<&str>) -> anyhow::Result<Config> {
    match path {
        Some(p) => load_config(Some(p)).with_context(|| format!("loading {p}")),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            load_config(None).context("loading config.yaml")
        }
        None => Ok(Config::default()),
    }
}

fn inspect(config: &Config, container: &Path, json: bool) -> anyhow::Result<()> {
    let archive = Archive::new(
        config.storage.compression,
        config.storage.compression_level,
    );
    let entries = archive.read_all(container)?;

    let summary = ContainerSummary {
        container: container.display().to_string(),
        entries: entries
            .into_iter()
            .map(|(entry, lines)| EntrySummary {
                lines: lines.len(),
                first: lines.first().cloned(),
                last: lines.last().cloned(),
                entry,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.container);
        for entry in &summary.entries {
            println!("  {} ({} lines)", entry.entry, entry.lines);
        }
    }
    Ok(())
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Cli> {
    let mut config = None;
    let mut json = false;
    let mut positional = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let Some(path) = args.next() else {
                    bail!("--config requires a path\n\n{USAGE}");
                };
                config = Some(path);
            }
            "--json" => json = true,
            "--help" | "-h" => bail!("{USAGE}"),
            flag if flag.starts_with('-') => bail!("unknown option '{flag}'\n\n{USAGE}"),
            _ => positional.push(arg),
        }
    }

    let command = match positional.first().map(String::as_str) {
        Some("inspect") => {
            let [_, container] = positional.as_slice() else {
                bail!("inspect takes exactly one container path\n\n{USAGE}");
            };
            Command::Inspect {
                container: PathBuf::from(container),
                json,
            }
        }
        Some("resolve") => {
            let [_, class, symbol, market, date, resolution, kind] = positional.as_slice() else {
                bail!("resolve takes six arguments\n\n{USAGE}");
            };
            Command::Resolve {
                class: class.clone(),
                symbol: symbol.clone(),
                market: market.clone(),
                date: date.clone(),
                resolution: resolution.clone(),
                kind: kind.clone(),
            }
        }
        Some(other) => bail!("unknown command '{other}'\n\n{USAGE}"),
        None => bail!("{USAGE}"),
    };

    Ok(Cli { config, command })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_parse_inspect_with_flags() {
        let cli = parse_args(args(&["--config", "c.yaml", "inspect", "a.zip", "--json"])).unwrap();
        assert_eq!(cli.config.as_deref(), Some("c.yaml"));
        assert_eq!(
            cli.command,
            Command::Inspect {
                container: PathBuf::from("a.zip"),
                json: true
            }
        );
    }

    #[test]
    fn test_parse_resolve() {
        let cli = parse_args(args(&[
            "resolve", "forex", "EURUSD", "fxcm", "20170316", "second", "quote",
        ]))
        .unwrap();
        assert!(matches!(cli.command, Command::Resolve { ref symbol, .. } if symbol == "EURUSD"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["inspect"])).is_err());
        assert!(parse_args(args(&["resolve", "forex"])).is_err());
        assert!(parse_args(args(&["explode"])).is_err());
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["--verbose", "inspect", "a.zip"])).is_err());
    }
}
