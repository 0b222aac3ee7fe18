use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use domain::ReceiptRecord;
use infrastructure::{PrintAgentConfig, TransportKind};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config directory
    #[arg(long, default_value = "config", global = true)]
    pub config_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a printer, print one receipt and disconnect
    Print {
        #[command(flatten)]
        record: RecordArgs,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Write the encoded receipt bytes without touching a printer
    Encode {
        #[command(flatten)]
        record: RecordArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Hex)]
        format: OutputFormat,

        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// ESC/POS receipt as a hex dump
    Hex,
    /// ESC/POS receipt bytes
    Raw,
    /// EPL label program for barcode label printers
    Epl,
}

/// Receipt fields, either as flags or as a JSON document.
#[derive(Args, Debug, Default)]
pub struct RecordArgs {
    /// Devotee ID
    #[arg(long, conflicts_with = "json")]
    pub id: Option<String>,

    /// Devotee name (optional)
    #[arg(long, conflicts_with = "json")]
    pub name: Option<String>,

    /// Visit date as YYYY-MM-DD (defaults to today)
    #[arg(long, conflicts_with = "json")]
    pub date: Option<String>,

    /// Selected item
    #[arg(long, conflicts_with = "json")]
    pub item: Option<String>,

    /// Read the record from a JSON file ("-" for stdin)
    #[arg(long)]
    pub json: Option<PathBuf>,
}

impl RecordArgs {
    pub fn into_record(self) -> Result<ReceiptRecord> {
        if let Some(path) = self.json {
            let raw = if path.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin()).context("Failed to read record from stdin")?
            } else {
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read record file {:?}", path))?
            };
            return parse_record_json(&raw);
        }

        let Some(id) = self.id else {
            bail!("--id is required (or pass --json)");
        };
        let Some(item) = self.item else {
            bail!("--item is required (or pass --json)");
        };
        let date = match self.date {
            Some(date) => normalize_date(&date)?,
            None => chrono::Local::now().date_naive().format(DATE_FORMAT).to_string(),
        };

        let mut record = ReceiptRecord::new(id, date, item);
        record.name = self.name;
        Ok(record)
    }
}

pub fn parse_record_json(raw: &str) -> Result<ReceiptRecord> {
    let mut record: ReceiptRecord =
        serde_json::from_str(raw).context("Record is not valid receipt JSON")?;
    record.date = normalize_date(&record.date)?;
    Ok(record)
}

/// Accepts `YYYY-MM-DD` and re-renders it zero-padded.
pub fn normalize_date(date: &str) -> Result<String> {
    let parsed = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", date))?;
    Ok(parsed.format(DATE_FORMAT).to_string())
}

/// Per-run overrides of loaded configuration values.
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Transport to use (ble or file)
    #[arg(long, value_parser = parse_transport_kind)]
    pub transport: Option<TransportKind>,

    /// Capture file for the file transport
    #[arg(long)]
    pub capture_path: Option<PathBuf>,

    /// Exact advertised name of the printer to select
    #[arg(long)]
    pub device_name: Option<String>,

    /// Override chunk size in bytes
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Override delay between chunks
    #[arg(long)]
    pub chunk_delay_ms: Option<u64>,
}

fn parse_transport_kind(value: &str) -> Result<TransportKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "ble" => Ok(TransportKind::Ble),
        "file" => Ok(TransportKind::File),
        other => Err(format!("unknown transport '{}', expected ble or file", other)),
    }
}

impl Overrides {
    pub fn apply(self, config: &mut PrintAgentConfig) -> Result<()> {
        if let Some(kind) = self.transport {
            config.transport.kind = kind;
        }
        if let Some(path) = self.capture_path {
            config.transport.capture_path = path;
        }
        if let Some(name) = self.device_name {
            config.transport.device_name = Some(name);
        }
        if let Some(size) = self.chunk_size {
            config.writer.chunk_size = size;
        }
        if let Some(delay) = self.chunk_delay_ms {
            config.writer.chunk_delay_ms = delay;
        }
        config.validate()?;
        Ok(())
    }
}
