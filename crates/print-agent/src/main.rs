use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::printer::{encoder, epl_label};
use application::{PrintQueue, PrintService, TransportSession};
use domain::ReceiptRecord;
use infrastructure::PrintAgentConfig;
use print_agent::bootstrap::{build_transport, build_writer, format_hex};
use print_agent::cli::{Cli, Command, OutputFormat};
use print_agent::notify::{connect_notice, indicator_notice, print_notice};

async fn run() -> Result<bool> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,print_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("📂 Config directory: {}", cli.config_dir);
    let mut config = PrintAgentConfig::load(&cli.config_dir)?;

    match cli.command {
        Command::Print { record, overrides } => {
            let record = record.into_record()?;
            overrides.apply(&mut config)?;
            print(&config, record).await
        }
        Command::Encode {
            record,
            format,
            output,
        } => {
            let record = record.into_record()?;
            let bytes = match format {
                OutputFormat::Hex => {
                    let payload = encoder::encode(&record, &config.receipt);
                    format!("{}\n", format_hex(payload.as_bytes())).into_bytes()
                }
                OutputFormat::Raw => encoder::encode(&record, &config.receipt).into_bytes(),
                OutputFormat::Epl => epl_label(&record).into_bytes(),
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, &bytes)?;
                    info!("✅ Wrote {} bytes to {:?}", bytes.len(), path);
                }
                None => std::io::stdout().write_all(&bytes)?,
            }
            Ok(true)
        }
    }
}

async fn print(config: &PrintAgentConfig, record: ReceiptRecord) -> Result<bool> {
    let transport = build_transport(&config.transport).await?;
    let session = Arc::new(TransportSession::new(transport));

    // Connection indicator
    let mut status_rx = session.subscribe();
    let indicator = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            info!(state = %status.state, "{}", indicator_notice(&status.indicator()));
        }
    });

    let connected = session
        .discover_and_connect(&config.filter)
        .await
        .map(|printer| printer.device().label().to_string());
    let notice = connect_notice(&connected);
    println!("{}", notice);
    if notice.is_error() {
        indicator.abort();
        return Ok(false);
    }

    let service = PrintService::new(session.clone(), build_writer(&config.writer)?)
        .with_template(config.receipt.clone());
    let (queue, handle) = PrintQueue::new(service, 8);
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(queue.run(cancel.clone()));

    let result = handle.print(record).await;
    let notice = print_notice(&result);
    println!("{}", notice);

    cancel.cancel();
    if let Err(e) = worker.await {
        warn!(error = %e, "Print queue task ended abnormally");
    }
    session.disconnect().await;
    indicator.abort();

    info!("👋 Good bye!");
    Ok(!notice.is_error())
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    match rt.block_on(run()) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("\n❌ CRITICAL ERROR: {:?}", e);
            std::process::exit(1);
        }
    }
}
