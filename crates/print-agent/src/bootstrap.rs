//! Wiring of configured components.

use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{Context, Result};
use application::printer::{ChunkedWriter, FixedPacing};
use domain::WirelessTransport;
use infrastructure::{FileTransport, TransportConfig, TransportKind, WriterConfig};
use tracing::info;

pub async fn build_transport(config: &TransportConfig) -> Result<Arc<dyn WirelessTransport>> {
    match config.kind {
        TransportKind::File => {
            info!("📄 Using capture file {:?}", config.capture_path);
            Ok(Arc::new(FileTransport::new(&config.capture_path)))
        }
        TransportKind::Ble => build_ble(config).await,
    }
}

#[cfg(feature = "ble")]
async fn build_ble(config: &TransportConfig) -> Result<Arc<dyn WirelessTransport>> {
    info!("📡 Using Bluetooth LE transport");
    Ok(Arc::new(
        infrastructure::BleTransport::new(config.scan_timeout(), config.device_name.clone()).await,
    ))
}

#[cfg(not(feature = "ble"))]
async fn build_ble(_config: &TransportConfig) -> Result<Arc<dyn WirelessTransport>> {
    anyhow::bail!(
        "this build has no Bluetooth support; rebuild with `--features ble` or set transport.kind = \"file\""
    )
}

pub fn build_writer(config: &WriterConfig) -> Result<ChunkedWriter> {
    let chunk_size =
        NonZeroUsize::new(config.chunk_size).context("writer.chunk_size must be at least 1")?;
    Ok(ChunkedWriter::new(chunk_size, FixedPacing(config.chunk_delay()))
        .with_write_timeout(config.write_timeout()))
}

/// Renders bytes as space-separated hex, 16 per line.
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .map(|line| {
            line.iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
