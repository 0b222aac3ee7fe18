//! EPL label output for barcode label printers.
//!
//! The label carries the devotee ID as a Code 128 barcode followed by the
//! name, item and date as text lines.

use domain::ReceiptRecord;

use super::encoder::{EncodedPayload, encode_text};

const UNKNOWN: &str = "Unknown";
const UNKNOWN_ITEM: &str = "Unknown Item";
const UNKNOWN_DATE: &str = "Unknown Date";

/// Renders `record` as an EPL2 label program.
pub fn epl_label(record: &ReceiptRecord) -> EncodedPayload {
    let id = field_or(&record.id, UNKNOWN);
    let name = record.holder_name().unwrap_or(UNKNOWN);
    let item = field_or(&record.item, UNKNOWN_ITEM);
    let date = field_or(&record.date, UNKNOWN_DATE);

    let lines = [
        // Clear image buffer, darkness 11
        "N".to_string(),
        "D11".to_string(),
        format!("B50,20,0,1,2,8,40,B,\"{}\"", quote(id)),
        format!("A60,70,0,3,1,1,N,\"{}\"", quote(name)),
        format!("A60,100,0,3,1,1,N,\"Item: {}\"", quote(item)),
        format!("A60,130,0,2,1,1,N,\"Date: {}\"", quote(date)),
        "P1".to_string(),
    ];

    let mut out = Vec::new();
    for line in lines {
        encode_text(&line, &mut out);
        out.push(b'\n');
    }
    EncodedPayload::from(out)
}

fn field_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() { fallback } else { trimmed }
}

/// Escapes a value for an EPL quoted field. Line breaks would end the
/// command early, so they become spaces.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            c if c.is_control() => quoted.push(' '),
            c => quoted.push(c),
        }
    }
    quoted
}
