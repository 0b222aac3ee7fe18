//! ESC/POS receipt encoding.
//!
//! Encoding happens in two stages: [`receipt_instructions`] decides what to
//! print as a list of [`Instruction`]s, and [`render`] turns any instruction
//! list into protocol bytes through one control-code table.

use domain::{ReceiptRecord, ReceiptTemplate};
use encoding_rs::WINDOWS_1252;

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const LF: u8 = 0x0A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// One typed printer instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Initialize,
    SetAlign(Alignment),
    SetBold(bool),
    /// Literal text; `\n` is emitted as a line feed
    Text(String),
    Cut,
}

/// Bytes ready for the chunked writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload(Vec<u8>);

impl EncodedPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for EncodedPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Fluent builder for an instruction list.
#[derive(Debug, Default)]
pub struct ReceiptBuilder {
    instructions: Vec<Instruction>,
}

impl ReceiptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(mut self) -> Self {
        self.instructions.push(Instruction::Initialize);
        self
    }

    pub fn align_center(mut self) -> Self {
        self.instructions
            .push(Instruction::SetAlign(Alignment::Center));
        self
    }

    pub fn align_left(mut self) -> Self {
        self.instructions.push(Instruction::SetAlign(Alignment::Left));
        self
    }

    pub fn bold(mut self, on: bool) -> Self {
        self.instructions.push(Instruction::SetBold(on));
        self
    }

    /// Text followed by a line feed. Control characters inside `text` are
    /// blanked so caller data cannot smuggle in printer commands.
    pub fn text_line(mut self, text: &str) -> Self {
        let mut line = sanitize(text);
        line.push('\n');
        self.instructions.push(Instruction::Text(line));
        self
    }

    pub fn kv(self, key: &str, value: &str) -> Self {
        self.text_line(&format!("{}: {}", key, value))
    }

    pub fn empty_line(mut self) -> Self {
        self.instructions.push(Instruction::Text("\n".to_string()));
        self
    }

    pub fn cut(mut self) -> Self {
        self.instructions.push(Instruction::Cut);
        self
    }

    pub fn build(self) -> Vec<Instruction> {
        self.instructions
    }
}

/// Lays out a receipt for `record`.
pub fn receipt_instructions(record: &ReceiptRecord, template: &ReceiptTemplate) -> Vec<Instruction> {
    let mut builder = ReceiptBuilder::new()
        .initialize()
        .align_center()
        .text_line(&template.header)
        .empty_line()
        .align_left()
        .kv("Devotee ID", &record.id);

    if let Some(name) = record.holder_name() {
        builder = builder.kv("Name", name);
    }

    builder
        .kv("Date", &record.date)
        .empty_line()
        .align_center()
        .bold(true)
        .kv(&template.item_label, &record.item)
        .bold(false)
        .empty_line()
        .empty_line()
        .text_line(&template.footer)
        .align_left()
        .cut()
        .build()
}

/// Encodes `record` into printer bytes.
pub fn encode(record: &ReceiptRecord, template: &ReceiptTemplate) -> EncodedPayload {
    render(&receipt_instructions(record, template))
}

/// Renders instructions to ESC/POS bytes.
pub fn render(instructions: &[Instruction]) -> EncodedPayload {
    let mut buffer = Vec::with_capacity(256);
    for instruction in instructions {
        match control_code(instruction) {
            Some(code) => buffer.extend_from_slice(code),
            None => {
                if let Instruction::Text(text) = instruction {
                    encode_text(text, &mut buffer);
                }
            }
        }
    }
    EncodedPayload(buffer)
}

fn control_code(instruction: &Instruction) -> Option<&'static [u8]> {
    let code: &'static [u8] = match instruction {
        // ESC @: Initialize printer
        Instruction::Initialize => &[ESC, b'@'],
        // ESC a n: Align (0: Left, 1: Center, 2: Right)
        Instruction::SetAlign(Alignment::Left) => &[ESC, b'a', 0x00],
        Instruction::SetAlign(Alignment::Center) => &[ESC, b'a', 0x01],
        Instruction::SetAlign(Alignment::Right) => &[ESC, b'a', 0x02],
        // ESC E n: Emphasized mode
        Instruction::SetBold(true) => &[ESC, b'E', 0x01],
        Instruction::SetBold(false) => &[ESC, b'E', 0x00],
        // GS V 0: Full cut
        Instruction::Cut => &[GS, b'V', 0x00],
        Instruction::Text(_) => return None,
    };
    Some(code)
}

/// Single-byte text encoding (Windows-1252). Characters the code page
/// cannot represent become `?`.
pub(crate) fn encode_text(text: &str, out: &mut Vec<u8>) {
    for ch in text.chars() {
        match ch {
            '\n' => out.push(LF),
            c if c.is_ascii_control() => out.push(b' '),
            c if c.is_ascii() => out.push(c as u8),
            c => {
                let mut utf8 = [0u8; 4];
                let (bytes, _, had_errors) = WINDOWS_1252.encode(c.encode_utf8(&mut utf8));
                match bytes.as_ref() {
                    [byte] if !had_errors => out.push(*byte),
                    _ => out.push(b'?'),
                }
            }
        }
    }
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReceiptRecord {
        ReceiptRecord::new("D100", "2024-03-01", "Blessing").with_name("A. Devotee")
    }

    fn expected_bytes(with_name: bool) -> Vec<u8> {
        let mut bytes = vec![0x1B, 0x40, 0x1B, 0x61, 0x01];
        bytes.extend_from_slice(b"JAIN TEMPLE\n\n");
        bytes.extend_from_slice(&[0x1B, 0x61, 0x00]);
        bytes.extend_from_slice(b"Devotee ID: D100\n");
        if with_name {
            bytes.extend_from_slice(b"Name: A. Devotee\n");
        }
        bytes.extend_from_slice(b"Date: 2024-03-01\n\n");
        bytes.extend_from_slice(&[0x1B, 0x61, 0x01, 0x1B, 0x45, 0x01]);
        bytes.extend_from_slice(b"Selected Item: Blessing\n");
        bytes.extend_from_slice(&[0x1B, 0x45, 0x00]);
        bytes.extend_from_slice(b"\n\nThank you for your visit!\n");
        bytes.extend_from_slice(&[0x1B, 0x61, 0x00, 0x1D, 0x56, 0x00]);
        bytes
    }

    #[test]
    fn test_encode_full_receipt() {
        let payload = encode(&sample(), &ReceiptTemplate::default());
        assert_eq!(payload.as_bytes(), expected_bytes(true).as_slice());
    }

    #[test]
    fn test_encode_is_deterministic() {
        let template = ReceiptTemplate::default();
        assert_eq!(encode(&sample(), &template), encode(&sample(), &template));
    }

    #[test]
    fn test_missing_name_omits_line() {
        let record = ReceiptRecord::new("D100", "2024-03-01", "Blessing");
        let payload = encode(&record, &ReceiptTemplate::default());
        assert_eq!(payload.as_bytes(), expected_bytes(false).as_slice());

        let blank = record.with_name("  ");
        assert_eq!(encode(&blank, &ReceiptTemplate::default()), payload);
    }

    #[test]
    fn test_instruction_order() {
        let instructions = receipt_instructions(&sample(), &ReceiptTemplate::default());
        assert_eq!(instructions.first(), Some(&Instruction::Initialize));
        assert_eq!(instructions.last(), Some(&Instruction::Cut));

        let bold_on = instructions
            .iter()
            .position(|i| *i == Instruction::SetBold(true))
            .unwrap();
        assert_eq!(
            instructions[bold_on + 1],
            Instruction::Text("Selected Item: Blessing\n".to_string())
        );
        assert_eq!(instructions[bold_on + 2], Instruction::SetBold(false));
    }

    #[test]
    fn test_render_right_alignment() {
        let payload = render(&[Instruction::SetAlign(Alignment::Right)]);
        assert_eq!(payload.as_bytes(), &[0x1B, 0x61, 0x02]);
    }

    #[test]
    fn test_non_ascii_is_single_byte() {
        let payload = render(&[Instruction::Text("Café 你".to_string())]);
        assert_eq!(payload.as_bytes(), &[b'C', b'a', b'f', 0xE9, b' ', b'?']);
    }

    #[test]
    fn test_record_cannot_inject_control_codes() {
        let record = ReceiptRecord::new("D1\x1B@\n", "2024-03-01", "Blessing");
        let payload = encode(&record, &ReceiptTemplate::default());
        let needle = b"Devotee ID: D1 @ \n";
        assert!(
            payload
                .as_bytes()
                .windows(needle.len())
                .any(|window| window == needle)
        );
        assert_eq!(
            payload
                .as_bytes()
                .windows(2)
                .filter(|w| *w == [0x1B, 0x40])
                .count(),
            1
        );
    }

    #[test]
    fn test_custom_template() {
        let template = ReceiptTemplate {
            header: "SHRI MANDIR".to_string(),
            ..ReceiptTemplate::default()
        };
        let payload = encode(&sample(), &template);
        let needle = b"SHRI MANDIR\n";
        assert!(
            payload
                .as_bytes()
                .windows(needle.len())
                .any(|window| window == needle)
        );
    }
}
