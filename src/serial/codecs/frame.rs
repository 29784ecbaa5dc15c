use std::{fmt::Display, io};

use bytes::{BufMut, BytesMut};
use itertools::Itertools;
use tokio_util::codec::{Decoder, Encoder};

use crate::operation::Operation;

/// Bytes per command frame.
pub const FRAME_LEN: usize = 3;

/// The wire form of an [`Operation`]: opcode code, then A and B truncated to their low eight bits.
///
/// No checksum, no length, no terminator.
/// The device counts three bytes per command.
pub fn encode(operation: &Operation) -> [u8; FRAME_LEN] {
    [
        operation.opcode().code(),
        low_byte(operation.a()),
        low_byte(operation.b()),
    ]
}

/// Operands wrap rather than fail: 300 becomes 44, -1 becomes 255.
fn low_byte(operand: i32) -> u8 {
    (operand & 0xFF) as u8
}

/// Received bytes prepared for showing to the operator.
///
/// The device's replies are opaque, so nothing is interpreted beyond
/// rendering each byte as unsigned hex and as signed decimal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayRecord {
    bytes: Vec<u8>,
}

impl DisplayRecord {
    /// How many bytes were received.
    pub fn count(&self) -> usize {
        self.bytes.len()
    }

    /// Nothing received.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Each byte as two uppercase hex digits, space separated.
    pub fn hex(&self) -> String {
        self.bytes.iter().map(|byte| format!("{byte:02X}")).join(" ")
    }

    /// Each byte as a signed decimal, space separated.
    pub fn signed(&self) -> String {
        self.bytes.iter().map(|&byte| byte as i8).join(" ")
    }
}

impl Display for DisplayRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} byte(s):", self.count())?;

        for &byte in &self.bytes {
            write!(f, " {byte:02X} {}", byte as i8)?;
        }

        Ok(())
    }
}

/// Prepare received bytes for display. Never fails; empty in, empty out.
pub fn decode_for_display(bytes: &[u8]) -> DisplayRecord {
    DisplayRecord {
        bytes: bytes.to_vec(),
    }
}

/// Frames operations onto a byte buffer, and turns buffered received bytes into [`DisplayRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl Encoder<Operation> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Operation, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(FRAME_LEN);
        dst.put_slice(&encode(&item));

        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = DisplayRecord;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            // Need more bytes.
            return Ok(None);
        }

        // Replies have no framing, so everything buffered is shown at once.
        let all = src.split_to(src.len());

        Ok(Some(decode_for_display(&all)))
    }
}
