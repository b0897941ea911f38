//! SQLite record-format helpers: varints, the payload-on-page formula, and
//! serial-type decoding. All three are transcribed directly from the SQLite
//! file format documentation, not invented.

use crate::error::{Error, Result};

/// Parses a big-endian SQLite varint (up to 9 bytes) from the front of
/// `bytes`, returning its value and the number of bytes it occupied.
pub fn read_varint(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut num_bytes = 0;
    for &byte in bytes.iter().take(9) {
        num_bytes += 1;
        if num_bytes == 9 {
            // The 9th byte contributes all 8 bits, not just the low 7.
            value = (value << 8) | byte as u64;
            break;
        }
        value = (value << 7) | (byte & 0x7F) as u64;
        if byte & 0x80 == 0 {
            break;
        }
    }
    if num_bytes == 0 {
        return Err(Error::MalformedRecord("empty varint".into()));
    }
    Ok((value, num_bytes))
}

/// The number of bytes of a cell's payload that are stored on the btree
/// page itself, with the remainder spilling onto overflow pages. `u` is the
/// usable page size, `p` the total payload size. Formula from the SQLite
/// file format spec, §Cell Payload Overflow.
pub fn payload_on_page(u: u32, p: u64) -> u64 {
    let u = u as u64;
    let x = u - 35;
    if p <= x {
        return p;
    }
    let m = ((u - 12) * 32 / 255) - 23;
    let k = m + ((p - m) % (u - 4));
    if k <= x {
        k
    } else {
        m
    }
}

/// A single decoded column value from a table-leaf record.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL` (serial type 0).
    Null,
    /// A signed integer column (serial types 1-6, 8, 9).
    Int(i64),
    /// An IEEE-754 floating point column (serial type 7).
    Real(f64),
    /// A UTF-8 text column (odd serial types `>= 13`).
    Text(String),
    /// A raw byte-string column (even serial types `>= 12`).
    Blob(Vec<u8>),
}

/// Maps a record's serial type to the byte width of its content and a
/// decoder for that content. Returns `None` for a serial type with no
/// defined meaning (10, 11).
pub fn decode_column(serial_type: u64, content: &[u8]) -> Result<SqlValue> {
    match serial_type {
        0 => Ok(SqlValue::Null),
        1 => Ok(SqlValue::Int(sign_extend(content, 1))),
        2 => Ok(SqlValue::Int(sign_extend(content, 2))),
        3 => Ok(SqlValue::Int(sign_extend(content, 3))),
        4 => Ok(SqlValue::Int(sign_extend(content, 4))),
        5 => Ok(SqlValue::Int(sign_extend(content, 6))),
        6 => Ok(SqlValue::Int(sign_extend(content, 8))),
        7 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&content[..8]);
            Ok(SqlValue::Real(f64::from_be_bytes(buf)))
        }
        8 => Ok(SqlValue::Int(0)),
        9 => Ok(SqlValue::Int(1)),
        n if n >= 12 && n % 2 == 0 => Ok(SqlValue::Blob(content.to_vec())),
        n if n >= 13 && n % 2 == 1 => Ok(SqlValue::Text(
            String::from_utf8(content.to_vec())
                .map_err(|e| Error::MalformedRecord(format!("non-utf8 TEXT column: {e}").into()))?,
        )),
        n => Err(Error::MalformedRecord(format!("reserved serial type {n}").into())),
    }
}

/// Byte width of the content for a given serial type, per the SQLite record
/// format. Zero for NULL and the constant-0/constant-1 serial types.
pub fn content_size(serial_type: u64) -> u64 {
    match serial_type {
        0 | 8 | 9 => 0,
        1 => 1,
        2 => 2,
        3 => 3,
        4 => 4,
        5 => 6,
        6 | 7 => 8,
        n if n >= 12 && n % 2 == 0 => (n - 12) / 2,
        n if n >= 13 && n % 2 == 1 => (n - 13) / 2,
        _ => 0,
    }
}

fn sign_extend(bytes: &[u8], width: usize) -> i64 {
    let mut value: i64 = 0;
    for &b in &bytes[..width] {
        value = (value << 8) | b as i64;
    }
    let bits = width * 8;
    if bits < 64 && (value & (1 << (bits - 1))) != 0 {
        value -= 1 << bits;
    }
    value
}
