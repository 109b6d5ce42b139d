//! Incremental RESP-2 parser.
//!
//! TCP delivers a byte stream, not messages, so a connection may hold
//! half a command (or three and a half) in its input buffer at any
//! moment. The parser therefore never consumes anything itself; it
//! reports either:
//!
//! - `Ok(Some((value, consumed)))` - a complete value and how many bytes
//!   it occupied, the caller drops that prefix from its buffer
//! - `Ok(None)` - the buffer holds an incomplete frame, read more
//! - `Err(ParseError)` - the bytes cannot be valid RESP-2; the server
//!   closes the connection on this
//!
//! Bulk strings commit only once the full payload and its trailing CRLF
//! are present. Arrays parse their elements recursively and commit only
//! when every element has committed, so a prefix of a valid message
//! always yields `Ok(None)`, never a partial value.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors a malformed byte stream can produce. All of them are fatal
/// for the connection that produced them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Leading byte is none of `+ - : $ *`.
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// A length or integer field did not parse as a decimal.
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Non-UTF-8 content in a simple string, error, or length line.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Negative bulk string length other than the null marker -1.
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Negative array length other than the null marker -1.
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Framing violation, such as a bulk payload without trailing CRLF.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A declared bulk length above the hard cap.
    #[error("bulk string too large: {size} bytes (max: {max})")]
    BulkTooLarge { size: usize, max: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum declared bulk string length (512 MiB, as Redis caps it).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Incremental RESP-2 parser.
///
/// Stateless between calls: each `parse` attempt starts from the head
/// of the supplied buffer, so a connection can retry the same bytes
/// after appending more input.
#[derive(Debug, Default)]
pub struct RespParser;

impl RespParser {
    pub fn new() -> Self {
        RespParser
    }

    /// Attempts to parse one complete RESP value from the head of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        parse_value(buf, 0)
    }
}

/// One-shot parse of a buffer. Convenience for tests and the client.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    parse_value(buf, 0)
}

fn parse_value(buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    if depth > MAX_NESTING_DEPTH {
        return Err(ParseError::Protocol(format!(
            "array nesting exceeds {} levels",
            MAX_NESTING_DEPTH
        )));
    }

    match buf[0] {
        prefix::SIMPLE_STRING => parse_line(buf).map(|opt| {
            opt.map(|(text, consumed)| (RespValue::SimpleString(text), consumed))
        }),
        prefix::ERROR => {
            parse_line(buf).map(|opt| opt.map(|(text, consumed)| (RespValue::Error(text), consumed)))
        }
        prefix::INTEGER => parse_integer(buf),
        prefix::BULK_STRING => parse_bulk_string(buf),
        prefix::ARRAY => parse_array(buf, depth),
        other => Err(ParseError::UnknownPrefix(other)),
    }
}

/// Parses a single `<prefix><text>\r\n` line, returning the text and
/// total bytes consumed. Shared by simple strings and errors.
fn parse_line(buf: &[u8]) -> ParseResult<Option<(String, usize)>> {
    match find_crlf(&buf[1..]) {
        Some(pos) => {
            let text = std::str::from_utf8(&buf[1..1 + pos])
                .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?
                .to_string();
            Ok(Some((text, 1 + pos + 2)))
        }
        None => Ok(None),
    }
}

fn parse_integer(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    match parse_line(buf)? {
        Some((text, consumed)) => {
            let n = parse_decimal(&text)?;
            Ok(Some((RespValue::Integer(n), consumed)))
        }
        None => Ok(None),
    }
}

fn parse_bulk_string(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    let (length, header_len) = match parse_length_header(buf)? {
        Some(parsed) => parsed,
        None => return Ok(None),
    };

    if length == -1 {
        return Ok(Some((RespValue::Null, header_len)));
    }
    if length < 0 {
        return Err(ParseError::InvalidBulkLength(length));
    }

    let length = length as usize;
    if length > MAX_BULK_SIZE {
        return Err(ParseError::BulkTooLarge {
            size: length,
            max: MAX_BULK_SIZE,
        });
    }

    // Payload plus trailing CRLF must be fully present before we commit.
    let total = header_len + length + 2;
    if buf.len() < total {
        return Ok(None);
    }

    if &buf[header_len + length..total] != CRLF {
        return Err(ParseError::Protocol(
            "bulk string missing trailing CRLF".to_string(),
        ));
    }

    let data = Bytes::copy_from_slice(&buf[header_len..header_len + length]);
    Ok(Some((RespValue::BulkString(data), total)))
}

fn parse_array(buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
    let (count, header_len) = match parse_length_header(buf)? {
        Some(parsed) => parsed,
        None => return Ok(None),
    };

    if count == -1 {
        return Ok(Some((RespValue::NullArray, header_len)));
    }
    if count < 0 {
        return Err(ParseError::InvalidArrayLength(count));
    }

    let count = count as usize;
    let mut elements = Vec::with_capacity(count.min(64));
    let mut consumed = header_len;

    for _ in 0..count {
        if consumed >= buf.len() {
            return Ok(None);
        }
        match parse_value(&buf[consumed..], depth + 1)? {
            Some((value, element_len)) => {
                elements.push(value);
                consumed += element_len;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((RespValue::Array(elements), consumed)))
}

/// Parses the `<prefix><decimal>\r\n` header of a bulk string or array.
/// Returns the signed length and the header size in bytes.
fn parse_length_header(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    match parse_line(buf)? {
        Some((text, consumed)) => Ok(Some((parse_decimal(&text)?, consumed))),
        None => Ok(None),
    }
}

fn parse_decimal(text: &str) -> ParseResult<i64> {
    text.parse()
        .map_err(|e: ParseIntError| ParseError::InvalidInteger(e.to_string()))
}

#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == CRLF)
}
