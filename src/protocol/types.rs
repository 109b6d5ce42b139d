//! RESP-2 value types and the wire encoder.
//!
//! [`RespValue`] covers all five RESP-2 types plus the two null forms.
//! Encoding is infallible; the inverse lives in [`super::parser`].

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator every RESP frame ends with.
pub const CRLF: &[u8] = b"\r\n";

/// RESP type prefix bytes.
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A single RESP-2 value, as parsed off the wire or about to be encoded
/// onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Non-binary-safe line: `+<text>\r\n`. Must not contain CRLF.
    SimpleString(String),

    /// Error line: `-<text>\r\n`.
    Error(String),

    /// 64-bit signed integer: `:<decimal>\r\n`.
    Integer(i64),

    /// Length-prefixed binary-safe payload: `$<len>\r\n<bytes>\r\n`.
    BulkString(Bytes),

    /// Null bulk string, `$-1\r\n`.
    Null,

    /// Null array, `*-1\r\n`.
    NullArray,

    /// `*<count>\r\n` followed by `count` elements of any type.
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    pub fn null() -> Self {
        RespValue::Null
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// The canonical `+OK\r\n` reply.
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Encodes the value into a fresh buffer in wire format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Encodes the value into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Null => {
                buf.extend_from_slice(b"$-1");
                buf.extend_from_slice(CRLF);
            }
            RespValue::NullArray => {
                buf.extend_from_slice(b"*-1");
                buf.extend_from_slice(CRLF);
            }
            RespValue::Array(values) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null | RespValue::NullArray)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Inner bytes of a bulk string, if that is what this is.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(b) => Some(b),
            _ => None,
        }
    }
}

/// Encodes a command as an array of bulk strings, the form the server
/// expects requests in. Used by the interactive client.
pub fn encode_command(verb: &str, args: &[Bytes]) -> Vec<u8> {
    let mut elements = Vec::with_capacity(1 + args.len());
    elements.push(RespValue::bulk_string(Bytes::from(verb.to_string())));
    for arg in args {
        elements.push(RespValue::BulkString(arg.clone()));
    }
    RespValue::Array(elements).serialize()
}

/// Human-readable rendering, in the shape redis-cli uses. This is what
/// the interactive client prints for replies.
impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            RespValue::Null | RespValue::NullArray => write!(f, "(nil)"),
            RespValue::Array(values) => {
                if values.is_empty() {
                    write!(f, "(empty array)")
                } else {
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            writeln!(f)?;
                        }
                        write!(f, "{}) {}", i + 1, v)?;
                    }
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_simple_string() {
        assert_eq!(RespValue::ok().serialize(), b"+OK\r\n");
    }

    #[test]
    fn serialize_error() {
        let value = RespValue::error("ERR unknown command 'PING'");
        assert_eq!(value.serialize(), b"-ERR unknown command 'PING'\r\n");
    }

    #[test]
    fn serialize_integer() {
        assert_eq!(RespValue::integer(1).serialize(), b":1\r\n");
        assert_eq!(RespValue::integer(-42).serialize(), b":-42\r\n");
    }

    #[test]
    fn serialize_bulk_string() {
        let value = RespValue::bulk_string(Bytes::from("hello"));
        assert_eq!(value.serialize(), b"$5\r\nhello\r\n");
    }

    #[test]
    fn serialize_binary_bulk_string() {
        let value = RespValue::bulk_string(Bytes::from(&b"\x00\x01\x02"[..]));
        assert_eq!(value.serialize(), b"$3\r\n\x00\x01\x02\r\n");
    }

    #[test]
    fn serialize_nulls() {
        assert_eq!(RespValue::Null.serialize(), b"$-1\r\n");
        assert_eq!(RespValue::NullArray.serialize(), b"*-1\r\n");
    }

    #[test]
    fn serialize_array() {
        let value = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("GET")),
            RespValue::bulk_string(Bytes::from("name")),
        ]);
        assert_eq!(value.serialize(), b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
    }

    #[test]
    fn serialize_nested_array() {
        let value = RespValue::array(vec![
            RespValue::integer(1),
            RespValue::array(vec![RespValue::integer(2), RespValue::integer(3)]),
        ]);
        assert_eq!(value.serialize(), b"*2\r\n:1\r\n*2\r\n:2\r\n:3\r\n");
    }

    #[test]
    fn encode_command_is_array_of_bulk_strings() {
        let encoded = encode_command("SET", &[Bytes::from("k"), Bytes::from("v")]);
        assert_eq!(encoded, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    }

    #[test]
    fn display_forms() {
        assert_eq!(RespValue::ok().to_string(), "OK");
        assert_eq!(RespValue::Null.to_string(), "(nil)");
        assert_eq!(RespValue::integer(7).to_string(), "(integer) 7");
        assert_eq!(
            RespValue::bulk_string(Bytes::from("v")).to_string(),
            "\"v\""
        );
    }
}
