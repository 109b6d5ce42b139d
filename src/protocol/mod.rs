//! RESP-2 Protocol Module
//!
//! blinkdb speaks RESP-2 (the Redis Serialization Protocol, version 2)
//! on the wire. Five framed types exist, each terminated by CRLF:
//!
//! - Simple String: `+OK\r\n`
//! - Error: `-ERR unknown command\r\n`
//! - Integer: `:1000\r\n`
//! - Bulk String: `$5\r\nhello\r\n` (null: `$-1\r\n`)
//! - Array: `*2\r\n$3\r\nGET\r\n$1\r\nk\r\n` (null: `*-1\r\n`)
//!
//! [`types`] defines the value enum and the encoder; [`parser`] is the
//! incremental parser used by connections to frame commands out of a
//! streaming input buffer.

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, RespParser};
pub use types::{encode_command, RespValue};
