//! Command execution: parsed RESP arrays in, reply values out.
//!
//! The dispatcher owns the mapping from uppercased verb to handler.
//! Three commands exist:
//!
//! - `SET key value [EX seconds]` -> `+OK`
//! - `GET key` -> bulk string, or null when absent/empty
//! - `DEL key` -> `:1` deleted / `:0` not found
//!
//! Anything else gets `-ERR unknown command '<VERB>'`. Arity and
//! argument errors are RESP error replies; the connection stays open
//! for all of them.

use crate::protocol::RespValue;
use crate::storage::Store;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Dispatches commands against a shared [`Store`].
#[derive(Debug, Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
}

impl CommandHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Executes one fully-parsed request and returns the reply.
    ///
    /// Requests are RESP arrays whose first element is the verb; the
    /// verb is uppercased before dispatch, arguments are passed through
    /// byte-for-byte.
    pub fn execute(&self, command: RespValue) -> RespValue {
        let args = match command {
            RespValue::Array(args) => args,
            _ => return RespValue::error("ERR protocol error: expected array"),
        };

        if args.is_empty() {
            return RespValue::error("ERR empty command");
        }

        let verb = match arg_str(&args[0]) {
            Some(s) => s.to_uppercase(),
            None => return RespValue::error("ERR invalid command name"),
        };

        self.dispatch(&verb, &args[1..])
    }

    fn dispatch(&self, verb: &str, args: &[RespValue]) -> RespValue {
        match verb {
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "DEL" => self.cmd_del(args),
            _ => RespValue::error(format!("ERR unknown command '{}'", verb)),
        }
    }

    /// SET key value [EX seconds]
    fn cmd_set(&self, args: &[RespValue]) -> RespValue {
        if args.len() < 2 {
            return RespValue::error("ERR wrong number of arguments for 'set' command");
        }

        let key = match arg_bytes(&args[0]) {
            Some(k) => k,
            None => return RespValue::error("ERR invalid key"),
        };
        let value = match arg_bytes(&args[1]) {
            Some(v) => v,
            None => return RespValue::error("ERR invalid value"),
        };

        let mut ttl = None;
        if args.len() >= 3 && arg_str(&args[2]).as_deref() == Some("EX") {
            let seconds = args
                .get(3)
                .and_then(arg_str)
                .and_then(|s| s.parse::<u64>().ok());
            match seconds {
                Some(secs) => ttl = Some(Duration::from_secs(secs)),
                None => {
                    return RespValue::error("ERR invalid expire time in 'set' command");
                }
            }
        }

        self.store.set(key, value, ttl);
        RespValue::ok()
    }

    /// GET key
    fn cmd_get(&self, args: &[RespValue]) -> RespValue {
        if args.len() != 1 {
            return RespValue::error("ERR wrong number of arguments for 'get' command");
        }

        let key = match arg_bytes(&args[0]) {
            Some(k) => k,
            None => return RespValue::error("ERR invalid key"),
        };

        // An empty value reads back as null, matching the store's
        // original empty-string-means-missing convention.
        match self.store.get(&key) {
            Some(value) if !value.is_empty() => RespValue::BulkString(value),
            _ => RespValue::Null,
        }
    }

    /// DEL key
    fn cmd_del(&self, args: &[RespValue]) -> RespValue {
        if args.len() != 1 {
            return RespValue::error("ERR wrong number of arguments for 'del' command");
        }

        let key = match arg_bytes(&args[0]) {
            Some(k) => k,
            None => return RespValue::error("ERR invalid key"),
        };

        RespValue::integer(if self.store.del(&key) { 1 } else { 0 })
    }
}

fn arg_bytes(value: &RespValue) -> Option<Bytes> {
    match value {
        RespValue::BulkString(b) => Some(b.clone()),
        RespValue::SimpleString(s) => Some(Bytes::from(s.clone())),
        _ => None,
    }
}

fn arg_str(value: &RespValue) -> Option<String> {
    match value {
        RespValue::BulkString(b) => std::str::from_utf8(b).ok().map(str::to_string),
        RespValue::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> CommandHandler {
        CommandHandler::new(Arc::new(Store::new()))
    }

    fn command(parts: &[&[u8]]) -> RespValue {
        RespValue::Array(
            parts
                .iter()
                .map(|p| RespValue::BulkString(Bytes::copy_from_slice(p)))
                .collect(),
        )
    }

    #[test]
    fn set_then_get_then_del() {
        let handler = handler();

        let reply = handler.execute(command(&[b"SET", b"k", b"v"]));
        assert_eq!(reply, RespValue::ok());

        let reply = handler.execute(command(&[b"GET", b"k"]));
        assert_eq!(reply, RespValue::BulkString(Bytes::from("v")));

        let reply = handler.execute(command(&[b"DEL", b"k"]));
        assert_eq!(reply, RespValue::integer(1));

        let reply = handler.execute(command(&[b"GET", b"k"]));
        assert_eq!(reply, RespValue::Null);

        let reply = handler.execute(command(&[b"DEL", b"k"]));
        assert_eq!(reply, RespValue::integer(0));
    }

    #[test]
    fn verb_is_case_insensitive() {
        let handler = handler();
        assert_eq!(handler.execute(command(&[b"set", b"k", b"v"])), RespValue::ok());
        assert_eq!(
            handler.execute(command(&[b"get", b"k"])),
            RespValue::BulkString(Bytes::from("v"))
        );
    }

    #[test]
    fn binary_values_pass_through() {
        let handler = handler();
        handler.execute(command(&[b"SET", b"k", b"\x00\x01\x02"]));
        assert_eq!(
            handler.execute(command(&[b"GET", b"k"])),
            RespValue::BulkString(Bytes::from(&b"\x00\x01\x02"[..]))
        );
    }

    #[test]
    fn empty_value_reads_back_as_null() {
        let handler = handler();
        handler.execute(command(&[b"SET", b"k", b""]));
        assert_eq!(handler.execute(command(&[b"GET", b"k"])), RespValue::Null);
    }

    #[test]
    fn set_accepts_expire_seconds() {
        let handler = handler();
        assert_eq!(
            handler.execute(command(&[b"SET", b"k", b"v", b"EX", b"10"])),
            RespValue::ok()
        );
        assert_eq!(
            handler.execute(command(&[b"GET", b"k"])),
            RespValue::BulkString(Bytes::from("v"))
        );
    }

    #[test]
    fn set_rejects_bad_expire_time() {
        let handler = handler();
        let expected = RespValue::error("ERR invalid expire time in 'set' command");

        assert_eq!(
            handler.execute(command(&[b"SET", b"k", b"v", b"EX", b"soon"])),
            expected
        );
        assert_eq!(
            handler.execute(command(&[b"SET", b"k", b"v", b"EX", b"-5"])),
            expected
        );
        assert_eq!(handler.execute(command(&[b"SET", b"k", b"v", b"EX"])), expected);
    }

    #[test]
    fn arity_errors_name_the_command() {
        let handler = handler();
        assert_eq!(
            handler.execute(command(&[b"SET", b"k"])),
            RespValue::error("ERR wrong number of arguments for 'set' command")
        );
        assert_eq!(
            handler.execute(command(&[b"GET"])),
            RespValue::error("ERR wrong number of arguments for 'get' command")
        );
        assert_eq!(
            handler.execute(command(&[b"DEL", b"a", b"b"])),
            RespValue::error("ERR wrong number of arguments for 'del' command")
        );
    }

    #[test]
    fn unknown_command_is_reported_uppercased() {
        let handler = handler();
        assert_eq!(
            handler.execute(command(&[b"PING"])),
            RespValue::error("ERR unknown command 'PING'")
        );
        assert_eq!(
            handler.execute(command(&[b"flushdb"])),
            RespValue::error("ERR unknown command 'FLUSHDB'")
        );
    }

    #[test]
    fn malformed_requests_are_rejected() {
        let handler = handler();
        assert_eq!(
            handler.execute(RespValue::integer(1)),
            RespValue::error("ERR protocol error: expected array")
        );
        assert_eq!(
            handler.execute(RespValue::Array(vec![])),
            RespValue::error("ERR empty command")
        );
    }
}
