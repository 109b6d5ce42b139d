//! blinkdb interactive client.
//!
//! Connects to a running server, reads commands line by line, encodes
//! each as a RESP-2 array of bulk strings, and pretty-prints the reply.
//! Input is split on whitespace; arguments wrapped in double quotes
//! lose the quotes. `exit` or `quit` leaves.

use blinkdb::protocol::{encode_command, RespParser};
use bytes::{Buf, Bytes, BytesMut};
use std::io::Write;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

struct Config {
    host: String,
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: blinkdb::DEFAULT_HOST.to_string(),
            port: blinkdb::DEFAULT_PORT,
        }
    }
}

impl Config {
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-h" | "--host" => {
                    i += 1;
                    config.host = match args.get(i) {
                        Some(host) => host.clone(),
                        None => {
                            eprintln!("Error: --host requires a value");
                            std::process::exit(1);
                        }
                    };
                }
                "-p" | "--port" => {
                    i += 1;
                    config.port = match args.get(i).and_then(|a| a.parse().ok()) {
                        Some(port) => port,
                        None => {
                            eprintln!("Error: --port requires an integer");
                            std::process::exit(1);
                        }
                    };
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown option: {}", other);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        config
    }
}

fn print_help() {
    println!(
        r#"blinkdb-cli - Interactive client for blinkdb

USAGE:
    blinkdb-cli [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Server host (default: {host})
    -p, --port <PORT>    Server port (default: {port})
        --help           Print this help message

COMMANDS:
    SET <key> <value> [EX <seconds>]
    GET <key>
    DEL <key>
    exit | quit
"#,
        host = blinkdb::DEFAULT_HOST,
        port = blinkdb::DEFAULT_PORT,
    );
}

/// Splits a command line on whitespace, stripping the outer double
/// quotes off any quoted token.
fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace()
        .map(|token| {
            let trimmed = token
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .unwrap_or(token);
            trimmed.to_string()
        })
        .collect()
}

/// Reads until one full RESP reply has been framed, then prints it.
async fn read_reply(stream: &mut TcpStream, buf: &mut BytesMut) -> anyhow::Result<bool> {
    let mut parser = RespParser::new();
    loop {
        if let Some((value, consumed)) = parser.parse(buf)? {
            buf.advance(consumed);
            println!("{}", value);
            return Ok(true);
        }

        let n = stream.read_buf(buf).await?;
        if n == 0 {
            eprintln!("Server closed the connection");
            return Ok(false);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    let mut stream = match TcpStream::connect((config.host.as_str(), config.port)).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Could not connect to {}:{}: {}", config.host, config.port, e);
            std::process::exit(1);
        }
    };
    println!("Connected to blinkdb at {}:{}", config.host, config.port);

    let mut reply_buf = BytesMut::with_capacity(4096);

    loop {
        print!("{}:{}> ", config.host, config.port);
        std::io::stdout().flush()?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        let mut tokens = tokenize(line);
        let verb = tokens.remove(0).to_uppercase();
        let args: Vec<Bytes> = tokens.into_iter().map(Bytes::from).collect();

        stream.write_all(&encode_command(&verb, &args)).await?;

        if !read_reply(&mut stream, &mut reply_buf).await? {
            break;
        }
    }

    Ok(())
}
