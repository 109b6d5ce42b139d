//! blinkdb REPL: the store without the network.
//!
//! Reads commands of the form `SET <key> "<value>" [EX <seconds>]`,
//! `GET <key>`, `DEL <key>` from stdin and calls straight into the
//! store. Quoted values (single or double quotes) keep their inner
//! whitespace. The TTL reaper runs alongside, as it does in the
//! server.

use blinkdb::storage::{start_reaper, Store};
use bytes::Bytes;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Splits a line into tokens, treating quoted runs (single or double
/// quotes) as one token with the quotes removed.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                    tokens.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn process_command(store: &Store, input: &str) {
    let mut tokens = tokenize(input);
    if tokens.is_empty() {
        return;
    }
    tokens[0] = tokens[0].to_uppercase();

    match tokens[0].as_str() {
        "SET" if tokens.len() >= 3 => {
            let mut ttl = None;
            if tokens.len() >= 5 && tokens[3] == "EX" {
                match tokens[4].parse::<u64>() {
                    Ok(secs) => ttl = Some(Duration::from_secs(secs)),
                    Err(_) => {
                        println!("ERROR: Invalid numeric argument");
                        return;
                    }
                }
            }
            store.set(
                Bytes::from(tokens[1].clone()),
                Bytes::from(tokens[2].clone()),
                ttl,
            );
            println!("OK");
        }
        "GET" if tokens.len() >= 2 => {
            match store.get(&Bytes::from(tokens[1].clone())) {
                Some(value) => match std::str::from_utf8(&value) {
                    Ok(s) => println!("{}", s),
                    Err(_) => println!("(binary data, {} bytes)", value.len()),
                },
                None => println!("NULL"),
            }
        }
        "DEL" if tokens.len() >= 2 => {
            if !store.del(&Bytes::from(tokens[1].clone())) {
                println!("Does not exist.");
            }
        }
        _ => println!("ERROR: Invalid command format"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let store = Arc::new(Store::new());
    let _reaper = start_reaper(Arc::clone(&store));

    println!("blinkdb REPL v{}", blinkdb::VERSION);
    println!("Supported commands:");
    println!("  SET <key> \"<value>\" [EX <seconds>]");
    println!("  GET <key>");
    println!("  DEL <key>");
    println!("  QUIT|EXIT");
    println!();

    loop {
        print!("User> ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            break;
        }

        process_command(&store, input);
    }

    Ok(())
}
