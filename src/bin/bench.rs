//! blinkdb benchmark tool.
//!
//! Two modes:
//!
//! - `generate [--ops N] [--dir PATH]` writes three workload files
//!   (read-heavy, balanced, write-heavy), one command per line.
//! - `run <file>` replays a workload file against a fresh store and
//!   reports per-operation latency and overall throughput.
//!
//! Workload file format: `SET key "value" [EX seconds]`, `GET key`,
//! `DEL key`; `#` starts a comment line; double-quoted values may
//! contain spaces.

use blinkdb::storage::Store;
use bytes::Bytes;
use rand::Rng;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Latency accumulator for one operation type.
#[derive(Default)]
struct OpStats {
    latencies: Vec<f64>,
}

impl OpStats {
    fn record(&mut self, elapsed: Duration) {
        self.latencies.push(elapsed.as_secs_f64() * 1000.0);
    }

    fn count(&self) -> usize {
        self.latencies.len()
    }

    fn avg_ms(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        self.latencies.iter().sum::<f64>() / self.latencies.len() as f64
    }

    fn p95_ms(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("latencies are finite"));
        sorted[(sorted.len() as f64 * 0.95) as usize % sorted.len()]
    }
}

/// Splits a workload line, treating quoted runs as single tokens.
fn parse_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '"' | '\'' => quote = Some(c),
                ' ' => {
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

fn run_workload(path: &Path) -> anyhow::Result<()> {
    let contents = fs::read_to_string(path)?;
    let store = Store::new();

    let mut set_stats = OpStats::default();
    let mut get_stats = OpStats::default();
    let mut del_stats = OpStats::default();
    let mut skipped = 0usize;

    let bench_start = Instant::now();

    for line in contents.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = parse_line(line);
        if tokens.is_empty() {
            continue;
        }
        tokens[0] = tokens[0].to_uppercase();

        match tokens[0].as_str() {
            "SET" if tokens.len() >= 3 => {
                let mut ttl = None;
                if tokens.len() >= 5 && tokens[3] == "EX" {
                    ttl = tokens[4].parse::<u64>().ok().map(Duration::from_secs);
                }
                let start = Instant::now();
                store.set(
                    Bytes::from(tokens[1].clone()),
                    Bytes::from(tokens[2].clone()),
                    ttl,
                );
                set_stats.record(start.elapsed());
            }
            "GET" if tokens.len() >= 2 => {
                let key = Bytes::from(tokens[1].clone());
                let start = Instant::now();
                let _ = store.get(&key);
                get_stats.record(start.elapsed());
            }
            "DEL" if tokens.len() >= 2 => {
                let key = Bytes::from(tokens[1].clone());
                let start = Instant::now();
                let _ = store.del(&key);
                del_stats.record(start.elapsed());
            }
            _ => skipped += 1,
        }
    }

    let total_time = bench_start.elapsed();
    let total_ops = set_stats.count() + get_stats.count() + del_stats.count();

    println!("Benchmark results for {}", path.display());
    println!("{:-<58}", "");
    println!(
        "{:<6} {:>10} {:>14} {:>14}",
        "op", "count", "avg (ms)", "p95 (ms)"
    );
    for (name, stats) in [("SET", &set_stats), ("GET", &get_stats), ("DEL", &del_stats)] {
        println!(
            "{:<6} {:>10} {:>14.5} {:>14.5}",
            name,
            stats.count(),
            stats.avg_ms(),
            stats.p95_ms()
        );
    }
    println!("{:-<58}", "");
    println!(
        "{} ops in {:.3} s ({:.0} ops/sec), {} lines skipped",
        total_ops,
        total_time.as_secs_f64(),
        total_ops as f64 / total_time.as_secs_f64().max(f64::EPSILON),
        skipped
    );
    println!(
        "final keyspace: {} keys, {} bytes",
        store.len(),
        store.current_bytes()
    );

    Ok(())
}

const VALUE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 ";

fn random_value(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(5..=50);
    (0..len)
        .map(|_| VALUE_CHARS[rng.gen_range(0..VALUE_CHARS.len())] as char)
        .collect()
}

/// Writes one workload file: 100 seed SETs, then `ops` random
/// operations mixed per the given percentages.
fn generate_workload(
    path: &Path,
    get_percent: u32,
    set_percent: u32,
    ops: usize,
) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    let mut file = fs::File::create(path)?;

    writeln!(
        file,
        "# generated workload: {}% GET / {}% SET / {}% DEL, {} ops",
        get_percent,
        set_percent,
        100 - get_percent - set_percent,
        ops
    )?;

    for i in 1..=100 {
        writeln!(file, "SET key{} \"{}\"", i, random_value(&mut rng))?;
    }

    for _ in 0..ops {
        let roll = rng.gen_range(1..=100);
        let key = rng.gen_range(1..=1000);
        if roll <= get_percent {
            writeln!(file, "GET key{}", key)?;
        } else if roll <= get_percent + set_percent {
            writeln!(file, "SET key{} \"{}\"", key, random_value(&mut rng))?;
        } else {
            writeln!(file, "DEL key{}", key)?;
        }
    }

    println!("Generated {} with {} operations", path.display(), ops + 100);
    Ok(())
}

fn generate_all(dir: &Path, ops: usize) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;
    generate_workload(&dir.join("read_heavy.txt"), 75, 20, ops)?;
    generate_workload(&dir.join("balanced.txt"), 40, 40, ops)?;
    generate_workload(&dir.join("write_heavy.txt"), 20, 70, ops)?;
    Ok(())
}

fn print_help() {
    println!(
        r#"blinkdb-bench - Workload generator and timing harness

USAGE:
    blinkdb-bench generate [--ops N] [--dir PATH]
    blinkdb-bench run <file>

MODES:
    generate    Write read_heavy.txt, balanced.txt, write_heavy.txt
                (default: 100000 ops each, into the current directory)
    run         Replay a workload file against a fresh store and
                report latency and throughput
"#
    );
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("run") => {
            let Some(file) = args.get(2) else {
                eprintln!("Error: run requires a workload file");
                std::process::exit(1);
            };
            run_workload(Path::new(file))
        }
        Some("generate") => {
            let mut ops = 100_000usize;
            let mut dir = PathBuf::from(".");
            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--ops" => {
                        i += 1;
                        ops = match args.get(i).and_then(|a| a.parse().ok()) {
                            Some(n) => n,
                            None => {
                                eprintln!("Error: --ops requires an integer");
                                std::process::exit(1);
                            }
                        };
                    }
                    "--dir" => {
                        i += 1;
                        dir = match args.get(i) {
                            Some(d) => PathBuf::from(d),
                            None => {
                                eprintln!("Error: --dir requires a path");
                                std::process::exit(1);
                            }
                        };
                    }
                    other => {
                        eprintln!("Unknown option: {}", other);
                        std::process::exit(1);
                    }
                }
                i += 1;
            }
            generate_all(&dir, ops)
        }
        _ => {
            print_help();
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_handles_quoted_values() {
        assert_eq!(
            parse_line("SET key1 \"a value with spaces\""),
            vec!["SET", "key1", "a value with spaces"]
        );
        assert_eq!(parse_line("GET key1"), vec!["GET", "key1"]);
    }

    #[test]
    fn parse_line_handles_ttl_suffix() {
        assert_eq!(
            parse_line("SET key1 \"v\" EX 30"),
            vec!["SET", "key1", "v", "EX", "30"]
        );
    }

    #[test]
    fn op_stats_percentiles() {
        let mut stats = OpStats::default();
        for i in 1..=100 {
            stats.record(Duration::from_millis(i));
        }
        assert_eq!(stats.count(), 100);
        assert!(stats.avg_ms() > 49.0 && stats.avg_ms() < 52.0);
        assert!(stats.p95_ms() >= 95.0);
    }
}
