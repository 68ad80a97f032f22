//! Command-line interface definitions and parsing

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (defaults to ./blepi.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum concurrent connections
    #[arg(long = "mc")]
    pub max_connections: Option<usize>,

    /// iBeacon duration, e.g. "2s" or "1500ms"; 0 disables the beacon phase
    #[arg(long = "id", value_parser = parse_duration)]
    pub beacon_duration: Option<Duration>,

    /// iBeacon interval
    #[arg(long = "ii", value_parser = parse_duration)]
    pub beacon_interval: Option<Duration>,

    /// Device name
    #[arg(long)]
    pub name: Option<String>,

    /// Advertising channel map, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_channel_map)]
    pub chmap: Option<u8>,

    /// HCI device ID; -1 picks the first available adapter
    #[arg(long, allow_negative_numbers = true)]
    pub dev: Option<i32>,

    /// Check device LE support
    #[arg(long)]
    pub chk: Option<bool>,

    /// Connect a scripted central once the peripheral is advertising
    #[arg(long)]
    pub simulate_central: bool,

    /// Exit after this long instead of waiting for Ctrl-C
    #[arg(long, value_parser = parse_duration)]
    pub run_for: Option<Duration>,

    /// Print an example configuration file and exit
    #[arg(long)]
    pub print_config: bool,
}

/// Parse durations such as `5s`, `250ms`, `1m30s` or a bare `0`
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in {input:?}"))?;
        if digits == 0 {
            return Err(format!("expected a number in {input:?}"));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|e| format!("{input:?}: {e}"))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let step = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            unit => return Err(format!("unknown unit {unit:?} in {input:?}")),
        };
        total += step;
        rest = &rest[unit_len..];
    }
    Ok(total)
}

/// Parse a channel map given as `7` or `0x7`
pub fn parse_channel_map(input: &str) -> Result<u8, String> {
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|e| format!("invalid channel map {input:?}: {e}"))
}
