use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU16;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use pixpipe_frame::BitDepth;
use pixpipe_peer::{DEFAULT_ACCEPT_POLLS, DEFAULT_PORT};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod recv;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream synthetic frames to the most recent receiver.
    Serve(ServeArgs),
    /// Connect to a sender and print a summary per received frame.
    Recv(RecvArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Recv(args) => recv::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DepthArg {
    #[value(name = "8")]
    Eight,
    #[value(name = "16")]
    Sixteen,
}

impl From<DepthArg> for BitDepth {
    fn from(depth: DepthArg) -> Self {
        match depth {
            DepthArg::Eight => BitDepth::Eight,
            DepthArg::Sixteen => BitDepth::Sixteen,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,
    /// Port to listen on.
    #[arg(long, short = 'p', env = "PIXPIPE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Frame geometry as WIDTHxHEIGHT.
    #[arg(long, default_value = "640x480")]
    pub size: String,
    /// Bits per sample.
    #[arg(long, value_enum, default_value = "16")]
    pub bit_depth: DepthArg,
    /// Delay between frames (e.g. 100ms, 1s).
    #[arg(long, default_value = "100ms")]
    pub interval: String,
    /// Stop after sending N frames.
    #[arg(long)]
    pub count: Option<u64>,
    /// Accept polls per waiting round.
    #[arg(long, default_value_t = DEFAULT_ACCEPT_POLLS)]
    pub accept_polls: u32,
    /// Pause between accept polls (e.g. 100us).
    #[arg(long, default_value = "100us")]
    pub poll_interval: String,
    /// Bound on a single frame write.
    #[arg(long, default_value = "2s")]
    pub write_timeout: String,
    /// Edge length of the test pattern sent to each new receiver.
    #[arg(long, default_value_t = pixpipe_peer::TEST_PATTERN_SIZE)]
    pub pattern_size: u16,
    /// Do not send the test pattern on connect.
    #[arg(long)]
    pub no_test_pattern: bool,
}

#[derive(Args, Debug)]
pub struct RecvArgs {
    /// Sender host name or address.
    #[arg(env = "PIXPIPE_HOST")]
    pub host: String,
    /// Sender port.
    #[arg(long, short = 'p', env = "PIXPIPE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<u64>,
    /// Pause between polls (e.g. 1ms).
    #[arg(long, default_value = "1ms")]
    pub tick: String,
    /// Only report the newest available frame per tick.
    #[arg(long)]
    pub latest: bool,
    /// Bound on a single connection attempt.
    #[arg(long, default_value = "200ms")]
    pub connect_timeout: String,
    /// How long each poll waits for a frame to start.
    #[arg(long, default_value = "100us")]
    pub poll_timeout: String,
    /// Give up after this long (e.g. 30s).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `100us`, `150ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("us") {
        (num, "us")
    } else if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    match unit {
        "us" => Ok(Duration::from_micros(value)),
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Parse `WIDTHxHEIGHT` into `(height, width)`.
pub fn parse_size(input: &str) -> CliResult<(NonZeroU16, NonZeroU16)> {
    let invalid = || CliError::usage(format!("invalid size {input:?} (expected WIDTHxHEIGHT)"));
    let (width, height) = input
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(invalid)?;
    let width: NonZeroU16 = width.trim().parse().map_err(|_| invalid())?;
    let height: NonZeroU16 = height.trim().parse().map_err(|_| invalid())?;
    Ok((height, width))
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("100us").unwrap(), Duration::from_micros(100));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn parse_size_is_width_by_height() {
        let (height, width) = parse_size("640x480").unwrap();
        assert_eq!((height.get(), width.get()), (480, 640));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("70000x1").is_err());
        assert!(parse_size("64").is_err());
    }
}
