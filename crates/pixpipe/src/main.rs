mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pixpipe", version, about = "Stream grayscale frames over TCP")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::DepthArg;

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "pixpipe",
            "serve",
            "--port",
            "6000",
            "--size",
            "320x240",
            "--bit-depth",
            "8",
        ])
        .expect("serve args should parse");

        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.port, 6000);
                assert_eq!(args.size, "320x240");
                assert_eq!(args.bit_depth, DepthArg::Eight);
                assert!(!args.no_test_pattern);
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        let err = Cli::try_parse_from(["pixpipe", "serve", "--bit-depth", "12"])
            .expect_err("12-bit should be rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn parses_recv_with_global_flags() {
        let cli = Cli::try_parse_from([
            "pixpipe",
            "recv",
            "camera-host",
            "--count",
            "5",
            "--latest",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("recv args should parse");

        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert_eq!(cli.log_level, LogLevel::Debug);
        match cli.command {
            Command::Recv(args) => {
                assert_eq!(args.host, "camera-host");
                assert_eq!(args.count, Some(5));
                assert!(args.latest);
            }
            other => panic!("expected recv, got {other:?}"),
        }
    }
}
