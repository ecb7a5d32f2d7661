use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use pixpipe_peer::{PollOutcome, Receiver, ReceiverConfig};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, RecvArgs};
use crate::exit::{peer_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_frame, FrameSummary, OutputFormat};

pub fn run(args: RecvArgs, format: OutputFormat) -> CliResult<i32> {
    let tick = parse_duration(&args.tick)?;
    let deadline = match &args.timeout {
        Some(timeout) => Some(Instant::now() + parse_duration(timeout)?),
        None => None,
    };
    let config = ReceiverConfig {
        connect_timeout: parse_duration(&args.connect_timeout)?,
        poll_timeout: parse_duration(&args.poll_timeout)?,
        ..ReceiverConfig::default()
    };

    let mut receiver = Receiver::with_config(args.host.clone(), args.port, config);
    let status = receiver
        .connect()
        .map_err(|err| peer_error("connect failed", err))?;
    info!(host = %args.host, port = args.port, %status, "initial connection attempt");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut received = 0u64;
    while running.load(Ordering::SeqCst) {
        let outcome = if args.latest {
            receiver.poll_latest()
        } else {
            receiver.poll_frame()
        };

        if let PollOutcome::Frame(image) = outcome {
            received += 1;
            let summary = FrameSummary::new(received, &image, receiver.peer_addr());
            print_frame(&summary, &image, format);
            if args.count.is_some_and(|count| received >= count) {
                return Ok(SUCCESS);
            }
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return match args.count {
                Some(count) => Err(CliError::new(
                    TIMEOUT,
                    format!("received {received} of {count} frames before timeout"),
                )),
                None => Ok(SUCCESS),
            };
        }
        thread::sleep(tick);
    }

    Ok(SUCCESS)
}
