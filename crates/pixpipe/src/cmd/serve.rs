use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use pixpipe_frame::{BitDepth, ErrorKind};
use pixpipe_peer::{GaussianSource, Sender, SenderConfig};
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, parse_size, ServeArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_serve_report, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let (height, width) = parse_size(&args.size)?;
    let bit_depth = BitDepth::from(args.bit_depth);
    let config = SenderConfig {
        accept_poll_interval: parse_duration(&args.poll_interval)?,
        write_timeout: parse_duration(&args.write_timeout)?,
        test_pattern_size: args.pattern_size,
        send_test_pattern: !args.no_test_pattern,
        ..SenderConfig::default()
    };

    let addr = SocketAddr::new(args.bind, args.port);
    let mut sender = Sender::bind(addr, config).map_err(|err| peer_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut source = GaussianSource::new(height, width, bit_depth);
    info!(
        height = height.get(),
        width = width.get(),
        %bit_depth,
        ?interval,
        "streaming synthetic frames"
    );

    let mut sent = 0u64;
    while running.load(Ordering::SeqCst) {
        // A newer receiver replaces the current one between frames.
        let polls = if sender.is_connected() { 1 } else { args.accept_polls };
        if let Err(err) = sender.accept_latest(polls) {
            warn!(error = %err, "accept failed");
            thread::sleep(sender.config().accept_poll_interval);
        }
        if !sender.is_connected() {
            continue;
        }

        match sender.send_from(&mut source) {
            Ok(()) => sent += 1,
            Err(err) if err.kind() == ErrorKind::MalformedFrame => {
                return Err(peer_error("send failed", err));
            }
            // The sender logged the loss and is listening again.
            Err(_) => continue,
        }

        if args.count.is_some_and(|count| sent >= count) {
            break;
        }
        thread::sleep(interval);
    }

    print_serve_report(sender.local_addr(), sent, format);
    Ok(SUCCESS)
}
