//! Viewer loop: the receiving half, driven like a GUI timer
//! drives it, one short poll per tick.
//!
//! Run with:
//!   cargo run --example viewer-loop --features peer -- [HOST] [PORT]

use std::thread;
use std::time::Duration;

use pixpipe::peer::{PollOutcome, Receiver, DEFAULT_PORT};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => DEFAULT_PORT,
    };

    let mut receiver = Receiver::new(host.as_str(), port);
    eprintln!("Connecting to {host}:{port}: {}", receiver.connect()?);

    let mut shown = 0u32;
    while shown < 20 {
        match receiver.poll_latest() {
            PollOutcome::Frame(image) => {
                shown += 1;
                let peak = image.samples().max().unwrap_or(0);
                eprintln!(
                    "frame {shown}: {}x{} {} peak={peak}",
                    image.width(),
                    image.height(),
                    image.bit_depth()
                );
            }
            PollOutcome::NoFrameYet => {}
        }
        thread::sleep(Duration::from_millis(16));
    }

    eprintln!(
        "Done after {} frames over {} connection(s)",
        receiver.frames_received(),
        receiver.connections()
    );
    Ok(())
}
