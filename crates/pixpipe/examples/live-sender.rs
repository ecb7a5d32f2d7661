//! Live sender: streams a moving Gaussian spot to whichever receiver
//! connected last.
//!
//! Run with:
//!   cargo run --example live-sender --features peer
//!
//! In another terminal:
//!   cargo run --features cli -- recv 127.0.0.1 --count 10 --format pretty

use std::num::NonZeroU16;
use std::thread;
use std::time::Duration;

use pixpipe::frame::BitDepth;
use pixpipe::peer::{GaussianSource, Sender, DEFAULT_ACCEPT_POLLS, DEFAULT_PORT};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut sender = Sender::listen(DEFAULT_PORT)?;
    eprintln!("Listening on port {DEFAULT_PORT}");

    let side = NonZeroU16::new(256).ok_or("zero frame size")?;
    let mut camera = GaussianSource::new(side, side, BitDepth::Sixteen);

    loop {
        if !sender.is_connected() && !sender.accept_latest(DEFAULT_ACCEPT_POLLS)? {
            eprintln!("No receiver yet, still waiting");
            continue;
        }

        if let Err(e) = sender.send_from(&mut camera) {
            eprintln!("Receiver lost: {e}");
            continue;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
