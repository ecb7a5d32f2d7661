use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pixpipe_frame::Image;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Raw sample bytes, for piping into other tools.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One line of `recv` output.
#[derive(Debug, Serialize)]
pub struct FrameSummary {
    pub schema_id: &'static str,
    pub index: u64,
    pub height: u16,
    pub width: u16,
    pub bit_depth: u16,
    pub bytes: usize,
    pub min: u16,
    pub max: u16,
    pub mean: f64,
    pub peer: Option<String>,
    pub timestamp: String,
}

impl FrameSummary {
    pub fn new(index: u64, image: &Image, peer: Option<SocketAddr>) -> Self {
        let (min, max, sum) = image
            .samples()
            .fold((u16::MAX, u16::MIN, 0u64), |(min, max, sum), sample| {
                (min.min(sample), max.max(sample), sum + u64::from(sample))
            });
        Self {
            schema_id: "https://schemas.3leaps.dev/pixpipe/cli/v1/frame-received.schema.json",
            index,
            height: image.height(),
            width: image.width(),
            bit_depth: image.bit_depth().bits(),
            bytes: image.data().len(),
            min,
            max,
            mean: sum as f64 / image.pixel_count() as f64,
            peer: peer.map(|addr| addr.to_string()),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_frame(summary: &FrameSummary, image: &Image, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "DEPTH", "BYTES", "MIN", "MAX", "MEAN", "PEER"])
                .add_row(vec![
                    summary.index.to_string(),
                    format!("{}x{}", summary.width, summary.height),
                    summary.bit_depth.to_string(),
                    summary.bytes.to_string(),
                    summary.min.to_string(),
                    summary.max.to_string(),
                    format!("{:.1}", summary.mean),
                    peer_label(summary),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frame={} size={}x{} depth={} min={} max={} mean={:.1} peer={}",
                summary.index,
                summary.width,
                summary.height,
                summary.bit_depth,
                summary.min,
                summary.max,
                summary.mean,
                peer_label(summary)
            );
        }
        OutputFormat::Raw => print_raw(image.data()),
    }
}

#[derive(Serialize)]
struct ServeReport {
    schema_id: &'static str,
    local_addr: Option<String>,
    frames_sent: u64,
}

pub fn print_serve_report(local_addr: Option<SocketAddr>, frames_sent: u64, format: OutputFormat) {
    let local = local_addr.map(|addr| addr.to_string());
    match format {
        OutputFormat::Json => {
            let out = ServeReport {
                schema_id: "https://schemas.3leaps.dev/pixpipe/cli/v1/serve-report.schema.json",
                local_addr: local,
                frames_sent,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["LISTEN", "FRAMES SENT"])
                .add_row(vec![
                    local.unwrap_or_else(|| "-".to_string()),
                    frames_sent.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            eprintln!(
                "served {} frames on {}",
                frames_sent,
                local.unwrap_or_else(|| "-".to_string())
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn peer_label(summary: &FrameSummary) -> String {
    summary.peer.clone().unwrap_or_else(|| "-".to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use pixpipe_frame::BitDepth;

    use super::*;

    #[test]
    fn summary_statistics() {
        let image = Image::from_u16(2, 2, &[0, 100, 200, 1000]).unwrap();
        let summary = FrameSummary::new(3, &image, None);

        assert_eq!((summary.min, summary.max), (0, 1000));
        assert_eq!(summary.mean, 325.0);
        assert_eq!(summary.bytes, 8);
        assert_eq!(summary.bit_depth, 16);
        assert_eq!(summary.index, 3);
    }

    #[test]
    fn summary_serializes_geometry() {
        let image = Image::filled(4, 6, BitDepth::Eight, 9).unwrap();
        let peer: SocketAddr = "127.0.0.1:60000".parse().unwrap();
        let json = serde_json::to_value(FrameSummary::new(1, &image, Some(peer))).unwrap();

        assert_eq!(json["height"], 4);
        assert_eq!(json["width"], 6);
        assert_eq!(json["peer"], "127.0.0.1:60000");
        assert_eq!(json["mean"], 9.0);
    }
}
