use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ofudp_frame::{msg_type_name, Message};
use serde::Serialize;

/// Longest body rendered before the preview is cut.
const PREVIEW_LIMIT: usize = 64;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

#[derive(Serialize)]
struct MessageOutput<'a> {
    version: u8,
    msg_type: u8,
    msg_type_name: &'a str,
    length: usize,
    xid: u32,
    body: String,
    peer: &'a str,
    timestamp: String,
}

pub fn print_message(message: &Message, peer: &str, format: OutputFormat) {
    let header = message.header();
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                version: header.version(),
                msg_type: header.msg_type(),
                msg_type_name: msg_type_name(header.msg_type()),
                length: message.len(),
                xid: header.xid(),
                body: body_preview(message.body()),
                peer,
                timestamp: now_unix_seconds(),
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
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "XID", "LENGTH", "PEER", "BODY"])
                .add_row(vec![
                    msg_type_name(header.msg_type()).to_string(),
                    header.xid().to_string(),
                    message.len().to_string(),
                    peer.to_string(),
                    body_preview(message.body()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} ({}) version={:#04x} xid={} length={} peer={} body={}",
                header.msg_type(),
                msg_type_name(header.msg_type()),
                header.version(),
                header.xid(),
                message.len(),
                peer,
                body_preview(message.body())
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(message.as_bytes());
            let _ = out.flush();
        }
    }
}

/// Printable text as-is, anything else as hex.
fn body_preview(body: &[u8]) -> String {
    let shown = &body[..body.len().min(PREVIEW_LIMIT)];
    let mut preview = match std::str::from_utf8(shown) {
        Ok(text) if text.chars().all(|c| !c.is_control()) => text.to_string(),
        _ => shown.iter().fold(String::new(), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        }),
    };
    if body.len() > PREVIEW_LIMIT {
        let _ = write!(preview, "... ({} bytes)", body.len());
    }
    preview
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
