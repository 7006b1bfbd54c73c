//! Rendering of a received record as one line of chat text

use std::net::SocketAddr;

use sysrelay_protocol::LogRecord;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a record for display
///
/// ```text
/// <ip>:<port> [<timestamp>] (<hostname>) [<severity>]: <text>
/// ```
///
/// The timestamp and hostname segments are left out when the record has
/// none. The payload is read as UTF-8 (invalid sequences replaced) with
/// leading and trailing newlines removed.
pub fn format_message(source: SocketAddr, record: &LogRecord) -> String {
    let text = String::from_utf8_lossy(&record.payload);
    let text = text.trim_matches('\n');

    let mut out = format!("{}:{} ", source.ip(), source.port());
    if let Some(timestamp) = record.timestamp {
        out.push_str(&format!("[{}] ", timestamp.format(TIMESTAMP_FORMAT)));
    }
    if let Some(hostname) = &record.hostname {
        out.push_str(&format!("({hostname}) "));
    }
    out.push_str(&format!("[{}]: {text}", record.severity));
    out
}
