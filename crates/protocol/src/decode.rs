//! Syslog record decoding
//!
//! Turns one raw datagram or TCP line into a [`LogRecord`].
//!
//! # Formats
//!
//! - **RFC 5424** - recognized by the `1 ` version after `<PRI>`
//! - **RFC 3164** - everything else; the header is optional and a line that
//!   carries only `<PRI>` and text is still accepted
//!
//! RFC 3164 timestamps carry no year, so the caller's current year is used.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::DecodeError;
use crate::record::{Facility, LogRecord, Severity};

// =============================================================================
// Constants
// =============================================================================

/// Maximum length of an RFC 3164 message
pub const MAX_RFC3164_LENGTH: usize = 1024;

/// Maximum length of an RFC 5424 message accepted here
pub const MAX_RFC5424_LENGTH: usize = 8192;

/// Highest valid PRI value (facility 23, severity 7)
const MAX_PRIORITY: u16 = 191;

const MONTHS: [&[u8; 3]; 12] = [
    b"Jan", b"Feb", b"Mar", b"Apr", b"May", b"Jun", b"Jul", b"Aug", b"Sep", b"Oct", b"Nov",
    b"Dec",
];

/// `Mmm dd hh:mm:ss`
const RFC3164_TIMESTAMP_LEN: usize = 15;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// =============================================================================
// Entry points
// =============================================================================

/// Decode a syslog message
///
/// # Errors
///
/// Returns `DecodeError` when the input is empty, too long, or lacks a valid
/// `<PRI>` prefix, and when an RFC 5424 header is malformed.
pub fn decode(data: &[u8]) -> Result<LogRecord, DecodeError> {
    decode_with_year(data, Local::now().year())
}

/// Decode a syslog message, completing RFC 3164 timestamps with `year`
pub fn decode_with_year(data: &[u8], year: i32) -> Result<LogRecord, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }

    let (priority, rest) = parse_priority(data)?;
    let facility = Facility::from_code((priority >> 3) as u8)
        .ok_or(DecodeError::InvalidPriority("facility out of range"))?;
    let severity = Severity::from_code((priority & 0x07) as u8);

    if let Some(header) = rest.strip_prefix(b"1 ") {
        if data.len() > MAX_RFC5424_LENGTH {
            return Err(DecodeError::too_long(data.len(), MAX_RFC5424_LENGTH));
        }
        return parse_rfc5424(facility, severity, header);
    }

    if data.len() > MAX_RFC3164_LENGTH {
        return Err(DecodeError::too_long(data.len(), MAX_RFC3164_LENGTH));
    }
    Ok(parse_rfc3164(facility, severity, rest, year))
}

// =============================================================================
// PRI
// =============================================================================

fn parse_priority(data: &[u8]) -> Result<(u16, &[u8]), DecodeError> {
    let rest = data
        .strip_prefix(b"<")
        .ok_or(DecodeError::InvalidPriority("missing '<'"))?;

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return Err(DecodeError::InvalidPriority("expected 1 to 3 digits"));
    }
    if rest.get(digits) != Some(&b'>') {
        return Err(DecodeError::InvalidPriority("missing '>'"));
    }

    let priority = rest[..digits]
        .iter()
        .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));
    if priority > MAX_PRIORITY {
        return Err(DecodeError::InvalidPriority("value above 191"));
    }

    Ok((priority, &rest[digits + 1..]))
}

// =============================================================================
// RFC 3164
// =============================================================================

fn parse_rfc3164(facility: Facility, severity: Severity, rest: &[u8], year: i32) -> LogRecord {
    let Some(timestamp) = parse_rfc3164_timestamp(rest, year) else {
        return LogRecord::new(facility, severity, rest);
    };

    let mut record = LogRecord::new(facility, severity, Vec::new()).with_timestamp(timestamp);

    let after = &rest[RFC3164_TIMESTAMP_LEN..];
    let Some(after) = after.strip_prefix(b" ") else {
        return record;
    };

    let (hostname, payload) = match after.iter().position(|&b| b == b' ') {
        Some(pos) => (&after[..pos], &after[pos + 1..]),
        None => (after, &b""[..]),
    };
    if !hostname.is_empty() {
        record.hostname = Some(String::from_utf8_lossy(hostname).into_owned());
    }
    record.payload = payload.to_vec();
    record
}

/// Parse `Mmm dd hh:mm:ss`; the day may be space-padded (`Oct  1`)
fn parse_rfc3164_timestamp(data: &[u8], year: i32) -> Option<NaiveDateTime> {
    let ts = data.get(..RFC3164_TIMESTAMP_LEN)?;

    let month = MONTHS.iter().position(|m| &ts[..3] == m.as_slice())? as u32 + 1;
    if ts[3] != b' ' || ts[6] != b' ' {
        return None;
    }

    let day = std::str::from_utf8(&ts[4..6]).ok()?.trim_start();
    let day: u32 = day.parse().ok()?;

    let time = std::str::from_utf8(&ts[7..]).ok()?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;

    NaiveDate::from_ymd_opt(year, month, day).map(|date| date.and_time(time))
}

// =============================================================================
// RFC 5424
// =============================================================================

fn parse_rfc5424(
    facility: Facility,
    severity: Severity,
    header: &[u8],
) -> Result<LogRecord, DecodeError> {
    let mut fields = Fields { rest: header };

    let timestamp = fields.next("missing timestamp")?;
    let hostname = fields.next("missing hostname")?;
    let _app_name = fields.next("missing app-name")?;
    let _proc_id = fields.next("missing procid")?;
    let _msg_id = fields.next("missing msgid")?;

    let timestamp = match timestamp {
        b"-" => None,
        ts => {
            let ts = std::str::from_utf8(ts)
                .map_err(|_| DecodeError::InvalidHeader("timestamp is not UTF-8"))?;
            let parsed = DateTime::parse_from_rfc3339(ts)
                .map_err(|_| DecodeError::InvalidHeader("invalid timestamp"))?;
            Some(parsed.naive_local())
        }
    };

    let hostname = match hostname {
        b"-" => None,
        name => Some(String::from_utf8_lossy(name).into_owned()),
    };

    let after_sd = skip_structured_data(fields.rest)?;
    let message = match after_sd {
        [] => &b""[..],
        [b' ', msg @ ..] => msg,
        _ => return Err(DecodeError::InvalidHeader("expected space after structured data")),
    };
    let message = message.strip_prefix(UTF8_BOM).unwrap_or(message);

    Ok(LogRecord {
        facility,
        severity,
        timestamp,
        hostname,
        payload: message.to_vec(),
    })
}

/// Space-separated header fields
struct Fields<'a> {
    rest: &'a [u8],
}

impl<'a> Fields<'a> {
    fn next(&mut self, missing: &'static str) -> Result<&'a [u8], DecodeError> {
        let pos = self
            .rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or(DecodeError::InvalidHeader(missing))?;
        if pos == 0 {
            return Err(DecodeError::InvalidHeader(missing));
        }
        let field = &self.rest[..pos];
        self.rest = &self.rest[pos + 1..];
        Ok(field)
    }
}

/// Skip `-` or one or more `[...]` elements, honoring `\]` escapes
fn skip_structured_data(data: &[u8]) -> Result<&[u8], DecodeError> {
    if let Some(rest) = data.strip_prefix(b"-") {
        return Ok(rest);
    }
    if data.first() != Some(&b'[') {
        return Err(DecodeError::InvalidHeader("invalid structured data"));
    }

    let mut i = 0;
    while data.get(i) == Some(&b'[') {
        i += 1;
        loop {
            match data.get(i) {
                None => return Err(DecodeError::InvalidHeader("unterminated structured data")),
                Some(b'\\') => i += 2,
                Some(b']') => {
                    i += 1;
                    break;
                }
                Some(_) => i += 1,
            }
        }
    }

    Ok(&data[i..])
}

#[cfg(test)]
#[path = "decode_test.rs"]
mod decode_test;
