//! IRC protocol lines
//!
//! ```text
//! [:prefix] COMMAND [param ...] [:trailing]
//! ```

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Maximum IRC line length including CRLF
pub const MAX_LINE_LENGTH: usize = 512;

/// Longest line accepted from the server; leaves room for IRCv3 tags
pub const MAX_INBOUND_LINE_LENGTH: usize = 16 * MAX_LINE_LENGTH;

/// A parsed inbound IRC line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<'a> {
    /// Origin, e.g. `nick!user@host` or a server name
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: Vec<&'a str>,
}

impl<'a> Message<'a> {
    /// Parse one line without its CRLF; `None` for blank lines
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start();

        let prefix = match rest.strip_prefix(':') {
            Some(tail) => {
                let (prefix, tail) = tail.split_once(' ')?;
                rest = tail.trim_start();
                Some(prefix)
            }
            None => None,
        };

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, tail)) => (command, tail),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing);
                break;
            }
            match rest.split_once(' ') {
                Some((param, tail)) => {
                    params.push(param);
                    rest = tail;
                }
                None => {
                    params.push(rest);
                    break;
                }
            }
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// Parameter at `index`, or empty
    pub fn param(&self, index: usize) -> &'a str {
        self.params.get(index).copied().unwrap_or("")
    }

    /// Nickname part of the prefix
    pub fn source_nick(&self) -> Option<&'a str> {
        self.prefix
            .map(|prefix| prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }
}

/// Splits server input into lines, never buffering more than `max_length`
///
/// Partial input survives between calls, so `next_line` may be raced in
/// `select!` and restarted.
#[derive(Debug)]
pub struct LineReader {
    buf: Vec<u8>,
    max_length: usize,
    discarding: bool,
}

impl LineReader {
    pub fn new(max_length: usize) -> Self {
        Self {
            buf: Vec::with_capacity(MAX_LINE_LENGTH),
            max_length,
            discarding: false,
        }
    }

    /// Next complete line with its line ending, `None` at end of stream
    ///
    /// Invalid UTF-8 is replaced. Lines over the limit are dropped whole.
    pub async fn next_line<R>(&mut self, reader: &mut R) -> io::Result<Option<String>>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(None);
            }

            let (consume, done) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };

            if !self.discarding {
                if self.buf.len() + consume > self.max_length {
                    self.discarding = true;
                    self.buf.clear();
                } else {
                    self.buf.extend_from_slice(&available[..consume]);
                }
            }
            reader.consume(consume);

            if done {
                if std::mem::take(&mut self.discarding) {
                    tracing::warn!(max = self.max_length, "overlong line from IRC server dropped");
                    continue;
                }
                let line = String::from_utf8_lossy(&self.buf).into_owned();
                self.buf.clear();
                return Ok(Some(line));
            }
        }
    }
}

/// Make text safe to place in a single `PRIVMSG` line
///
/// Line breaks become spaces and the whole line, including `PRIVMSG
/// <target> :` and CRLF, is kept within [`MAX_LINE_LENGTH`].
pub fn privmsg_line(target: &str, text: &str) -> String {
    let limit = MAX_LINE_LENGTH - 2;

    let mut line = format!("PRIVMSG {target} :");
    for c in text.chars() {
        let c = match c {
            '\r' | '\n' | '\0' => ' ',
            c => c,
        };
        if line.len() + c.len_utf8() > limit {
            break;
        }
        line.push(c);
    }
    line
}
