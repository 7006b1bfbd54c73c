//! Stdout Sink - local echo
//!
//! Used when no IRC server is configured. Every destination is ready as
//! soon as the sink starts, and each message is printed as
//! `<destination>> <text>`.
//!
//! # Example Output
//!
//! ```text
//! #ops> 10.0.0.5:514 [2024-10-11 22:14:15] (mymachine) [critical]: su: 'su root' failed
//! ```

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use owo_colors::{OwoColorize, Style};
use parking_lot::Mutex;
use sysrelay_routing::Destination;

use crate::common::{Sink, SinkError, SinkEvents};

/// Configuration for the stdout sink
#[derive(Debug, Clone)]
pub struct StdoutConfig {
    /// Highlight the destination name
    pub color: bool,
}

impl Default for StdoutConfig {
    fn default() -> Self {
        Self {
            color: io::stdout().is_terminal(),
        }
    }
}

impl StdoutConfig {
    /// Create config with colors disabled (for piped output)
    pub fn no_color() -> Self {
        Self { color: false }
    }
}

/// Metrics for stdout sink
#[derive(Debug, Default)]
pub struct StdoutSinkMetrics {
    messages_written: AtomicU64,
    write_errors: AtomicU64,
}

impl StdoutSinkMetrics {
    pub fn messages_written(&self) -> u64 {
        self.messages_written.load(Ordering::Relaxed)
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }
}

/// Local echo sink
pub struct StdoutSink {
    destinations: Vec<Destination>,
    writer: Mutex<Box<dyn Write + Send>>,
    destination_style: Style,
    metrics: StdoutSinkMetrics,
}

impl StdoutSink {
    /// Echo to stdout
    pub fn new(destinations: Vec<Destination>, config: StdoutConfig) -> Self {
        Self::with_writer(destinations, config, Box::new(io::stdout()))
    }

    /// Echo to any writer
    pub fn with_writer(
        destinations: Vec<Destination>,
        config: StdoutConfig,
        writer: Box<dyn Write + Send>,
    ) -> Self {
        let destination_style = if config.color {
            Style::new().bold().cyan()
        } else {
            Style::new()
        };
        Self {
            destinations,
            writer: Mutex::new(writer),
            destination_style,
            metrics: StdoutSinkMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &StdoutSinkMetrics {
        &self.metrics
    }
}

#[async_trait]
impl Sink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn start(&self, events: SinkEvents) -> Result<(), SinkError> {
        tracing::info!(
            destinations = self.destinations.len(),
            "no IRC server configured, echoing messages to stdout"
        );
        for destination in &self.destinations {
            events.destination_ready(destination.name()).await;
        }
        Ok(())
    }

    fn send(&self, destination: &str, text: &str) {
        let mut writer = self.writer.lock();
        let result = writeln!(
            writer,
            "{}> {}",
            destination.style(self.destination_style),
            text
        )
        .and_then(|()| writer.flush());

        match result {
            Ok(()) => {
                self.metrics.messages_written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.metrics.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(error = %e, "stdout write failed");
            }
        }
    }

    async fn disconnect(&self, reason: &str) {
        let _ = self.writer.lock().flush();
        tracing::info!(
            reason = %reason,
            messages_written = self.metrics.messages_written(),
            "stdout sink closed"
        );
    }
}
