//! Configuration validation
//!
//! Checks config consistency:
//! - The bot has a nickname
//! - Channels are unique
//! - Route keys are valid ports and route targets are configured channels
//! - Server settings are usable (valid port, positive rate limit)
//! - Warns when nothing is routed or joined

use std::collections::HashSet;

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_bot(config)?;
    validate_server(config)?;
    validate_channels(config)?;
    validate_routes(config)?;
    validate_listeners(config)?;
    Ok(())
}

fn validate_bot(config: &Config) -> Result<()> {
    if config.irc.bot.nickname.trim().is_empty() {
        return Err(ConfigError::missing_field("irc.bot", "nickname"));
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    let Some(server) = config.irc.active_server() else {
        return Ok(());
    };

    if server.port == 0 {
        return Err(ConfigError::invalid_value(
            "irc.server",
            &server.host,
            "port",
            "must be in 1-65535",
        ));
    }

    if let Some(rate) = server.rate_limit
        && !(rate.is_finite() && rate > 0.0)
    {
        return Err(ConfigError::invalid_value(
            "irc.server",
            &server.host,
            "rate_limit",
            format!("must be a positive number of messages per second, got {rate}"),
        ));
    }

    Ok(())
}

fn validate_channels(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();
    for channel in &config.irc.channels {
        if channel.name.is_empty() {
            return Err(ConfigError::missing_field("irc.channels", "name"));
        }
        if !seen.insert(channel.name.as_str()) {
            return Err(ConfigError::duplicate_channel(&channel.name));
        }
    }

    if config.irc.channels.is_empty() {
        tracing::warn!("no IRC channels to join have been configured");
    }
    Ok(())
}

fn validate_routes(config: &Config) -> Result<()> {
    if config.routes.is_empty() {
        tracing::warn!("no routes have been configured");
    }

    let known: HashSet<&str> = config.irc.channels.iter().map(|c| c.name.as_str()).collect();
    for route in config.routes.routes()? {
        if !known.contains(route.destination.as_str()) {
            return Err(ConfigError::unknown_channel(route.destination));
        }
    }
    Ok(())
}

fn validate_listeners(config: &Config) -> Result<()> {
    let listeners = &config.listeners;
    if listeners.udp_workers == 0 {
        return Err(ConfigError::invalid_value(
            "listeners",
            &listeners.address,
            "udp_workers",
            "must be at least 1",
        ));
    }
    if listeners.max_message_size == 0 {
        return Err(ConfigError::invalid_value(
            "listeners",
            &listeners.address,
            "max_message_size",
            "must be at least 1",
        ));
    }
    if config.global.queue_size == 0 {
        return Err(ConfigError::invalid_value(
            "global",
            "queue_size",
            "queue_size",
            "must be at least 1",
        ));
    }
    Ok(())
}
