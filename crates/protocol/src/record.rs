//! Decoded syslog records

use std::fmt;

use chrono::NaiveDateTime;

/// Syslog facility (PRI >> 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facility {
    Kernel,
    User,
    Mail,
    SystemDaemons,
    Security4,
    Internal,
    LinePrinter,
    NetworkNews,
    Uucp,
    Clock9,
    Security10,
    Ftp,
    Ntp,
    LogAudit,
    LogAlert,
    Clock15,
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl Facility {
    const ALL: [Facility; 24] = [
        Self::Kernel,
        Self::User,
        Self::Mail,
        Self::SystemDaemons,
        Self::Security4,
        Self::Internal,
        Self::LinePrinter,
        Self::NetworkNews,
        Self::Uucp,
        Self::Clock9,
        Self::Security10,
        Self::Ftp,
        Self::Ntp,
        Self::LogAudit,
        Self::LogAlert,
        Self::Clock15,
        Self::Local0,
        Self::Local1,
        Self::Local2,
        Self::Local3,
        Self::Local4,
        Self::Local5,
        Self::Local6,
        Self::Local7,
    ];

    /// Facility for a numeric code (0-23)
    #[inline]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    #[inline]
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Kernel => "kernel",
            Self::User => "user",
            Self::Mail => "mail",
            Self::SystemDaemons => "system_daemons",
            Self::Security4 => "security4",
            Self::Internal => "internal",
            Self::LinePrinter => "line_printer",
            Self::NetworkNews => "network_news",
            Self::Uucp => "uucp",
            Self::Clock9 => "clock9",
            Self::Security10 => "security10",
            Self::Ftp => "ftp",
            Self::Ntp => "ntp",
            Self::LogAudit => "log_audit",
            Self::LogAlert => "log_alert",
            Self::Clock15 => "clock15",
            Self::Local0 => "local0",
            Self::Local1 => "local1",
            Self::Local2 => "local2",
            Self::Local3 => "local3",
            Self::Local4 => "local4",
            Self::Local5 => "local5",
            Self::Local6 => "local6",
            Self::Local7 => "local7",
        }
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Syslog severity (PRI & 7), most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Informational,
    Debug,
}

impl Severity {
    /// Severity for the low three bits of a priority value
    #[inline]
    pub fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0 => Self::Emergency,
            1 => Self::Alert,
            2 => Self::Critical,
            3 => Self::Error,
            4 => Self::Warning,
            5 => Self::Notice,
            6 => Self::Informational,
            _ => Self::Debug,
        }
    }

    #[inline]
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Informational => "informational",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded syslog record
///
/// The payload stays as raw bytes; it is interpreted as text only when the
/// record is rendered for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub facility: Facility,
    pub severity: Severity,
    pub timestamp: Option<NaiveDateTime>,
    pub hostname: Option<String>,
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// Record with only priority and payload set
    pub fn new(facility: Facility, severity: Severity, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            facility,
            severity,
            timestamp: None,
            hostname: None,
            payload: payload.into(),
        }
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the hostname
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facility_codes_round_trip() {
        for code in 0..24u8 {
            let facility = Facility::from_code(code).unwrap();
            assert_eq!(facility.code(), code);
        }
        assert!(Facility::from_code(24).is_none());
    }

    #[test]
    fn test_facility_names() {
        assert_eq!(Facility::Kernel.name(), "kernel");
        assert_eq!(Facility::SystemDaemons.name(), "system_daemons");
        assert_eq!(Facility::from_code(20).unwrap().name(), "local4");
        assert_eq!(Facility::Local7.to_string(), "local7");
    }

    #[test]
    fn test_severity_names() {
        let names: Vec<&str> = (0..8u8).map(|c| Severity::from_code(c).name()).collect();
        assert_eq!(
            names,
            vec![
                "emergency",
                "alert",
                "critical",
                "error",
                "warning",
                "notice",
                "informational",
                "debug"
            ]
        );
    }

    #[test]
    fn test_severity_ordering_most_severe_first() {
        assert!(Severity::Emergency < Severity::Debug);
        assert_eq!(Severity::Warning.code(), 4);
    }
}
