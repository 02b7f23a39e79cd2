use thiserror::Error;

use crate::config::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Which channel bank a mask or index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Digital,
    Analog,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Digital => write!(f, "digital"),
            ChannelKind::Analog => write!(f, "analog"),
        }
    }
}

/// Rejected at configure time; session state is left unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{kind} mask {mask:#x} exceeds the {limit}-channel range")]
    MaskOutOfRange {
        kind: ChannelKind,
        mask: u32,
        limit: u32,
    },

    #[error("sample rate {rate} Hz outside supported range {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE}")]
    UnsupportedRate { rate: u32 },

    #[error("no channels enabled")]
    NoChannels,

    #[error("session is armed, configuration is locked")]
    Armed,
}

/// Terminal run failures raised by the capture context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("half-buffer overrun after {samples_sent} samples delivered, run aborted")]
    Overrun { samples_sent: u64 },
}

/// Command channel failures, recovered locally by discarding the
/// partial command buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed command {0:?}")]
    Malformed(String),

    #[error("command exceeded {capacity} bytes without terminator")]
    Overflow { capacity: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("host connection lost")]
    Disconnected,
}
