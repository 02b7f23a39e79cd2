use serde::Serialize;

use crate::error::{ChannelKind, ConfigError};

/// Number of ADC-backed analog inputs on the probe.
pub const NUM_ANALOG_CHANNELS: u32 = 3;
/// Number of digital inputs sampled by the capture engine.
pub const NUM_DIGITAL_CHANNELS: u32 = 8;

pub const MIN_SAMPLE_RATE: u32 = 5_000;
pub const MAX_SAMPLE_RATE: u32 = 120_000_000;

/// Total byte budget for the capture buffers. Split into two halves per
/// channel type so one half can drain while the other fills.
pub const CAPTURE_BUF_BYTES: usize = 100_000;

/// Analog scale reported to the host for the `a<ch>` query, in
/// microvolts per LSB of the 7-bit wire sample (3.3 V full scale).
pub const ANALOG_SCALE_UV: u32 = 25_700;
/// Analog offset reported to the host, in microvolts.
pub const ANALOG_OFFSET_UV: u32 = 0;

/// Session configuration plus the fields derived from it.
///
/// Mutated only by the communication context, and only while the
/// session is unarmed. The capture context reads a snapshot at run
/// start and never writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionConfig {
    pub sample_rate: u32,
    /// Bounded sample count; 0 means continuous/unbounded.
    pub sample_limit: u64,
    pub continuous: bool,
    pub analog_mask: u32,
    pub digital_mask: u32,

    // Derived on every successful configure.
    pub analog_count: u32,
    pub digital_count: u32,
    /// Capture pin width, smallest of {4, 8, 16, 32} covering the
    /// enabled digital channels.
    pub pin_width: u32,
    /// Digital nibbles per slice as seen by the sampler/DMA.
    pub nibbles_per_slice: u32,
    /// Digital wire bytes per slice (7 channel bits per byte).
    pub digital_tx_bytes: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        let mut cfg = Self {
            sample_rate: 1_000_000,
            sample_limit: 5_000,
            continuous: false,
            analog_mask: 0,
            digital_mask: 0,
            analog_count: 0,
            digital_count: 0,
            pin_width: 4,
            nibbles_per_slice: 1,
            digital_tx_bytes: 0,
        };
        cfg.recompute();
        cfg
    }
}

impl AcquisitionConfig {
    /// Validate and apply a new configuration. On any error the
    /// previous configuration is left intact.
    pub fn apply(
        &mut self,
        sample_rate: u32,
        analog_mask: u32,
        digital_mask: u32,
        sample_limit: u64,
        continuous: bool,
    ) -> Result<(), ConfigError> {
        if analog_mask & !mask_for(NUM_ANALOG_CHANNELS) != 0 {
            return Err(ConfigError::MaskOutOfRange {
                kind: ChannelKind::Analog,
                mask: analog_mask,
                limit: NUM_ANALOG_CHANNELS,
            });
        }
        if digital_mask & !mask_for(NUM_DIGITAL_CHANNELS) != 0 {
            return Err(ConfigError::MaskOutOfRange {
                kind: ChannelKind::Digital,
                mask: digital_mask,
                limit: NUM_DIGITAL_CHANNELS,
            });
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(ConfigError::UnsupportedRate { rate: sample_rate });
        }

        self.sample_rate = sample_rate;
        self.analog_mask = analog_mask;
        self.digital_mask = digital_mask;
        self.sample_limit = sample_limit;
        self.continuous = continuous;
        self.recompute();
        Ok(())
    }

    /// Recompute the derived channel counts and slice widths.
    pub fn recompute(&mut self) {
        self.analog_count = self.analog_mask.count_ones();
        self.digital_count = self.digital_mask.count_ones();
        self.pin_width = pin_width_for(self.digital_count);
        self.nibbles_per_slice = self.pin_width / 4;
        self.digital_tx_bytes = self.digital_count.div_ceil(7);
    }

    /// True when at least one channel of either bank is enabled.
    pub fn any_channels(&self) -> bool {
        self.analog_count > 0 || self.digital_count > 0
    }

    /// Wire bytes per packed slice: digital bytes then one byte per
    /// enabled analog channel.
    pub fn slice_tx_bytes(&self) -> usize {
        self.digital_tx_bytes as usize + self.analog_count as usize
    }
}

fn mask_for(channels: u32) -> u32 {
    (1u32 << channels) - 1
}

fn pin_width_for(digital_count: u32) -> u32 {
    for width in [4u32, 8, 16, 32] {
        if digital_count <= width {
            return width;
        }
    }
    32
}
