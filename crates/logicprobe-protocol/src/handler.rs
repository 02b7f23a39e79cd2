use std::sync::Arc;

use logicprobe_engine::{AcquisitionController, Session};
use logicprobe_foundation::{
    BoundedBuf, ChannelKind, ConfigError, ProtocolError, ANALOG_OFFSET_UV, ANALOG_SCALE_UV,
    CMD_BUF_CAPACITY, NUM_ANALOG_CHANNELS, NUM_DIGITAL_CHANNELS,
};
use logicprobe_telemetry::ProbeMetrics;

use crate::command::Command;

const ACK: &[u8] = b"*";
const NAK: &[u8] = b"!";

/// Byte-at-a-time command handler for one host connection.
///
/// `+` (abort) and `*` (full reset) act the moment they arrive, even
/// mid-line; both discard any partially accumulated command. Everything
/// else collects into a fixed 20-byte line buffer until `\n` (`\r` is
/// ignored). A line that outgrows the buffer is answered with `!` once
/// and swallowed up to its terminator, leaving session state untouched.
pub struct ProtocolHandler {
    controller: AcquisitionController,
    session: Arc<Session>,
    cmd: BoundedBuf<CMD_BUF_CAPACITY>,
    overflowed: bool,
    metrics: Option<Arc<ProbeMetrics>>,
}

impl ProtocolHandler {
    pub fn new(controller: AcquisitionController) -> Self {
        let session = Arc::clone(controller.session());
        Self {
            controller,
            session,
            cmd: BoundedBuf::new(),
            overflowed: false,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ProbeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn on_bytes(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        for &byte in bytes {
            self.on_byte(byte)?;
        }
        Ok(())
    }

    pub fn on_byte(&mut self, byte: u8) -> Result<(), ProtocolError> {
        match byte {
            b'+' => {
                tracing::debug!("host abort");
                self.controller.stop();
                self.discard_line();
                Ok(())
            }
            b'*' => {
                tracing::debug!("host full reset");
                self.controller.initialize();
                self.discard_line();
                Ok(())
            }
            b'\r' => Ok(()),
            b'\n' => self.on_terminator(),
            _ => {
                if self.overflowed {
                    return Ok(());
                }
                if self.cmd.push(byte).is_err() {
                    tracing::warn!(capacity = CMD_BUF_CAPACITY, "command line overflow");
                    self.overflowed = true;
                    self.cmd.clear();
                    return self.nak();
                }
                Ok(())
            }
        }
    }

    fn discard_line(&mut self) {
        self.cmd.clear();
        self.overflowed = false;
    }

    fn on_terminator(&mut self) -> Result<(), ProtocolError> {
        if self.overflowed {
            // Already answered `!` when the line overflowed.
            self.discard_line();
            return Ok(());
        }
        if self.cmd.is_empty() {
            return Ok(());
        }
        let line = self.cmd.as_slice().to_vec();
        self.cmd.clear();
        match Command::parse(&line) {
            Ok(command) => self.dispatch(command),
            Err(err) => {
                tracing::warn!(%err, "command rejected");
                self.nak()
            }
        }
    }

    fn dispatch(&mut self, command: Command) -> Result<(), ProtocolError> {
        tracing::debug!(?command, "dispatching command");
        let result = match command {
            Command::Identify => {
                let id = format!(
                    "SRPICO,A{:02}1D{:02},02",
                    NUM_ANALOG_CHANNELS, NUM_DIGITAL_CHANNELS
                );
                return self.respond(id.as_bytes());
            }
            Command::AnalogScale { channel } => {
                if u32::from(channel) >= NUM_ANALOG_CHANNELS {
                    tracing::warn!(channel, "analog scale query out of range");
                    return self.nak();
                }
                let scale = format!("{}x{}", ANALOG_SCALE_UV, ANALOG_OFFSET_UV);
                return self.respond(scale.as_bytes());
            }
            Command::SetRate(rate) => {
                let cfg = self.session.config();
                self.controller.configure(
                    rate,
                    cfg.analog_mask,
                    cfg.digital_mask,
                    cfg.sample_limit,
                    cfg.continuous,
                )
            }
            Command::SetLimit(limit) => {
                let cfg = self.session.config();
                self.controller.configure(
                    cfg.sample_rate,
                    cfg.analog_mask,
                    cfg.digital_mask,
                    limit,
                    cfg.continuous,
                )
            }
            Command::EnableAnalog { channel, enabled } => {
                self.enable(ChannelKind::Analog, channel, enabled)
            }
            Command::EnableDigital { channel, enabled } => {
                self.enable(ChannelKind::Digital, channel, enabled)
            }
            // Run commands carry no acknowledgement; sample data and the
            // end-of-run report are the reply.
            Command::RunFixed => return self.start_run(false),
            Command::RunContinuous => return self.start_run(true),
        };
        match result {
            Ok(()) => self.ack(),
            Err(err) => {
                tracing::warn!(%err, "configuration rejected");
                self.nak()
            }
        }
    }

    fn enable(&self, kind: ChannelKind, channel: u8, enabled: bool) -> Result<(), ConfigError> {
        let limit = match kind {
            ChannelKind::Analog => NUM_ANALOG_CHANNELS,
            ChannelKind::Digital => NUM_DIGITAL_CHANNELS,
        };
        if u32::from(channel) >= limit {
            return Err(ConfigError::MaskOutOfRange {
                kind,
                mask: 1u32 << channel,
                limit,
            });
        }
        let cfg = self.session.config();
        let bit = 1u32 << channel;
        let toggled = |mask: u32| if enabled { mask | bit } else { mask & !bit };
        let (analog_mask, digital_mask) = match kind {
            ChannelKind::Analog => (toggled(cfg.analog_mask), cfg.digital_mask),
            ChannelKind::Digital => (cfg.analog_mask, toggled(cfg.digital_mask)),
        };
        self.controller.configure(
            cfg.sample_rate,
            analog_mask,
            digital_mask,
            cfg.sample_limit,
            cfg.continuous,
        )
    }

    fn start_run(&mut self, continuous: bool) -> Result<(), ProtocolError> {
        match self.controller.run(continuous) {
            Ok(()) => {
                if let Some(m) = &self.metrics {
                    m.increment_commands_accepted();
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, continuous, "run start rejected");
                self.nak()
            }
        }
    }

    fn ack(&mut self) -> Result<(), ProtocolError> {
        if let Some(m) = &self.metrics {
            m.increment_commands_accepted();
        }
        self.session.queue_response(ACK)
    }

    fn nak(&mut self) -> Result<(), ProtocolError> {
        if let Some(m) = &self.metrics {
            m.increment_commands_rejected();
        }
        self.session.queue_response(NAK)
    }

    fn respond(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if let Some(m) = &self.metrics {
            m.increment_commands_accepted();
        }
        self.session.queue_response(bytes)
    }
}
