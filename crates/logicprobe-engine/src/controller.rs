use std::sync::Arc;

use logicprobe_foundation::{AcquisitionConfig, ConfigError};
use logicprobe_telemetry::ProbeMetrics;

use crate::buffer::{BufferGeometry, CaptureBuffers};
use crate::session::Session;

/// Owns session configuration and run-state transitions on the
/// communication context. Every entry point validates against the
/// armed/sampling flags; it never touches capture-owned state beyond
/// the cooperative `aborted` flag.
pub struct AcquisitionController {
    session: Arc<Session>,
    metrics: Option<Arc<ProbeMetrics>>,
}

impl AcquisitionController {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ProbeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Full reset: configuration back to safe defaults, all run state
    /// and buffers cleared.
    pub fn initialize(&self) {
        *self.session.config_mut() = AcquisitionConfig::default();
        self.session.run_reset();
        tracing::info!("session fully reset");
    }

    /// Run reset: stop any active run, clear run state, keep the
    /// configuration. Idempotent.
    pub fn reset(&self) {
        self.session.run_reset();
    }

    /// Validate and apply a configuration. Rejected while armed; on
    /// error the previous configuration is untouched.
    pub fn configure(
        &self,
        sample_rate: u32,
        analog_mask: u32,
        digital_mask: u32,
        sample_limit: u64,
        continuous: bool,
    ) -> Result<(), ConfigError> {
        if self.session.state.is_armed() {
            return Err(ConfigError::Armed);
        }
        let mut config = self.session.config_mut();
        config.apply(sample_rate, analog_mask, digital_mask, sample_limit, continuous)?;
        tracing::info!(
            sample_rate,
            analog_mask,
            digital_mask,
            sample_limit,
            continuous,
            digital_count = config.digital_count,
            analog_count = config.analog_count,
            pin_width = config.pin_width,
            "configuration applied"
        );
        Ok(())
    }

    /// Prepare the capture path from the current configuration without
    /// starting capture. Idempotent.
    pub fn arm(&self) -> Result<(), ConfigError> {
        if self.session.state.is_armed() {
            return Ok(());
        }
        let config = self.session.config();
        let geometry = BufferGeometry::for_config(&config)?;
        self.session
            .install_buffers(Arc::new(CaptureBuffers::new(geometry)));
        self.session.state.set_armed(true);
        tracing::info!(
            samples_per_half = geometry.samples_per_half,
            half_bytes = geometry.half_bytes(),
            "armed"
        );
        Ok(())
    }

    /// Arm if needed and start sampling; capture begins at the capture
    /// context's next scheduling opportunity. A no-op while a run is
    /// already in progress.
    pub fn start(&self) -> Result<(), ConfigError> {
        if self.session.state.is_sampling() {
            return Ok(());
        }
        self.arm()?;
        let config = self.session.config();
        let continuous = config.continuous || config.sample_limit == 0;
        self.session.state.begin_run(config.sample_limit, continuous);
        if let Some(m) = &self.metrics {
            m.increment_runs_started();
        }
        self.session.notifier.notify();
        Ok(())
    }

    /// Start a run in the requested mode, arming first if needed. The
    /// mode flag alone may change while armed since it does not affect
    /// buffer geometry.
    pub fn run(&self, continuous: bool) -> Result<(), ConfigError> {
        if self.session.state.is_sampling() {
            return Ok(());
        }
        self.session.config_mut().continuous = continuous;
        self.start()
    }

    /// Host stop request. Observed cooperatively at the next buffer
    /// swap boundary; never preempts a fill in progress.
    pub fn stop(&self) {
        self.abort("host stop");
    }

    pub fn abort(&self, reason: &str) {
        if !self.session.state.is_run_active() {
            return;
        }
        tracing::info!(reason, "abort requested");
        self.session.state.set_aborted();
        self.session.notifier.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> AcquisitionController {
        AcquisitionController::new(Arc::new(Session::new()))
    }

    #[test]
    fn configure_rejected_while_armed() {
        let ctl = controller();
        ctl.configure(1_000_000, 0, 0xFF, 1000, false).unwrap();
        ctl.arm().unwrap();
        assert_eq!(
            ctl.configure(2_000_000, 0, 0xFF, 1000, false),
            Err(ConfigError::Armed)
        );
    }

    #[test]
    fn arm_is_idempotent() {
        let ctl = controller();
        ctl.configure(1_000_000, 0b1, 0, 0, true).unwrap();
        ctl.arm().unwrap();
        let buffers = ctl.session().buffers().unwrap();
        ctl.arm().unwrap();
        assert!(Arc::ptr_eq(&buffers, &ctl.session().buffers().unwrap()));
    }

    #[test]
    fn arm_requires_channels() {
        let ctl = controller();
        assert_eq!(ctl.arm(), Err(ConfigError::NoChannels));
        assert!(!ctl.session().state.is_armed());
    }

    #[test]
    fn configure_accepts_empty_channel_set() {
        let ctl = controller();
        // An empty channel set is valid configuration; only arming
        // rejects it.
        ctl.configure(2_000_000, 0, 0, 100, false).unwrap();
        assert_eq!(ctl.session().config().sample_rate, 2_000_000);
        assert_eq!(ctl.arm(), Err(ConfigError::NoChannels));
    }

    #[test]
    fn start_enters_continuous_mode_when_limit_is_zero() {
        let ctl = controller();
        ctl.configure(1_000_000, 0, 0xFF, 0, false).unwrap();
        ctl.start().unwrap();
        assert!(ctl.session().state.is_sampling());
        assert!(ctl.session().state.is_continuous());
    }

    #[test]
    fn reset_preserves_configuration() {
        let ctl = controller();
        ctl.configure(2_000_000, 0b11, 0x0F, 500, false).unwrap();
        ctl.start().unwrap();
        ctl.reset();
        assert!(!ctl.session().state.is_sampling());
        assert!(!ctl.session().state.is_armed());
        let config = ctl.session().config();
        assert_eq!(config.sample_rate, 2_000_000);
        assert_eq!(config.digital_mask, 0x0F);
    }

    #[test]
    fn initialize_restores_defaults() {
        let ctl = controller();
        ctl.configure(2_000_000, 0b11, 0x0F, 500, false).unwrap();
        ctl.initialize();
        assert_eq!(ctl.session().config(), AcquisitionConfig::default());
        assert!(ctl.session().buffers().is_none());
    }

    #[test]
    fn abort_without_run_is_a_no_op() {
        let ctl = controller();
        ctl.stop();
        assert!(!ctl.session().state.is_aborted());
    }
}
