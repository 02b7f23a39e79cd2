use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use logicprobe_foundation::{AcquisitionConfig, ConfigError, CAPTURE_BUF_BYTES};

/// Sizing of the ping-pong capture buffers, derived from the session
/// configuration at arm time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferGeometry {
    pub samples_per_half: usize,
    /// Bytes of digital storage per sample: one `u32` word (pin-width
    /// bits used), or zero when no digital channels are enabled.
    pub digital_bytes_per_sample: usize,
    /// One byte per enabled analog channel per sample.
    pub analog_bytes_per_sample: usize,
}

impl BufferGeometry {
    pub fn for_config(cfg: &AcquisitionConfig) -> Result<Self, ConfigError> {
        if !cfg.any_channels() {
            return Err(ConfigError::NoChannels);
        }
        let digital_bytes_per_sample = if cfg.digital_count > 0 {
            std::mem::size_of::<u32>()
        } else {
            0
        };
        let analog_bytes_per_sample = cfg.analog_count as usize;
        let per_sample = digital_bytes_per_sample + analog_bytes_per_sample;
        let samples_per_half = CAPTURE_BUF_BYTES / (2 * per_sample);

        let geometry = Self {
            samples_per_half,
            digital_bytes_per_sample,
            analog_bytes_per_sample,
        };
        debug_assert!(2 * geometry.half_bytes() <= CAPTURE_BUF_BYTES);
        Ok(geometry)
    }

    pub fn half_bytes(&self) -> usize {
        self.samples_per_half * (self.digital_bytes_per_sample + self.analog_bytes_per_sample)
    }

    fn digital_words_per_half(&self) -> usize {
        if self.digital_bytes_per_sample > 0 {
            self.samples_per_half
        } else {
            0
        }
    }

    fn analog_bytes_per_half(&self) -> usize {
        self.samples_per_half * self.analog_bytes_per_sample
    }
}

/// Which of the two ping-pong halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfIndex {
    A,
    B,
}

impl HalfIndex {
    pub fn other(self) -> Self {
        match self {
            HalfIndex::A => HalfIndex::B,
            HalfIndex::B => HalfIndex::A,
        }
    }

    fn as_usize(self) -> usize {
        match self {
            HalfIndex::A => 0,
            HalfIndex::B => 1,
        }
    }
}

/// One half of the ping-pong capture memory.
///
/// The `ready` flag is the SPSC handoff: the producer owns the half
/// while `ready` is false and publishes it with a `Release` store; the
/// transmitter owns it while `ready` is true and retires it when
/// drained. The payload mutexes exist only for interior mutability —
/// each side locks a half exclusively while it owns it per the flag
/// protocol, so the locks are never contended.
pub struct HalfBuffer {
    digital: Mutex<Box<[u32]>>,
    analog: Mutex<Box<[u8]>>,
    ready: AtomicBool,
    valid: AtomicUsize,
}

impl HalfBuffer {
    fn new(geometry: &BufferGeometry) -> Self {
        Self {
            digital: Mutex::new(vec![0u32; geometry.digital_words_per_half()].into_boxed_slice()),
            analog: Mutex::new(vec![0u8; geometry.analog_bytes_per_half()].into_boxed_slice()),
            ready: AtomicBool::new(false),
            valid: AtomicUsize::new(0),
        }
    }

    pub fn digital(&self) -> MutexGuard<'_, Box<[u32]>> {
        self.digital.lock()
    }

    pub fn analog(&self) -> MutexGuard<'_, Box<[u8]>> {
        self.analog.lock()
    }

    /// Producer: hand the half to the transmitter with `valid` samples.
    pub fn publish(&self, valid: usize) {
        self.valid.store(valid, Ordering::Release);
        self.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Transmitter: the half is drained and may be refilled.
    pub fn retire(&self) {
        self.ready.store(false, Ordering::Release);
    }

    pub fn valid_samples(&self) -> usize {
        self.valid.load(Ordering::Acquire)
    }
}

/// The two ping-pong halves plus their geometry, installed on the
/// session at arm time and shared by both execution contexts.
pub struct CaptureBuffers {
    halves: [HalfBuffer; 2],
    geometry: BufferGeometry,
}

impl CaptureBuffers {
    pub fn new(geometry: BufferGeometry) -> Self {
        Self {
            halves: [HalfBuffer::new(&geometry), HalfBuffer::new(&geometry)],
            geometry,
        }
    }

    pub fn half(&self, index: HalfIndex) -> &HalfBuffer {
        &self.halves[index.as_usize()]
    }

    pub fn geometry(&self) -> &BufferGeometry {
        &self.geometry
    }
}
