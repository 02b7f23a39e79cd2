/// The sample-acquisition seam: stands in for the DMA/sampler hardware
/// that fills half-buffers on the capture context.
///
/// `fill` writes up to `samples` slices: one `u32` word per slice into
/// `digital` (ignored when no digital channels are enabled) and
/// `analog_stride` bytes per slice into `analog`. It returns the number
/// of slices actually produced; producing fewer than requested means
/// the source is exhausted and ends the run like a bounded completion.
pub trait SampleSource: Send {
    fn fill(
        &mut self,
        digital: &mut [u32],
        analog: &mut [u8],
        samples: usize,
        analog_stride: usize,
    ) -> usize;
}

/// Synthetic source producing a deterministic counting pattern:
/// digital words count up from zero, analog channels ramp with a fixed
/// phase offset per channel. Used by the bridge binary and in tests.
#[derive(Debug, Default)]
pub struct PatternSource {
    next: u64,
}

impl PatternSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SampleSource for PatternSource {
    fn fill(
        &mut self,
        digital: &mut [u32],
        analog: &mut [u8],
        samples: usize,
        analog_stride: usize,
    ) -> usize {
        for i in 0..samples {
            let tick = self.next + i as u64;
            if !digital.is_empty() {
                digital[i] = tick as u32;
            }
            for ch in 0..analog_stride {
                analog[i * analog_stride + ch] =
                    (tick as u8).wrapping_add((ch as u8).wrapping_mul(0x40));
            }
        }
        self.next += samples as u64;
        samples
    }
}
