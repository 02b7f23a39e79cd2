//! Wire sample format, fixed by the sigrok generic-serial driver
//! convention (protocol version 02).
//!
//! Each slice is `digital_tx_bytes` digital bytes followed by one byte
//! per enabled analog channel. Digital bytes carry 7 channel bits with
//! bit 7 set; analog bytes carry the 8-bit sample scaled to 7 bits with
//! bit 7 set. Bit 7 distinguishes sample bytes from the ASCII control
//! bytes sharing the channel.

use logicprobe_foundation::AcquisitionConfig;

/// Terminates the sample stream of a run; the `$<count>+` report follows.
pub const END_OF_RUN: u8 = b'!';

/// Pack one slice into `out`.
pub fn pack_slice(cfg: &AcquisitionConfig, digital_word: u32, analog: &[u8], out: &mut Vec<u8>) {
    for byte_index in 0..cfg.digital_tx_bytes {
        let bits = (digital_word >> (7 * byte_index)) & 0x7F;
        out.push(0x80 | bits as u8);
    }
    for &sample in analog {
        out.push(0x80 | (sample >> 1));
    }
}

/// Pack `valid` slices from half-buffer storage in capture order.
/// `analog` is interleaved with `analog_count` bytes per slice.
pub fn pack_slices(
    cfg: &AcquisitionConfig,
    digital: &[u32],
    analog: &[u8],
    valid: usize,
    out: &mut Vec<u8>,
) {
    let stride = cfg.analog_count as usize;
    out.reserve(valid * cfg.slice_tx_bytes());
    for i in 0..valid {
        let word = if cfg.digital_count > 0 { digital[i] } else { 0 };
        pack_slice(cfg, word, &analog[i * stride..(i + 1) * stride], out);
    }
}

/// End-of-run report sent after [`END_OF_RUN`]: the number of samples
/// delivered, so the host can account for a truncated bounded run.
pub fn run_trailer(samples_sent: u64) -> Vec<u8> {
    format!("${samples_sent}+").into_bytes()
}
