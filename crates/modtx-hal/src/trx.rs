//! Common transceiver core
//!
//! State and plumbing shared by the three device variants: the open
//! context with its devices and channels, the cached transmit
//! parameters, the loaded signal and the single-owner cyclic DMA
//! buffer. Variants differ in attribute vocabulary and DAC width; the
//! conversion and buffer marshalling below is common to all of them.

use std::sync::Arc;

use modtx_core::SignalData;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TrxError, TrxResult};
use crate::iio::{IioBuffer, IioChannel, IioContext, IioDevice};
use crate::range::{RangeF64, RangeI64};

/// Number of zero samples pushed to silence the DAC
pub const STOP_BUFFER_IQ_PAIRS: usize = 1024;

/// Cached transmit parameters and their tuning ranges
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TxParameters {
    /// LO (or main NCO) frequency [Hz]
    pub lo_frequency: i64,
    pub lo_range: RangeI64,
    /// Sampling frequency [Hz]
    pub sampling_frequency: i64,
    pub sampling_range: RangeI64,
    /// RF bandwidth [Hz]
    pub bandwidth: i64,
    pub bandwidth_range: RangeI64,
    /// Hardware gain [dB]
    pub hw_gain_db: f64,
    pub hw_gain_range: RangeF64,
    /// NCO gain scale [0..1]
    pub nco_gain_scale: f64,
}

/// Scale ratio mapping `[-max_abs, max_abs]` onto the full span of a
/// `dac_bits`-wide DAC: `(2^(W-1) - 1) / max_abs`.
pub fn scale_ratio(dac_bits: u32, max_abs: f32) -> f64 {
    ((1i64 << (dac_bits - 1)) - 1) as f64 / max_abs as f64
}

/// Convert one normalized component to a device word. The cast
/// truncates toward zero; inputs are bounded by `max_abs`, so the
/// shifted result always fits an `i16`.
pub fn convert_sample(value: f32, scale: f64, shift: u32) -> i16 {
    ((value as f64 * scale) as i16) << shift
}

/// Shared device state of one transceiver variant
pub struct TrxCore {
    pub(crate) context: Option<Box<dyn IioContext>>,
    pub(crate) phy_dev: Option<Box<dyn IioDevice>>,
    pub(crate) tx_dev: Option<Box<dyn IioDevice>>,
    pub(crate) rx_dev: Option<Box<dyn IioDevice>>,

    pub(crate) phy_chan: Option<Box<dyn IioChannel>>,
    pub(crate) lo_chan: Option<Box<dyn IioChannel>>,
    pub(crate) nco_chan: Option<Box<dyn IioChannel>>,
    pub(crate) tx_i: Option<Box<dyn IioChannel>>,
    pub(crate) tx_q: Option<Box<dyn IioChannel>>,

    tx_buf: Option<Box<dyn IioBuffer>>,

    pub(crate) params: TxParameters,
    pub(crate) initialized: bool,

    signal: Option<Arc<SignalData>>,
    frame_length: usize,
    frames_nr: usize,

    dump_filename: Option<String>,
}

impl Default for TrxCore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrxCore {
    pub fn new() -> Self {
        Self {
            context: None,
            phy_dev: None,
            tx_dev: None,
            rx_dev: None,
            phy_chan: None,
            lo_chan: None,
            nco_chan: None,
            tx_i: None,
            tx_q: None,
            tx_buf: None,
            params: TxParameters::default(),
            initialized: false,
            signal: None,
            frame_length: 0,
            frames_nr: 0,
            dump_filename: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn parameters(&self) -> &TxParameters {
        &self.params
    }

    /// Release everything owned by this variant. The buffer goes
    /// first: no reference to it may outlive the teardown.
    pub fn free_resources(&mut self) {
        self.tx_buf = None;

        for chan in [
            &mut self.tx_i,
            &mut self.tx_q,
            &mut self.nco_chan,
            &mut self.lo_chan,
            &mut self.phy_chan,
        ] {
            if let Some(c) = chan.as_mut() {
                c.disable();
            }
            *chan = None;
        }

        self.phy_dev = None;
        self.tx_dev = None;
        self.rx_dev = None;
        self.context = None;
        self.initialized = false;
    }

    /// Destroy the current buffer and, for a non-zero length, allocate
    /// a fresh one on the streaming device.
    pub fn reset_tx_buffer(&mut self, iq_pairs: usize, cyclic: bool) -> TrxResult<()> {
        self.tx_buf = None;

        if iq_pairs > 0 {
            let tx_dev = self.tx_dev.as_mut().ok_or(TrxError::NoDevice)?;
            self.tx_buf = Some(tx_dev.create_buffer(iq_pairs, cyclic)?);
        }

        Ok(())
    }

    /// Borrow the signal for the coming transmit session and cache its
    /// dimensions.
    pub fn load_signal(&mut self, signal: Arc<SignalData>) -> TrxResult<()> {
        if signal.frame_count() == 0 || signal.frame_length() == 0 {
            return Err(TrxError::NoSignal);
        }

        self.frames_nr = signal.frame_count();
        self.frame_length = signal.frame_length();
        self.signal = Some(signal);
        Ok(())
    }

    pub fn set_dump_filename(&mut self, filename: impl Into<String>) {
        self.dump_filename = Some(filename.into());
    }

    /// Convert the loaded signal and hand it to the hardware as one
    /// cyclic buffer; the DMA engine replays it until stopped.
    pub fn start_streaming(&mut self, dac_bits: u32) -> TrxResult<()> {
        let signal = self.signal.clone().ok_or(TrxError::NoSignal)?;
        let scale = scale_ratio(dac_bits, signal.max_abs);
        let shift = 16 - dac_bits;

        self.reset_tx_buffer(self.frame_length * self.frames_nr, true)?;

        let mut words = Vec::with_capacity(2 * self.frame_length * self.frames_nr);
        for frame in &signal.frames {
            for pt in frame {
                words.push(convert_sample(pt.re, scale, shift));
                words.push(convert_sample(pt.im, scale, shift));
            }
        }

        #[cfg(feature = "dump-frames")]
        self.dump_frames(&signal);

        let buffer = self.tx_buf.as_mut().expect("buffer was just allocated");
        buffer.fill(&words)?;
        buffer.push()?;

        debug!(
            samples = words.len() / 2,
            dac_bits, "cyclic transmit buffer pushed"
        );
        Ok(())
    }

    /// Silence the DAC with a zero-filled cyclic buffer. Idempotent.
    pub fn stop_streaming(&mut self) -> TrxResult<()> {
        self.reset_tx_buffer(STOP_BUFFER_IQ_PAIRS, true)?;

        let buffer = self.tx_buf.as_mut().expect("buffer was just allocated");
        buffer.fill(&vec![0i16; 2 * STOP_BUFFER_IQ_PAIRS])?;
        buffer.push()?;
        Ok(())
    }

    pub(crate) fn phy_chan(&self) -> TrxResult<&dyn IioChannel> {
        self.phy_chan.as_deref().ok_or(TrxError::NoDevice)
    }

    pub(crate) fn phy_chan_mut(&mut self) -> TrxResult<&mut (dyn IioChannel + 'static)> {
        match self.phy_chan.as_deref_mut() {
            Some(chan) => Ok(chan),
            None => Err(TrxError::NoDevice),
        }
    }

    pub(crate) fn lo_chan(&self) -> TrxResult<&dyn IioChannel> {
        self.lo_chan.as_deref().ok_or(TrxError::NoDevice)
    }

    pub(crate) fn lo_chan_mut(&mut self) -> TrxResult<&mut (dyn IioChannel + 'static)> {
        match self.lo_chan.as_deref_mut() {
            Some(chan) => Ok(chan),
            None => Err(TrxError::NoDevice),
        }
    }

    pub(crate) fn nco_chan(&self) -> TrxResult<&dyn IioChannel> {
        self.nco_chan.as_deref().ok_or(TrxError::NoDevice)
    }

    pub(crate) fn nco_chan_mut(&mut self) -> TrxResult<&mut (dyn IioChannel + 'static)> {
        match self.nco_chan.as_deref_mut() {
            Some(chan) => Ok(chan),
            None => Err(TrxError::NoDevice),
        }
    }

    pub fn read_register(&mut self, address: u16) -> TrxResult<u8> {
        self.phy_dev
            .as_mut()
            .ok_or(TrxError::NoDevice)?
            .reg_read(address)
    }

    pub fn write_register(&mut self, address: u16, value: u8) -> TrxResult<()> {
        self.phy_dev
            .as_mut()
            .ok_or(TrxError::NoDevice)?
            .reg_write(address, value)
    }

    /// Write the first two frames as `index i q` text lines, normalized
    /// to `[-1, 1]`. Failures only log; the transmission proceeds.
    #[cfg(feature = "dump-frames")]
    fn dump_frames(&self, signal: &SignalData) {
        use std::io::Write;

        const FRAMES_TO_DUMP: usize = 2;

        let Some(filename) = self.dump_filename.as_deref() else {
            return;
        };

        let mut file = match std::fs::File::create(filename) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(filename, error = %err, "cannot create dump file");
                return;
            }
        };

        let mut index = 0usize;
        for frame in signal.frames.iter().take(FRAMES_TO_DUMP) {
            for pt in frame {
                let line = format!(
                    "{} {:.6} {:.6}\n",
                    index,
                    pt.re / signal.max_abs,
                    pt.im / signal.max_abs
                );
                if let Err(err) = file.write_all(line.as_bytes()) {
                    tracing::warn!(filename, error = %err, "dump write failed");
                    return;
                }
                index += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_spans_the_dac() {
        // SCALE * max_abs recovers the DAC full-scale value
        for (bits, full_scale) in [(12u32, 2047.0), (14, 8191.0), (16, 32767.0)] {
            let max_abs = 0.7f32;
            let scale = scale_ratio(bits, max_abs);
            assert!((scale * max_abs as f64 - full_scale).abs() < 1e-9);
        }
    }

    #[test]
    fn conversion_for_12_bit_dac() {
        let scale = scale_ratio(12, 1.0);
        assert_eq!(convert_sample(0.5, scale, 4), 16368); // 1023 << 4
        assert_eq!(convert_sample(-1.0, scale, 4), -32752); // -2047 << 4
        assert_eq!(convert_sample(0.0, scale, 4), 0);
    }

    #[test]
    fn conversion_never_overflows_i16() {
        for (bits, shift) in [(12u32, 4u32), (14, 2), (16, 0)] {
            let scale = scale_ratio(bits, 1.0);
            let hi = convert_sample(1.0, scale, shift);
            let lo = convert_sample(-1.0, scale, shift);
            assert!(hi > 0 && lo < 0);
            // shifting back recovers the unshifted magnitude
            assert_eq!(i32::from(hi) >> shift, (1 << (bits - 1)) - 1);
        }
    }

    #[test]
    fn conversion_truncates_toward_zero() {
        let scale = scale_ratio(16, 1.0);
        assert_eq!(convert_sample(0.99999, scale, 0), 32766);
        assert_eq!(convert_sample(-0.99999, scale, 0), -32766);
    }
}
