//! Core sample types
//!
//! A dataset decomposes into frames of complex baseband points:
//!
//! ```text
//! SignalData ─▶ [FrameData; frames_per_mod_snr] ─▶ [IqPoint; frame_length]
//! ```
//!
//! `max_abs` is tracked per signal because it later becomes the
//! denominator of the DAC scale ratio; an all-zero signal is therefore
//! unusable and rejected at store insertion.

use num_complex::Complex32;

/// One complex baseband sample in host-normalized units
pub type IqPoint = Complex32;

/// One capture: an ordered block of I/Q points of fixed per-dataset length
pub type FrameData = Vec<IqPoint>;

/// All frames recorded for one `(modulation, SNR)` combination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalData {
    /// Frames, all of equal length
    pub frames: Vec<FrameData>,
    /// Largest `|I|` or `|Q|` component over all frames
    pub max_abs: f32,
}

impl SignalData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame, folding its components into `max_abs`.
    pub fn push_frame(&mut self, frame: FrameData) {
        for pt in &frame {
            if pt.re.abs() > self.max_abs {
                self.max_abs = pt.re.abs();
            }
            if pt.im.abs() > self.max_abs {
                self.max_abs = pt.im.abs();
            }
        }
        self.frames.push(frame);
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Length of the first frame, zero when empty.
    pub fn frame_length(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_abs_tracks_largest_component() {
        let mut signal = SignalData::new();
        signal.push_frame(vec![IqPoint::new(0.5, -1.25), IqPoint::new(-0.75, 0.25)]);
        signal.push_frame(vec![IqPoint::new(1.0, 0.0), IqPoint::new(0.0, -2.5)]);

        assert_eq!(signal.max_abs, 2.5);
        assert_eq!(signal.frame_count(), 2);
        assert_eq!(signal.frame_length(), 2);
    }

    #[test]
    fn all_zero_signal_has_zero_max() {
        let mut signal = SignalData::new();
        signal.push_frame(vec![IqPoint::new(0.0, 0.0); 4]);
        assert_eq!(signal.max_abs, 0.0);
    }
}
