//! Dataset kinds and their shape constants
//!
//! Every supported dataset has a fixed geometry: frame length in
//! `(I, Q)` points, frames per `(modulation, SNR)` combination, and the
//! number of distinct modulations and SNRs it must contain. Parsers
//! validate against these, and the transmit HAL derives its sampling
//! rate from the frame-length ratio between datasets.

use serde::{Deserialize, Serialize};

/// The supported dataset families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetKind {
    /// RadioML 2016.10A: pickle container, 128-point frames
    RadioMl2016,
    /// RadioML 2018.01: HDF5 container, 1024-point frames, parsed one
    /// modulation at a time
    RadioMl2018,
    /// HisarMod 2019.1: CSV, 1024-point frames
    HisarMod2019,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::RadioMl2016,
        DatasetKind::RadioMl2018,
        DatasetKind::HisarMod2019,
    ];

    /// Number of `(I, Q)` points per frame.
    pub const fn frame_length(self) -> usize {
        match self {
            DatasetKind::RadioMl2016 => 128,
            DatasetKind::RadioMl2018 => 1024,
            DatasetKind::HisarMod2019 => 1024,
        }
    }

    /// Number of frames per `(modulation, SNR)` combination.
    pub const fn frames_per_mod_snr(self) -> usize {
        match self {
            DatasetKind::RadioMl2016 => 1000,
            DatasetKind::RadioMl2018 => 4096,
            DatasetKind::HisarMod2019 => 500,
        }
    }

    /// Total number of modulations (analog + digital).
    pub const fn modulation_count(self) -> usize {
        match self {
            DatasetKind::RadioMl2016 => 11,
            DatasetKind::RadioMl2018 => 24,
            DatasetKind::HisarMod2019 => 26,
        }
    }

    /// Number of distinct SNRs.
    pub const fn snr_count(self) -> usize {
        match self {
            DatasetKind::RadioMl2016 => 20,
            DatasetKind::RadioMl2018 => 26,
            DatasetKind::HisarMod2019 => 20,
        }
    }

    /// Display label, also used in dump filenames.
    pub const fn label(self) -> &'static str {
        match self {
            DatasetKind::RadioMl2016 => "RadioML2016.10A",
            DatasetKind::RadioMl2018 => "RadioML2018.01",
            DatasetKind::HisarMod2019 => "HisarMod2019.1",
        }
    }

    /// Smallest frame length over all datasets; the reference for the
    /// transmit sampling-rate policy.
    pub fn min_frame_length() -> usize {
        DatasetKind::ALL
            .iter()
            .map(|k| k.frame_length())
            .min()
            .expect("dataset table is non-empty")
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_constants() {
        assert_eq!(DatasetKind::RadioMl2016.frame_length(), 128);
        assert_eq!(DatasetKind::RadioMl2016.frames_per_mod_snr(), 1000);
        assert_eq!(DatasetKind::RadioMl2016.modulation_count(), 11);
        assert_eq!(DatasetKind::RadioMl2016.snr_count(), 20);

        assert_eq!(DatasetKind::RadioMl2018.frame_length(), 1024);
        assert_eq!(DatasetKind::RadioMl2018.frames_per_mod_snr(), 4096);
        assert_eq!(DatasetKind::RadioMl2018.modulation_count(), 24);
        assert_eq!(DatasetKind::RadioMl2018.snr_count(), 26);

        assert_eq!(DatasetKind::HisarMod2019.frame_length(), 1024);
        assert_eq!(DatasetKind::HisarMod2019.frames_per_mod_snr(), 500);
        assert_eq!(DatasetKind::HisarMod2019.modulation_count(), 26);
        assert_eq!(DatasetKind::HisarMod2019.snr_count(), 20);
    }

    #[test]
    fn min_frame_length_is_radioml16() {
        assert_eq!(DatasetKind::min_frame_length(), 128);
    }
}
