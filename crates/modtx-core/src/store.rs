//! In-memory dataset store
//!
//! Maps `(modulation, SNR)` to the signal data parsed for that
//! combination. A store is built whole by one parser run and published
//! atomically by the parse session; it is never mutated while a
//! transmit session borrows signals from it, which is why signals are
//! handed out as `Arc<SignalData>`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dataset::DatasetKind;
use crate::error::{DatasetError, DatasetResult};
use crate::modulation::ModulationName;
use crate::types::SignalData;

/// Key of one modulation-SNR combination
pub type ModulationSnr = (ModulationName, i32);

/// Map with signal data for all modulation-SNR combinations of a dataset
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    map: BTreeMap<ModulationSnr, Arc<SignalData>>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the signal for one combination.
    ///
    /// Rejects duplicate keys (a dataset must not define the same
    /// combination twice) and all-zero signals (`max_abs` later divides
    /// the DAC scale ratio).
    pub fn insert(
        &mut self,
        name: ModulationName,
        snr_db: i32,
        signal: SignalData,
    ) -> DatasetResult<()> {
        if signal.max_abs <= 0.0 {
            return Err(DatasetError::format(format!(
                "all-zero signal for {} at {} dB",
                name.canonical(),
                snr_db
            )));
        }

        if self.map.contains_key(&(name, snr_db)) {
            return Err(DatasetError::format(format!(
                "duplicate entry for {} at {} dB",
                name.canonical(),
                snr_db
            )));
        }

        self.map.insert((name, snr_db), Arc::new(signal));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, name: ModulationName, snr_db: i32) -> Option<&SignalData> {
        self.map.get(&(name, snr_db)).map(Arc::as_ref)
    }

    /// Shared handle to one signal, for the duration of a transmit session.
    pub fn signal(&self, name: ModulationName, snr_db: i32) -> Option<Arc<SignalData>> {
        self.map.get(&(name, snr_db)).cloned()
    }

    /// Distinct modulations, sorted, deduplicated.
    pub fn modulations(&self) -> Vec<ModulationName> {
        let mut mods: Vec<ModulationName> = self.map.keys().map(|(m, _)| *m).collect();
        mods.sort();
        mods.dedup();
        mods
    }

    /// Distinct SNRs in dB, sorted ascending, deduplicated.
    pub fn snrs(&self) -> Vec<i32> {
        let mut snrs: Vec<i32> = self.map.keys().map(|(_, s)| *s).collect();
        snrs.sort_unstable();
        snrs.dedup();
        snrs
    }

    /// SNRs available for one modulation, sorted ascending.
    pub fn snrs_for(&self, name: ModulationName) -> Vec<i32> {
        self.map
            .keys()
            .filter(|(m, _)| *m == name)
            .map(|(_, s)| *s)
            .collect()
    }

    /// Check the distinct-modulation and distinct-SNR cardinalities
    /// against the dataset constants.
    pub fn check_cardinalities(&self, kind: DatasetKind) -> DatasetResult<()> {
        let mods = self.modulations().len();
        let snrs = self.snrs().len();

        if mods != kind.modulation_count() || snrs != kind.snr_count() {
            return Err(DatasetError::format(format!(
                "{}: found {} modulations and {} SNRs, expected {} and {}",
                kind.label(),
                mods,
                snrs,
                kind.modulation_count(),
                kind.snr_count()
            )));
        }

        Ok(())
    }
}
