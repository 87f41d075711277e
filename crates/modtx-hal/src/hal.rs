//! Transmit HAL: context discovery and variant dispatch
//!
//! [`TxHal`] owns the transport backend, the discovered context list
//! and the active device variant. Variants form a closed tagged sum
//! ([`TxVariant`]); every parameter and streaming operation switches on
//! the tag and forwards to the variant's own state. With no variant
//! selected, every operation fails with [`TrxError::NoDevice`].

use std::sync::Arc;

use modtx_core::{DatasetKind, ModulationName, SignalData};
use tracing::{debug, info};

use crate::ad9081::{self, Ad9081Trx};
use crate::ad9361::{self, Ad9361Trx};
use crate::adrv9009::{self, Adrv9009Trx};
use crate::error::{TrxError, TrxResult};
use crate::iio::{IioBackend, ScanEntry};
use crate::range::{RangeF64, RangeI64};
use crate::trx::TxParameters;

/// IP context probed in addition to the scanned USB contexts
pub const DEFAULT_IP_URI: &str = "ip:10.0.0.2";

/// Supported device families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxDeviceKind {
    Ad9361,
    Adrv9009,
    Ad9081,
}

impl TxDeviceKind {
    /// Description substrings identifying each family.
    pub const fn name_ids(self) -> &'static [&'static str] {
        match self {
            TxDeviceKind::Ad9361 => &["AD936", "PLUTO", "Pluto"],
            TxDeviceKind::Adrv9009 => &["ADRV9009"],
            TxDeviceKind::Ad9081 => &["AD9081", "AD9082"],
        }
    }

    /// Classify a context description by substring match.
    pub fn from_description(description: &str) -> Option<Self> {
        [
            TxDeviceKind::Ad9361,
            TxDeviceKind::Adrv9009,
            TxDeviceKind::Ad9081,
        ]
        .into_iter()
        .find(|kind| kind.name_ids().iter().any(|id| description.contains(id)))
    }

    pub const fn label(self) -> &'static str {
        match self {
            TxDeviceKind::Ad9361 => "AD936",
            TxDeviceKind::Adrv9009 => "ADRV9009",
            TxDeviceKind::Ad9081 => "AD9081",
        }
    }
}

/// Closed sum over the three device variants
pub enum TxVariant {
    Ad9361(Ad9361Trx),
    Adrv9009(Adrv9009Trx),
    Ad9081(Ad9081Trx),
}

macro_rules! dispatch {
    ($self:expr, $trx:ident => $body:expr) => {
        match $self {
            TxVariant::Ad9361($trx) => $body,
            TxVariant::Adrv9009($trx) => $body,
            TxVariant::Ad9081($trx) => $body,
        }
    };
}

impl TxVariant {
    pub fn kind(&self) -> TxDeviceKind {
        match self {
            TxVariant::Ad9361(_) => TxDeviceKind::Ad9361,
            TxVariant::Adrv9009(_) => TxDeviceKind::Adrv9009,
            TxVariant::Ad9081(_) => TxDeviceKind::Ad9081,
        }
    }

    pub fn initialize(&mut self, backend: &dyn IioBackend, uri: &str) -> TrxResult<()> {
        dispatch!(self, trx => trx.initialize(backend, uri))
    }

    pub fn free_resources(&mut self) {
        dispatch!(self, trx => trx.free_resources())
    }

    pub fn is_initialized(&self) -> bool {
        dispatch!(self, trx => trx.is_initialized())
    }

    pub fn parameters(&self) -> &TxParameters {
        dispatch!(self, trx => trx.parameters())
    }

    pub fn bandwidth(&mut self) -> TrxResult<i64> {
        dispatch!(self, trx => trx.bandwidth())
    }

    pub fn hw_gain(&mut self) -> TrxResult<f64> {
        dispatch!(self, trx => trx.hw_gain())
    }

    pub fn hw_gain_range(&self) -> RangeF64 {
        dispatch!(self, trx => trx.hw_gain_range())
    }

    pub fn lo_frequency(&mut self) -> TrxResult<i64> {
        dispatch!(self, trx => trx.lo_frequency())
    }

    pub fn lo_frequency_range(&self) -> RangeI64 {
        dispatch!(self, trx => trx.lo_frequency_range())
    }

    pub fn set_lo_frequency(&mut self, hz: i64) -> TrxResult<()> {
        dispatch!(self, trx => trx.set_lo_frequency(hz))
    }

    pub fn lo_power(&self) -> TrxResult<bool> {
        dispatch!(self, trx => trx.lo_power())
    }

    pub fn set_lo_power(&mut self, enable: bool) -> TrxResult<()> {
        dispatch!(self, trx => trx.set_lo_power(enable))
    }

    pub fn nco_gain_scale(&mut self) -> TrxResult<f64> {
        dispatch!(self, trx => trx.nco_gain_scale())
    }

    pub fn set_nco_gain_scale(&mut self, scale: f64) -> TrxResult<()> {
        dispatch!(self, trx => trx.set_nco_gain_scale(scale))
    }

    pub fn sampling_frequency(&mut self) -> TrxResult<i64> {
        dispatch!(self, trx => trx.sampling_frequency())
    }

    pub fn sampling_frequency_range(&self) -> RangeI64 {
        dispatch!(self, trx => trx.sampling_frequency_range())
    }

    pub fn set_sampling_frequency(&mut self, hz: i64) -> TrxResult<()> {
        dispatch!(self, trx => trx.set_sampling_frequency(hz))
    }

    pub fn load_signal(&mut self, signal: Arc<SignalData>) -> TrxResult<()> {
        dispatch!(self, trx => trx.load_signal(signal))
    }

    pub fn set_dump_filename(&mut self, filename: String) {
        dispatch!(self, trx => trx.set_dump_filename(filename))
    }

    pub fn start_streaming(&mut self) -> TrxResult<()> {
        dispatch!(self, trx => trx.start_streaming())
    }

    pub fn stop_streaming(&mut self) -> TrxResult<()> {
        dispatch!(self, trx => trx.stop_streaming())
    }
}

/// Default name of the optional frame-dump file.
pub fn default_dump_filename(kind: DatasetKind, modulation: ModulationName, snr_db: i32) -> String {
    format!("{}_{}_{}dB.txt", kind.label(), modulation.canonical(), snr_db)
}

/// Transmit hardware abstraction over the discovered contexts
pub struct TxHal {
    backend: Box<dyn IioBackend>,
    contexts: Vec<ScanEntry>,
    variant: Option<TxVariant>,
}

impl TxHal {
    /// Wrap a transport backend and run an initial context scan.
    pub fn new(backend: Box<dyn IioBackend>) -> Self {
        let mut hal = Self {
            backend,
            contexts: Vec::new(),
            variant: None,
        };
        hal.update_scan_contexts();
        hal
    }

    /// Discovered contexts, in discovery order.
    pub fn scan_contexts(&self) -> &[ScanEntry] {
        &self.contexts
    }

    /// Re-enumerate transport contexts: scanned URIs starting with
    /// `usb`, plus the default IP context when probing it reveals a
    /// known streaming device.
    pub fn update_scan_contexts(&mut self) {
        self.contexts.clear();

        for entry in self.backend.scan() {
            if entry.uri.starts_with("usb") {
                self.contexts.push(entry);
            }
        }

        if let Ok(context) = self.backend.open(DEFAULT_IP_URI) {
            let description = if context.find_device(adrv9009::TX_DEVICE).is_some() {
                Some(TxDeviceKind::Adrv9009.label())
            } else if context.find_device(ad9081::TX_DEVICE).is_some()
                || context.find_device("axi-ad9082-tx-hpc").is_some()
            {
                Some(TxDeviceKind::Ad9081.label())
            } else {
                None
            };

            if let Some(description) = description {
                self.contexts.push(ScanEntry::new(DEFAULT_IP_URI, description));
            }
        }

        debug!(count = self.contexts.len(), "transport contexts discovered");
    }

    /// Select and initialize the context at `index`. An already
    /// initialized variant is torn down first, buffer before channels
    /// before context.
    pub fn initialize_device(&mut self, index: usize) -> TrxResult<()> {
        if let Some(variant) = self.variant.as_mut() {
            variant.free_resources();
        }
        self.variant = None;

        let entry = self
            .contexts
            .get(index)
            .cloned()
            .ok_or(TrxError::NoDevice)?;
        let kind = TxDeviceKind::from_description(&entry.description).ok_or(TrxError::NoDevice)?;

        let mut variant = match kind {
            TxDeviceKind::Ad9361 => TxVariant::Ad9361(Ad9361Trx::new()),
            TxDeviceKind::Adrv9009 => TxVariant::Adrv9009(Adrv9009Trx::new()),
            TxDeviceKind::Ad9081 => TxVariant::Ad9081(Ad9081Trx::new()),
        };
        variant.initialize(self.backend.as_ref(), &entry.uri)?;

        info!(uri = %entry.uri, device = kind.label(), "transmit device initialized");
        self.variant = Some(variant);
        Ok(())
    }

    /// Tear down the active variant, if any.
    pub fn release_device(&mut self) {
        if let Some(variant) = self.variant.as_mut() {
            variant.free_resources();
        }
        self.variant = None;
    }

    pub fn device_kind(&self) -> Option<TxDeviceKind> {
        self.variant.as_ref().map(TxVariant::kind)
    }

    pub fn is_initialized(&self) -> bool {
        self.variant
            .as_ref()
            .map(TxVariant::is_initialized)
            .unwrap_or(false)
    }

    fn variant(&self) -> TrxResult<&TxVariant> {
        self.variant.as_ref().ok_or(TrxError::NoDevice)
    }

    fn variant_mut(&mut self) -> TrxResult<&mut TxVariant> {
        self.variant.as_mut().ok_or(TrxError::NoDevice)
    }

    pub fn parameters(&self) -> TrxResult<&TxParameters> {
        Ok(self.variant()?.parameters())
    }

    pub fn bandwidth(&mut self) -> TrxResult<i64> {
        self.variant_mut()?.bandwidth()
    }

    pub fn hw_gain(&mut self) -> TrxResult<f64> {
        self.variant_mut()?.hw_gain()
    }

    pub fn hw_gain_range(&self) -> TrxResult<RangeF64> {
        Ok(self.variant()?.hw_gain_range())
    }

    pub fn lo_frequency(&mut self) -> TrxResult<i64> {
        self.variant_mut()?.lo_frequency()
    }

    pub fn lo_frequency_range(&self) -> TrxResult<RangeI64> {
        Ok(self.variant()?.lo_frequency_range())
    }

    pub fn set_lo_frequency(&mut self, hz: i64) -> TrxResult<()> {
        self.variant_mut()?.set_lo_frequency(hz)
    }

    pub fn nco_gain_scale(&mut self) -> TrxResult<f64> {
        self.variant_mut()?.nco_gain_scale()
    }

    pub fn set_nco_gain_scale(&mut self, scale: f64) -> TrxResult<()> {
        self.variant_mut()?.set_nco_gain_scale(scale)
    }

    pub fn sampling_frequency(&mut self) -> TrxResult<i64> {
        self.variant_mut()?.sampling_frequency()
    }

    pub fn set_sampling_frequency(&mut self, hz: i64) -> TrxResult<()> {
        self.variant_mut()?.set_sampling_frequency(hz)
    }

    /// Apply the sampling-rate policy for a newly parsed dataset: the
    /// AD9361 family runs at the 2.5 MHz reference scaled by the
    /// frame-length ratio; the other families are fixed-rate and this
    /// is a no-op.
    pub fn update_sampling_frequency(&mut self, dataset: DatasetKind) -> TrxResult<()> {
        let min_frame_length = DatasetKind::min_frame_length() as i64;
        let ratio = dataset.frame_length() as i64 / min_frame_length;

        match self.variant_mut()? {
            TxVariant::Ad9361(trx) => {
                trx.set_sampling_frequency(ad9361::REFERENCE_SAMPLING_FREQUENCY * ratio)
            }
            TxVariant::Adrv9009(_) | TxVariant::Ad9081(_) => Ok(()),
        }
    }

    pub fn load_signal(&mut self, signal: Arc<SignalData>) -> TrxResult<()> {
        self.variant_mut()?.load_signal(signal)
    }

    pub fn set_dump_filename(&mut self, filename: String) -> TrxResult<()> {
        self.variant_mut()?.set_dump_filename(filename);
        Ok(())
    }

    pub fn start_streaming(&mut self) -> TrxResult<()> {
        self.variant_mut()?.start_streaming()
    }

    pub fn stop_streaming(&mut self) -> TrxResult<()> {
        self.variant_mut()?.stop_streaming()
    }
}
