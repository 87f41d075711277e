//! ADRV9009 family — wideband transceiver
//!
//! 14-bit DAC, so converted samples are shifted left by 2. Unlike the
//! AD9361 family the tuning limits are not reported over the attribute
//! bus; the LO spans 70 MHz - 6 GHz, the sampling frequency is pinned
//! at 122.88 MHz and the bandwidth at 100 MHz, with hardware gain
//! adjustable in [-30, 0] dB.

use std::sync::Arc;

use modtx_core::SignalData;
use tracing::debug;

use crate::error::{TrxError, TrxResult};
use crate::iio::IioBackend;
use crate::range::{token_f64, RangeF64, RangeI64};
use crate::trx::{TrxCore, TxParameters};

pub const PHY_DEVICE: &str = "adrv9009-phy";
pub const TX_DEVICE: &str = "axi-adrv9009-tx-hpc";
pub const DAC_BITS: u32 = 14;

const LO_RANGE: RangeI64 = RangeI64::new(70_000_000, 1, 6_000_000_000);
const SAMPLING_FREQUENCY: i64 = 122_880_000;
const BANDWIDTH: i64 = 100_000_000;
const HW_GAIN_RANGE: RangeF64 = RangeF64::new(-30.0, 0.05, 0.0);

/// Transmit path of one ADRV9009 device
#[derive(Default)]
pub struct Adrv9009Trx {
    core: TrxCore,
}

impl Adrv9009Trx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.core.is_initialized()
    }

    pub fn parameters(&self) -> &TxParameters {
        self.core.parameters()
    }

    /// Open the context, locate PHY and streaming devices, enable the
    /// I/Q channels and install the family's fixed tuning ranges.
    pub fn initialize(&mut self, backend: &dyn IioBackend, uri: &str) -> TrxResult<()> {
        let context = backend.open(uri)?;
        if context.device_count() == 0 {
            return Err(TrxError::ContextOpenFailed(uri.into()));
        }

        let phy_dev = context
            .find_device(PHY_DEVICE)
            .ok_or_else(|| TrxError::DeviceMissing(PHY_DEVICE.into()))?;
        let tx_dev = context
            .find_device(TX_DEVICE)
            .ok_or_else(|| TrxError::DeviceMissing(TX_DEVICE.into()))?;

        let phy_chan = phy_dev
            .find_channel("voltage0", true)
            .ok_or_else(|| TrxError::ChannelMissing("voltage0".into()))?;
        let lo_chan = phy_dev
            .find_channel("altvoltage0", true)
            .ok_or_else(|| TrxError::ChannelMissing("altvoltage0".into()))?;
        let mut tx_i = tx_dev
            .find_channel("voltage0", true)
            .ok_or_else(|| TrxError::ChannelMissing("voltage0".into()))?;
        let mut tx_q = tx_dev
            .find_channel("voltage1", true)
            .ok_or_else(|| TrxError::ChannelMissing("voltage1".into()))?;

        tx_i.enable();
        tx_q.enable();

        self.core.context = Some(context);
        self.core.phy_dev = Some(phy_dev);
        self.core.tx_dev = Some(tx_dev);
        self.core.phy_chan = Some(phy_chan);
        self.core.lo_chan = Some(lo_chan);
        self.core.tx_i = Some(tx_i);
        self.core.tx_q = Some(tx_q);

        self.core.reset_tx_buffer(0, true)?;

        self.core.params.bandwidth_range = RangeI64::pinned(BANDWIDTH);
        self.core.params.sampling_range = RangeI64::pinned(SAMPLING_FREQUENCY);
        self.core.params.lo_range = LO_RANGE;
        self.core.params.hw_gain_range = HW_GAIN_RANGE;

        self.core.initialized = true;
        debug!(uri, "ADRV9009 transmit path initialized");
        Ok(())
    }

    pub fn free_resources(&mut self) {
        self.core.free_resources();
    }

    pub fn bandwidth(&mut self) -> TrxResult<i64> {
        let value = self.core.phy_chan()?.attr_read_i64("rf_bandwidth")?;
        self.core.params.bandwidth = value;
        Ok(value)
    }

    pub fn bandwidth_range(&self) -> RangeI64 {
        self.core.params.bandwidth_range
    }

    /// Bandwidth is fixed on this family.
    pub fn set_bandwidth(&mut self, _hz: i64) -> TrxResult<()> {
        Err(TrxError::Unsupported("bandwidth is fixed on ADRV9009"))
    }

    pub fn hw_gain(&mut self) -> TrxResult<f64> {
        let text = self.core.phy_chan()?.attr_read("hardwaregain")?;
        let value = token_f64(&text, 0)
            .ok_or_else(|| TrxError::AttributeReadFailed("hardwaregain".into()))?;
        self.core.params.hw_gain_db = value;
        Ok(value)
    }

    pub fn hw_gain_range(&self) -> RangeF64 {
        self.core.params.hw_gain_range
    }

    pub fn set_hw_gain(&mut self, gain_db: f64) -> TrxResult<()> {
        let range = self.core.params.hw_gain_range;
        if !range.contains(gain_db) {
            return Err(TrxError::OutOfRange {
                value: gain_db,
                min: range.min,
                max: range.max,
            });
        }

        self.core
            .phy_chan_mut()?
            .attr_write_f64("hardwaregain", gain_db)?;
        self.core.params.hw_gain_db = gain_db;
        Ok(())
    }

    pub fn lo_frequency(&mut self) -> TrxResult<i64> {
        let value = self.core.lo_chan()?.attr_read_i64("frequency")?;
        self.core.params.lo_frequency = value;
        Ok(value)
    }

    pub fn lo_frequency_range(&self) -> RangeI64 {
        self.core.params.lo_range
    }

    pub fn set_lo_frequency(&mut self, hz: i64) -> TrxResult<()> {
        let range = self.core.params.lo_range;
        if !range.contains(hz) {
            return Err(TrxError::OutOfRange {
                value: hz as f64,
                min: range.min as f64,
                max: range.max as f64,
            });
        }

        self.core.lo_chan_mut()?.attr_write_i64("frequency", hz)?;
        self.core.params.lo_frequency = hz;
        Ok(())
    }

    pub fn lo_power(&self) -> TrxResult<bool> {
        let powered_down = self.core.lo_chan()?.attr_read_i64("powerdown")?;
        Ok(powered_down == 0)
    }

    /// The power-down switch of this family sits on the PHY channel.
    pub fn set_lo_power(&mut self, enable: bool) -> TrxResult<()> {
        self.core
            .phy_chan_mut()?
            .attr_write_i64("powerdown", i64::from(!enable))
    }

    pub fn nco_gain_scale(&mut self) -> TrxResult<f64> {
        Err(TrxError::Unsupported("NCO gain scale on ADRV9009"))
    }

    pub fn set_nco_gain_scale(&mut self, _scale: f64) -> TrxResult<()> {
        Err(TrxError::Unsupported("NCO gain scale on ADRV9009"))
    }

    pub fn sampling_frequency(&mut self) -> TrxResult<i64> {
        let value = self.core.phy_chan()?.attr_read_i64("sampling_frequency")?;
        self.core.params.sampling_frequency = value;
        Ok(value)
    }

    pub fn sampling_frequency_range(&self) -> RangeI64 {
        self.core.params.sampling_range
    }

    /// Sampling frequency is fixed on this family.
    pub fn set_sampling_frequency(&mut self, _hz: i64) -> TrxResult<()> {
        Err(TrxError::Unsupported(
            "sampling frequency is fixed on ADRV9009",
        ))
    }

    pub fn load_signal(&mut self, signal: Arc<SignalData>) -> TrxResult<()> {
        self.core.load_signal(signal)
    }

    pub fn set_dump_filename(&mut self, filename: impl Into<String>) {
        self.core.set_dump_filename(filename);
    }

    pub fn start_streaming(&mut self) -> TrxResult<()> {
        self.core.start_streaming(DAC_BITS)
    }

    pub fn stop_streaming(&mut self) -> TrxResult<()> {
        self.core.stop_streaming()
    }
}
