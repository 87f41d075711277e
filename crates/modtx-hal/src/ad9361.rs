//! AD9361 / AD9363 / AD9364 family (PlutoSDR) — baseband transceiver
//!
//! 12-bit DAC, so converted samples are shifted left by 4. All tuning
//! ranges come from the attribute bus as `"[min step max]"` text; the
//! hardware-gain range has a variable lower bound reported by
//! `hardwaregain_available`. Sampling frequency is tunable and set to
//! 2.5 MHz at init (above the family's 2.083 MHz minimum).

use std::sync::Arc;

use modtx_core::SignalData;
use tracing::debug;

use crate::error::{TrxError, TrxResult};
use crate::iio::IioBackend;
use crate::range::{parse_f64_limit, parse_i64_range, token_f64, RangeF64, RangeI64};
use crate::trx::{TrxCore, TxParameters};

pub const PHY_DEVICE: &str = "ad9361-phy";
pub const TX_DEVICE: &str = "cf-ad9361-dds-core-lpc";
pub const DAC_BITS: u32 = 12;

/// Reference transmit rate applied at init; the sampling-rate policy
/// scales it by the dataset frame-length ratio.
pub const REFERENCE_SAMPLING_FREQUENCY: i64 = 2_500_000;

const GAIN_STEP_DB: f64 = 0.25;

/// Transmit path of one AD9361-family device
#[derive(Default)]
pub struct Ad9361Trx {
    core: TrxCore,
}

impl Ad9361Trx {
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
    /// I/Q channels, query all tuning ranges and apply the init
    /// settings (max gain, max bandwidth, 2.5 MHz sampling rate).
    pub fn initialize(&mut self, backend: &dyn IioBackend, uri: &str) -> TrxResult<()> {
        let context = backend.open(uri)?;
        if context.device_count() == 0 {
            return Err(TrxError::ContextOpenFailed(uri.into()));
        }

        let phy_dev = context
            .find_device(PHY_DEVICE)
            .ok_or_else(|| TrxError::DeviceMissing(PHY_DEVICE.into()))?;
        let mut tx_dev = context
            .find_device(TX_DEVICE)
            .ok_or_else(|| TrxError::DeviceMissing(TX_DEVICE.into()))?;

        let phy_chan = phy_dev
            .find_channel("voltage0", true)
            .ok_or_else(|| TrxError::ChannelMissing("voltage0".into()))?;
        let lo_chan = phy_dev
            .find_channel("altvoltage1", true)
            .ok_or_else(|| TrxError::ChannelMissing("altvoltage1".into()))?;
        let mut tx_i = tx_dev
            .find_channel("voltage0", true)
            .ok_or_else(|| TrxError::ChannelMissing("voltage0".into()))?;
        let mut tx_q = tx_dev
            .find_channel("voltage1", true)
            .ok_or_else(|| TrxError::ChannelMissing("voltage1".into()))?;

        tx_i.enable();
        tx_q.enable();
        tx_dev.set_kernel_buffers_count(1)?;

        self.core.context = Some(context);
        self.core.phy_dev = Some(phy_dev);
        self.core.tx_dev = Some(tx_dev);
        self.core.phy_chan = Some(phy_chan);
        self.core.lo_chan = Some(lo_chan);
        self.core.tx_i = Some(tx_i);
        self.core.tx_q = Some(tx_q);

        self.core.reset_tx_buffer(0, true)?;

        self.query_bandwidth_range()?;
        self.query_sampling_frequency_range()?;
        self.query_lo_frequency_range()?;
        self.query_hw_gain_range()?;

        let max_gain = self.core.params.hw_gain_range.max;
        self.set_hw_gain(max_gain)?;
        let max_bandwidth = self.core.params.bandwidth_range.max;
        self.set_bandwidth(max_bandwidth)?;
        self.set_sampling_frequency(REFERENCE_SAMPLING_FREQUENCY)?;

        self.core.initialized = true;
        debug!(uri, "AD9361 transmit path initialized");
        Ok(())
    }

    pub fn free_resources(&mut self) {
        self.core.free_resources();
    }

    fn query_bandwidth_range(&mut self) -> TrxResult<()> {
        let text = self.core.phy_chan()?.attr_read("rf_bandwidth_available")?;
        self.core.params.bandwidth_range = parse_i64_range(&text)
            .ok_or_else(|| TrxError::AttributeReadFailed("rf_bandwidth_available".into()))?;
        Ok(())
    }

    fn query_sampling_frequency_range(&mut self) -> TrxResult<()> {
        let text = self
            .core
            .phy_chan()?
            .attr_read("sampling_frequency_available")?;
        self.core.params.sampling_range = parse_i64_range(&text)
            .ok_or_else(|| TrxError::AttributeReadFailed("sampling_frequency_available".into()))?;
        Ok(())
    }

    fn query_lo_frequency_range(&mut self) -> TrxResult<()> {
        let text = self.core.lo_chan()?.attr_read("frequency_available")?;
        self.core.params.lo_range = parse_i64_range(&text)
            .ok_or_else(|| TrxError::AttributeReadFailed("frequency_available".into()))?;
        Ok(())
    }

    /// Upper bound is 0 dB; the lower bound is device-reported.
    fn query_hw_gain_range(&mut self) -> TrxResult<()> {
        let text = self.core.phy_chan()?.attr_read("hardwaregain_available")?;
        let min = parse_f64_limit(&text)
            .ok_or_else(|| TrxError::AttributeReadFailed("hardwaregain_available".into()))?;
        self.core.params.hw_gain_range = RangeF64::new(min, GAIN_STEP_DB, 0.0);
        Ok(())
    }

    pub fn bandwidth(&mut self) -> TrxResult<i64> {
        let value = self.core.phy_chan()?.attr_read_i64("rf_bandwidth")?;
        self.core.params.bandwidth = value;
        Ok(value)
    }

    pub fn bandwidth_range(&self) -> RangeI64 {
        self.core.params.bandwidth_range
    }

    pub fn set_bandwidth(&mut self, hz: i64) -> TrxResult<()> {
        let range = self.core.params.bandwidth_range;
        if !range.contains(hz) {
            return Err(TrxError::OutOfRange {
                value: hz as f64,
                min: range.min as f64,
                max: range.max as f64,
            });
        }

        self.core.phy_chan_mut()?.attr_write_i64("rf_bandwidth", hz)?;
        self.core.params.bandwidth = hz;
        Ok(())
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

    pub fn set_lo_power(&mut self, enable: bool) -> TrxResult<()> {
        self.core
            .lo_chan_mut()?
            .attr_write_i64("powerdown", i64::from(!enable))
    }

    pub fn nco_gain_scale(&mut self) -> TrxResult<f64> {
        Err(TrxError::Unsupported("NCO gain scale on AD9361"))
    }

    pub fn set_nco_gain_scale(&mut self, _scale: f64) -> TrxResult<()> {
        Err(TrxError::Unsupported("NCO gain scale on AD9361"))
    }

    pub fn sampling_frequency(&mut self) -> TrxResult<i64> {
        let value = self.core.phy_chan()?.attr_read_i64("sampling_frequency")?;
        self.core.params.sampling_frequency = value;
        Ok(value)
    }

    pub fn sampling_frequency_range(&self) -> RangeI64 {
        self.core.params.sampling_range
    }

    pub fn set_sampling_frequency(&mut self, hz: i64) -> TrxResult<()> {
        let range = self.core.params.sampling_range;
        if !range.contains(hz) {
            return Err(TrxError::OutOfRange {
                value: hz as f64,
                min: range.min as f64,
                max: range.max as f64,
            });
        }

        self.core
            .phy_chan_mut()?
            .attr_write_i64("sampling_frequency", hz)?;
        self.core.params.sampling_frequency = hz;
        Ok(())
    }

    /// Debug register access on the PHY device.
    pub fn read_register(&mut self, address: u16) -> TrxResult<u8> {
        self.core.read_register(address)
    }

    pub fn write_register(&mut self, address: u16, value: u8) -> TrxResult<()> {
        self.core.write_register(address, value)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBackend;
    use modtx_core::IqPoint;

    const URI: &str = "usb:1.2.5";

    fn pluto() -> SimBackend {
        let sim = SimBackend::new();
        sim.add_pluto(URI, "Analog Devices PlutoSDR (AD9363)");
        sim
    }

    fn initialized(sim: &SimBackend) -> Ad9361Trx {
        let mut trx = Ad9361Trx::new();
        trx.initialize(sim, URI).unwrap();
        trx
    }

    #[test]
    fn init_applies_settings() {
        let sim = pluto();
        let trx = initialized(&sim);

        assert!(trx.is_initialized());
        let params = trx.parameters();
        assert_eq!(params.bandwidth_range, RangeI64::new(200_000, 1, 40_000_000));
        assert_eq!(
            params.sampling_range,
            RangeI64::new(2_083_333, 1, 61_440_000)
        );
        assert_eq!(
            params.lo_range,
            RangeI64::new(46_875_001, 1, 6_000_000_000)
        );
        assert_eq!(params.hw_gain_range, RangeF64::new(-89.75, 0.25, 0.0));

        // gain to max, bandwidth to max, sampling rate to 2.5 MHz
        assert_eq!(params.hw_gain_db, 0.0);
        assert_eq!(params.bandwidth, 40_000_000);
        assert_eq!(params.sampling_frequency, 2_500_000);
        assert_eq!(
            sim.attr(URI, PHY_DEVICE, "voltage0", true, "sampling_frequency"),
            Some("2500000".into())
        );
        assert!(sim.channel_enabled(URI, TX_DEVICE, "voltage0", true));
        assert!(sim.channel_enabled(URI, TX_DEVICE, "voltage1", true));
    }

    #[test]
    fn missing_phy_device_fails_init() {
        let sim = SimBackend::new();
        sim.add_context(URI);
        sim.add_channel(URI, TX_DEVICE, "voltage0", true);

        let mut trx = Ad9361Trx::new();
        assert!(matches!(
            trx.initialize(&sim, URI),
            Err(TrxError::DeviceMissing(_))
        ));
        assert!(!trx.is_initialized());
    }

    #[test]
    fn lo_setter_validates_range() {
        let sim = pluto();
        let mut trx = initialized(&sim);
        let before = trx.lo_frequency().unwrap();

        assert!(matches!(
            trx.set_lo_frequency(46_875_000),
            Err(TrxError::OutOfRange { .. })
        ));
        // cached value and hardware untouched on rejection
        assert_eq!(trx.parameters().lo_frequency, before);
        assert_eq!(
            sim.attr(URI, PHY_DEVICE, "altvoltage1", true, "frequency"),
            Some("2400000000".into())
        );

        trx.set_lo_frequency(915_000_000).unwrap();
        assert_eq!(trx.parameters().lo_frequency, 915_000_000);
        assert_eq!(trx.lo_frequency().unwrap(), 915_000_000);
    }

    #[test]
    fn streaming_converts_to_12_bit_words() {
        let sim = pluto();
        let mut trx = initialized(&sim);

        let mut signal = SignalData::new();
        signal.push_frame(vec![IqPoint::new(0.5, -1.0), IqPoint::new(1.0, 0.0)]);
        trx.load_signal(Arc::new(signal)).unwrap();
        trx.start_streaming().unwrap();

        let pushed = sim.pushed_buffers(URI, TX_DEVICE);
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0], vec![16368, -32752, 32752, 0]);

        trx.stop_streaming().unwrap();
        let pushed = sim.pushed_buffers(URI, TX_DEVICE);
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[1].len(), 2 * 1024);
        assert!(pushed[1].iter().all(|w| *w == 0));
    }

    #[test]
    fn streaming_without_signal_fails() {
        let sim = pluto();
        let mut trx = initialized(&sim);
        assert!(matches!(trx.start_streaming(), Err(TrxError::NoSignal)));
    }

    #[test]
    fn register_peek_poke() {
        let sim = pluto();
        let mut trx = initialized(&sim);

        assert_eq!(trx.read_register(0x3f4).unwrap(), 0);
        trx.write_register(0x3f4, 0x5a).unwrap();
        assert_eq!(trx.read_register(0x3f4).unwrap(), 0x5a);
    }

    #[test]
    fn lo_power_round_trip() {
        let sim = pluto();
        let mut trx = initialized(&sim);

        assert!(trx.lo_power().unwrap());
        trx.set_lo_power(false).unwrap();
        assert!(!trx.lo_power().unwrap());
        trx.set_lo_power(true).unwrap();
        assert!(trx.lo_power().unwrap());
    }
}
