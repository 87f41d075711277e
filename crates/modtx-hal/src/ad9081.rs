//! AD9081 / AD9082 family — mixed-signal front-end
//!
//! 16-bit DAC, no shift. Different topology from the other families:
//! there is no PHY device, only the Tx streaming device plus an Rx-side
//! control device whose `voltage0_i` output channel exposes the Tx NCO.
//! `main_nco_frequency` stands in for the LO, sampling frequency is
//! read-only, bandwidth and hardware gain are unsupported, and an NCO
//! gain scale in `[0, 1]` replaces the analog gain stage.

use std::sync::Arc;

use modtx_core::SignalData;
use tracing::debug;

use crate::error::{TrxError, TrxResult};
use crate::iio::IioBackend;
use crate::range::{parse_i64_range, RangeF64, RangeI64};
use crate::trx::{TrxCore, TxParameters};

pub const TX_DEVICE: &str = "axi-ad9081-tx-hpc";
pub const RX_DEVICE: &str = "axi-ad9081-rx-hpc";
pub const DAC_BITS: u32 = 16;

const NCO_GAIN_RANGE: RangeF64 = RangeF64::new(0.0, 0.0, 1.0);

/// Transmit path of one AD9081/AD9082 device
#[derive(Default)]
pub struct Ad9081Trx {
    core: TrxCore,
}

impl Ad9081Trx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.core.is_initialized()
    }

    pub fn parameters(&self) -> &TxParameters {
        self.core.parameters()
    }

    /// Open the context, locate the streaming and control devices,
    /// enable the I/Q channels and park the NCO stages: channel NCO at
    /// 0 Hz / 0 phase with test tones off, main NCO powered with test
    /// tones off.
    pub fn initialize(&mut self, backend: &dyn IioBackend, uri: &str) -> TrxResult<()> {
        let context = backend.open(uri)?;
        if context.device_count() == 0 {
            return Err(TrxError::ContextOpenFailed(uri.into()));
        }

        let tx_dev = context
            .find_device(TX_DEVICE)
            .ok_or_else(|| TrxError::DeviceMissing(TX_DEVICE.into()))?;
        let rx_dev = context
            .find_device(RX_DEVICE)
            .ok_or_else(|| TrxError::DeviceMissing(RX_DEVICE.into()))?;

        let nco_chan = rx_dev
            .find_channel("voltage0_i", true)
            .ok_or_else(|| TrxError::ChannelMissing("voltage0_i".into()))?;
        let mut tx_i = tx_dev
            .find_channel("voltage0_i", true)
            .ok_or_else(|| TrxError::ChannelMissing("voltage0_i".into()))?;
        let mut tx_q = tx_dev
            .find_channel("voltage0_q", true)
            .ok_or_else(|| TrxError::ChannelMissing("voltage0_q".into()))?;

        tx_i.enable();
        tx_q.enable();

        self.core.context = Some(context);
        self.core.tx_dev = Some(tx_dev);
        self.core.rx_dev = Some(rx_dev);
        self.core.nco_chan = Some(nco_chan);
        self.core.tx_i = Some(tx_i);
        self.core.tx_q = Some(tx_q);

        self.core.reset_tx_buffer(0, true)?;

        self.query_lo_frequency_range()?;
        self.query_sampling_frequency_range()?;

        {
            let nco = self.core.nco_chan_mut()?;
            nco.attr_write_i64("channel_nco_frequency", 0)?;
            nco.attr_write_i64("channel_nco_phase", 0)?;
            nco.attr_write_i64("channel_nco_test_tone_en", 0)?;
            nco.attr_write_f64("channel_nco_test_tone_scale", 0.0)?;
        }

        self.set_lo_power(true)?;

        {
            let nco = self.core.nco_chan_mut()?;
            nco.attr_write_i64("main_nco_phase", 0)?;
            nco.attr_write_i64("main_nco_test_tone_en", 0)?;
            nco.attr_write_i64("main_nco_test_tone_scale", 0)?;
        }

        self.core.initialized = true;
        debug!(uri, "AD9081 transmit path initialized");
        Ok(())
    }

    pub fn free_resources(&mut self) {
        self.core.free_resources();
    }

    fn query_lo_frequency_range(&mut self) -> TrxResult<()> {
        let text = self
            .core
            .nco_chan()?
            .attr_read("main_nco_frequency_available")?;
        self.core.params.lo_range = parse_i64_range(&text)
            .ok_or_else(|| TrxError::AttributeReadFailed("main_nco_frequency_available".into()))?;
        Ok(())
    }

    /// The converter rate is fixed; pin the range to whatever the
    /// device reports.
    fn query_sampling_frequency_range(&mut self) -> TrxResult<()> {
        let value = self.sampling_frequency()?;
        self.core.params.sampling_range = RangeI64::pinned(value);
        Ok(())
    }

    pub fn bandwidth(&mut self) -> TrxResult<i64> {
        Err(TrxError::Unsupported("bandwidth on AD9081"))
    }

    pub fn bandwidth_range(&self) -> RangeI64 {
        self.core.params.bandwidth_range
    }

    pub fn set_bandwidth(&mut self, _hz: i64) -> TrxResult<()> {
        Err(TrxError::Unsupported("bandwidth on AD9081"))
    }

    pub fn hw_gain(&mut self) -> TrxResult<f64> {
        Err(TrxError::Unsupported("hardware gain on AD9081"))
    }

    pub fn hw_gain_range(&self) -> RangeF64 {
        self.core.params.hw_gain_range
    }

    pub fn set_hw_gain(&mut self, _gain_db: f64) -> TrxResult<()> {
        Err(TrxError::Unsupported("hardware gain on AD9081"))
    }

    /// The main NCO stands in for the LO on this family.
    pub fn lo_frequency(&mut self) -> TrxResult<i64> {
        let value = self.core.nco_chan()?.attr_read_i64("main_nco_frequency")?;
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

        self.core
            .nco_chan_mut()?
            .attr_write_i64("main_nco_frequency", hz)?;
        self.core.params.lo_frequency = hz;
        Ok(())
    }

    pub fn lo_power(&self) -> TrxResult<bool> {
        Ok(self.core.nco_chan()?.attr_read_i64("en")? != 0)
    }

    pub fn set_lo_power(&mut self, enable: bool) -> TrxResult<()> {
        self.core
            .nco_chan_mut()?
            .attr_write_i64("en", i64::from(enable))
    }

    pub fn nco_gain_scale(&mut self) -> TrxResult<f64> {
        let value = self.core.nco_chan()?.attr_read_f64("channel_nco_gain_scale")?;
        self.core.params.nco_gain_scale = value;
        Ok(value)
    }

    pub fn set_nco_gain_scale(&mut self, scale: f64) -> TrxResult<()> {
        if !NCO_GAIN_RANGE.contains(scale) {
            return Err(TrxError::OutOfRange {
                value: scale,
                min: NCO_GAIN_RANGE.min,
                max: NCO_GAIN_RANGE.max,
            });
        }

        self.core
            .nco_chan_mut()?
            .attr_write_f64("channel_nco_gain_scale", scale)?;
        self.core.params.nco_gain_scale = scale;
        Ok(())
    }

    pub fn sampling_frequency(&mut self) -> TrxResult<i64> {
        let value = self.core.nco_chan()?.attr_read_i64("sampling_frequency")?;
        self.core.params.sampling_frequency = value;
        Ok(value)
    }

    pub fn sampling_frequency_range(&self) -> RangeI64 {
        self.core.params.sampling_range
    }

    /// The converter rate is read-only on this family.
    pub fn set_sampling_frequency(&mut self, _hz: i64) -> TrxResult<()> {
        Err(TrxError::Unsupported(
            "sampling frequency is read-only on AD9081",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBackend;
    use modtx_core::IqPoint;

    const URI: &str = "ip:10.0.0.2";

    fn ad9081() -> SimBackend {
        let sim = SimBackend::new();
        sim.add_ad9081(URI, "AD9081");
        sim
    }

    fn initialized(sim: &SimBackend) -> Ad9081Trx {
        let mut trx = Ad9081Trx::new();
        trx.initialize(sim, URI).unwrap();
        trx
    }

    #[test]
    fn init_parks_the_nco_stages() {
        let sim = ad9081();
        let trx = initialized(&sim);

        assert!(trx.is_initialized());
        assert_eq!(
            sim.attr(URI, RX_DEVICE, "voltage0_i", true, "channel_nco_frequency"),
            Some("0".into())
        );
        assert_eq!(
            sim.attr(URI, RX_DEVICE, "voltage0_i", true, "main_nco_test_tone_en"),
            Some("0".into())
        );
        assert_eq!(
            sim.attr(URI, RX_DEVICE, "voltage0_i", true, "en"),
            Some("1".into())
        );

        let params = trx.parameters();
        assert_eq!(
            params.lo_range,
            RangeI64::new(-6_000_000_000, 1, 6_000_000_000)
        );
        assert_eq!(params.sampling_range, RangeI64::pinned(4_000_000_000));
    }

    #[test]
    fn nco_stands_in_for_the_lo() {
        let sim = ad9081();
        let mut trx = initialized(&sim);

        trx.set_lo_frequency(1_500_000_000).unwrap();
        assert_eq!(trx.lo_frequency().unwrap(), 1_500_000_000);
        assert_eq!(
            sim.attr(URI, RX_DEVICE, "voltage0_i", true, "main_nco_frequency"),
            Some("1500000000".into())
        );

        assert!(matches!(
            trx.set_lo_frequency(7_000_000_000),
            Err(TrxError::OutOfRange { .. })
        ));
    }

    #[test]
    fn nco_gain_scale_bounds() {
        let sim = ad9081();
        let mut trx = initialized(&sim);

        assert_eq!(trx.nco_gain_scale().unwrap(), 0.5);

        trx.set_nco_gain_scale(1.0).unwrap();
        assert_eq!(trx.nco_gain_scale().unwrap(), 1.0);

        assert!(matches!(
            trx.set_nco_gain_scale(1.01),
            Err(TrxError::OutOfRange { .. })
        ));
        assert!(matches!(
            trx.set_nco_gain_scale(-0.01),
            Err(TrxError::OutOfRange { .. })
        ));
    }

    #[test]
    fn unsupported_parameters() {
        let sim = ad9081();
        let mut trx = initialized(&sim);

        assert!(matches!(trx.bandwidth(), Err(TrxError::Unsupported(_))));
        assert!(matches!(trx.hw_gain(), Err(TrxError::Unsupported(_))));
        assert!(matches!(
            trx.set_sampling_frequency(1),
            Err(TrxError::Unsupported(_))
        ));
    }

    #[test]
    fn streaming_converts_to_16_bit_words() {
        let sim = ad9081();
        let mut trx = initialized(&sim);

        let mut signal = SignalData::new();
        signal.push_frame(vec![IqPoint::new(1.0, -0.5), IqPoint::new(0.0, 1.0)]);
        trx.load_signal(Arc::new(signal)).unwrap();
        trx.start_streaming().unwrap();

        let pushed = sim.pushed_buffers(URI, TX_DEVICE);
        // no shift on the 16-bit DAC
        assert_eq!(pushed[0], vec![32767, -16383, 0, 32767]);
    }

    #[test]
    fn missing_control_device_fails_init() {
        let sim = SimBackend::new();
        sim.add_context(URI);
        sim.add_channel(URI, TX_DEVICE, "voltage0_i", true);
        sim.add_channel(URI, TX_DEVICE, "voltage0_q", true);

        let mut trx = Ad9081Trx::new();
        assert!(matches!(
            trx.initialize(&sim, URI),
            Err(TrxError::DeviceMissing(_))
        ));
    }
}
