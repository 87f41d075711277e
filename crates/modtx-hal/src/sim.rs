//! In-memory transport backend
//!
//! Implements the [`crate::iio`] trait family over a shared in-memory
//! tree of contexts, devices, channels and attributes. Used by the test
//! suite and by hardware-less runs; pushed buffers are captured so a
//! test can assert on the exact DAC words a variant produced.
//!
//! The presets ([`SimBackend::add_pluto`] and friends) install a
//! plausible attribute tree for each supported family.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{TrxError, TrxResult};
use crate::iio::{IioBackend, IioBuffer, IioChannel, IioContext, IioDevice, ScanEntry};

#[derive(Debug, Default)]
struct ChannelState {
    attrs: HashMap<String, String>,
    enabled: bool,
}

#[derive(Debug, Default)]
struct DeviceState {
    channels: HashMap<(String, bool), ChannelState>,
    kernel_buffers: u32,
    registers: HashMap<u16, u8>,
    /// Every buffer pushed to this device, in push order
    pushed: Vec<Vec<i16>>,
    fail_buffer_alloc: bool,
}

#[derive(Debug, Default)]
struct ContextState {
    devices: HashMap<String, DeviceState>,
}

#[derive(Debug, Default)]
struct SimTree {
    scan: Vec<ScanEntry>,
    contexts: HashMap<String, ContextState>,
}

/// Shared in-memory transport tree
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    tree: Arc<Mutex<SimTree>>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimTree> {
        self.tree.lock().expect("sim tree lock")
    }

    /// Report a context from [`IioBackend::scan`].
    pub fn add_scan_entry(&self, uri: &str, description: &str) {
        self.lock().scan.push(ScanEntry::new(uri, description));
    }

    /// Create an empty context reachable through [`IioBackend::open`].
    pub fn add_context(&self, uri: &str) {
        self.lock().contexts.entry(uri.into()).or_default();
    }

    pub fn add_device(&self, uri: &str, device: &str) {
        self.lock()
            .contexts
            .entry(uri.into())
            .or_default()
            .devices
            .entry(device.into())
            .or_default();
    }

    pub fn add_channel(&self, uri: &str, device: &str, channel: &str, output: bool) {
        self.lock()
            .contexts
            .entry(uri.into())
            .or_default()
            .devices
            .entry(device.into())
            .or_default()
            .channels
            .entry((channel.into(), output))
            .or_default();
    }

    /// Set an attribute on a channel, creating the channel if needed.
    pub fn set_attr(
        &self,
        uri: &str,
        device: &str,
        channel: &str,
        output: bool,
        attr: &str,
        value: &str,
    ) {
        self.lock()
            .contexts
            .entry(uri.into())
            .or_default()
            .devices
            .entry(device.into())
            .or_default()
            .channels
            .entry((channel.into(), output))
            .or_default()
            .attrs
            .insert(attr.into(), value.into());
    }

    /// Current attribute text, as the hardware would report it.
    pub fn attr(
        &self,
        uri: &str,
        device: &str,
        channel: &str,
        output: bool,
        attr: &str,
    ) -> Option<String> {
        self.lock()
            .contexts
            .get(uri)?
            .devices
            .get(device)?
            .channels
            .get(&(channel.into(), output))?
            .attrs
            .get(attr)
            .cloned()
    }

    /// Buffers pushed to a streaming device, in push order.
    pub fn pushed_buffers(&self, uri: &str, device: &str) -> Vec<Vec<i16>> {
        self.lock()
            .contexts
            .get(uri)
            .and_then(|c| c.devices.get(device))
            .map(|d| d.pushed.clone())
            .unwrap_or_default()
    }

    /// Make the next buffer allocation on a device fail.
    pub fn fail_buffer_alloc(&self, uri: &str, device: &str, fail: bool) {
        if let Some(dev) = self
            .lock()
            .contexts
            .get_mut(uri)
            .and_then(|c| c.devices.get_mut(device))
        {
            dev.fail_buffer_alloc = fail;
        }
    }

    /// Whether a channel has been enabled by the HAL.
    pub fn channel_enabled(&self, uri: &str, device: &str, channel: &str, output: bool) -> bool {
        self.lock()
            .contexts
            .get(uri)
            .and_then(|c| c.devices.get(device))
            .and_then(|d| d.channels.get(&(channel.into(), output)))
            .map(|c| c.enabled)
            .unwrap_or(false)
    }

    /// Install an AD9361/Pluto-shaped context.
    pub fn add_pluto(&self, uri: &str, description: &str) {
        self.add_scan_entry(uri, description);

        let phy = "ad9361-phy";
        self.set_attr(uri, phy, "voltage0", true, "rf_bandwidth", "18000000");
        self.set_attr(
            uri,
            phy,
            "voltage0",
            true,
            "rf_bandwidth_available",
            "[200000 1 40000000]",
        );
        self.set_attr(uri, phy, "voltage0", true, "sampling_frequency", "30720000");
        self.set_attr(
            uri,
            phy,
            "voltage0",
            true,
            "sampling_frequency_available",
            "[2083333 1 61440000]",
        );
        self.set_attr(uri, phy, "voltage0", true, "hardwaregain", "-10.00 dB");
        self.set_attr(uri, phy, "voltage0", true, "hardwaregain_available", "[-89.75]");
        self.set_attr(uri, phy, "altvoltage1", true, "frequency", "2400000000");
        self.set_attr(
            uri,
            phy,
            "altvoltage1",
            true,
            "frequency_available",
            "[46875001 1 6000000000]",
        );
        self.set_attr(uri, phy, "altvoltage1", true, "powerdown", "0");

        let tx = "cf-ad9361-dds-core-lpc";
        self.add_channel(uri, tx, "voltage0", true);
        self.add_channel(uri, tx, "voltage1", true);
    }

    /// Install an ADRV9009-shaped context.
    pub fn add_adrv9009(&self, uri: &str, description: &str) {
        self.add_scan_entry(uri, description);

        let phy = "adrv9009-phy";
        self.set_attr(uri, phy, "voltage0", true, "rf_bandwidth", "100000000");
        self.set_attr(uri, phy, "voltage0", true, "sampling_frequency", "122880000");
        self.set_attr(uri, phy, "voltage0", true, "hardwaregain", "-10.00 dB");
        self.set_attr(uri, phy, "voltage0", true, "powerdown", "0");
        self.set_attr(uri, phy, "altvoltage0", true, "frequency", "2400000000");
        self.set_attr(uri, phy, "altvoltage0", true, "powerdown", "0");

        let tx = "axi-adrv9009-tx-hpc";
        self.add_channel(uri, tx, "voltage0", true);
        self.add_channel(uri, tx, "voltage1", true);
    }

    /// Install an AD9081-shaped context.
    pub fn add_ad9081(&self, uri: &str, description: &str) {
        self.add_scan_entry(uri, description);

        let rx = "axi-ad9081-rx-hpc";
        let nco = "voltage0_i";
        self.set_attr(uri, rx, nco, true, "main_nco_frequency", "1000000000");
        self.set_attr(
            uri,
            rx,
            nco,
            true,
            "main_nco_frequency_available",
            "[-6000000000 1 6000000000]",
        );
        self.set_attr(uri, rx, nco, true, "main_nco_phase", "0");
        self.set_attr(uri, rx, nco, true, "main_nco_test_tone_en", "0");
        self.set_attr(uri, rx, nco, true, "main_nco_test_tone_scale", "0");
        self.set_attr(uri, rx, nco, true, "channel_nco_frequency", "0");
        self.set_attr(uri, rx, nco, true, "channel_nco_phase", "0");
        self.set_attr(uri, rx, nco, true, "channel_nco_test_tone_en", "0");
        self.set_attr(uri, rx, nco, true, "channel_nco_test_tone_scale", "0");
        self.set_attr(uri, rx, nco, true, "channel_nco_gain_scale", "0.5");
        self.set_attr(uri, rx, nco, true, "sampling_frequency", "4000000000");
        self.set_attr(uri, rx, nco, true, "en", "1");

        let tx = "axi-ad9081-tx-hpc";
        self.add_channel(uri, tx, "voltage0_i", true);
        self.add_channel(uri, tx, "voltage0_q", true);
    }
}

impl IioBackend for SimBackend {
    fn scan(&self) -> Vec<ScanEntry> {
        self.lock().scan.clone()
    }

    fn open(&self, uri: &str) -> TrxResult<Box<dyn IioContext>> {
        if !self.lock().contexts.contains_key(uri) {
            return Err(TrxError::ContextOpenFailed(uri.into()));
        }

        Ok(Box::new(SimContext {
            uri: uri.into(),
            tree: self.tree.clone(),
        }))
    }
}

struct SimContext {
    uri: String,
    tree: Arc<Mutex<SimTree>>,
}

impl SimContext {
    fn lock(&self) -> MutexGuard<'_, SimTree> {
        self.tree.lock().expect("sim tree lock")
    }
}

impl IioContext for SimContext {
    fn device_count(&self) -> usize {
        self.lock()
            .contexts
            .get(&self.uri)
            .map(|c| c.devices.len())
            .unwrap_or(0)
    }

    fn find_device(&self, name: &str) -> Option<Box<dyn IioDevice>> {
        let tree = self.lock();
        let context = tree.contexts.get(&self.uri)?;
        if !context.devices.contains_key(name) {
            return None;
        }

        Some(Box::new(SimDevice {
            uri: self.uri.clone(),
            device: name.into(),
            tree: self.tree.clone(),
        }))
    }
}

struct SimDevice {
    uri: String,
    device: String,
    tree: Arc<Mutex<SimTree>>,
}

impl SimDevice {
    fn with_state<T>(&self, f: impl FnOnce(&mut DeviceState) -> T) -> Option<T> {
        let mut tree = self.tree.lock().expect("sim tree lock");
        tree.contexts
            .get_mut(&self.uri)?
            .devices
            .get_mut(&self.device)
            .map(f)
    }
}

impl IioDevice for SimDevice {
    fn find_channel(&self, name: &str, output: bool) -> Option<Box<dyn IioChannel>> {
        let exists = self
            .with_state(|dev| dev.channels.contains_key(&(name.into(), output)))
            .unwrap_or(false);
        if !exists {
            return None;
        }

        Some(Box::new(SimChannel {
            uri: self.uri.clone(),
            device: self.device.clone(),
            channel: name.into(),
            output,
            tree: self.tree.clone(),
        }))
    }

    fn set_kernel_buffers_count(&mut self, count: u32) -> TrxResult<()> {
        self.with_state(|dev| dev.kernel_buffers = count)
            .ok_or_else(|| TrxError::DeviceMissing(self.device.clone()))
    }

    fn create_buffer(&mut self, iq_pairs: usize, cyclic: bool) -> TrxResult<Box<dyn IioBuffer>> {
        let fail = self
            .with_state(|dev| dev.fail_buffer_alloc)
            .ok_or_else(|| TrxError::DeviceMissing(self.device.clone()))?;
        if fail {
            return Err(TrxError::BufferAllocFailed(iq_pairs));
        }

        Ok(Box::new(SimBuffer {
            uri: self.uri.clone(),
            device: self.device.clone(),
            iq_pairs,
            _cyclic: cyclic,
            words: vec![0; 2 * iq_pairs],
            tree: self.tree.clone(),
        }))
    }

    fn reg_read(&mut self, address: u16) -> TrxResult<u8> {
        self.with_state(|dev| dev.registers.get(&address).copied().unwrap_or(0))
            .ok_or_else(|| TrxError::DeviceMissing(self.device.clone()))
    }

    fn reg_write(&mut self, address: u16, value: u8) -> TrxResult<()> {
        self.with_state(|dev| {
            dev.registers.insert(address, value);
        })
        .ok_or_else(|| TrxError::DeviceMissing(self.device.clone()))
    }
}

struct SimChannel {
    uri: String,
    device: String,
    channel: String,
    output: bool,
    tree: Arc<Mutex<SimTree>>,
}

impl SimChannel {
    fn with_state<T>(&self, f: impl FnOnce(&mut ChannelState) -> T) -> Option<T> {
        let mut tree = self.tree.lock().expect("sim tree lock");
        tree.contexts
            .get_mut(&self.uri)?
            .devices
            .get_mut(&self.device)?
            .channels
            .get_mut(&(self.channel.clone(), self.output))
            .map(f)
    }
}

impl IioChannel for SimChannel {
    fn enable(&mut self) {
        self.with_state(|ch| ch.enabled = true);
    }

    fn disable(&mut self) {
        self.with_state(|ch| ch.enabled = false);
    }

    fn attr_read(&self, attr: &str) -> TrxResult<String> {
        self.with_state(|ch| ch.attrs.get(attr).cloned())
            .flatten()
            .ok_or_else(|| TrxError::AttributeReadFailed(attr.into()))
    }

    fn attr_read_i64(&self, attr: &str) -> TrxResult<i64> {
        self.attr_read(attr)?
            .trim()
            .parse()
            .map_err(|_| TrxError::AttributeReadFailed(attr.into()))
    }

    fn attr_read_f64(&self, attr: &str) -> TrxResult<f64> {
        self.attr_read(attr)?
            .split_whitespace()
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| TrxError::AttributeReadFailed(attr.into()))
    }

    fn attr_write_i64(&mut self, attr: &str, value: i64) -> TrxResult<()> {
        self.with_state(|ch| {
            ch.attrs.insert(attr.into(), value.to_string());
        })
        .ok_or_else(|| TrxError::AttributeWriteFailed(attr.into()))
    }

    fn attr_write_f64(&mut self, attr: &str, value: f64) -> TrxResult<()> {
        self.with_state(|ch| {
            ch.attrs.insert(attr.into(), format!("{:.6}", value));
        })
        .ok_or_else(|| TrxError::AttributeWriteFailed(attr.into()))
    }
}

struct SimBuffer {
    uri: String,
    device: String,
    iq_pairs: usize,
    _cyclic: bool,
    words: Vec<i16>,
    tree: Arc<Mutex<SimTree>>,
}

impl IioBuffer for SimBuffer {
    fn iq_pairs(&self) -> usize {
        self.iq_pairs
    }

    fn fill(&mut self, words: &[i16]) -> TrxResult<()> {
        if words.len() != 2 * self.iq_pairs {
            return Err(TrxError::BufferAllocFailed(self.iq_pairs));
        }
        self.words.copy_from_slice(words);
        Ok(())
    }

    fn push(&mut self) -> TrxResult<()> {
        let mut tree = self.tree.lock().expect("sim tree lock");
        let device = tree
            .contexts
            .get_mut(&self.uri)
            .and_then(|c| c.devices.get_mut(&self.device))
            .ok_or_else(|| TrxError::DeviceMissing(self.device.clone()))?;

        device.pushed.push(self.words.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_and_open() {
        let sim = SimBackend::new();
        sim.add_pluto("usb:1.2.5", "Analog Devices PlutoSDR (AD9363)");

        let entries = sim.scan();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].uri, "usb:1.2.5");

        assert!(sim.open("usb:1.2.5").is_ok());
        assert!(matches!(
            sim.open("usb:9.9.9"),
            Err(TrxError::ContextOpenFailed(_))
        ));
    }

    #[test]
    fn attribute_round_trip() {
        let sim = SimBackend::new();
        sim.add_pluto("usb:1.2.5", "PlutoSDR");

        let ctx = sim.open("usb:1.2.5").unwrap();
        let phy = ctx.find_device("ad9361-phy").unwrap();
        let mut chan = phy.find_channel("altvoltage1", true).unwrap();

        assert_eq!(chan.attr_read_i64("frequency").unwrap(), 2_400_000_000);
        chan.attr_write_i64("frequency", 915_000_000).unwrap();
        assert_eq!(chan.attr_read_i64("frequency").unwrap(), 915_000_000);
        assert!(matches!(
            chan.attr_read("no_such_attr"),
            Err(TrxError::AttributeReadFailed(_))
        ));
    }

    #[test]
    fn buffers_are_captured() {
        let sim = SimBackend::new();
        sim.add_pluto("usb:1.2.5", "PlutoSDR");

        let ctx = sim.open("usb:1.2.5").unwrap();
        let mut tx = ctx.find_device("cf-ad9361-dds-core-lpc").unwrap();

        let mut buffer = tx.create_buffer(2, true).unwrap();
        buffer.fill(&[1, -1, 2, -2]).unwrap();
        buffer.push().unwrap();

        let pushed = sim.pushed_buffers("usb:1.2.5", "cf-ad9361-dds-core-lpc");
        assert_eq!(pushed, vec![vec![1, -1, 2, -2]]);
    }

    #[test]
    fn buffer_allocation_can_fail() {
        let sim = SimBackend::new();
        sim.add_pluto("usb:1.2.5", "PlutoSDR");
        sim.fail_buffer_alloc("usb:1.2.5", "cf-ad9361-dds-core-lpc", true);

        let ctx = sim.open("usb:1.2.5").unwrap();
        let mut tx = ctx.find_device("cf-ad9361-dds-core-lpc").unwrap();
        assert!(matches!(
            tx.create_buffer(16, true),
            Err(TrxError::BufferAllocFailed(16))
        ));
    }
}
