//! Industrial-I/O transport abstraction
//!
//! The concrete transport (libiio over USB, IP or local backends) is
//! out of scope; the HAL consumes it through this trait family as an
//! opaque key/value attribute bus with a bulk DMA buffer API. The
//! layering mirrors the transport's object model:
//!
//! ```text
//! IioBackend ──open(uri)──▶ IioContext ──find_device──▶ IioDevice
//!                                            │
//!                              find_channel ─┴─ create_buffer
//!                                  │                  │
//!                              IioChannel         IioBuffer
//! ```
//!
//! [`crate::sim::SimBackend`] implements the family in memory; a real
//! libiio binding would implement it over FFI.

use serde::{Deserialize, Serialize};

use crate::error::TrxResult;

/// One discovered transport context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    /// Addressing handle (`usb:...`, `ip:...`, `local:`)
    pub uri: String,
    /// Human-readable description; variant selection matches on this
    pub description: String,
}

impl ScanEntry {
    pub fn new(uri: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            description: description.into(),
        }
    }
}

/// Entry point: context enumeration and opening
pub trait IioBackend: Send {
    /// Enumerate contexts visible on the system bus, discovery order.
    fn scan(&self) -> Vec<ScanEntry>;

    /// Open a transport context by URI.
    fn open(&self, uri: &str) -> TrxResult<Box<dyn IioContext>>;
}

/// An open transport context
pub trait IioContext: Send {
    fn device_count(&self) -> usize;

    /// Look up a device by name.
    fn find_device(&self, name: &str) -> Option<Box<dyn IioDevice>>;
}

/// A PHY or streaming sub-device
pub trait IioDevice: Send {
    /// Look up a channel by id; `output` selects the direction.
    fn find_channel(&self, name: &str, output: bool) -> Option<Box<dyn IioChannel>>;

    /// Number of kernel buffers backing the DMA ring.
    fn set_kernel_buffers_count(&mut self, count: u32) -> TrxResult<()>;

    /// Create a DMA buffer with `iq_pairs` sample slots.
    fn create_buffer(&mut self, iq_pairs: usize, cyclic: bool) -> TrxResult<Box<dyn IioBuffer>>;

    /// Debug register access on the device.
    fn reg_read(&mut self, address: u16) -> TrxResult<u8>;
    fn reg_write(&mut self, address: u16, value: u8) -> TrxResult<()>;
}

/// One control or streaming channel of a device
pub trait IioChannel: Send {
    fn enable(&mut self);
    fn disable(&mut self);

    /// Raw attribute text.
    fn attr_read(&self, attr: &str) -> TrxResult<String>;
    fn attr_read_i64(&self, attr: &str) -> TrxResult<i64>;
    fn attr_read_f64(&self, attr: &str) -> TrxResult<f64>;

    fn attr_write_i64(&mut self, attr: &str, value: i64) -> TrxResult<()>;
    fn attr_write_f64(&mut self, attr: &str, value: f64) -> TrxResult<()>;
}

/// A DMA sample buffer owned by one streaming device
pub trait IioBuffer: Send {
    /// Number of `(I, Q)` slots.
    fn iq_pairs(&self) -> usize;

    /// Fill the buffer with interleaved 16-bit I/Q words
    /// (`words.len() == 2 * iq_pairs()`).
    fn fill(&mut self, words: &[i16]) -> TrxResult<()>;

    /// Hand the buffer to the hardware. A cyclic buffer replays until
    /// replaced.
    fn push(&mut self) -> TrxResult<()>;
}
