//! # Transmit Hardware Abstraction Layer
//!
//! Streams dataset frames through Analog Devices SDR transmit
//! front-ends. Three device families are supported, each with its own
//! DAC resolution, attribute vocabulary and tuning ranges:
//!
//! | Family | PHY / streaming devices | DAC |
//! |---|---|---|
//! | AD9361 / Pluto | `ad9361-phy`, `cf-ad9361-dds-core-lpc` | 12-bit |
//! | ADRV9009 | `adrv9009-phy`, `axi-adrv9009-tx-hpc` | 14-bit |
//! | AD9081 / AD9082 | `axi-ad9081-tx-hpc` (+ `axi-ad9081-rx-hpc` NCO) | 16-bit |
//!
//! The industrial-I/O transport is consumed through the trait family in
//! [`iio`]; [`sim`] provides an in-memory implementation for tests and
//! hardware-less runs. [`hal::TxHal`] discovers contexts, selects the
//! matching variant and dispatches every parameter and streaming
//! operation to it.
//!
//! Normalized `(I, Q)` frames are converted to device-native fixed
//! point (`(x * SCALE) as i16 << shift` with
//! `SCALE = (2^(W-1) - 1) / max_abs`), marshalled into a cyclic DMA
//! buffer and pushed once; hardware then replays the buffer until a
//! zero-filled buffer silences it.

pub mod ad9081;
pub mod ad9361;
pub mod adrv9009;
pub mod error;
pub mod hal;
pub mod iio;
pub mod range;
pub mod sim;
pub mod trx;

pub use error::{TrxError, TrxResult};
pub use hal::{TxDeviceKind, TxHal, TxVariant, DEFAULT_IP_URI};
pub use iio::{IioBackend, IioBuffer, IioChannel, IioContext, IioDevice, ScanEntry};
pub use range::{RangeF64, RangeI64};
pub use sim::SimBackend;
pub use trx::TxParameters;
