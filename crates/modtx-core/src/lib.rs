//! # Modulation Replay Core
//!
//! This crate ingests pre-recorded RF modulation datasets into a single
//! in-memory representation indexed by `(modulation, SNR)`.
//!
//! Three on-disk dataset families are supported:
//!
//! - **RadioML 2016.10A** — a serialized-object (pickle) container holding
//!   a dict keyed by `('<modulation>', snr_dB)` tuples
//! - **RadioML 2018.01** — a hierarchical (HDF5-style) container with the
//!   `X`/`Y`/`Z` cube layout; parsed one modulation at a time because the
//!   full cube is ~19.5 GB
//! - **HisarMod 2019.1** — a CSV file with one 1024-point frame per line
//!
//! ## Data Flow
//!
//! ```text
//! file ──parser──▶ DatasetStore ──(modulation, SNR)──▶ SignalData ──▶ TX HAL
//! ```
//!
//! Parsers run on a worker thread managed by [`session::ParseSession`];
//! a finished parse publishes its store atomically, so a failed parse
//! never disturbs previously loaded data.

pub mod csv_parser;
pub mod dataset;
pub mod error;
pub mod hdf5_parser;
pub mod modulation;
pub mod pkl_parser;
pub mod session;
pub mod store;
pub mod types;

pub use dataset::DatasetKind;
pub use error::{DatasetError, DatasetResult};
pub use modulation::{ModulationFamily, ModulationKind, ModulationName, ModulationRegistry};
pub use session::{ParseOutcome, ParseSession, ParseState};
pub use store::DatasetStore;
pub use types::{FrameData, IqPoint, SignalData};
