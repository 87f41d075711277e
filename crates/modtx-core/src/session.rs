//! Parse session: worker thread plus completion channel
//!
//! Parsing never runs on the caller's thread. [`ParseSession::begin`]
//! hands a parse job to a worker thread and the caller later collects
//! the single completion notification, either by polling
//! ([`ParseSession::try_complete`]) or by blocking
//! ([`ParseSession::wait`]).
//!
//! The session drives a small state machine:
//!
//! ```text
//! Idle ──begin──▶ Parsing ──success──▶ Ready ──begin──▶ Parsing ...
//!                    │
//!                    └──failure──▶ Idle (or Ready, if a store was
//!                                  published by an earlier parse)
//! ```
//!
//! The store is swapped only on a successful outcome, so a failed parse
//! leaves previously loaded data untouched. Parses are serialized: a
//! second `begin` while one is running is rejected. There is no
//! cancellation of an in-flight parse.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::dataset::DatasetKind;
use crate::error::{DatasetError, DatasetResult};
use crate::modulation::ModulationName;
use crate::store::DatasetStore;
use crate::types::SignalData;

/// A parse job: runs on the worker thread and produces a complete store.
pub type ParseJob = Box<dyn FnOnce() -> DatasetResult<DatasetStore> + Send + 'static>;

/// Session state as seen by the presenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// No dataset loaded
    Idle,
    /// A parser worker is running
    Parsing,
    /// A dataset is loaded and transmit may proceed
    Ready,
}

/// Single-delivery completion notification of one parse
pub struct ParseOutcome {
    pub kind: DatasetKind,
    pub result: DatasetResult<DatasetStore>,
}

/// Owner of the published dataset store and the parser worker
pub struct ParseSession {
    state: ParseState,
    published: Option<(DatasetKind, DatasetStore)>,
    pending_kind: Option<DatasetKind>,
    completion: Option<Receiver<ParseOutcome>>,
    worker: Option<JoinHandle<()>>,
}

impl Default for ParseSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseSession {
    pub fn new() -> Self {
        Self {
            state: ParseState::Idle,
            published: None,
            pending_kind: None,
            completion: None,
            worker: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Start a parse on a worker thread. Rejected while another parse
    /// is running.
    pub fn begin(&mut self, kind: DatasetKind, job: ParseJob) -> DatasetResult<()> {
        if self.state == ParseState::Parsing {
            return Err(DatasetError::ParseInProgress);
        }

        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("dataset-parser".into())
            .spawn(move || {
                let result = job();
                let _ = tx.send(ParseOutcome { kind, result });
            })?;

        info!(dataset = kind.label(), "parse started");
        self.completion = Some(rx);
        self.worker = Some(worker);
        self.pending_kind = Some(kind);
        self.state = ParseState::Parsing;
        Ok(())
    }

    /// Non-blocking: consume the completion notification if one has
    /// arrived. `None` while the worker is still running or no parse is
    /// pending.
    pub fn try_complete(&mut self) -> Option<DatasetResult<DatasetKind>> {
        let rx = self.completion.as_ref()?;

        match rx.try_recv() {
            Ok(outcome) => Some(self.finish(outcome)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                let kind = self.pending_kind.take().expect("a parse was pending");
                Some(self.finish(ParseOutcome {
                    kind,
                    result: Err(DatasetError::format("parser worker disappeared")),
                }))
            }
        }
    }

    /// Block until the pending parse completes.
    pub fn wait(&mut self) -> DatasetResult<DatasetKind> {
        let rx = self
            .completion
            .as_ref()
            .ok_or_else(|| DatasetError::format("no parse is pending"))?;

        let outcome = match rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => {
                let kind = self.pending_kind.take().expect("a parse was pending");
                ParseOutcome {
                    kind,
                    result: Err(DatasetError::format("parser worker disappeared")),
                }
            }
        };

        self.finish(outcome)
    }

    fn finish(&mut self, outcome: ParseOutcome) -> DatasetResult<DatasetKind> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.completion = None;
        self.pending_kind = None;

        match outcome.result {
            Ok(store) => {
                info!(
                    dataset = outcome.kind.label(),
                    entries = store.len(),
                    "parse finished"
                );
                self.published = Some((outcome.kind, store));
                self.state = ParseState::Ready;
                Ok(outcome.kind)
            }
            Err(err) => {
                warn!(dataset = outcome.kind.label(), error = %err, "Parsing failed.");
                self.state = if self.published.is_some() {
                    ParseState::Ready
                } else {
                    ParseState::Idle
                };
                Err(err)
            }
        }
    }

    /// Kind of the published dataset, when one is loaded.
    pub fn dataset(&self) -> Option<DatasetKind> {
        self.published.as_ref().map(|(kind, _)| *kind)
    }

    /// The published store; `None` outside `Ready`.
    pub fn store(&self) -> Option<&DatasetStore> {
        if self.state != ParseState::Ready {
            return None;
        }
        self.published.as_ref().map(|(_, store)| store)
    }

    /// Signal for one combination; `None` outside `Ready`. The `Arc`
    /// keeps the data immutable and alive for the transmit session.
    pub fn signal(&self, name: ModulationName, snr_db: i32) -> Option<Arc<SignalData>> {
        self.store()?.signal(name, snr_db)
    }
}
