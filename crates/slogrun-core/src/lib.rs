//! slogrun-core — single-pass run tracking and run classification for slogs.
//!
//! A slog is the line-delimited JSON event log written by a cosmic-swingset
//! node. This crate turns that stream into one summary per *run* (the burst
//! of deliveries triggered by a bridge message, a timer tick, or a
//! continuation):
//! - envelope decoding of each line into a [`Record`],
//! - the payload decode step for embedded capdata bodies ([`payload`]),
//! - layered wallet-action variants ([`wallet`]),
//! - the pure [`Classifier`] decision tree,
//! - the stateful [`RunTracker`] automaton and its extraction sinks, and
//! - a streaming line reader for multi-gigabyte inputs ([`io_jsonl`]).
//!
//! ```no_run
//! use slogrun_core::{ClassifierConfig, MemorySink, RunTracker};
//! let mut tracker = RunTracker::new(ClassifierConfig::default(), ["push-price"], MemorySink::default());
//! for line in ["{\"type\":\"cosmic-swingset-begin-block\",\"blockHeight\":7}"] {
//!     if let Some(summary) = tracker.ingest(line)? {
//!         println!("{summary}");
//!     }
//! }
//! # Ok::<(), slogrun_core::TrackError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// Category labels assigned to runs.
pub mod category;
/// The run classification decision tree.
pub mod classify;
/// Deployment-specific signatures (timer and bundle vats) and TOML loading.
pub mod config;
/// Error taxonomy for envelopes, payloads, classification and tracking.
pub mod error;
/// Streaming line reader over any `BufRead`.
pub mod io_jsonl;
/// Embedded capdata body decoding (smallcaps vs legacy).
pub mod payload;
/// Envelope-level record decoding.
pub mod record;
/// Extraction sinks keyed by run name.
pub mod sink;
/// Address frequency side tally.
pub mod tally;
/// The block/run state machine.
pub mod tracker;
/// Wallet action envelopes and invitation spec variants.
pub mod wallet;

pub use category::*;
pub use classify::*;
pub use config::*;
pub use error::*;
pub use record::*;
pub use sink::*;
pub use tally::*;
pub use tracker::*;

/// Commonly-used items for quick imports.
///
/// ```rust
/// use slogrun_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        category::Category, classify::Classifier, config::ClassifierConfig, sink::ExtractSink,
        tally::AddressTally, tracker::RunTracker, tracker::RunSummary,
    };
}
