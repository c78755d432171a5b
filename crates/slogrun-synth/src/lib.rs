//! Synthetic slog streams.
//!
//! - `generator`: a seeded generator producing realistic-looking slog lines
//!   (blocks, bridge inbounds, runs, deliveries, replay brackets) together
//!   with the category each run should be assigned.
//!
//! The CLI `simulate` subcommand, the tracker benchmark and the end-to-end
//! tests all draw their input from here.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]

/// Seeded slog generator.
pub mod generator;
