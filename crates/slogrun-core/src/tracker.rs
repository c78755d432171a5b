//! Block/run state machine.
//!
//! The tracker consumes slog lines strictly in order and keeps just enough
//! context to know when a run starts and ends:
//!
//! ```text
//!   Idle --block-start--> InBlock --run-start--> InRun --run-finish--> InBlock
//!                           ^  bridge-inbound: remembered as the trigger
//!                           '------------- block-start from any state
//! ```
//!
//! The first non-replay `deliver` of a run is classified on the spot; a
//! classification failure is returned immediately. At run-finish a
//! [`RunSummary`] is produced (if the run was classified) and, for selected
//! categories, the run's raw lines go to the [`ExtractSink`].
//!
//! Replay-tagged records (vat transcript replay while paging a vat in) are
//! dropped entirely: they are not buffered and never classified. The
//! lifecycle markers around a replay are not replay-tagged and are kept.
//!
//! Out-of-order lifecycle records are tolerated with a warning: a run-start
//! over an open run replaces it, and a run-finish with no open run produces
//! no summary.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::category::Category;
use crate::classify::Classifier;
use crate::config::ClassifierConfig;
use crate::error::TrackError;
use crate::record::{Record, RecordKind, RunId};
use crate::sink::ExtractSink;
use crate::tally::AddressTally;

/// Metered beans per computron.
pub const BEANS_PER_COMPUTRON: u64 = 100;

/// Coarse tracker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No block seen yet.
    Idle,
    /// Inside a block, between runs.
    InBlock,
    /// Inside a run.
    InRun,
}

/// Current block identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockContext {
    /// Block height (0 for bootstrap).
    pub block_num: u64,
    /// Block time, if recorded.
    pub block_time: Option<u64>,
}

#[derive(Clone, Copy, Debug)]
struct RunContext {
    run_num: u64,
    start_monotime: f64,
    first_delivery_seen: bool,
}

/// One line of classifier output.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Assigned category.
    pub category: Category,
    /// Run identity.
    pub run: RunId,
    /// `usedBeans / 100`.
    pub computrons: u64,
    /// Monotonic time between run-start and run-finish.
    pub elapsed: f64,
}

impl fmt::Display for RunSummary {
    /// `category,b<block>-r<run>,computrons,elapsed`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.category, self.run, self.computrons, self.elapsed
        )
    }
}

/// Counters kept across the whole stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Lines ingested.
    pub lines: u64,
    /// Records dropped before the first block start.
    pub preamble_skipped: u64,
    /// Replay-tagged records dropped.
    pub replay_skipped: u64,
    /// Runs that reached run-finish.
    pub runs_finished: u64,
    /// Runs dropped by a block start or run start while still open.
    pub runs_abandoned: u64,
    /// Run-finish records with no open run.
    pub orphan_finishes: u64,
    /// Runs written to the extraction sink.
    pub runs_extracted: u64,
    /// Summaries emitted, per category.
    pub categories: BTreeMap<String, u64>,
}

impl TrackerStats {
    /// Total summaries emitted.
    #[must_use]
    pub fn runs_summarized(&self) -> u64 {
        self.categories.values().sum()
    }
}

/// Raw lines of the run being assembled.
///
/// `active` tracks whether a run is being buffered at all; lines are only
/// kept when something may be extracted.
#[derive(Debug)]
struct RunBuffer {
    retain: bool,
    active: bool,
    lines: Vec<String>,
}

impl RunBuffer {
    const fn new(retain: bool) -> Self {
        Self {
            retain,
            active: false,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line: &str) {
        self.active = true;
        if self.retain {
            self.lines.push(line.to_owned());
        }
    }

    fn push_if_active(&mut self, line: &str) {
        if self.active {
            self.push(line);
        }
    }

    fn clear(&mut self) {
        self.active = false;
        self.lines.clear();
    }
}

/// Single-pass run tracker.
pub struct RunTracker<S> {
    classifier: Classifier,
    extract: HashSet<String>,
    sink: S,
    block: Option<BlockContext>,
    run: Option<RunContext>,
    bridge_inbound: Option<Value>,
    category: Option<Category>,
    buffer: RunBuffer,
    tally: AddressTally,
    stats: TrackerStats,
}

impl<S: ExtractSink> RunTracker<S> {
    /// Tracker extracting runs whose category is in `extract` into `sink`.
    pub fn new<I, T>(config: ClassifierConfig, extract: I, sink: S) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let extract: HashSet<String> = extract.into_iter().map(Into::into).collect();
        let retain = !extract.is_empty();
        Self {
            classifier: Classifier::new(config),
            extract,
            sink,
            block: None,
            run: None,
            bridge_inbound: None,
            category: None,
            buffer: RunBuffer::new(retain),
            tally: AddressTally::new(),
            stats: TrackerStats::default(),
        }
    }

    /// Current coarse state.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match (&self.block, &self.run) {
            (None, _) => Phase::Idle,
            (Some(_), None) => Phase::InBlock,
            (Some(_), Some(_)) => Phase::InRun,
        }
    }

    /// Current block, if any.
    #[must_use]
    pub const fn block(&self) -> Option<&BlockContext> {
        self.block.as_ref()
    }

    /// Addresses tallied from vbank balance updates so far.
    #[must_use]
    pub const fn tally(&self) -> &AddressTally {
        &self.tally
    }

    /// Stream counters so far.
    #[must_use]
    pub const fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    /// Extraction sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Tear down into `(sink, tally, stats)`.
    pub fn into_parts(self) -> (S, AddressTally, TrackerStats) {
        (self.sink, self.tally, self.stats)
    }

    /// Decode and consume one raw slog line.
    pub fn ingest(&mut self, line: &str) -> Result<Option<RunSummary>, TrackError> {
        self.stats.lines += 1;
        let record = Record::parse(line).map_err(|source| TrackError::Envelope {
            line: self.stats.lines,
            source,
        })?;
        self.apply(line, record)
    }

    fn apply(&mut self, raw: &str, record: Record) -> Result<Option<RunSummary>, TrackError> {
        let starts_block = matches!(
            record.kind,
            RecordKind::BeginBlock { .. } | RecordKind::BootstrapBlockStart { .. }
        );
        if self.block.is_none() && !starts_block {
            self.stats.preamble_skipped += 1;
            return Ok(None);
        }
        if record.replay && !record.is_boundary() {
            self.stats.replay_skipped += 1;
            return Ok(None);
        }

        match record.kind {
            RecordKind::BeginBlock {
                block_height,
                block_time,
            } => self.start_block(block_height, block_time),
            RecordKind::BootstrapBlockStart { block_time } => self.start_block(0, block_time),
            RecordKind::BridgeInbound(value) => {
                self.buffer.push(raw);
                self.bridge_inbound = Some(value);
            }
            RecordKind::RunStart { run_num, monotime } => self.start_run(raw, run_num, monotime),
            RecordKind::RunFinish {
                monotime,
                used_beans,
            } => {
                self.buffer.push(raw);
                return self.finish_run(monotime, used_beans);
            }
            RecordKind::Deliver(value) => {
                self.buffer.push_if_active(raw);
                self.observe_delivery(raw, &value)?;
            }
            RecordKind::Other => self.buffer.push_if_active(raw),
        }
        Ok(None)
    }

    fn run_id(&self, run_num: u64) -> RunId {
        RunId::new(self.block.map_or(0, |b| b.block_num), run_num)
    }

    fn start_run(&mut self, raw: &str, run_num: u64, monotime: f64) {
        if let Some(open) = self.run {
            // The open run never finished; the new one takes over its buffer
            // and any bridge record seen since.
            warn!(run = %self.run_id(open.run_num), next = run_num, "run-start while run still open, abandoning it");
            self.stats.runs_abandoned += 1;
            self.category = None;
        }
        self.buffer.push(raw);
        self.run = Some(RunContext {
            run_num,
            start_monotime: monotime,
            first_delivery_seen: false,
        });
    }

    fn start_block(&mut self, block_num: u64, block_time: Option<u64>) {
        if let Some(open) = self.run.take() {
            warn!(run = %self.run_id(open.run_num), "block started while run still open, abandoning it");
            self.stats.runs_abandoned += 1;
        }
        debug!(block_num, ?block_time, "block start");
        self.block = Some(BlockContext {
            block_num,
            block_time,
        });
        self.bridge_inbound = None;
        self.category = None;
        self.buffer.clear();
    }

    fn observe_delivery(&mut self, raw: &str, delivery: &Value) -> Result<(), TrackError> {
        let Some(run) = self.run.as_mut() else {
            // Deliveries between runs belong to no run.
            return Ok(());
        };
        if run.first_delivery_seen {
            return Ok(());
        }
        run.first_delivery_seen = true;
        let run_num = run.run_num;
        let id = self.run_id(run_num);

        match self
            .classifier
            .classify(run_num, self.bridge_inbound.as_ref(), delivery)
        {
            Ok(c) => {
                debug!(run = %id, category = %c.category, "classified");
                self.tally.extend(&c.balance_addresses);
                self.category = Some(c.category);
                Ok(())
            }
            Err(source) => {
                error!(run = %id, error = %source, record = raw, "classification failed");
                Err(TrackError::Classify {
                    run: id,
                    source,
                    record: raw.to_owned(),
                })
            }
        }
    }

    fn finish_run(&mut self, monotime: f64, used_beans: Option<u64>) -> Result<Option<RunSummary>, TrackError> {
        let Some(run) = self.run.take() else {
            warn!(line = self.stats.lines, "run-finish without a matching run-start, ignoring it");
            self.stats.orphan_finishes += 1;
            self.bridge_inbound = None;
            self.category = None;
            self.buffer.clear();
            return Ok(None);
        };
        self.stats.runs_finished += 1;
        let id = self.run_id(run.run_num);

        let summary = match self.category.take() {
            Some(category) => {
                *self
                    .stats
                    .categories
                    .entry(category.as_str().to_owned())
                    .or_default() += 1;

                if self.extract.contains(category.as_str()) {
                    let name = format!("{id}-{category}");
                    self.sink
                        .write_run(&name, &self.buffer.lines)
                        .map_err(|source| TrackError::Sink {
                            name: name.clone(),
                            source,
                        })?;
                    self.stats.runs_extracted += 1;
                    debug!(%name, lines = self.buffer.lines.len(), "extracted run");
                }

                Some(RunSummary {
                    category,
                    run: id,
                    computrons: used_beans.unwrap_or(0) / BEANS_PER_COMPUTRON,
                    elapsed: monotime - run.start_monotime,
                })
            }
            None => {
                debug!(run = %id, "run finished without a delivery");
                None
            }
        };

        self.bridge_inbound = None;
        self.buffer.clear();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn tracker(extract: &[&str]) -> RunTracker<MemorySink> {
        RunTracker::new(
            ClassifierConfig::default(),
            extract.iter().copied(),
            MemorySink::default(),
        )
    }

    const BEGIN: &str = r#"{"type":"cosmic-swingset-begin-block","blockHeight":5,"blockTime":99}"#;
    const TIMER: &str = r##"{"type":"deliver","vatID":"v5","kd":["message","ko296",{"methargs":{"body":"#[\"wake\",[]]","slots":[]}}]}"##;

    #[test]
    fn phases_follow_boundaries() {
        let mut t = tracker(&[]);
        assert_eq!(t.phase(), Phase::Idle);
        t.ingest(BEGIN).unwrap();
        assert_eq!(t.phase(), Phase::InBlock);
        assert_eq!(t.block().map(|b| b.block_num), Some(5));
        t.ingest(r#"{"type":"cosmic-swingset-run-start","runNum":1,"monotime":1}"#).unwrap();
        assert_eq!(t.phase(), Phase::InRun);
        t.ingest(TIMER).unwrap();
        let s = t
            .ingest(r#"{"type":"cosmic-swingset-run-finish","runNum":1,"monotime":3.5,"usedBeans":12345}"#)
            .unwrap()
            .unwrap();
        assert_eq!(t.phase(), Phase::InBlock);
        assert_eq!(s.to_string(), "timer,b5-r1,123,2.5");
    }

    #[test]
    fn preamble_is_skipped() {
        let mut t = tracker(&[]);
        t.ingest(TIMER).unwrap();
        t.ingest(r#"{"type":"cosmic-swingset-run-finish","monotime":1}"#).unwrap();
        assert_eq!(t.stats().preamble_skipped, 2);
    }

    #[test]
    fn orphan_run_finish_is_ignored() {
        let mut t = tracker(&["timer"]);
        t.ingest(BEGIN).unwrap();
        let s = t
            .ingest(r#"{"type":"cosmic-swingset-run-finish","monotime":1}"#)
            .unwrap();
        assert!(s.is_none());
        assert_eq!(t.stats().orphan_finishes, 1);
        assert_eq!(t.stats().runs_finished, 0);
        assert_eq!(t.phase(), Phase::InBlock);
    }

    #[test]
    fn finish_of_run_abandoned_by_block_start_keeps_going() {
        let mut t = tracker(&[]);
        t.ingest(BEGIN).unwrap();
        t.ingest(r#"{"type":"cosmic-swingset-run-start","runNum":1,"monotime":1}"#).unwrap();
        t.ingest(r#"{"type":"cosmic-swingset-begin-block","blockHeight":6}"#).unwrap();
        let s = t
            .ingest(r#"{"type":"cosmic-swingset-run-finish","monotime":2}"#)
            .unwrap();
        assert!(s.is_none());
        assert_eq!(t.stats().runs_abandoned, 1);
        assert_eq!(t.stats().orphan_finishes, 1);

        t.ingest(r#"{"type":"cosmic-swingset-run-start","runNum":1,"monotime":3}"#).unwrap();
        t.ingest(TIMER).unwrap();
        let s = t
            .ingest(r#"{"type":"cosmic-swingset-run-finish","monotime":4,"usedBeans":200}"#)
            .unwrap()
            .unwrap();
        assert_eq!(s.to_string(), "timer,b6-r1,2,1");
    }

    #[test]
    fn run_start_over_open_run_replaces_it() {
        let mut t = tracker(&["timer"]);
        t.ingest(BEGIN).unwrap();
        t.ingest(r#"{"type":"cosmic-swingset-run-start","runNum":1,"monotime":1}"#).unwrap();
        t.ingest(TIMER).unwrap();
        t.ingest(r#"{"type":"cosmic-swingset-run-start","runNum":2,"monotime":10}"#).unwrap();
        assert_eq!(t.stats().runs_abandoned, 1);
        assert_eq!(t.phase(), Phase::InRun);

        // The replacement run has no delivery of its own, so it inherits no category.
        let s = t
            .ingest(r#"{"type":"cosmic-swingset-run-finish","monotime":12}"#)
            .unwrap();
        assert!(s.is_none());
        assert!(t.sink().runs.is_empty());
        assert_eq!(t.stats().runs_finished, 1);
    }

    #[test]
    fn replay_tagged_lifecycle_markers_still_drive_state() {
        let mut t = tracker(&[]);
        t.ingest(BEGIN).unwrap();
        t.ingest(r#"{"type":"cosmic-swingset-run-start","runNum":1,"monotime":1,"replay":true}"#)
            .unwrap();
        assert_eq!(t.phase(), Phase::InRun);
        t.ingest(r#"{"type":"syscall","replay":true}"#).unwrap();
        assert_eq!(t.stats().replay_skipped, 1);
    }

    #[test]
    fn block_start_abandons_open_run() {
        let mut t = tracker(&["timer"]);
        t.ingest(BEGIN).unwrap();
        t.ingest(r#"{"type":"cosmic-swingset-run-start","runNum":1,"monotime":1}"#).unwrap();
        t.ingest(TIMER).unwrap();
        t.ingest(BEGIN).unwrap();
        assert_eq!(t.phase(), Phase::InBlock);
        assert_eq!(t.stats().runs_abandoned, 1);
        assert!(t.sink().runs.is_empty());
    }

    #[test]
    fn envelope_error_carries_line_number() {
        let mut t = tracker(&[]);
        t.ingest(BEGIN).unwrap();
        let err = t.ingest("{oops").unwrap_err();
        assert!(matches!(err, TrackError::Envelope { line: 2, .. }));
    }
}
