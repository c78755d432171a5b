//! Envelope-level decoding of one slog line.
//!
//! Only the record types that drive the tracker are decoded into typed
//! fields. Bridge-inbound and delivery bodies stay as raw JSON values and are
//! decoded lazily by the classifier, so a run that never needs them (a
//! continuation) can't fail on them.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::EnvelopeError;

/// `type` of a regular block start.
pub const BEGIN_BLOCK: &str = "cosmic-swingset-begin-block";
/// `type` of the bootstrap (genesis) block start.
pub const BOOTSTRAP_BLOCK_START: &str = "cosmic-swingset-bootstrap-block-start";
/// `type` of a bridge inbound message.
pub const BRIDGE_INBOUND: &str = "cosmic-swingset-bridge-inbound";
/// `type` of a run start.
pub const RUN_START: &str = "cosmic-swingset-run-start";
/// `type` of a run finish.
pub const RUN_FINISH: &str = "cosmic-swingset-run-finish";
/// `type` of a delivery.
pub const DELIVER: &str = "deliver";

/// Identity of a run within the stream: `b<block>-r<run>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId {
    /// Block height (0 for the bootstrap block).
    pub block_num: u64,
    /// Run number within the block (0 for a continuation).
    pub run_num: u64,
}

impl RunId {
    /// Construct a run identity.
    #[inline]
    #[must_use]
    pub const fn new(block_num: u64, run_num: u64) -> Self {
        Self { block_num, run_num }
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}-r{}", self.block_num, self.run_num)
    }
}

/// Type-specific payload of a record.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordKind {
    /// `cosmic-swingset-begin-block`.
    BeginBlock {
        /// Block height.
        block_height: u64,
        /// Block time (seconds), if recorded.
        block_time: Option<u64>,
    },
    /// `cosmic-swingset-bootstrap-block-start`; the bootstrap block is block 0.
    BootstrapBlockStart {
        /// Block time (seconds), if recorded.
        block_time: Option<u64>,
    },
    /// `cosmic-swingset-bridge-inbound`, kept undecoded.
    BridgeInbound(Value),
    /// `cosmic-swingset-run-start`.
    RunStart {
        /// Run number within the block.
        run_num: u64,
        /// Monotonic clock at run start.
        monotime: f64,
    },
    /// `cosmic-swingset-run-finish`.
    RunFinish {
        /// Monotonic clock at run finish.
        monotime: f64,
        /// Metered cost; absent on the bootstrap block.
        used_beans: Option<u64>,
    },
    /// `deliver`, kept undecoded.
    Deliver(Value),
    /// Any other record type.
    Other,
}

/// One decoded slog line.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Type-specific payload.
    pub kind: RecordKind,
    /// Whether the record was emitted while replaying a vat transcript.
    pub replay: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockFields {
    block_height: u64,
    block_time: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapFields {
    block_time: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunStartFields {
    run_num: u64,
    monotime: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunFinishFields {
    monotime: f64,
    used_beans: Option<u64>,
}

impl Record {
    /// Decode one line of slog text.
    pub fn parse(line: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(line).map_err(EnvelopeError::Json)?;
        Self::from_value(value)
    }

    /// Decode an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let (tag, replay) = {
            let obj = value.as_object().ok_or(EnvelopeError::NotAnObject)?;
            let ty = obj
                .get("type")
                .and_then(Value::as_str)
                .ok_or(EnvelopeError::MissingType)?;
            let replay = obj.get("replay").and_then(Value::as_bool).unwrap_or(false);
            (Tag::of(ty), replay)
        };

        let kind = match tag {
            Tag::BeginBlock => {
                let f: BlockFields = fields(tag, &value)?;
                RecordKind::BeginBlock {
                    block_height: f.block_height,
                    block_time: f.block_time,
                }
            }
            Tag::BootstrapBlockStart => {
                let f: BootstrapFields = fields(tag, &value)?;
                RecordKind::BootstrapBlockStart {
                    block_time: f.block_time,
                }
            }
            Tag::RunStart => {
                let f: RunStartFields = fields(tag, &value)?;
                RecordKind::RunStart {
                    run_num: f.run_num,
                    monotime: f.monotime,
                }
            }
            Tag::RunFinish => {
                let f: RunFinishFields = fields(tag, &value)?;
                RecordKind::RunFinish {
                    monotime: f.monotime,
                    used_beans: f.used_beans,
                }
            }
            Tag::BridgeInbound => RecordKind::BridgeInbound(value),
            Tag::Deliver => RecordKind::Deliver(value),
            Tag::Other => RecordKind::Other,
        };
        Ok(Self { kind, replay })
    }

    /// Block and run lifecycle markers are never replay-tagged themselves.
    #[must_use]
    pub const fn is_boundary(&self) -> bool {
        matches!(
            self.kind,
            RecordKind::BeginBlock { .. }
                | RecordKind::BootstrapBlockStart { .. }
                | RecordKind::BridgeInbound(_)
                | RecordKind::RunStart { .. }
                | RecordKind::RunFinish { .. }
        )
    }
}

#[derive(Clone, Copy)]
enum Tag {
    BeginBlock,
    BootstrapBlockStart,
    BridgeInbound,
    RunStart,
    RunFinish,
    Deliver,
    Other,
}

impl Tag {
    fn of(ty: &str) -> Self {
        match ty {
            BEGIN_BLOCK => Self::BeginBlock,
            BOOTSTRAP_BLOCK_START => Self::BootstrapBlockStart,
            BRIDGE_INBOUND => Self::BridgeInbound,
            RUN_START => Self::RunStart,
            RUN_FINISH => Self::RunFinish,
            DELIVER => Self::Deliver,
            _ => Self::Other,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::BeginBlock => BEGIN_BLOCK,
            Self::BootstrapBlockStart => BOOTSTRAP_BLOCK_START,
            Self::BridgeInbound => BRIDGE_INBOUND,
            Self::RunStart => RUN_START,
            Self::RunFinish => RUN_FINISH,
            Self::Deliver => DELIVER,
            Self::Other => "other",
        }
    }
}

fn fields<'de, T: Deserialize<'de>>(tag: Tag, value: &'de Value) -> Result<T, EnvelopeError> {
    T::deserialize(value).map_err(|source| EnvelopeError::Fields {
        kind: tag.name(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_lifecycle_records() {
        let r = Record::parse(r#"{"type":"cosmic-swingset-begin-block","blockHeight":12,"blockTime":1700000000}"#).unwrap();
        assert_eq!(
            r.kind,
            RecordKind::BeginBlock {
                block_height: 12,
                block_time: Some(1_700_000_000)
            }
        );

        let r = Record::parse(r#"{"type":"cosmic-swingset-run-finish","monotime":150}"#).unwrap();
        assert_eq!(
            r.kind,
            RecordKind::RunFinish {
                monotime: 150.0,
                used_beans: None
            }
        );
        assert!(r.is_boundary());
    }

    #[test]
    fn replay_flag_and_other_types() {
        let r = Record::parse(r#"{"type":"syscall","replay":true}"#).unwrap();
        assert!(r.replay);
        assert_eq!(r.kind, RecordKind::Other);
        assert!(!r.is_boundary());
    }

    #[test]
    fn rejects_bad_envelopes() {
        assert!(matches!(Record::parse("not json"), Err(EnvelopeError::Json(_))));
        assert!(matches!(Record::parse("[1,2]"), Err(EnvelopeError::NotAnObject)));
        assert!(matches!(Record::parse(r#"{"x":1}"#), Err(EnvelopeError::MissingType)));
        assert!(matches!(
            Record::parse(r#"{"type":"cosmic-swingset-run-start","monotime":1}"#),
            Err(EnvelopeError::Fields { .. })
        ));
    }

    #[test]
    fn run_id_display() {
        assert_eq!(RunId::new(12, 3).to_string(), "b12-r3");
    }
}
