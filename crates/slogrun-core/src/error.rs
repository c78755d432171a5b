//! Error taxonomy.
//!
//! - [`EnvelopeError`]: a line is not a decodable slog record. Fatal.
//! - [`PayloadError`]: an embedded capdata body could not be decoded.
//! - [`ClassifyError`]: the triggering context of a run matches no known
//!   pattern. Fatal for the run; misclassifying would corrupt downstream
//!   accounting, so there is no best-effort fallback.
//! - [`TrackError`]: what the [`crate::RunTracker`] surfaces to its caller.
//!
//! Missing `usedBeans` is not an error (it defaults to 0), and an unknown
//! bridge source is not an error either (it passes through as the category).

use thiserror::Error;

use crate::record::RunId;

/// Top-level shape of a slog line is unusable.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Not valid JSON.
    #[error("not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    /// Valid JSON, but not an object.
    #[error("record is not a JSON object")]
    NotAnObject,
    /// No string `type` discriminator.
    #[error("record has no string `type` field")]
    MissingType,
    /// A field required by this record type is absent or mistyped.
    #[error("malformed `{kind}` record: {source}")]
    Fields {
        /// Record type being decoded.
        kind: &'static str,
        /// Underlying field error.
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of the embedded-body decode step.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Body text (after marker stripping) is not JSON.
    #[error("{encoding} body is not valid JSON: {source}")]
    Json {
        /// `"smallcaps"` or `"legacy"`.
        encoding: &'static str,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// The capdata wrapper itself is malformed.
    #[error("malformed capdata: {0}")]
    CapData(#[source] serde_json::Error),
}

/// A run's triggering context matched none of the known patterns.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A required field was missing or had the wrong type.
    #[error("missing or mistyped field `{0}`")]
    MissingField(&'static str),
    /// An embedded payload could not be decoded.
    #[error("payload decode failed: {0}")]
    Payload(#[from] PayloadError),
    /// No bridge inbound, and the first delivery is neither a bundle install nor a timer wake.
    #[error("no bridge_inbound but not a timer (vat {vat_id})")]
    NotTimer {
        /// Vat of the first delivery.
        vat_id: String,
    },
    /// Methargs did not decode to `[method, args]`.
    #[error("methargs is not a [method, args] pair")]
    MethArgsShape,
    /// Bank-sourced run whose args are not a `VBANK_BALANCE_UPDATE`.
    #[error("bank but not VBANK_BALANCE_UPDATE")]
    NotBalanceUpdate,
    /// Provision-sourced run whose args are not a `PLEASE_PROVISION`.
    #[error("provision but not PLEASE_PROVISION")]
    NotProvision,
    /// Wallet spend action with a method other than executeOffer/tryExitOffer.
    #[error("unrecognized wallet spend action method `{0}`")]
    UnknownSpendMethod(String),
    /// Continuing invitation whose maker name is not mapped.
    #[error("unrecognized invitationMakerName `{0}`")]
    UnknownInvitationMaker(String),
    /// Contract invitation whose public maker is not mapped.
    #[error("unrecognized publicInvitationMaker `{0}`")]
    UnknownPublicInvitationMaker(String),
    /// Purse invitation whose call pipe is not mapped.
    #[error("unrecognized callPipe {0:?}")]
    UnknownCallPipe(Vec<String>),
    /// Bare invitation spec whose offer id carries no known prefix.
    #[error("offer id {0} has no recognized prefix")]
    UnknownOfferId(String),
}

/// Errors surfaced by the run tracker.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A line could not be decoded as a record.
    #[error("line {line}: {source}")]
    Envelope {
        /// 1-based input line number.
        line: u64,
        /// Envelope failure.
        #[source]
        source: EnvelopeError,
    },
    /// The first delivery of a run could not be classified.
    #[error("cannot classify run {run}: {source}")]
    Classify {
        /// Run whose classification failed.
        run: RunId,
        /// Classifier failure.
        #[source]
        source: ClassifyError,
        /// Offending delivery record, verbatim.
        record: String,
    },
    /// The extraction sink failed.
    #[error("writing extracted run {name}: {source}")]
    Sink {
        /// Resource name being written.
        name: String,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
}
