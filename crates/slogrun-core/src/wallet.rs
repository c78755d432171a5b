//! Wallet bridge actions, decoded level by level.
//!
//! `args[1]` of a wallet-sourced bridge delivery is an action envelope
//! `{ owner, spendAction }`. `spendAction` is capdata serialized to a string,
//! whose body holds `{ method, ... }`. For `executeOffer`, the offer's
//! invitation spec is discriminated by which key is present, checked in the
//! order `invitationMakerName`, `publicInvitationMaker`, `callPipe`. Empty
//! values count as absent.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ClassifyError;
use crate::payload::decode_capdata_text;

/// Wallet action envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct WalletAction {
    /// Smart-wallet owner address.
    pub owner: String,
    /// Decoded spend action.
    pub spend_action: SpendAction,
}

/// Spend action, by method.
#[derive(Clone, Debug, PartialEq)]
pub enum SpendAction {
    /// `executeOffer`.
    ExecuteOffer(Offer),
    /// `tryExitOffer`.
    TryExitOffer {
        /// Offer being exited, if given.
        offer_id: Option<Value>,
    },
    /// Any other method.
    Other(String),
}

/// The offer inside an `executeOffer`.
#[derive(Clone, Debug, PartialEq)]
pub struct Offer {
    /// Client-chosen offer id (usually a timestamp or prefixed string).
    pub id: Value,
    /// Which contract capability the offer invokes.
    pub invitation_spec: InvitationSpec,
}

impl Offer {
    /// Offer id as text, for prefix checks and diagnostics.
    #[must_use]
    pub fn id_text(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Invitation spec variants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvitationSpec {
    /// Continuing invitation: `invitationMakerName`.
    Continuing {
        /// Maker name.
        invitation_maker_name: String,
    },
    /// Public contract invitation: `publicInvitationMaker`.
    Contract {
        /// Maker name.
        public_invitation_maker: String,
    },
    /// Purse invitation reached through `callPipe`.
    Purse {
        /// Method name of each pipe step, in order.
        call_pipe: Vec<String>,
    },
    /// No discriminator present.
    Bare,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAction {
    owner: String,
    spend_action: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpendAction {
    method: String,
    offer: Option<RawOffer>,
    offer_id: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOffer {
    id: Value,
    invitation_spec: RawInvitationSpec,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInvitationSpec {
    invitation_maker_name: Option<String>,
    public_invitation_maker: Option<String>,
    // Each step is `[method, ...args]`.
    call_pipe: Option<Vec<Vec<Value>>>,
}

impl WalletAction {
    /// Decode the action envelope found at `args[1]`.
    pub fn decode(envelope: &Value) -> Result<Self, ClassifyError> {
        let raw = RawAction::deserialize(envelope)
            .map_err(|_| ClassifyError::MissingField("args[1].owner/spendAction"))?;
        let body = decode_capdata_text(&raw.spend_action)?;
        let spend = RawSpendAction::deserialize(&body.value)
            .map_err(|_| ClassifyError::MissingField("spendAction.method"))?;

        let spend_action = match spend.method.as_str() {
            "executeOffer" => {
                let offer = spend
                    .offer
                    .ok_or(ClassifyError::MissingField("spendAction.offer"))?;
                SpendAction::ExecuteOffer(Offer {
                    id: offer.id,
                    invitation_spec: InvitationSpec::from_raw(offer.invitation_spec)?,
                })
            }
            "tryExitOffer" => SpendAction::TryExitOffer {
                offer_id: spend.offer_id,
            },
            _ => SpendAction::Other(spend.method),
        };

        Ok(Self {
            owner: raw.owner,
            spend_action,
        })
    }
}

impl InvitationSpec {
    fn from_raw(raw: RawInvitationSpec) -> Result<Self, ClassifyError> {
        if let Some(name) = raw.invitation_maker_name.filter(|s| !s.is_empty()) {
            return Ok(Self::Continuing {
                invitation_maker_name: name,
            });
        }
        if let Some(name) = raw.public_invitation_maker.filter(|s| !s.is_empty()) {
            return Ok(Self::Contract {
                public_invitation_maker: name,
            });
        }
        if let Some(steps) = raw.call_pipe.filter(|p| !p.is_empty()) {
            let call_pipe = steps
                .iter()
                .map(|step| {
                    step.first()
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                        .ok_or(ClassifyError::MissingField("callPipe[i][0]"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self::Purse { call_pipe });
        }
        Ok(Self::Bare)
    }
}
