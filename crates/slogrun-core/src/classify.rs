//! Run classification.
//!
//! [`Classifier::classify`] looks at a run's bridge inbound record (if any)
//! and its first delivery and returns a [`Category`]. First match wins:
//!
//! 1. run 0 is always a continuation;
//! 2. without a bridge inbound, the delivery must be a bundle install or a
//!    timer wake;
//! 3. with one, the bridge `source` picks the branch (`bank`, `provision`,
//!    `wallet`); any other source passes through as the category.
//!
//! The classifier holds no mutable state. Vbank addresses seen along the way
//! are returned in [`Classification::balance_addresses`] for the caller to
//! tally.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::category::Category;
use crate::config::ClassifierConfig;
use crate::error::ClassifyError;
use crate::payload::decode_body;
use crate::wallet::{InvitationSpec, Offer, SpendAction, WalletAction};

/// Outcome of a successful classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    /// Assigned category.
    pub category: Category,
    /// Addresses from a vbank balance update, in message order.
    pub balance_addresses: Vec<String>,
}

impl From<Category> for Classification {
    fn from(category: Category) -> Self {
        Self {
            category,
            balance_addresses: Vec::new(),
        }
    }
}

/// Where a bridge inbound message came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeSource {
    /// Vbank balance updates.
    Bank,
    /// Account provisioning.
    Provision,
    /// Smart-wallet actions.
    Wallet,
    /// Anything else.
    Other(String),
}

impl From<String> for BridgeSource {
    fn from(s: String) -> Self {
        match s.as_str() {
            "bank" => Self::Bank,
            "provision" => Self::Provision,
            "wallet" => Self::Wallet,
            _ => Self::Other(s),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BridgeInbound {
    source: String,
    inbound_num: Option<Value>,
}

/// The parts of a `deliver` record the classifier reads.
#[derive(Deserialize)]
struct Delivery {
    #[serde(rename = "vatID")]
    vat_id: String,
    kd: Vec<Value>,
}

impl Delivery {
    fn decode(v: &Value) -> Result<Self, ClassifyError> {
        Self::deserialize(v).map_err(|_| ClassifyError::MissingField("vatID/kd"))
    }

    fn kind(&self) -> Option<&str> {
        self.kd.first().and_then(Value::as_str)
    }

    fn target(&self) -> Option<&str> {
        self.kd.get(1).and_then(Value::as_str)
    }

    fn body(&self) -> Result<&str, ClassifyError> {
        self.kd
            .get(2)
            .and_then(|m| m.pointer("/methargs/body"))
            .and_then(Value::as_str)
            .ok_or(ClassifyError::MissingField("kd[2].methargs.body"))
    }

    /// Decode the message body as `[method, args]`.
    fn methargs(&self) -> Result<(Value, Vec<Value>), ClassifyError> {
        let decoded = decode_body(self.body()?)?;
        let Value::Array(mut pair) = decoded.value else {
            return Err(ClassifyError::MethArgsShape);
        };
        if pair.len() != 2 {
            return Err(ClassifyError::MethArgsShape);
        }
        let args = match pair.pop() {
            Some(Value::Array(args)) => args,
            _ => return Err(ClassifyError::MethArgsShape),
        };
        let method = pair.pop().unwrap_or(Value::Null);
        Ok((method, args))
    }
}

#[derive(Deserialize)]
struct BalanceEntry {
    address: String,
}

#[derive(Deserialize)]
struct BalanceUpdate {
    updated: Vec<BalanceEntry>,
}

/// Pure decision tree over a run's triggering context.
#[derive(Clone, Debug, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    /// Build a classifier with the given signatures.
    #[must_use]
    pub const fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify a run from its bridge inbound record and first delivery.
    pub fn classify(
        &self,
        run_num: u64,
        bridge_inbound: Option<&Value>,
        first_delivery: &Value,
    ) -> Result<Classification, ClassifyError> {
        if run_num == 0 {
            return Ok(Category::Continuation.into());
        }

        let delivery = Delivery::decode(first_delivery)?;
        let Some(inbound) = bridge_inbound else {
            return self.classify_unprompted(&delivery).map(Into::into);
        };

        let inbound = BridgeInbound::deserialize(inbound)
            .map_err(|_| ClassifyError::MissingField("bridge_inbound.source"))?;
        debug!(source = %inbound.source, inbound_num = ?inbound.inbound_num, "bridge-triggered run");

        let (_method, args) = delivery.methargs()?;
        match BridgeSource::from(inbound.source) {
            BridgeSource::Bank => classify_bank(&args),
            BridgeSource::Provision => classify_provision(&args).map(Into::into),
            BridgeSource::Wallet => classify_wallet(&args).map(Into::into),
            BridgeSource::Other(source) => {
                warn!(%source, "unrecognized bridge source, using it as the category");
                Ok(Category::Passthrough(source).into())
            }
        }
    }

    /// Runs with no bridge inbound: bundle installs and timer wakes.
    fn classify_unprompted(&self, d: &Delivery) -> Result<Category, ClassifyError> {
        let bundle = &self.config.bundle;
        if d.vat_id == bundle.vat_id && d.body()?.contains(bundle.body_marker.as_str()) {
            return Ok(Category::BundleInstalled);
        }

        let timer = &self.config.timer;
        let is_timer = d.vat_id == timer.vat_id
            && d.kind() == Some("message")
            && d.target() == Some(timer.target.as_str())
            && d.body()?.contains(timer.method_token.as_str());
        if is_timer {
            Ok(Category::Timer)
        } else {
            Err(ClassifyError::NotTimer {
                vat_id: d.vat_id.clone(),
            })
        }
    }
}

fn tagged<'a>(args: &'a [Value], tag: &str, ty: &str) -> Option<&'a Value> {
    let body = args.get(1)?;
    let ok = args.first().and_then(Value::as_str) == Some(tag)
        && body.get("type").and_then(Value::as_str) == Some(ty);
    ok.then_some(body)
}

fn classify_bank(args: &[Value]) -> Result<Classification, ClassifyError> {
    let body = tagged(args, "bank", "VBANK_BALANCE_UPDATE").ok_or(ClassifyError::NotBalanceUpdate)?;
    let update = BalanceUpdate::deserialize(body)
        .map_err(|_| ClassifyError::MissingField("updated[].address"))?;
    Ok(Classification {
        category: Category::VbankBalanceUpdate,
        balance_addresses: update.updated.into_iter().map(|e| e.address).collect(),
    })
}

fn classify_provision(args: &[Value]) -> Result<Category, ClassifyError> {
    let body = tagged(args, "provision", "PLEASE_PROVISION").ok_or(ClassifyError::NotProvision)?;
    body.get("address")
        .and_then(Value::as_str)
        .ok_or(ClassifyError::MissingField("address"))?;
    Ok(Category::Provision)
}

fn classify_wallet(args: &[Value]) -> Result<Category, ClassifyError> {
    let envelope = args.get(1).ok_or(ClassifyError::MissingField("args[1]"))?;
    let action = WalletAction::decode(envelope)?;
    debug!(owner = %action.owner, "wallet action");
    match action.spend_action {
        SpendAction::ExecuteOffer(offer) => classify_offer(&offer),
        SpendAction::TryExitOffer { .. } => Ok(Category::ExitOffer),
        SpendAction::Other(method) => Err(ClassifyError::UnknownSpendMethod(method)),
    }
}

// These names are scoped by the target contract; two contracts sharing a
// maker name would collide here.
fn classify_offer(offer: &Offer) -> Result<Category, ClassifyError> {
    match &offer.invitation_spec {
        InvitationSpec::Continuing {
            invitation_maker_name,
        } => continuing_category(invitation_maker_name)
            .ok_or_else(|| ClassifyError::UnknownInvitationMaker(invitation_maker_name.clone())),
        InvitationSpec::Contract {
            public_invitation_maker,
        } => contract_category(public_invitation_maker).ok_or_else(|| {
            ClassifyError::UnknownPublicInvitationMaker(public_invitation_maker.clone())
        }),
        InvitationSpec::Purse { call_pipe } => {
            purse_category(call_pipe).ok_or_else(|| ClassifyError::UnknownCallPipe(call_pipe.clone()))
        }
        InvitationSpec::Bare => {
            let id = offer.id_text();
            if id.starts_with("econgov-") {
                Ok(Category::MaybeGovVote)
            } else if id.starts_with("oracleAccept-") {
                Ok(Category::MaybeOracleAccept)
            } else {
                Err(ClassifyError::UnknownOfferId(id))
            }
        }
    }
}

fn continuing_category(name: &str) -> Option<Category> {
    Some(match name {
        "PushPrice" => Category::PushPrice,
        "AdjustBalances" => Category::AdjustBalances,
        "CloseVault" => Category::CloseVault,
        "makeVoteInvitation" => Category::MakeVote,
        "VoteOnParamChange" => Category::VoteParamChange,
        "VoteOnApiCall" => Category::VoteApiCall,
        _ => return None,
    })
}

fn contract_category(name: &str) -> Option<Category> {
    Some(match name {
        "makeWantMintedInvitation" => Category::PsmBuy,
        "makeGiveMintedInvitation" => Category::PsmSell,
        "makeMintCharacterInvitation" => Category::KreadMintCharacter,
        "makeSellCharacterInvitation" => Category::KreadSellCharacter,
        "makeBuyCharacterInvitation" => Category::KreadBuyCharacter,
        "makeBuyItemInvitation" => Category::KreadBuyItem,
        "makeItemSwapInvitation" => Category::KreadSwapItem,
        "makeSellItemInvitation" => Category::KreadSellItem,
        "makeEquipInvitation" => Category::KreadEquipItem,
        "makeUnequipInvitation" => Category::KreadUnequipItem,
        _ => return None,
    })
}

fn purse_category(call_pipe: &[String]) -> Option<Category> {
    let step = |i: usize| call_pipe.get(i).map(String::as_str);
    match (step(0), step(1)) {
        (Some("getCollateralManager"), Some("makeVaultInvitation")) => Some(Category::CreateVault),
        (Some("makeBidInvitation"), _) => Some(Category::VaultBid),
        (Some("makeAddCollateralInvitation"), _) => Some(Category::VaultAddCollateral),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(vat: &str, target: &str, body: &str) -> Value {
        json!({
            "type": "deliver",
            "vatID": vat,
            "kd": ["message", target, { "methargs": { "body": body, "slots": [] }, "result": "p-1" }]
        })
    }

    fn bridge_delivery(args: &Value) -> Value {
        message("v10", "ko62", &format!("#{}", json!(["inbound", args])))
    }

    fn inbound(source: &str) -> Value {
        json!({ "type": "cosmic-swingset-bridge-inbound", "source": source, "inboundNum": "7-1-0" })
    }

    fn wallet_delivery(spend: &Value) -> Value {
        let capdata = json!({ "body": format!("#{spend}"), "slots": [] });
        bridge_delivery(&json!([
            "wallet",
            { "type": "WALLET_SPEND_ACTION", "owner": "agoric1o", "spendAction": capdata.to_string() }
        ]))
    }

    fn offer(id: &Value, spec: &Value) -> Value {
        json!({ "method": "executeOffer", "offer": { "id": id, "invitationSpec": spec } })
    }

    fn classify(bridge: Option<&Value>, first: &Value) -> Result<Category, ClassifyError> {
        Classifier::default().classify(1, bridge, first).map(|c| c.category)
    }

    #[test]
    fn run_zero_ignores_everything() {
        let c = Classifier::default()
            .classify(0, Some(&json!("garbage")), &json!(null))
            .unwrap();
        assert_eq!(c.category, Category::Continuation);
    }

    #[test]
    fn timer_and_bundle() {
        let timer = message("v5", "ko296", "#[\"wake\",[\"+1700\"]]");
        assert_eq!(classify(None, &timer).unwrap(), Category::Timer);

        let bundle = message("v2", "ko1", "#[\"bundleInstalled\",[\"b1-abc\"]]");
        assert_eq!(classify(None, &bundle).unwrap(), Category::BundleInstalled);

        let other = message("v7", "ko296", "#[\"wake\",[]]");
        assert!(matches!(classify(None, &other), Err(ClassifyError::NotTimer { .. })));

        let wrong_target = message("v5", "ko1", "#[\"wake\",[]]");
        assert!(classify(None, &wrong_target).is_err());
    }

    #[test]
    fn timer_target_is_configurable() {
        let mut cfg = ClassifierConfig::default();
        cfg.timer.target = "ko77".into();
        let c = Classifier::new(cfg)
            .classify(3, None, &message("v5", "ko77", "#[\"wake\",[]]"))
            .unwrap();
        assert_eq!(c.category, Category::Timer);
    }

    #[test]
    fn bank_returns_addresses() {
        let d = bridge_delivery(&json!([
            "bank",
            { "type": "VBANK_BALANCE_UPDATE", "nonce": 3, "updated": [
                { "address": "addr1", "denom": "uist", "amount": "5" },
                { "address": "addr2", "denom": "ubld", "amount": "9" }
            ] }
        ]));
        let c = Classifier::default().classify(2, Some(&inbound("bank")), &d).unwrap();
        assert_eq!(c.category, Category::VbankBalanceUpdate);
        assert_eq!(c.balance_addresses, vec!["addr1", "addr2"]);

        let wrong = bridge_delivery(&json!(["bank", { "type": "OTHER" }]));
        assert!(matches!(
            classify(Some(&inbound("bank")), &wrong),
            Err(ClassifyError::NotBalanceUpdate)
        ));
    }

    #[test]
    fn provision() {
        let d = bridge_delivery(&json!(["provision", { "type": "PLEASE_PROVISION", "address": "agoric1p" }]));
        assert_eq!(classify(Some(&inbound("provision")), &d).unwrap(), Category::Provision);

        let no_addr = bridge_delivery(&json!(["provision", { "type": "PLEASE_PROVISION" }]));
        assert!(classify(Some(&inbound("provision")), &no_addr).is_err());
    }

    fn wallet_offer_label(spec: &Value) -> Result<String, ClassifyError> {
        let d = wallet_delivery(&offer(&json!(1), spec));
        classify(Some(&inbound("wallet")), &d).map(|c| c.as_str().to_owned())
    }

    #[test]
    fn continuing_invitation_table() {
        let rows = [
            ("PushPrice", "push-price"),
            ("AdjustBalances", "adjust-balances"),
            ("CloseVault", "close-vault"),
            ("makeVoteInvitation", "make-vote"),
            ("VoteOnParamChange", "vote-param-change"),
            ("VoteOnApiCall", "vote-api-call"),
        ];
        for (name, label) in rows {
            let spec = json!({ "source": "continuing", "previousOffer": "p", "invitationMakerName": name });
            assert_eq!(wallet_offer_label(&spec).unwrap(), label, "{name}");
        }
        assert!(matches!(
            wallet_offer_label(&json!({ "invitationMakerName": "pushPrice" })),
            Err(ClassifyError::UnknownInvitationMaker(_))
        ));
    }

    #[test]
    fn contract_invitation_table() {
        let rows = [
            ("makeWantMintedInvitation", "psm-buy"),
            ("makeGiveMintedInvitation", "psm-sell"),
            ("makeMintCharacterInvitation", "kread-mint-character"),
            ("makeSellCharacterInvitation", "kread-sell-character"),
            ("makeBuyCharacterInvitation", "kread-buy-character"),
            ("makeBuyItemInvitation", "kread-buy-item"),
            ("makeItemSwapInvitation", "kread-swap-item"),
            ("makeSellItemInvitation", "kread-sell-item"),
            ("makeEquipInvitation", "kread-equip-item"),
            ("makeUnequipInvitation", "kread-unequip-item"),
        ];
        for (name, label) in rows {
            let spec = json!({ "source": "contract", "instancePath": ["x"], "publicInvitationMaker": name });
            assert_eq!(wallet_offer_label(&spec).unwrap(), label, "{name}");
        }
        assert!(matches!(
            wallet_offer_label(&json!({ "publicInvitationMaker": "makeSwapInvitation" })),
            Err(ClassifyError::UnknownPublicInvitationMaker(_))
        ));
    }

    #[test]
    fn purse_call_pipe_table() {
        let rows = [
            (json!([["getCollateralManager", ["$0"]], ["makeVaultInvitation"]]), "create-vault"),
            (json!([["makeBidInvitation", ["$0"]]]), "vault-bid"),
            (json!([["makeBidInvitation"], ["anything"]]), "vault-bid"),
            (json!([["makeAddCollateralInvitation", []]]), "vault-add-collateral"),
        ];
        for (pipe, label) in rows {
            let spec = json!({ "source": "purse", "callPipe": pipe });
            assert_eq!(wallet_offer_label(&spec).unwrap(), label, "{pipe}");
        }
        for pipe in [
            json!([["getCollateralManager"]]),
            json!([["makeVaultInvitation"]]),
            json!([["getCollateralManager"], ["makeBidInvitation"]]),
        ] {
            assert!(
                matches!(
                    wallet_offer_label(&json!({ "callPipe": pipe })),
                    Err(ClassifyError::UnknownCallPipe(_))
                ),
                "{pipe}"
            );
        }
    }

    #[test]
    fn wallet_unmapped_method_fails() {
        let d = wallet_delivery(&json!({ "method": "makeAccount" }));
        assert!(matches!(
            classify(Some(&inbound("wallet")), &d),
            Err(ClassifyError::UnknownSpendMethod(_))
        ));
    }

    #[test]
    fn oracle_accept_prefix() {
        let d = wallet_delivery(&offer(&json!("oracleAccept-9"), &json!({ "source": "purse" })));
        assert_eq!(classify(Some(&inbound("wallet")), &d).unwrap(), Category::MaybeOracleAccept);
    }

    #[test]
    fn unknown_source_passes_through() {
        let d = bridge_delivery(&json!(["ibc", { "type": "IBC_EVENT" }]));
        assert_eq!(
            classify(Some(&inbound("vibc")), &d).unwrap(),
            Category::Passthrough("vibc".into())
        );
    }

    #[test]
    fn bridge_without_source_fails() {
        let d = bridge_delivery(&json!(["bank", {}]));
        assert!(classify(Some(&json!({ "inboundNum": "1" })), &d).is_err());
    }
}
