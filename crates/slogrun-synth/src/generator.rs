// crates/slogrun-synth/src/generator.rs

//! Seeded slog generator.
//!
//! Produces a bootstrap block (one bundle-installed run without
//! `usedBeans`) followed by `blocks` regular blocks. Each regular block may
//! open with a continuation run and then carries 1..=3 triggered runs drawn
//! from timer, bank, provision and a handful of wallet actions. Some runs
//! page a vat in first, which emits a replay bracket before the first real
//! delivery.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, Rng as _, SeedableRng};
use serde_json::{json, Value};
use slogrun_core::{Category, ClassifierConfig, RunId};

/// Generated stream plus what the classifier should say about it.
#[derive(Clone, Debug, Default)]
pub struct SyntheticSlog {
    /// Slog lines, in order, without terminators.
    pub lines: Vec<String>,
    /// `(run, category)` for every run that has a delivery, in completion order.
    pub expected: Vec<(RunId, Category)>,
}

impl SyntheticSlog {
    /// Write the lines as a slog file.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut w = BufWriter::new(f);
        for line in &self.lines {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
        }
        w.flush().context("flush slog writer")?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Trigger {
    Timer,
    Bank,
    Provision,
    PushPrice,
    PsmBuy,
    CreateVault,
    ExitOffer,
}

impl Trigger {
    const ALL: [Self; 7] = [
        Self::Timer,
        Self::Bank,
        Self::Provision,
        Self::PushPrice,
        Self::PsmBuy,
        Self::CreateVault,
        Self::ExitOffer,
    ];

    const fn category(self) -> Category {
        match self {
            Self::Timer => Category::Timer,
            Self::Bank => Category::VbankBalanceUpdate,
            Self::Provision => Category::Provision,
            Self::PushPrice => Category::PushPrice,
            Self::PsmBuy => Category::PsmBuy,
            Self::CreateVault => Category::CreateVault,
            Self::ExitOffer => Category::ExitOffer,
        }
    }

    const fn source(self) -> Option<&'static str> {
        match self {
            Self::Timer => None,
            Self::Bank => Some("bank"),
            Self::Provision => Some("provision"),
            _ => Some("wallet"),
        }
    }
}

struct Gen {
    rng: StdRng,
    cfg: ClassifierConfig,
    monotime: f64,
    crank: u64,
    out: SyntheticSlog,
}

/// Generate a synthetic slog with `blocks` regular blocks.
#[must_use]
pub fn generate_slog(blocks: u32, seed: u64) -> SyntheticSlog {
    let mut g = Gen {
        rng: StdRng::seed_from_u64(seed),
        cfg: ClassifierConfig::default(),
        monotime: 1000.0,
        crank: 0,
        out: SyntheticSlog::default(),
    };

    g.bootstrap_block();
    for height in 1..=u64::from(blocks) {
        g.block(height);
    }
    g.out
}

impl Gen {
    fn push(&mut self, v: &Value) {
        self.out.lines.push(v.to_string());
    }

    fn tick(&mut self) -> f64 {
        self.monotime += f64::from(self.rng.random_range(1u32..=40)) / 8.0;
        self.monotime
    }

    fn bootstrap_block(&mut self) {
        self.push(&json!({ "type": "cosmic-swingset-bootstrap-block-start", "blockTime": 1_685_000_000 }));
        let start = self.tick();
        self.push(&json!({ "type": "cosmic-swingset-run-start", "runNum": 1, "monotime": start }));
        let body = format!("#{}", json!([self.cfg.bundle.body_marker, ["b1-0123abcd"]]));
        let vat = self.cfg.bundle.vat_id.clone();
        self.delivery(&vat, "ko20", &body);
        let finish = self.tick();
        // The bootstrap run-finish carries no usedBeans.
        self.push(&json!({ "type": "cosmic-swingset-run-finish", "runNum": 1, "monotime": finish }));
        self.push(&json!({ "type": "cosmic-swingset-bootstrap-block-finish", "blockTime": 1_685_000_000 }));
        self.out
            .expected
            .push((RunId::new(0, 1), Category::BundleInstalled));
    }

    fn block(&mut self, height: u64) {
        let block_time = 1_700_000_000 + height * 6;
        self.push(&json!({ "type": "cosmic-swingset-begin-block", "blockHeight": height, "blockTime": block_time }));
        self.push(&json!({ "type": "cosmic-swingset-end-block-start", "blockHeight": height, "blockTime": block_time }));

        if self.rng.random_bool(0.3) {
            self.run(height, 0, None);
        }
        let runs = self.rng.random_range(1u64..=3);
        for run_num in 1..=runs {
            let trigger = Trigger::ALL[self.rng.random_range(0..Trigger::ALL.len())];
            self.run(height, run_num, Some(trigger));
        }

        self.push(&json!({ "type": "cosmic-swingset-end-block-finish", "blockHeight": height, "blockTime": block_time }));
        self.push(&json!({ "type": "cosmic-swingset-commit-block-start", "blockHeight": height }));
        self.push(&json!({ "type": "cosmic-swingset-commit-block-finish", "blockHeight": height }));
    }

    /// One run; `trigger == None` means a continuation.
    fn run(&mut self, height: u64, run_num: u64, trigger: Option<Trigger>) {
        if let Some(source) = trigger.and_then(Trigger::source) {
            let inbound_num = format!("{height}-{run_num}-0");
            self.push(&json!({ "type": "cosmic-swingset-bridge-inbound", "source": source, "inboundNum": inbound_num }));
        }
        let start = self.tick();
        self.push(&json!({ "type": "cosmic-swingset-run-start", "runNum": run_num, "monotime": start }));

        if self.rng.random_bool(0.2) {
            self.replay_bracket();
        }

        match trigger {
            None => self.delivery("v9", "ko77", "#[\"updateState\",[]]"),
            Some(t) => self.first_delivery(t),
        }
        let extra = self.rng.random_range(0..4);
        for _ in 0..extra {
            self.delivery("v11", "ko99", "#[\"notify\",[]]");
        }

        let used_beans = self.rng.random_range(1_000u64..5_000_000);
        let finish = self.tick();
        self.push(&json!({ "type": "cosmic-swingset-run-finish", "runNum": run_num, "monotime": finish, "usedBeans": used_beans }));

        let category = trigger.map_or(Category::Continuation, Trigger::category);
        self.out
            .expected
            .push((RunId::new(height, run_num), category));
    }

    fn replay_bracket(&mut self) {
        self.push(&json!({ "type": "create-vat", "vatID": "v44", "dynamic": true }));
        self.push(&json!({ "type": "heap-snapshot-load", "vatID": "v44", "snapPos": 12 }));
        self.push(&json!({ "type": "start-replay", "vatID": "v44", "deliveries": 2 }));
        for n in 0..2 {
            // Replayed bodies need not be decodable.
            self.push(&json!({
                "type": "deliver", "vatID": "v44", "deliveryNum": n, "replay": true,
                "kd": ["message", "o+0", { "methargs": { "body": "#{truncated", "slots": [] } }]
            }));
            self.push(&json!({ "type": "syscall", "vatID": "v44", "replay": true, "ksc": ["vatstoreGet", "v44", "k"] }));
            self.push(&json!({ "type": "deliver-result", "vatID": "v44", "replay": true, "dr": ["ok", null, null] }));
        }
        self.push(&json!({ "type": "finish-replay", "vatID": "v44" }));
    }

    fn first_delivery(&mut self, trigger: Trigger) {
        let args = match trigger {
            Trigger::Timer => {
                let vat = self.cfg.timer.vat_id.clone();
                let target = self.cfg.timer.target.clone();
                let body = format!("#{}", json!([self.cfg.timer.method_token, ["+1700000000"]]));
                self.delivery(&vat, &target, &body);
                return;
            }
            Trigger::Bank => {
                let n = self.rng.random_range(1..=3);
                let updated: Vec<Value> = (0..n)
                    .map(|_| {
                        let id = self.rng.random_range(0..50u32);
                        json!({ "address": format!("agoric1user{id:02}"), "denom": "uist", "amount": "1000" })
                    })
                    .collect();
                json!(["bank", { "type": "VBANK_BALANCE_UPDATE", "nonce": self.crank, "updated": updated }])
            }
            Trigger::Provision => {
                json!(["provision", { "type": "PLEASE_PROVISION", "address": "agoric1newcomer", "nickname": "n" }])
            }
            Trigger::PushPrice => wallet_args(&json!({
                "method": "executeOffer",
                "offer": { "id": format!("pushPrice-{}", self.crank), "invitationSpec": {
                    "source": "continuing", "previousOffer": "oracleAccept-1", "invitationMakerName": "PushPrice"
                } }
            })),
            Trigger::PsmBuy => wallet_args(&json!({
                "method": "executeOffer",
                "offer": { "id": self.crank, "invitationSpec": {
                    "source": "contract", "instancePath": ["psm-IST-USDC"], "publicInvitationMaker": "makeWantMintedInvitation"
                } }
            })),
            Trigger::CreateVault => wallet_args(&json!({
                "method": "executeOffer",
                "offer": { "id": self.crank, "invitationSpec": {
                    "source": "purse", "callPipe": [["getCollateralManager", ["$0.Alleged: ATOM brand"]], ["makeVaultInvitation"]]
                } }
            })),
            Trigger::ExitOffer => wallet_args(&json!({ "method": "tryExitOffer", "offerId": self.crank })),
        };
        let body = format!("#{}", json!(["inbound", args]));
        self.delivery("v10", "ko62", &body);
    }

    fn delivery(&mut self, vat: &str, target: &str, body: &str) {
        self.crank += 1;
        let crank = self.crank;
        self.push(&json!({
            "type": "crank-start", "crankType": "delivery", "crankNum": crank, "message": { "type": "send", "target": target }
        }));
        self.push(&json!({
            "type": "deliver", "crankNum": crank, "vatID": vat, "deliveryNum": crank, "replay": false,
            "kd": ["message", target, { "methargs": { "body": body, "slots": [] }, "result": format!("kp{crank}") }]
        }));
        self.push(&json!({ "type": "syscall", "crankNum": crank, "vatID": vat, "replay": false, "ksc": ["resolve", vat, []] }));
        self.push(&json!({ "type": "deliver-result", "crankNum": crank, "vatID": vat, "replay": false, "dr": ["ok", null, { "compute": 1234 }] }));
        self.push(&json!({ "type": "crank-finish", "crankNum": crank }));
    }
}

/// `["wallet", WALLET_SPEND_ACTION]` args for a spend action.
fn wallet_args(spend: &Value) -> Value {
    let capdata = json!({ "body": format!("#{spend}"), "slots": [] });
    json!([
        "wallet",
        { "type": "WALLET_SPEND_ACTION", "owner": "agoric1trader", "spendAction": capdata.to_string(), "blockTime": 1_700_000_000 }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_a_seed() {
        let a = generate_slog(8, 7);
        let b = generate_slog(8, 7);
        assert_eq!(a.lines, b.lines);
        assert_eq!(a.expected, b.expected);
    }

    #[test]
    fn starts_with_bootstrap() {
        let s = generate_slog(1, 1);
        assert!(s.lines[0].contains("bootstrap-block-start"));
        assert_eq!(s.expected[0], (RunId::new(0, 1), Category::BundleInstalled));
        assert!(s.expected.len() >= 2);
    }
}
