//! Run categories.
//!
//! Every known label is a unit variant; a bridge source the classifier has
//! never seen passes through verbatim as [`Category::Passthrough`].

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Category label of a run.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Continuation,
    BundleInstalled,
    Timer,
    VbankBalanceUpdate,
    Provision,
    PushPrice,
    AdjustBalances,
    CloseVault,
    MakeVote,
    VoteParamChange,
    VoteApiCall,
    PsmBuy,
    PsmSell,
    KreadMintCharacter,
    KreadSellCharacter,
    KreadBuyCharacter,
    KreadBuyItem,
    KreadSwapItem,
    KreadSellItem,
    KreadEquipItem,
    KreadUnequipItem,
    CreateVault,
    VaultBid,
    VaultAddCollateral,
    MaybeGovVote,
    MaybeOracleAccept,
    ExitOffer,
    /// Unrecognized bridge source, carried as-is.
    Passthrough(String),
}

impl Category {
    /// Every fixed label, in declaration order.
    pub const KNOWN: [Self; 27] = [
        Self::Continuation,
        Self::BundleInstalled,
        Self::Timer,
        Self::VbankBalanceUpdate,
        Self::Provision,
        Self::PushPrice,
        Self::AdjustBalances,
        Self::CloseVault,
        Self::MakeVote,
        Self::VoteParamChange,
        Self::VoteApiCall,
        Self::PsmBuy,
        Self::PsmSell,
        Self::KreadMintCharacter,
        Self::KreadSellCharacter,
        Self::KreadBuyCharacter,
        Self::KreadBuyItem,
        Self::KreadSwapItem,
        Self::KreadSellItem,
        Self::KreadEquipItem,
        Self::KreadUnequipItem,
        Self::CreateVault,
        Self::VaultBid,
        Self::VaultAddCollateral,
        Self::MaybeGovVote,
        Self::MaybeOracleAccept,
        Self::ExitOffer,
    ];

    /// Label as printed in summaries and extraction names.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Continuation => "continuation",
            Self::BundleInstalled => "bundle-installed",
            Self::Timer => "timer",
            Self::VbankBalanceUpdate => "vbank-balance-update",
            Self::Provision => "provision",
            Self::PushPrice => "push-price",
            Self::AdjustBalances => "adjust-balances",
            Self::CloseVault => "close-vault",
            Self::MakeVote => "make-vote",
            Self::VoteParamChange => "vote-param-change",
            Self::VoteApiCall => "vote-api-call",
            Self::PsmBuy => "psm-buy",
            Self::PsmSell => "psm-sell",
            Self::KreadMintCharacter => "kread-mint-character",
            Self::KreadSellCharacter => "kread-sell-character",
            Self::KreadBuyCharacter => "kread-buy-character",
            Self::KreadBuyItem => "kread-buy-item",
            Self::KreadSwapItem => "kread-swap-item",
            Self::KreadSellItem => "kread-sell-item",
            Self::KreadEquipItem => "kread-equip-item",
            Self::KreadUnequipItem => "kread-unequip-item",
            Self::CreateVault => "create-vault",
            Self::VaultBid => "vault-bid",
            Self::VaultAddCollateral => "vault-add-collateral",
            Self::MaybeGovVote => "maybe-gov-vote",
            Self::MaybeOracleAccept => "maybe-oracle-accept",
            Self::ExitOffer => "exit-offer",
            Self::Passthrough(source) => source,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Infallible;

    /// Unknown labels parse as [`Category::Passthrough`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::KNOWN
            .into_iter()
            .find(|c| c.as_str() == s)
            .unwrap_or_else(|| Self::Passthrough(s.to_owned())))
    }
}
