//! Core data types for parser results

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Confidence for the canonical phrasing of an intent.
pub const CANONICAL_CONFIDENCE: f64 = 0.95;
/// Confidence for a recognized but less canonical phrasing.
pub const VARIANT_CONFIDENCE: f64 = 0.90;
/// Confidence reported with an ambiguous reading.
pub const AMBIGUOUS_CONFIDENCE: f64 = 0.50;

/// Token metadata as known to the resolver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub mint: String,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(symbol: impl Into<String>, mint: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            mint: mint.into(),
            decimals,
        }
    }
}

/// A recipient as the user wrote it plus the address it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub input: String,
    pub address: String,
}

impl Recipient {
    pub fn new(input: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            address: address.into(),
        }
    }
}

/// How much of a launched token to sell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SellAmount {
    Tokens { amount: Decimal },
    Percent { percent: Decimal },
    All,
}

/// Priority fee preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeLevel {
    Low,
    #[default]
    Medium,
    High,
    Turbo,
}

impl FeeLevel {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            "turbo" | "max" => Some(Self::Turbo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Turbo => "turbo",
        }
    }
}

/// Discriminant of [`TransactionIntent`], used for counters and prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Transfer,
    Swap,
    Stake,
    Unstake,
    LaunchBuy,
    LaunchSell,
    LaunchCreate,
    Balance,
    Portfolio,
    TokenPrice,
    TransactionHistory,
    ResolveDomain,
    ReverseLookup,
    ListDomains,
    SubscribeAccount,
    SubscribeSlot,
    NftTransfer,
    NftList,
    WrapSol,
    UnwrapSol,
    BurnToken,
    CloseEmptyAccounts,
    Airdrop,
    Informational,
}

impl IntentKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Swap => "swap",
            Self::Stake => "stake",
            Self::Unstake => "unstake",
            Self::LaunchBuy => "launch_buy",
            Self::LaunchSell => "launch_sell",
            Self::LaunchCreate => "launch_create",
            Self::Balance => "balance",
            Self::Portfolio => "portfolio",
            Self::TokenPrice => "token_price",
            Self::TransactionHistory => "transaction_history",
            Self::ResolveDomain => "resolve_domain",
            Self::ReverseLookup => "reverse_lookup",
            Self::ListDomains => "list_domains",
            Self::SubscribeAccount => "subscribe_account",
            Self::SubscribeSlot => "subscribe_slot",
            Self::NftTransfer => "nft_transfer",
            Self::NftList => "nft_list",
            Self::WrapSol => "wrap_sol",
            Self::UnwrapSol => "unwrap_sol",
            Self::BurnToken => "burn_token",
            Self::CloseEmptyAccounts => "close_empty_accounts",
            Self::Airdrop => "airdrop",
            Self::Informational => "informational",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A structured, typed wallet command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionIntent {
    Transfer {
        amount: Decimal,
        token: TokenInfo,
        recipient: Recipient,
    },
    Swap {
        amount: Decimal,
        from: TokenInfo,
        to: TokenInfo,
        slippage_bps: Option<u32>,
        mev_protection: bool,
    },
    Stake {
        amount: Decimal,
        validator: Option<String>,
    },
    /// `amount: None` unstakes everything.
    Unstake {
        amount: Option<Decimal>,
    },
    LaunchBuy {
        amount_sol: Decimal,
        mint: String,
        symbol: Option<String>,
    },
    LaunchSell {
        amount: SellAmount,
        mint: String,
        symbol: Option<String>,
    },
    LaunchCreate {
        name: String,
        symbol: String,
        initial_buy_sol: Option<Decimal>,
    },
    Balance {
        token: Option<TokenInfo>,
        owner: Option<Recipient>,
    },
    Portfolio {
        owner: Option<Recipient>,
    },
    TokenPrice {
        token: TokenInfo,
    },
    TransactionHistory {
        limit: Option<u32>,
    },
    ResolveDomain {
        domain: String,
        address: String,
    },
    ReverseLookup {
        address: String,
        domain: Option<String>,
    },
    ListDomains {
        owner: Recipient,
        domains: Vec<String>,
    },
    SubscribeAccount {
        account: Recipient,
    },
    SubscribeSlot,
    NftTransfer {
        mint: String,
        recipient: Recipient,
    },
    NftList {
        owner: Option<Recipient>,
    },
    WrapSol {
        amount: Decimal,
    },
    UnwrapSol {
        amount: Option<Decimal>,
    },
    BurnToken {
        amount: Decimal,
        token: TokenInfo,
    },
    CloseEmptyAccounts,
    Airdrop {
        amount: Decimal,
    },
    Informational {
        topic: String,
    },
}

impl TransactionIntent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Self::Transfer { .. } => IntentKind::Transfer,
            Self::Swap { .. } => IntentKind::Swap,
            Self::Stake { .. } => IntentKind::Stake,
            Self::Unstake { .. } => IntentKind::Unstake,
            Self::LaunchBuy { .. } => IntentKind::LaunchBuy,
            Self::LaunchSell { .. } => IntentKind::LaunchSell,
            Self::LaunchCreate { .. } => IntentKind::LaunchCreate,
            Self::Balance { .. } => IntentKind::Balance,
            Self::Portfolio { .. } => IntentKind::Portfolio,
            Self::TokenPrice { .. } => IntentKind::TokenPrice,
            Self::TransactionHistory { .. } => IntentKind::TransactionHistory,
            Self::ResolveDomain { .. } => IntentKind::ResolveDomain,
            Self::ReverseLookup { .. } => IntentKind::ReverseLookup,
            Self::ListDomains { .. } => IntentKind::ListDomains,
            Self::SubscribeAccount { .. } => IntentKind::SubscribeAccount,
            Self::SubscribeSlot => IntentKind::SubscribeSlot,
            Self::NftTransfer { .. } => IntentKind::NftTransfer,
            Self::NftList { .. } => IntentKind::NftList,
            Self::WrapSol { .. } => IntentKind::WrapSol,
            Self::UnwrapSol { .. } => IntentKind::UnwrapSol,
            Self::BurnToken { .. } => IntentKind::BurnToken,
            Self::CloseEmptyAccounts => IntentKind::CloseEmptyAccounts,
            Self::Airdrop { .. } => IntentKind::Airdrop,
            Self::Informational { .. } => IntentKind::Informational,
        }
    }

    /// The primary amount, when the intent carries one.
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Self::Transfer { amount, .. }
            | Self::Swap { amount, .. }
            | Self::Stake { amount, .. }
            | Self::WrapSol { amount }
            | Self::BurnToken { amount, .. }
            | Self::Airdrop { amount } => Some(*amount),
            Self::LaunchBuy { amount_sol, .. } => Some(*amount_sol),
            Self::LaunchSell {
                amount: SellAmount::Tokens { amount },
                ..
            } => Some(*amount),
            Self::Unstake { amount } | Self::UnwrapSol { amount } => *amount,
            _ => None,
        }
    }

    /// The token symbol the intent spends or queries.
    pub fn token_symbol(&self) -> Option<&str> {
        match self {
            Self::Transfer { token, .. } | Self::BurnToken { token, .. } => Some(&token.symbol),
            Self::TokenPrice { token } => Some(&token.symbol),
            Self::Swap { from, .. } => Some(&from.symbol),
            Self::Balance { token, .. } => token.as_ref().map(|t| t.symbol.as_str()),
            Self::LaunchBuy { symbol, .. } | Self::LaunchSell { symbol, .. } => symbol.as_deref(),
            Self::Stake { .. } | Self::Unstake { .. } | Self::WrapSol { .. } | Self::Airdrop { .. } => {
                Some("SOL")
            }
            _ => None,
        }
    }

    /// The recipient as the user wrote it.
    pub fn recipient(&self) -> Option<&Recipient> {
        match self {
            Self::Transfer { recipient, .. } | Self::NftTransfer { recipient, .. } => Some(recipient),
            _ => None,
        }
    }

    pub fn uses_mev_protection(&self) -> bool {
        matches!(
            self,
            Self::Swap {
                mev_protection: true,
                ..
            }
        )
    }

    /// Copy of this intent with a new amount, if it has an amount to replace.
    pub fn with_amount(&self, new_amount: Decimal) -> Option<Self> {
        let mut next = self.clone();
        match &mut next {
            Self::Transfer { amount, .. }
            | Self::Swap { amount, .. }
            | Self::Stake { amount, .. }
            | Self::WrapSol { amount }
            | Self::BurnToken { amount, .. }
            | Self::Airdrop { amount } => *amount = new_amount,
            Self::LaunchBuy { amount_sol, .. } => *amount_sol = new_amount,
            Self::LaunchSell { amount, .. } => *amount = SellAmount::Tokens { amount: new_amount },
            Self::Unstake { amount } | Self::UnwrapSol { amount } => *amount = Some(new_amount),
            _ => return None,
        }
        Some(next)
    }

    /// Copy of this intent with a new recipient, if it has one to replace.
    pub fn with_recipient(&self, new_recipient: Recipient) -> Option<Self> {
        let mut next = self.clone();
        match &mut next {
            Self::Transfer { recipient, .. } | Self::NftTransfer { recipient, .. } => {
                *recipient = new_recipient
            }
            _ => return None,
        }
        Some(next)
    }
}

/// Result type for a single-clause parse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParseResult {
    Success {
        intent: TransactionIntent,
        confidence: f64,
        raw_input: String,
    },
    Ambiguous {
        primary: TransactionIntent,
        alternatives: Vec<TransactionIntent>,
        confidence: f64,
    },
    NeedsInfo {
        intent_type: IntentKind,
        missing: Vec<String>,
        partial: BTreeMap<String, String>,
        suggestion: String,
    },
    Unknown {
        input: String,
        suggestions: Vec<String>,
    },
}

impl ParseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Success { confidence, .. } | Self::Ambiguous { confidence, .. } => *confidence,
            _ => 0.0,
        }
    }

    pub fn intent(&self) -> Option<&TransactionIntent> {
        match self {
            Self::Success { intent, .. } => Some(intent),
            _ => None,
        }
    }

    /// Human-readable reason for a non-success result.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Ambiguous { alternatives, .. } => Some(format!(
                "ambiguous input with {} possible readings",
                alternatives.len() + 1
            )),
            Self::NeedsInfo { suggestion, .. } => Some(suggestion.clone()),
            Self::Unknown { input, .. } => Some(format!("could not understand '{}'", input)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sol() -> TokenInfo {
        TokenInfo::new("SOL", "So11111111111111111111111111111111111111112", 9)
    }

    #[test]
    fn test_with_amount_only_on_amount_bearing_intents() {
        let transfer = TransactionIntent::Transfer {
            amount: Decimal::ONE,
            token: sol(),
            recipient: Recipient::new("bob.sol", "Bob1111111111111111111111111111111111111111"),
        };
        let updated = transfer.with_amount(Decimal::from(3)).unwrap();
        assert_eq!(updated.amount(), Some(Decimal::from(3)));

        assert!(TransactionIntent::SubscribeSlot.with_amount(Decimal::ONE).is_none());
    }

    #[test]
    fn test_sell_amount_becomes_token_amount() {
        let sell = TransactionIntent::LaunchSell {
            amount: SellAmount::All,
            mint: "mint".to_string(),
            symbol: None,
        };
        assert_eq!(sell.amount(), None);
        let updated = sell.with_amount(Decimal::from_str("2.5").unwrap()).unwrap();
        assert_eq!(updated.amount(), Some(Decimal::from_str("2.5").unwrap()));
    }

    #[test]
    fn test_serialized_tag() {
        let json = serde_json::to_value(TransactionIntent::SubscribeSlot).unwrap();
        assert_eq!(json["type"], "subscribe_slot");
        assert_eq!(IntentKind::LaunchBuy.to_string(), "launch_buy");
    }
}
