//! Intent matcher - ordered pattern catalog for single wallet commands
//!
//! Categories are scanned in declaration order, and patterns within a
//! category in declaration order. The first pattern whose extractor accepts
//! the input wins; an extractor that rejects (bad number, wrong shape) hands
//! control to the next pattern. Resolver I/O failures are the only errors
//! that escape [`IntentParser::parse`].

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::{Captures, Regex};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::amount::{parse_amount, AmountError, AMOUNT_LITERAL};
use crate::entities::{is_address_like, is_domain_like};
use crate::error::{Error, Result};
use crate::resolver::EntityResolver;
use crate::types::{
    IntentKind, ParseResult, Recipient, SellAmount, TokenInfo, TransactionIntent,
    AMBIGUOUS_CONFIDENCE, CANONICAL_CONFIDENCE, VARIANT_CONFIDENCE,
};

/// Example commands returned with every `Unknown` result, in this order.
pub const COMMAND_TEMPLATES: &[&str] = &[
    "send 1 SOL to alice.sol",
    "swap 0.5 SOL for BONK",
    "stake 10 SOL",
    "what's my balance",
    "buy 0.1 SOL of <mint> on pump",
    "resolve alice.sol",
    "show my NFTs",
    "bundle: send 1 SOL to bob then swap 1 SOL for USDC",
    "every day swap 1 USDC for SOL",
    "if SOL > 200 then sell 50% of BONK on pump",
];

/// Input after trimming, quote unification and whitespace collapsing.
///
/// `lower` is an ASCII-lowercased copy of `cased`, so byte offsets found in
/// one are valid in the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub cased: String,
    pub lower: String,
}

impl Normalized {
    /// Original-case text for a byte range located in `lower`.
    pub fn cased_slice(&self, start: usize, end: usize) -> &str {
        &self.cased[start..end]
    }
}

pub fn normalize(text: &str) -> Normalized {
    let unified: String = text
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201B}' | '`' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201F}' => '"',
            other => other,
        })
        .collect();
    let collapsed = unified.split_whitespace().collect::<Vec<_>>().join(" ");
    let cased = collapsed
        .trim_end_matches(|c| c == '.' || c == '!' || c == '?')
        .trim_end()
        .to_string();
    let lower = cased.to_ascii_lowercase();
    Normalized { cased, lower }
}

/// Outcome of resolving a freeform recipient.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipientResolution {
    Resolved(Recipient),
    /// Several different addresses fit; the first is the preferred reading.
    Ambiguous(Recipient, Vec<Recipient>),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    NftTransfer,
    NftList,
    TransferTo,
    TransferPayee,
    TransferDefaultSol,
    TransferMissingAmount,
    TransferMissingRecipient,
    LaunchBuy,
    LaunchBuyMint,
    LaunchSell,
    LaunchCreate,
    SwapFor,
    SwapBuyWith,
    SwapBuyWorth,
    SwapSellFor,
    SwapMissingAmount,
    Stake,
    StakeMissingAmount,
    Unstake,
    UnstakeAll,
    Balance,
    TokenBalance,
    HowMuch,
    Portfolio,
    TokenPrice,
    History,
    ResolveDomain,
    ReverseLookup,
    ListDomains,
    SubscribeSlot,
    SubscribeAccount,
    WrapSol,
    UnwrapSol,
    BurnToken,
    CloseEmptyAccounts,
    Airdrop,
    Informational,
}

struct Pattern {
    regex: Regex,
    rule: Rule,
    confidence: f64,
}

struct Category {
    name: &'static str,
    patterns: Vec<Pattern>,
}

/// Why an extractor gave up on a pattern.
enum ExtractError {
    /// The text only looked like this pattern; try the next one.
    Mismatch(String),
    /// The resolver itself failed.
    Resource(Error),
}

impl From<AmountError> for ExtractError {
    fn from(err: AmountError) -> Self {
        Self::Mismatch(err.to_string())
    }
}

impl From<Error> for ExtractError {
    fn from(err: Error) -> Self {
        Self::Resource(err)
    }
}

type Extracted = std::result::Result<ParseResult, ExtractError>;

const SELL_SPEC: &str = r"(?P<spec>all|everything|\d[\d,]*(?:\.\d+)?\s*%|\d[\d,]*(?:\.\d+)?[kmb]?)";
const PUMP_SUFFIX: &str = r"\s+on\s+pump(?:\.?fun)?";

// Expand `{amount}`, `{token}`, `{from}`, `{to}`, `{recipient}` and
// `{owner}` placeholders into named capture groups.
fn expand(template: &str) -> String {
    let mut out = template.replace("{amount}", &format!("(?P<amount>{})", AMOUNT_LITERAL));
    for name in ["token", "from", "to"] {
        out = out.replace(
            &format!("{{{}}}", name),
            &format!(r"\$?(?P<{}>[a-z][a-z0-9]{{0,9}})", name),
        );
    }
    for name in ["recipient", "owner"] {
        out = out.replace(&format!("{{{}}}", name), &format!(r"(?P<{}>\S+)", name));
    }
    out
}

fn pattern(template: &str, rule: Rule, confidence: f64) -> Pattern {
    Pattern {
        regex: Regex::new(&expand(template)).expect("Invalid regex pattern"),
        rule,
        confidence,
    }
}

fn text<'t>(caps: &Captures<'t>, name: &str) -> Option<&'t str> {
    caps.name(name).map(|m| m.as_str())
}

fn cased(n: &Normalized, caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| n.cased_slice(m.start(), m.end()).to_string())
}

fn mismatch(reason: impl Into<String>) -> ExtractError {
    ExtractError::Mismatch(reason.into())
}

fn positive_amount(caps: &Captures<'_>, name: &str) -> std::result::Result<Decimal, ExtractError> {
    let raw = text(caps, name).ok_or_else(|| mismatch(format!("no {} captured", name)))?;
    let amount = parse_amount(raw)?;
    if amount <= Decimal::ZERO {
        return Err(mismatch("amount must be positive"));
    }
    Ok(amount)
}

fn success(intent: TransactionIntent, confidence: f64, n: &Normalized) -> Extracted {
    Ok(ParseResult::Success {
        intent,
        confidence,
        raw_input: n.cased.clone(),
    })
}

fn needs_info(
    intent_type: IntentKind,
    missing: &[&str],
    partial: &[(&str, String)],
    suggestion: String,
) -> Extracted {
    Ok(ParseResult::NeedsInfo {
        intent_type,
        missing: missing.iter().map(|m| m.to_string()).collect(),
        partial: partial
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
        suggestion,
    })
}

/// Single-clause intent parser
pub struct IntentParser {
    resolver: Arc<dyn EntityResolver>,
    categories: Vec<Category>,
    swap_option: Regex,
}

impl IntentParser {
    pub fn new(resolver: Arc<dyn EntityResolver>) -> Self {
        let c = CANONICAL_CONFIDENCE;
        let v = VARIANT_CONFIDENCE;
        let pump = PUMP_SUFFIX;

        let categories = vec![
            Category {
                name: "nft",
                patterns: vec![
                    pattern(r"^(?:send|transfer|give)\s+(?:my\s+)?nft\s+(?P<mint>\S+)\s+to\s+{recipient}$", Rule::NftTransfer, c),
                    pattern(r"^(?:show|list|view)\s+(?:my\s+)?nfts(?:\s+(?:of|for|owned\s+by)\s+{owner})?$", Rule::NftList, c),
                ],
            },
            Category {
                name: "transfer",
                patterns: vec![
                    pattern(r"^(?:send|transfer)\s+{amount}\s+{token}\s+to\s+{recipient}$", Rule::TransferTo, c),
                    pattern(r"^pay\s+{amount}\s+{token}\s+to\s+{recipient}$", Rule::TransferTo, v),
                    pattern(r"^(?:pay|give|tip)\s+{recipient}\s+{amount}\s+{token}$", Rule::TransferPayee, v),
                    pattern(r"^(?:send|transfer|pay)\s+{amount}\s+to\s+{recipient}$", Rule::TransferDefaultSol, v),
                    pattern(r"^(?:send|transfer|pay)\s+(?:some\s+)?{token}\s+to\s+{recipient}$", Rule::TransferMissingAmount, v),
                    pattern(r"^(?:send|transfer)\s+{amount}\s+{token}$", Rule::TransferMissingRecipient, v),
                ],
            },
            Category {
                name: "launch",
                patterns: vec![
                    pattern(&format!(r"^(?:buy|ape)\s+{{amount}}\s*sol\s+(?:of|worth\s+of|into)\s+\$?(?P<mint>\S+){}$", pump), Rule::LaunchBuy, c),
                    pattern(r"^(?:buy|ape)\s+{amount}\s*sol\s+(?:of|worth\s+of|into)\s+(?P<mint>[1-9a-z]{32,44})$", Rule::LaunchBuyMint, v),
                    pattern(&format!(r"^(?:sell|dump)\s+{}\s+(?:of\s+)?(?:my\s+)?\$?(?P<mint>\S+){}$", SELL_SPEC, pump), Rule::LaunchSell, c),
                    pattern(r"^(?:sell|dump)\s+(?P<spec>all|everything|\d[\d,]*(?:\.\d+)?\s*%)\s+(?:of\s+)?(?:my\s+)?\$?(?P<mint>\S+)$", Rule::LaunchSell, v),
                    pattern(r"^(?:create|launch|deploy)\s+(?:a\s+)?(?:new\s+)?(?:token|coin|memecoin)\s+(?:named\s+|called\s+)?(?P<name>.+?)\s+(?:with\s+)?(?:symbol|ticker)\s+\$?(?P<symbol>[a-z0-9]{1,10})(?:\s+(?:and\s+)?(?:an?\s+)?(?:initial\s+|dev\s+)?buy\s+(?:of\s+)?{amount}\s*(?:sol)?)?$", Rule::LaunchCreate, c),
                ],
            },
            Category {
                name: "swap",
                patterns: vec![
                    pattern(r"^(?:swap|exchange|convert|trade)\s+{amount}\s+{from}\s+(?:for|to|into)\s+{to}(?P<options>.*)$", Rule::SwapFor, c),
                    pattern(r"^buy\s+{to}\s+with\s+{amount}\s+{from}(?P<options>.*)$", Rule::SwapBuyWith, v),
                    pattern(r"^buy\s+{amount}\s+{from}\s+(?:of|worth\s+of)\s+{to}(?P<options>.*)$", Rule::SwapBuyWorth, v),
                    pattern(r"^sell\s+{amount}\s+{from}\s+(?:for|to|into)\s+{to}(?P<options>.*)$", Rule::SwapSellFor, v),
                    pattern(r"^(?:swap|exchange|convert|trade)\s+(?:some\s+)?{from}\s+(?:for|to|into)\s+{to}$", Rule::SwapMissingAmount, v),
                ],
            },
            Category {
                name: "staking",
                patterns: vec![
                    pattern(r"^stake\s+{amount}\s*(?:sol)?(?:\s+(?:with|to|on|via)\s+(?P<validator>\S+))?$", Rule::Stake, c),
                    pattern(r"^stake(?:\s+(?:my\s+|some\s+)?sol)?$", Rule::StakeMissingAmount, v),
                    pattern(r"^(?:unstake|deactivate\s+stake|withdraw\s+stake)\s+{amount}\s*(?:sol)?$", Rule::Unstake, c),
                    pattern(r"^(?:unstake|deactivate\s+stake|withdraw\s+stake)(?:\s+(?:all|everything))?(?:\s+(?:my\s+)?sol)?$", Rule::UnstakeAll, v),
                ],
            },
            Category {
                name: "query",
                patterns: vec![
                    pattern(r"^(?:check\s+|show\s+|get\s+)?(?:what(?:'s|\s+is)\s+)?(?:my\s+)?(?:wallet\s+)?balance(?:\s+(?:of|for)\s+{owner})?$", Rule::Balance, c),
                    pattern(r"^(?:check\s+|show\s+|get\s+)?(?:what(?:'s|\s+is)\s+)?(?:my\s+)?{token}\s+balance$", Rule::TokenBalance, c),
                    pattern(r"^how\s+much\s+{token}\s+(?:do\s+i\s+have|does\s+{owner}\s+have)$", Rule::HowMuch, v),
                    pattern(r"^(?:show|list|view|check|what(?:'s|\s+is|\s+are))\s+(?:in\s+)?(?:my\s+)?(?:portfolio|assets|holdings|tokens|wallet)(?:\s+(?:of|for)\s+{owner})?$", Rule::Portfolio, c),
                    pattern(r"^(?:what(?:'s|\s+is)\s+)?(?:the\s+)?(?:current\s+)?price\s+of\s+{token}$", Rule::TokenPrice, c),
                    pattern(r"^(?:how\s+much\s+is\s+)?{token}\s+price$", Rule::TokenPrice, v),
                    pattern(r"^(?:show\s+|list\s+|view\s+)?(?:my\s+)?(?:recent\s+|last\s+(?P<limit>\d{1,4})\s+)?(?:transactions|transaction\s+history|tx\s+history|history|txs)$", Rule::History, c),
                ],
            },
            Category {
                name: "domain",
                patterns: vec![
                    pattern(r"^(?:resolve|lookup|look\s+up|whois|who\s+is)\s+(?P<domain>\S+\.\S+)$", Rule::ResolveDomain, c),
                    pattern(r"^what(?:'s|\s+is)\s+the\s+address\s+(?:of|for)\s+(?P<domain>\S+\.\S+)$", Rule::ResolveDomain, v),
                    pattern(r"^reverse(?:\s+lookup)?\s+(?P<address>\S+)$", Rule::ReverseLookup, c),
                    pattern(r"^(?:what(?:'s|\s+is)\s+the\s+)?domain\s+(?:of|for)\s+(?P<address>\S+)$", Rule::ReverseLookup, v),
                    pattern(r"^(?:list|show|get)\s+(?:all\s+)?(?:the\s+)?domains\s+(?:owned\s+by|of|for)\s+{owner}$", Rule::ListDomains, c),
                ],
            },
            Category {
                name: "subscription",
                patterns: vec![
                    pattern(r"^(?:subscribe\s+to|watch|monitor|stream)\s+(?:new\s+)?slots?(?:\s+updates)?$", Rule::SubscribeSlot, c),
                    pattern(r"^(?:subscribe\s+to|watch|monitor|stream)\s+(?:account\s+|wallet\s+|address\s+)?{recipient}$", Rule::SubscribeAccount, c),
                ],
            },
            Category {
                name: "token_ops",
                patterns: vec![
                    pattern(r"^wrap\s+{amount}\s*sol$", Rule::WrapSol, c),
                    pattern(r"^unwrap(?:\s+{amount})?\s*(?:all\s+)?(?:my\s+)?w?sol$", Rule::UnwrapSol, c),
                    pattern(r"^burn\s+{amount}\s+{token}$", Rule::BurnToken, c),
                    pattern(r"^(?:close|clean\s+up|cleanup)\s+(?:all\s+)?(?:my\s+)?empty\s+(?:token\s+)?accounts$", Rule::CloseEmptyAccounts, c),
                    pattern(r"^(?:request\s+|get\s+)?(?:an?\s+)?airdrop(?:\s+(?:of|for))?\s+{amount}\s*(?:sol)?$", Rule::Airdrop, c),
                ],
            },
            Category {
                name: "informational",
                patterns: vec![pattern(
                    r"^(?:what\s+is|what's|whats|explain|tell\s+me\s+about|how\s+does)\s+(?P<topic>.+?)(?:\s+work)?$",
                    Rule::Informational,
                    v,
                )],
            },
        ];

        Self {
            resolver,
            categories,
            swap_option: Regex::new(
                r"^(?:,\s*|and\s+|with\s+)*(?:(?:a\s+)?(?:max\s+)?(?P<pct>\d+(?:\.\d+)?)\s*%\s*(?:max\s+)?slippage|slippage\s+(?:of\s+)?(?P<pct2>\d+(?:\.\d+)?)\s*%|(?P<protect>(?:mev[\s-]+)?protection|mev[\s-]+protect(?:ed)?|protected|jito))",
            )
            .expect("Invalid regex pattern"),
        }
    }

    pub fn resolver(&self) -> &Arc<dyn EntityResolver> {
        &self.resolver
    }

    /// Parse a single clause.
    pub async fn parse(&self, input: &str) -> Result<ParseResult> {
        let normalized = normalize(input);
        if normalized.lower.is_empty() {
            return Ok(self.unknown(input));
        }

        for category in &self.categories {
            for pattern in &category.patterns {
                let Some(caps) = pattern.regex.captures(&normalized.lower) else {
                    continue;
                };
                match self
                    .extract(pattern.rule, pattern.confidence, &caps, &normalized)
                    .await
                {
                    Ok(result) => {
                        debug!(
                            category = category.name,
                            rule = ?pattern.rule,
                            "matched input"
                        );
                        return Ok(result);
                    }
                    Err(ExtractError::Mismatch(reason)) => {
                        debug!(
                            category = category.name,
                            rule = ?pattern.rule,
                            %reason,
                            "pattern rejected input"
                        );
                    }
                    Err(ExtractError::Resource(err)) => return Err(err),
                }
            }
        }

        Ok(self.unknown(input))
    }

    fn unknown(&self, input: &str) -> ParseResult {
        ParseResult::Unknown {
            input: input.trim().to_string(),
            suggestions: COMMAND_TEMPLATES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Resolve a token symbol (`$` prefix allowed).
    pub async fn resolve_token(&self, symbol: &str) -> Result<Option<TokenInfo>> {
        let symbol = symbol.trim().trim_start_matches('$').to_ascii_uppercase();
        let token = self.resolver.resolve_token(&symbol).await?;
        if token.is_none() {
            warn!(%symbol, "token not resolved");
        }
        Ok(token)
    }

    /// Resolve a freeform recipient: address, domain, alias or bare name.
    ///
    /// A bare name that is both an alias and `<name>.sol` with different
    /// owners is ambiguous; the alias reading comes first.
    pub async fn resolve_recipient(&self, raw: &str) -> Result<RecipientResolution> {
        let raw = raw.trim();
        if is_address_like(raw) {
            return Ok(RecipientResolution::Resolved(Recipient::new(raw, raw)));
        }

        let lower = raw.to_ascii_lowercase();
        if is_domain_like(&lower) {
            return Ok(match self.resolver.resolve_domain(&lower).await? {
                Some(address) => RecipientResolution::Resolved(Recipient::new(lower, address)),
                None => {
                    warn!(domain = %lower, "domain not resolved");
                    RecipientResolution::NotFound
                }
            });
        }

        let alias = self.resolver.lookup_alias(&lower).await?;
        let implied_domain = format!("{}.sol", lower);
        let domain = self.resolver.resolve_domain(&implied_domain).await?;

        Ok(match (alias, domain) {
            (Some(alias_addr), Some(domain_addr)) if alias_addr != domain_addr => {
                RecipientResolution::Ambiguous(
                    Recipient::new(lower, alias_addr),
                    vec![Recipient::new(implied_domain, domain_addr)],
                )
            }
            (Some(address), _) => RecipientResolution::Resolved(Recipient::new(lower, address)),
            (None, Some(address)) => {
                RecipientResolution::Resolved(Recipient::new(implied_domain, address))
            }
            (None, None) => match self.resolver.resolve_address(&lower).await? {
                Some(address) => RecipientResolution::Resolved(Recipient::new(lower, address)),
                None => {
                    warn!(recipient = %lower, "recipient not resolved");
                    RecipientResolution::NotFound
                }
            },
        })
    }

    async fn extract(
        &self,
        rule: Rule,
        confidence: f64,
        caps: &Captures<'_>,
        n: &Normalized,
    ) -> Extracted {
        match rule {
            Rule::TransferTo | Rule::TransferPayee | Rule::TransferDefaultSol => {
                let amount = positive_amount(caps, "amount")?;
                let symbol = text(caps, "token").unwrap_or("sol");
                let raw_recipient =
                    cased(n, caps, "recipient").ok_or_else(|| mismatch("no recipient"))?;
                self.transfer(amount, symbol, &raw_recipient, confidence, n)
                    .await
            }
            Rule::TransferMissingAmount => {
                let symbol = text(caps, "token").unwrap_or("sol").to_ascii_uppercase();
                let recipient = cased(n, caps, "recipient").unwrap_or_default();
                needs_info(
                    IntentKind::Transfer,
                    &["amount"],
                    &[("token", symbol.clone()), ("recipient", recipient.clone())],
                    format!("How much {} should I send to {}?", symbol, recipient),
                )
            }
            Rule::TransferMissingRecipient => {
                let amount = positive_amount(caps, "amount")?;
                let symbol = text(caps, "token").unwrap_or("sol").to_ascii_uppercase();
                needs_info(
                    IntentKind::Transfer,
                    &["recipient"],
                    &[("amount", amount.to_string()), ("token", symbol.clone())],
                    format!("Who should receive {} {}?", amount, symbol),
                )
            }
            Rule::NftTransfer => {
                let mint = cased(n, caps, "mint").ok_or_else(|| mismatch("no mint"))?;
                let raw_recipient =
                    cased(n, caps, "recipient").ok_or_else(|| mismatch("no recipient"))?;
                match self.resolve_recipient(&raw_recipient).await? {
                    RecipientResolution::Resolved(recipient) => success(
                        TransactionIntent::NftTransfer { mint, recipient },
                        confidence,
                        n,
                    ),
                    RecipientResolution::Ambiguous(primary, others) => Ok(ParseResult::Ambiguous {
                        primary: TransactionIntent::NftTransfer {
                            mint: mint.clone(),
                            recipient: primary,
                        },
                        alternatives: others
                            .into_iter()
                            .map(|recipient| TransactionIntent::NftTransfer {
                                mint: mint.clone(),
                                recipient,
                            })
                            .collect(),
                        confidence: AMBIGUOUS_CONFIDENCE,
                    }),
                    RecipientResolution::NotFound => needs_info(
                        IntentKind::NftTransfer,
                        &["recipient"],
                        &[("mint", mint), ("recipient", raw_recipient.clone())],
                        unresolved_recipient_prompt(&raw_recipient),
                    ),
                }
            }
            Rule::NftList => {
                let owner = self.optional_owner(caps, n).await?;
                match owner {
                    Ok(owner) => success(TransactionIntent::NftList { owner }, confidence, n),
                    Err(raw) => needs_info(
                        IntentKind::NftList,
                        &["owner"],
                        &[("owner", raw.clone())],
                        unresolved_recipient_prompt(&raw),
                    ),
                }
            }
            Rule::LaunchBuy | Rule::LaunchBuyMint => {
                let amount_sol = positive_amount(caps, "amount")?;
                let raw = cased(n, caps, "mint").ok_or_else(|| mismatch("no token"))?;
                if rule == Rule::LaunchBuyMint && !is_address_like(&raw) {
                    return Err(mismatch("launch token is not a mint address"));
                }
                let (mint, symbol) = match self.launch_token(&raw).await? {
                    Some(found) => found,
                    None => {
                        return needs_info(
                            IntentKind::LaunchBuy,
                            &["mint"],
                            &[("amount_sol", amount_sol.to_string()), ("token", raw.clone())],
                            format!("I couldn't find a token called '{}'. Paste its mint address.", raw),
                        )
                    }
                };
                success(
                    TransactionIntent::LaunchBuy {
                        amount_sol,
                        mint,
                        symbol,
                    },
                    confidence,
                    n,
                )
            }
            Rule::LaunchSell => {
                let spec = text(caps, "spec").ok_or_else(|| mismatch("no sell amount"))?;
                let amount = parse_sell_amount(spec)?;
                let raw = cased(n, caps, "mint").ok_or_else(|| mismatch("no token"))?;
                let (mint, symbol) = match self.launch_token(&raw).await? {
                    Some(found) => found,
                    None => {
                        return needs_info(
                            IntentKind::LaunchSell,
                            &["mint"],
                            &[("token", raw.clone())],
                            format!("I couldn't find a token called '{}'. Paste its mint address.", raw),
                        )
                    }
                };
                success(
                    TransactionIntent::LaunchSell {
                        amount,
                        mint,
                        symbol,
                    },
                    confidence,
                    n,
                )
            }
            Rule::LaunchCreate => {
                let name = cased(n, caps, "name").ok_or_else(|| mismatch("no name"))?;
                let name = name.trim_matches(|c| c == '"' || c == '\'').trim().to_string();
                if name.is_empty() {
                    return Err(mismatch("empty token name"));
                }
                let symbol = text(caps, "symbol")
                    .ok_or_else(|| mismatch("no symbol"))?
                    .to_ascii_uppercase();
                let initial_buy_sol = match caps.name("amount") {
                    Some(_) => Some(positive_amount(caps, "amount")?),
                    None => None,
                };
                success(
                    TransactionIntent::LaunchCreate {
                        name,
                        symbol,
                        initial_buy_sol,
                    },
                    confidence,
                    n,
                )
            }
            Rule::SwapFor | Rule::SwapBuyWith | Rule::SwapBuyWorth | Rule::SwapSellFor => {
                let amount = positive_amount(caps, "amount")?;
                let (slippage_bps, mev_protection) =
                    self.swap_options(text(caps, "options").unwrap_or(""))?;
                let from_symbol = text(caps, "from").ok_or_else(|| mismatch("no input token"))?;
                let to_symbol = text(caps, "to").ok_or_else(|| mismatch("no output token"))?;
                if from_symbol == to_symbol {
                    return Err(mismatch("swap tokens are identical"));
                }

                let from = self.resolve_token(from_symbol).await?;
                let to = self.resolve_token(to_symbol).await?;
                match (from, to) {
                    (Some(from), Some(to)) => success(
                        TransactionIntent::Swap {
                            amount,
                            from,
                            to,
                            slippage_bps,
                            mev_protection,
                        },
                        confidence,
                        n,
                    ),
                    (from, to) => {
                        let mut missing = Vec::new();
                        if from.is_none() {
                            missing.push("from");
                        }
                        if to.is_none() {
                            missing.push("to");
                        }
                        let unknown = if from.is_none() { from_symbol } else { to_symbol };
                        needs_info(
                            IntentKind::Swap,
                            &missing,
                            &[
                                ("amount", amount.to_string()),
                                ("from", from_symbol.to_ascii_uppercase()),
                                ("to", to_symbol.to_ascii_uppercase()),
                            ],
                            format!(
                                "I don't recognize the token '{}'. Which token did you mean?",
                                unknown.to_ascii_uppercase()
                            ),
                        )
                    }
                }
            }
            Rule::SwapMissingAmount => {
                let from = text(caps, "from").unwrap_or("").to_ascii_uppercase();
                let to = text(caps, "to").unwrap_or("").to_ascii_uppercase();
                needs_info(
                    IntentKind::Swap,
                    &["amount"],
                    &[("from", from.clone()), ("to", to.clone())],
                    format!("How much {} should I swap for {}?", from, to),
                )
            }
            Rule::Stake => {
                let amount = positive_amount(caps, "amount")?;
                let validator = cased(n, caps, "validator");
                success(TransactionIntent::Stake { amount, validator }, confidence, n)
            }
            Rule::StakeMissingAmount => needs_info(
                IntentKind::Stake,
                &["amount"],
                &[],
                "How much SOL would you like to stake?".to_string(),
            ),
            Rule::Unstake => {
                let amount = positive_amount(caps, "amount")?;
                success(
                    TransactionIntent::Unstake {
                        amount: Some(amount),
                    },
                    confidence,
                    n,
                )
            }
            Rule::UnstakeAll => success(TransactionIntent::Unstake { amount: None }, confidence, n),
            Rule::Balance => match self.optional_owner(caps, n).await? {
                Ok(owner) => success(TransactionIntent::Balance { token: None, owner }, confidence, n),
                Err(raw) => needs_info(
                    IntentKind::Balance,
                    &["owner"],
                    &[("owner", raw.clone())],
                    unresolved_recipient_prompt(&raw),
                ),
            },
            Rule::TokenBalance | Rule::HowMuch => {
                let symbol = text(caps, "token").ok_or_else(|| mismatch("no token"))?;
                if matches!(symbol, "my" | "wallet" | "the") {
                    return Err(mismatch("not a token symbol"));
                }
                let Some(token) = self.resolve_token(symbol).await? else {
                    return needs_info(
                        IntentKind::Balance,
                        &["token"],
                        &[("token", symbol.to_ascii_uppercase())],
                        format!("I don't recognize the token '{}'.", symbol.to_ascii_uppercase()),
                    );
                };
                match self.optional_owner(caps, n).await? {
                    Ok(owner) => success(
                        TransactionIntent::Balance {
                            token: Some(token),
                            owner,
                        },
                        confidence,
                        n,
                    ),
                    Err(raw) => needs_info(
                        IntentKind::Balance,
                        &["owner"],
                        &[("token", token.symbol), ("owner", raw.clone())],
                        unresolved_recipient_prompt(&raw),
                    ),
                }
            }
            Rule::Portfolio => match self.optional_owner(caps, n).await? {
                Ok(owner) => success(TransactionIntent::Portfolio { owner }, confidence, n),
                Err(raw) => needs_info(
                    IntentKind::Portfolio,
                    &["owner"],
                    &[("owner", raw.clone())],
                    unresolved_recipient_prompt(&raw),
                ),
            },
            Rule::TokenPrice => {
                let symbol = text(caps, "token").ok_or_else(|| mismatch("no token"))?;
                match self.resolve_token(symbol).await? {
                    Some(token) => success(TransactionIntent::TokenPrice { token }, confidence, n),
                    None => needs_info(
                        IntentKind::TokenPrice,
                        &["token"],
                        &[("token", symbol.to_ascii_uppercase())],
                        format!("I don't recognize the token '{}'.", symbol.to_ascii_uppercase()),
                    ),
                }
            }
            Rule::History => {
                let limit = match text(caps, "limit") {
                    Some(raw) => Some(
                        raw.parse::<u32>()
                            .map_err(|e| mismatch(format!("bad limit: {}", e)))?,
                    ),
                    None => None,
                };
                success(TransactionIntent::TransactionHistory { limit }, confidence, n)
            }
            Rule::ResolveDomain => {
                let domain = text(caps, "domain")
                    .ok_or_else(|| mismatch("no domain"))?
                    .to_string();
                if !is_domain_like(&domain) {
                    return Err(mismatch("not a domain"));
                }
                match self.resolver.resolve_domain(&domain).await? {
                    Some(address) => success(
                        TransactionIntent::ResolveDomain { domain, address },
                        confidence,
                        n,
                    ),
                    None => needs_info(
                        IntentKind::ResolveDomain,
                        &["domain"],
                        &[("domain", domain.clone())],
                        format!("'{}' is not registered. Check the spelling.", domain),
                    ),
                }
            }
            Rule::ReverseLookup => {
                let address = cased(n, caps, "address").ok_or_else(|| mismatch("no address"))?;
                if !is_address_like(&address) {
                    return Err(mismatch("not a wallet address"));
                }
                let domain = self.resolver.reverse_lookup(&address).await?;
                success(
                    TransactionIntent::ReverseLookup { address, domain },
                    confidence,
                    n,
                )
            }
            Rule::ListDomains => {
                let raw = cased(n, caps, "owner").ok_or_else(|| mismatch("no owner"))?;
                match self.resolve_recipient(&raw).await? {
                    RecipientResolution::Resolved(owner)
                    | RecipientResolution::Ambiguous(owner, _) => {
                        let domains = self.resolver.get_domains(&owner.address).await?;
                        success(
                            TransactionIntent::ListDomains { owner, domains },
                            confidence,
                            n,
                        )
                    }
                    RecipientResolution::NotFound => needs_info(
                        IntentKind::ListDomains,
                        &["owner"],
                        &[("owner", raw.clone())],
                        unresolved_recipient_prompt(&raw),
                    ),
                }
            }
            Rule::SubscribeSlot => success(TransactionIntent::SubscribeSlot, confidence, n),
            Rule::SubscribeAccount => {
                let raw = cased(n, caps, "recipient").ok_or_else(|| mismatch("no account"))?;
                match self.resolve_recipient(&raw).await? {
                    RecipientResolution::Resolved(account)
                    | RecipientResolution::Ambiguous(account, _) => success(
                        TransactionIntent::SubscribeAccount { account },
                        confidence,
                        n,
                    ),
                    RecipientResolution::NotFound => needs_info(
                        IntentKind::SubscribeAccount,
                        &["account"],
                        &[("account", raw.clone())],
                        unresolved_recipient_prompt(&raw),
                    ),
                }
            }
            Rule::WrapSol => {
                let amount = positive_amount(caps, "amount")?;
                success(TransactionIntent::WrapSol { amount }, confidence, n)
            }
            Rule::UnwrapSol => {
                let amount = match caps.name("amount") {
                    Some(_) => Some(positive_amount(caps, "amount")?),
                    None => None,
                };
                success(TransactionIntent::UnwrapSol { amount }, confidence, n)
            }
            Rule::BurnToken => {
                let amount = positive_amount(caps, "amount")?;
                let symbol = text(caps, "token").ok_or_else(|| mismatch("no token"))?;
                match self.resolve_token(symbol).await? {
                    Some(token) => success(TransactionIntent::BurnToken { amount, token }, confidence, n),
                    None => needs_info(
                        IntentKind::BurnToken,
                        &["token"],
                        &[("amount", amount.to_string()), ("token", symbol.to_ascii_uppercase())],
                        format!("I don't recognize the token '{}'.", symbol.to_ascii_uppercase()),
                    ),
                }
            }
            Rule::CloseEmptyAccounts => success(TransactionIntent::CloseEmptyAccounts, confidence, n),
            Rule::Airdrop => {
                let amount = positive_amount(caps, "amount")?;
                success(TransactionIntent::Airdrop { amount }, confidence, n)
            }
            Rule::Informational => {
                let topic = text(caps, "topic")
                    .ok_or_else(|| mismatch("no topic"))?
                    .trim()
                    .to_string();
                if topic.is_empty() {
                    return Err(mismatch("empty topic"));
                }
                success(TransactionIntent::Informational { topic }, confidence, n)
            }
        }
    }

    async fn transfer(
        &self,
        amount: Decimal,
        symbol: &str,
        raw_recipient: &str,
        confidence: f64,
        n: &Normalized,
    ) -> Extracted {
        let Some(token) = self.resolve_token(symbol).await? else {
            let symbol = symbol.trim_start_matches('$').to_ascii_uppercase();
            return needs_info(
                IntentKind::Transfer,
                &["token"],
                &[
                    ("amount", amount.to_string()),
                    ("token", symbol.clone()),
                    ("recipient", raw_recipient.to_string()),
                ],
                format!("I don't recognize the token '{}'. Which token should I send?", symbol),
            );
        };

        match self.resolve_recipient(raw_recipient).await? {
            RecipientResolution::Resolved(recipient) => success(
                TransactionIntent::Transfer {
                    amount,
                    token,
                    recipient,
                },
                confidence,
                n,
            ),
            RecipientResolution::Ambiguous(primary, others) => Ok(ParseResult::Ambiguous {
                primary: TransactionIntent::Transfer {
                    amount,
                    token: token.clone(),
                    recipient: primary,
                },
                alternatives: others
                    .into_iter()
                    .map(|recipient| TransactionIntent::Transfer {
                        amount,
                        token: token.clone(),
                        recipient,
                    })
                    .collect(),
                confidence: AMBIGUOUS_CONFIDENCE,
            }),
            RecipientResolution::NotFound => needs_info(
                IntentKind::Transfer,
                &["recipient"],
                &[
                    ("amount", amount.to_string()),
                    ("token", token.symbol),
                    ("recipient", raw_recipient.to_string()),
                ],
                unresolved_recipient_prompt(raw_recipient),
            ),
        }
    }

    // Ok(None) when no owner was written, Err(raw) when it did not resolve.
    async fn optional_owner(
        &self,
        caps: &Captures<'_>,
        n: &Normalized,
    ) -> Result<std::result::Result<Option<Recipient>, String>> {
        let Some(raw) = cased(n, caps, "owner") else {
            return Ok(Ok(None));
        };
        Ok(match self.resolve_recipient(&raw).await? {
            RecipientResolution::Resolved(owner) | RecipientResolution::Ambiguous(owner, _) => {
                Ok(Some(owner))
            }
            RecipientResolution::NotFound => Err(raw),
        })
    }

    // A launch token is either a mint address or a symbol the resolver knows.
    async fn launch_token(&self, raw: &str) -> Result<Option<(String, Option<String>)>> {
        if is_address_like(raw) {
            return Ok(Some((raw.to_string(), None)));
        }
        Ok(self
            .resolve_token(raw)
            .await?
            .map(|token| (token.mint, Some(token.symbol))))
    }

    fn swap_options(
        &self,
        options: &str,
    ) -> std::result::Result<(Option<u32>, bool), ExtractError> {
        let mut rest = options.trim();
        let mut slippage_bps = None;
        let mut protected = false;

        while !rest.is_empty() {
            let caps = self
                .swap_option
                .captures(rest)
                .ok_or_else(|| mismatch(format!("unrecognized swap option '{}'", rest)))?;
            if let Some(pct) = caps.name("pct").or_else(|| caps.name("pct2")) {
                let percent = parse_amount(pct.as_str())?;
                let bps = (percent * Decimal::from(100))
                    .round()
                    .to_u32()
                    .ok_or_else(|| mismatch("slippage out of range"))?;
                if bps > 10_000 {
                    return Err(mismatch("slippage above 100%"));
                }
                slippage_bps = Some(bps);
            }
            if caps.name("protect").is_some() {
                protected = true;
            }
            let consumed = caps.get(0).map(|m| m.end()).unwrap_or(0);
            if consumed == 0 {
                return Err(mismatch(format!("unrecognized swap option '{}'", rest)));
            }
            rest = rest[consumed..].trim_start();
        }

        Ok((slippage_bps, protected))
    }
}

fn parse_sell_amount(spec: &str) -> std::result::Result<SellAmount, ExtractError> {
    let spec = spec.trim();
    if spec == "all" || spec == "everything" {
        return Ok(SellAmount::All);
    }
    if let Some(pct) = spec.strip_suffix('%') {
        let percent = parse_amount(pct)?;
        if percent <= Decimal::ZERO || percent > Decimal::from(100) {
            return Err(mismatch("percentage must be within (0, 100]"));
        }
        return Ok(if percent == Decimal::from(100) {
            SellAmount::All
        } else {
            SellAmount::Percent { percent }
        });
    }
    let amount = parse_amount(spec)?;
    if amount <= Decimal::ZERO {
        return Err(mismatch("amount must be positive"));
    }
    Ok(SellAmount::Tokens { amount })
}

fn unresolved_recipient_prompt(raw: &str) -> String {
    format!(
        "I couldn't resolve '{}'. Provide a wallet address or a registered domain.",
        raw
    )
}
