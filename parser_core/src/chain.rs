//! Chain parser - multi-clause composition on top of the intent matcher
//!
//! Marker detection runs in a fixed order: bundle, batch, conditional,
//! recurring, scheduled, cancel/copy-trade/snipe, implicit sequence and
//! finally a single clause. An input that carries two markers is classified
//! by the earlier one, so "if sol > 200 then ..." stays a conditional even
//! though it contains "then".

use std::iter;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::{parse_amount, parse_tip, AMOUNT_LITERAL};
use crate::condition::{Condition, ConditionParser};
use crate::entities::is_address_like;
use crate::error::Result;
use crate::matcher::{normalize, IntentParser, Normalized, RecipientResolution};
use crate::resolver::EntityResolver;
use crate::schedule::{Clock, Interval, IntervalUnit, TimeParser};
use crate::types::{ParseResult, Recipient, TransactionIntent};

/// One step of an implicit sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStep {
    pub order: usize,
    pub depends_on: Option<usize>,
    pub intent: TransactionIntent,
}

/// A segment of a bundle or batch that did not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub index: usize,
    pub text: String,
    pub reason: String,
}

/// Result of parsing a possibly multi-clause command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainParseResult {
    Empty,
    Single {
        intent: TransactionIntent,
        confidence: f64,
        tip: Option<Decimal>,
    },
    Sequential {
        steps: Vec<ChainStep>,
    },
    /// Atomic group submitted together.
    Bundle {
        intents: Vec<TransactionIntent>,
        tip: Option<Decimal>,
    },
    /// Independent, non-atomic group.
    Batch {
        intents: Vec<TransactionIntent>,
    },
    Conditional {
        condition: Condition,
        then_intent: TransactionIntent,
    },
    Scheduled {
        intent: TransactionIntent,
        execution_time: DateTime<Utc>,
    },
    Recurring {
        interval: Interval,
        intent: TransactionIntent,
        start_time: DateTime<Utc>,
    },
    CopyTrade {
        wallet: Recipient,
        multiplier: Decimal,
    },
    Snipe {
        token_identifier: String,
        amount: Option<Decimal>,
    },
    CancelSubscription {
        id: Option<String>,
    },
    ChainFailure {
        step_index: usize,
        reason: String,
        suggestions: Vec<String>,
    },
    ChainAmbiguous {
        step_index: usize,
        candidates: Vec<TransactionIntent>,
    },
    PartialFailure {
        successes: Vec<TransactionIntent>,
        failures: Vec<StepFailure>,
    },
    InvalidCondition {
        text: String,
    },
    InvalidSchedule {
        text: String,
    },
    InvalidRecurrence {
        text: String,
    },
}

impl ChainParseResult {
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            Self::Empty
                | Self::ChainFailure { .. }
                | Self::ChainAmbiguous { .. }
                | Self::PartialFailure { .. }
                | Self::InvalidCondition { .. }
                | Self::InvalidSchedule { .. }
                | Self::InvalidRecurrence { .. }
        )
    }

    /// Every intent carried by a successful result, in execution order.
    pub fn intents(&self) -> Vec<&TransactionIntent> {
        match self {
            Self::Single { intent, .. }
            | Self::Scheduled { intent, .. }
            | Self::Recurring { intent, .. } => vec![intent],
            Self::Conditional { then_intent, .. } => vec![then_intent],
            Self::Sequential { steps } => steps.iter().map(|s| &s.intent).collect(),
            Self::Bundle { intents, .. } | Self::Batch { intents } => intents.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn last_intent(&self) -> Option<&TransactionIntent> {
        self.intents().last().copied()
    }

    /// Copy of this result with its last intent rewritten by `f`.
    pub fn map_last_intent<F>(&self, f: F) -> Option<Self>
    where
        F: FnOnce(&TransactionIntent) -> Option<TransactionIntent>,
    {
        let mut next = self.clone();
        let slot = match &mut next {
            Self::Single { intent, .. }
            | Self::Scheduled { intent, .. }
            | Self::Recurring { intent, .. } => intent,
            Self::Conditional { then_intent, .. } => then_intent,
            Self::Sequential { steps } => &mut steps.last_mut()?.intent,
            Self::Bundle { intents, .. } | Self::Batch { intents } => intents.last_mut()?,
            _ => return None,
        };
        *slot = f(&*slot)?;
        Some(next)
    }

    /// Copy of this result with a new tip, for results that carry one.
    pub fn with_tip(&self, new_tip: Decimal) -> Option<Self> {
        let mut next = self.clone();
        match &mut next {
            Self::Single { tip, .. } | Self::Bundle { tip, .. } => *tip = Some(new_tip),
            _ => return None,
        }
        Some(next)
    }

    /// Time left until a scheduled result should run, never negative.
    pub fn delay_until(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::Scheduled { execution_time, .. } => {
                Some((*execution_time - now).max(Duration::zero()))
            }
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Empty => Some("nothing to parse".to_string()),
            Self::ChainFailure {
                step_index, reason, ..
            } => Some(format!("step {} failed: {}", step_index + 1, reason)),
            Self::ChainAmbiguous {
                step_index,
                candidates,
            } => Some(format!(
                "step {} is ambiguous between {} readings",
                step_index + 1,
                candidates.len()
            )),
            Self::PartialFailure { failures, .. } => Some(
                failures
                    .iter()
                    .map(|f| format!("'{}': {}", f.text, f.reason))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            Self::InvalidCondition { text } => {
                Some(format!("could not understand the condition '{}'", text))
            }
            Self::InvalidSchedule { text } => {
                Some(format!("could not resolve the time '{}'", text))
            }
            Self::InvalidRecurrence { text } => {
                Some(format!("could not understand the interval '{}'", text))
            }
            _ => None,
        }
    }
}

// Success, or the chain-level failure for the step at `step_index`.
fn into_intent(
    step_index: usize,
    result: ParseResult,
) -> std::result::Result<(TransactionIntent, f64), ChainParseResult> {
    match result {
        ParseResult::Success {
            intent, confidence, ..
        } => Ok((intent, confidence)),
        ParseResult::Ambiguous {
            primary,
            alternatives,
            ..
        } => Err(ChainParseResult::ChainAmbiguous {
            step_index,
            candidates: iter::once(primary).chain(alternatives).collect(),
        }),
        ParseResult::NeedsInfo { suggestion, .. } => Err(ChainParseResult::ChainFailure {
            step_index,
            reason: suggestion,
            suggestions: Vec::new(),
        }),
        ParseResult::Unknown { input, suggestions } => Err(ChainParseResult::ChainFailure {
            step_index,
            reason: format!("could not understand '{}'", input),
            suggestions,
        }),
    }
}

fn failure(reason: impl Into<String>) -> ChainParseResult {
    ChainParseResult::ChainFailure {
        step_index: 0,
        reason: reason.into(),
        suggestions: Vec::new(),
    }
}

// Split on a connective, keeping "1,000" intact and dropping empty pieces.
fn split_segments(text: &str, connective: &Regex) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut start = 0;
    for m in connective.find_iter(text) {
        let inside_number = m.as_str() == ","
            && m.start() > 0
            && bytes[m.start() - 1].is_ascii_digit()
            && bytes.get(m.end()).map(u8::is_ascii_digit).unwrap_or(false);
        if inside_number {
            continue;
        }
        segments.push(&text[start..m.start()]);
        start = m.end();
    }
    segments.push(&text[start..]);
    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Multi-clause command parser
pub struct ChainParser {
    intents: IntentParser,
    conditions: ConditionParser,
    times: TimeParser,
    clock: Arc<dyn Clock>,
    bundle: Regex,
    batch: Regex,
    conditional_head: Regex,
    conditional: Regex,
    recurring: Regex,
    named_recurrence: Regex,
    weekday_recurrence: Regex,
    recurring_start: Regex,
    schedule_keyword: Regex,
    cancel_subscription: Regex,
    copy_trade: Regex,
    snipe_amount_first: Regex,
    snipe: Regex,
    sequence: Regex,
    batch_split: Regex,
    tip: Regex,
}

impl ChainParser {
    pub fn new(resolver: Arc<dyn EntityResolver>, clock: Arc<dyn Clock>) -> Self {
        Self::with_parts(IntentParser::new(resolver), clock, TimeParser::new(0, 9))
    }

    pub fn with_parts(intents: IntentParser, clock: Arc<dyn Clock>, times: TimeParser) -> Self {
        let re = |pattern: &str| Regex::new(pattern).expect("Invalid regex pattern");
        Self {
            intents,
            conditions: ConditionParser::new(),
            times,
            clock,
            bundle: re(r"^(?:jito\s+bundle|bundle|mev\s+protect(?:ed)?)\s*:\s*"),
            batch: re(r"^(?:batch|multi)\s*:\s*"),
            conditional_head: re(r"^(?:if|when|once)\s+"),
            conditional: re(
                r"^(?:if|when|once)\s+(?P<cond>.+?)(?:\s*,\s+(?:then\s+)?|\s+then\s+)(?P<action>.+)$",
            ),
            recurring: re(r"^(?:every|each)\s+(?P<rest>.+)$"),
            named_recurrence: re(r"^(?P<name>hourly|daily|weekly|monthly)[,:]?\s+(?P<rest>.+)$"),
            weekday_recurrence: re(
                r"^(?P<day>monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?[,:]?\s+(?P<rest>.+)$",
            ),
            recurring_start: re(
                r"^(?P<time>at\s+(?:\d{1,2}(?::\d{2})?\s*(?:am|pm)|\d{1,2}:\d{2}|noon|midnight))[,:]?\s+",
            ),
            schedule_keyword: re(r"\s(?:at|on|today|tonight|tomorrow|next|in)\b"),
            cancel_subscription: re(
                r"^(?:cancel|stop|end|unsubscribe(?:\s+from)?)\s+(?:the\s+|my\s+)?(?:subscription|sub|recurring(?:\s+order)?|scheduled(?:\s+order)?|schedule|dca)(?:\s+(?:#|id\s+)?(?P<id>[a-z0-9_-]+))?$",
            ),
            copy_trade: re(
                r"^(?:copy(?:\s+trade)?|copytrade|mirror)\s+(?:trades\s+(?:of|from)\s+|wallet\s+)?(?P<wallet>\S+?)(?:'s\s+trades)?(?:\s+(?:at|with|x)\s*(?P<mult>\d+(?:\.\d+)?)\s*x?|\s+(?P<multx>\d+(?:\.\d+)?)x)?$",
            ),
            snipe_amount_first: re(&format!(
                r"^snipe\s+(?P<amount>{})\s*(?:sol)?\s+(?:of|on|into)\s+\$?(?P<token>\S+)$",
                AMOUNT_LITERAL
            )),
            snipe: re(&format!(
                r"^snipe\s+\$?(?P<token>\S+)(?:\s+(?:with|for|using)\s+(?P<amount>{})\s*(?:sol)?)?$",
                AMOUNT_LITERAL
            )),
            sequence: re(r"(?i)\s*(?:;|->|=>|→)\s*|,?\s+(?:and\s+)?then\s+"),
            batch_split: re(r"(?i)\s*,\s*|\s+and\s+"),
            tip: re(
                r"(?i)(?:^|,?\s+)(?:with\s+)?(?:an?\s+)?(?:jito\s+)?tip(?::|\s+of)?\s*(?P<tip>\d[\d,]*(?:\.\d+)?k?)\b(?:\s*(?:lamports|sol))?",
            ),
        }
    }

    pub fn intent_parser(&self) -> &IntentParser {
        &self.intents
    }

    pub fn time_parser(&self) -> &TimeParser {
        &self.times
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Parse a possibly multi-clause command.
    pub async fn parse(&self, input: &str) -> Result<ChainParseResult> {
        let n = normalize(input);
        if n.lower.is_empty() {
            return Ok(ChainParseResult::Empty);
        }

        if let Some(m) = self.bundle.find(&n.lower) {
            debug!("bundle marker");
            return self.parse_bundle(&n.cased[m.end()..]).await;
        }
        if let Some(m) = self.batch.find(&n.lower) {
            debug!("batch marker");
            return self.parse_batch(&n.cased[m.end()..]).await;
        }
        if self.conditional_head.is_match(&n.lower) {
            debug!("conditional marker");
            return self.parse_conditional(&n).await;
        }
        if let Some(result) = self.parse_recurring(&n).await? {
            return Ok(result);
        }
        if let Some(result) = self.parse_scheduled(&n).await? {
            return Ok(result);
        }
        if let Some(result) = self.parse_idiom(&n).await? {
            return Ok(result);
        }
        if self.sequence.is_match(&n.cased) {
            debug!("implicit sequence");
            return self.parse_sequence(&n.cased).await;
        }
        self.parse_single(&n.cased).await
    }

    /// Remove an inline tip directive, returning the rest and the tip.
    pub fn strip_tip(&self, text: &str) -> (String, Option<Decimal>) {
        let Some(caps) = self.tip.captures(text) else {
            return (text.to_string(), None);
        };
        let (Some(whole), Some(raw)) = (caps.get(0), caps.name("tip")) else {
            return (text.to_string(), None);
        };
        match parse_tip(raw.as_str()) {
            Ok(tip) => {
                let rest = format!("{} {}", &text[..whole.start()], &text[whole.end()..]);
                let rest = rest.split_whitespace().collect::<Vec<_>>().join(" ");
                (rest, Some(tip))
            }
            Err(err) => {
                debug!(%err, "ignoring malformed tip directive");
                (text.to_string(), None)
            }
        }
    }

    async fn parse_single(&self, text: &str) -> Result<ChainParseResult> {
        let (rest, tip) = self.strip_tip(text);
        let result = self.intents.parse(&rest).await?;
        Ok(match into_intent(0, result) {
            Ok((intent, confidence)) => ChainParseResult::Single {
                intent,
                confidence,
                tip,
            },
            Err(failure) => failure,
        })
    }

    async fn collect(
        &self,
        segments: &[String],
    ) -> Result<(Vec<TransactionIntent>, Vec<StepFailure>)> {
        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for (index, text) in segments.iter().enumerate() {
            match self.intents.parse(text).await? {
                ParseResult::Success { intent, .. } => successes.push(intent),
                other => failures.push(StepFailure {
                    index,
                    text: text.clone(),
                    reason: other.failure_reason().unwrap_or_default(),
                }),
            }
        }
        Ok((successes, failures))
    }

    async fn parse_bundle(&self, body: &str) -> Result<ChainParseResult> {
        let (body, tip) = self.strip_tip(body);
        let segments = split_segments(&body, &self.sequence);
        if segments.is_empty() {
            return Ok(failure("the bundle contains no commands"));
        }
        let (successes, failures) = self.collect(&segments).await?;
        Ok(if failures.is_empty() {
            ChainParseResult::Bundle {
                intents: successes,
                tip,
            }
        } else {
            ChainParseResult::PartialFailure {
                successes,
                failures,
            }
        })
    }

    async fn parse_batch(&self, body: &str) -> Result<ChainParseResult> {
        let segments = split_segments(body, &self.batch_split);
        if segments.is_empty() {
            return Ok(failure("the batch contains no commands"));
        }
        let (successes, failures) = self.collect(&segments).await?;
        Ok(if failures.is_empty() {
            ChainParseResult::Batch { intents: successes }
        } else {
            ChainParseResult::PartialFailure {
                successes,
                failures,
            }
        })
    }

    async fn parse_conditional(&self, n: &Normalized) -> Result<ChainParseResult> {
        let Some(caps) = self.conditional.captures(&n.lower) else {
            let head_end = self
                .conditional_head
                .find(&n.lower)
                .map(|m| m.end())
                .unwrap_or(0);
            return Ok(ChainParseResult::InvalidCondition {
                text: n.cased[head_end..].to_string(),
            });
        };
        let (Some(cond), Some(action)) = (caps.name("cond"), caps.name("action")) else {
            return Ok(ChainParseResult::InvalidCondition {
                text: n.cased.clone(),
            });
        };

        let Some(condition) = self
            .conditions
            .parse(cond.as_str(), &self.times, self.clock.now())
        else {
            return Ok(ChainParseResult::InvalidCondition {
                text: n.cased_slice(cond.start(), cond.end()).to_string(),
            });
        };

        let action = n.cased_slice(action.start(), action.end());
        let result = self.intents.parse(action).await?;
        Ok(match into_intent(0, result) {
            Ok((then_intent, _)) => ChainParseResult::Conditional {
                condition,
                then_intent,
            },
            Err(failure) => failure,
        })
    }

    async fn parse_recurring(&self, n: &Normalized) -> Result<Option<ChainParseResult>> {
        let now = self.clock.now();

        let (interval, rest_lower, mut start_time) =
            if let Some(caps) = self.named_recurrence.captures(&n.lower) {
                let unit = match &caps["name"] {
                    "hourly" => IntervalUnit::Hour,
                    "daily" => IntervalUnit::Day,
                    "weekly" => IntervalUnit::Week,
                    _ => IntervalUnit::Month,
                };
                let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
                (Interval { every: 1, unit }, rest, now)
            } else if let Some(caps) = self.recurring.captures(&n.lower) {
                let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
                if let Some(day) = self.weekday_recurrence.captures(rest) {
                    let Some(first) = self.times.resolve(&format!("next {}", &day["day"]), now)
                    else {
                        return Ok(Some(ChainParseResult::InvalidRecurrence {
                            text: rest.to_string(),
                        }));
                    };
                    let action = day.name("rest").map(|m| m.as_str()).unwrap_or("");
                    let interval = Interval {
                        every: 1,
                        unit: IntervalUnit::Week,
                    };
                    (interval, action, first)
                } else {
                    match self.times.split_interval(rest) {
                        Some((interval, action)) => (interval, action, now),
                        None => {
                            return Ok(Some(ChainParseResult::InvalidRecurrence {
                                text: n.cased[n.lower.len() - rest.len()..].to_string(),
                            }))
                        }
                    }
                }
            } else {
                return Ok(None);
            };

        let mut rest_lower = rest_lower.trim_start();
        if let Some(caps) = self.recurring_start.captures(rest_lower) {
            let (Some(whole), Some(time)) = (caps.get(0), caps.name("time")) else {
                return Ok(None);
            };
            match self.times.resolve(time.as_str(), now) {
                Some(first) => start_time = first,
                None => {
                    return Ok(Some(ChainParseResult::InvalidSchedule {
                        text: time.as_str().to_string(),
                    }))
                }
            }
            rest_lower = &rest_lower[whole.end()..];
        }

        let action = n.cased[n.lower.len() - rest_lower.len()..].trim();
        if action.is_empty() {
            return Ok(Some(ChainParseResult::InvalidRecurrence {
                text: n.cased.clone(),
            }));
        }

        debug!(every = interval.every, unit = ?interval.unit, "recurring marker");
        let result = self.intents.parse(action).await?;
        Ok(Some(match into_intent(0, result) {
            Ok((intent, _)) => ChainParseResult::Recurring {
                interval,
                intent,
                start_time,
            },
            Err(failure) => failure,
        }))
    }

    async fn parse_scheduled(&self, n: &Normalized) -> Result<Option<ChainParseResult>> {
        let candidates: Vec<usize> = self
            .schedule_keyword
            .find_iter(&n.lower)
            .map(|m| m.start())
            .filter(|&at| at > 0 && self.times.looks_like_time(&n.lower[at + 1..]))
            .collect();
        let Some(&leftmost) = candidates.first() else {
            return Ok(None);
        };

        // "on pump at 3pm" only resolves from "at"
        let now = self.clock.now();
        let Some((split, execution_time)) = candidates
            .iter()
            .find_map(|&at| self.times.resolve(&n.lower[at + 1..], now).map(|t| (at, t)))
        else {
            return Ok(Some(ChainParseResult::InvalidSchedule {
                text: n.cased[leftmost + 1..].to_string(),
            }));
        };

        let action = n.cased[..split].trim();
        let when = &n.lower[split + 1..];
        debug!(%when, "scheduled marker");

        let result = self.intents.parse(action).await?;
        Ok(Some(match into_intent(0, result) {
            Ok((intent, _)) => ChainParseResult::Scheduled {
                intent,
                execution_time,
            },
            Err(failure) => failure,
        }))
    }

    // Cancel-subscription, copy-trade and snipe.
    async fn parse_idiom(&self, n: &Normalized) -> Result<Option<ChainParseResult>> {
        if let Some(caps) = self.cancel_subscription.captures(&n.lower) {
            let id = caps
                .name("id")
                .map(|m| n.cased_slice(m.start(), m.end()).to_string());
            return Ok(Some(ChainParseResult::CancelSubscription { id }));
        }

        if let Some(caps) = self.copy_trade.captures(&n.lower) {
            let Some(wallet) = caps.name("wallet") else {
                return Ok(None);
            };
            let raw = n.cased_slice(wallet.start(), wallet.end());
            let multiplier = match caps.name("mult").or_else(|| caps.name("multx")) {
                Some(m) => match parse_amount(m.as_str()) {
                    Ok(value) if value > Decimal::ZERO => value,
                    _ => return Ok(Some(failure("the copy-trade multiplier must be positive"))),
                },
                None => Decimal::ONE,
            };
            return Ok(Some(match self.intents.resolve_recipient(raw).await? {
                RecipientResolution::Resolved(wallet)
                | RecipientResolution::Ambiguous(wallet, _) => {
                    ChainParseResult::CopyTrade { wallet, multiplier }
                }
                RecipientResolution::NotFound => failure(format!(
                    "I couldn't resolve the wallet '{}' to copy.",
                    raw
                )),
            }));
        }

        let snipe = self
            .snipe_amount_first
            .captures(&n.lower)
            .or_else(|| self.snipe.captures(&n.lower));
        if let Some(caps) = snipe {
            let Some(token) = caps.name("token") else {
                return Ok(None);
            };
            let raw = n.cased_slice(token.start(), token.end());
            let token_identifier = if is_address_like(raw) {
                raw.to_string()
            } else {
                raw.trim_start_matches('$').to_ascii_uppercase()
            };
            let amount = match caps.name("amount") {
                Some(m) => match parse_amount(m.as_str()) {
                    Ok(value) if value > Decimal::ZERO => Some(value),
                    _ => return Ok(Some(failure("the snipe amount must be positive"))),
                },
                None => None,
            };
            return Ok(Some(ChainParseResult::Snipe {
                token_identifier,
                amount,
            }));
        }

        Ok(None)
    }

    async fn parse_sequence(&self, text: &str) -> Result<ChainParseResult> {
        let segments = split_segments(text, &self.sequence);
        if segments.len() < 2 {
            let only = segments.into_iter().next().unwrap_or_default();
            return self.parse_single(&only).await;
        }

        let mut steps = Vec::with_capacity(segments.len());
        for (order, segment) in segments.iter().enumerate() {
            let result = self.intents.parse(segment).await?;
            match into_intent(order, result) {
                Ok((intent, _)) => steps.push(ChainStep {
                    order,
                    depends_on: order.checked_sub(1),
                    intent,
                }),
                Err(failure) => return Ok(failure),
            }
        }
        Ok(ChainParseResult::Sequential { steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Comparator;
    use crate::resolver::StaticResolver;
    use crate::schedule::FixedClock;
    use crate::types::{IntentKind, SellAmount};
    use chrono::TimeZone;
    use std::str::FromStr;

    const ALICE: &str = "A1iceWa11et111111111111111111111111111111111";
    const BOB: &str = "BobWa11et1111111111111111111111111111111111";
    const MINT: &str = "7GCihgDB8fe6KNjn2MYtkzZcRjQy3t9GHdC8uHYmW2hr";

    fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap()
    }

    fn parser() -> ChainParser {
        let resolver = StaticResolver::default()
            .with_domain("alice.sol", ALICE)
            .with_alias("bob", BOB);
        ChainParser::new(Arc::new(resolver), Arc::new(FixedClock(monday_morning())))
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_sequential_ordering() {
        let result = parser()
            .parse("send 1 SOL to alice.sol then send 2 SOL to bob")
            .await
            .unwrap();
        match result {
            ChainParseResult::Sequential { steps } => {
                assert_eq!(steps.len(), 2);
                assert_eq!(steps[0].order, 0);
                assert_eq!(steps[0].depends_on, None);
                assert_eq!(steps[1].order, 1);
                assert_eq!(steps[1].depends_on, Some(0));
                assert_eq!(steps[1].intent.amount(), Some(dec("2")));
            }
            other => panic!("Expected Sequential, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sequence_failure_names_step() {
        let result = parser()
            .parse("stake 1 sol; swap 1 badtoken for sol")
            .await
            .unwrap();
        assert!(matches!(
            result,
            ChainParseResult::ChainFailure { step_index: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_bundle_partial_failure_keeps_both() {
        let result = parser()
            .parse("bundle: send 1 SOL to bob then swap 1 BADTOKEN for SOL")
            .await
            .unwrap();
        match result {
            ChainParseResult::PartialFailure {
                successes,
                failures,
            } => {
                assert_eq!(successes.len(), 1);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 1);
                assert_eq!(failures[0].text, "swap 1 BADTOKEN for SOL");
            }
            other => panic!("Expected PartialFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bundle_with_tip() {
        let result = parser()
            .parse("jito bundle: send 1 SOL to bob; swap 1 SOL for USDC with tip 10k")
            .await
            .unwrap();
        match result {
            ChainParseResult::Bundle { intents, tip } => {
                assert_eq!(intents.len(), 2);
                assert_eq!(tip, Some(dec("10000")));
            }
            other => panic!("Expected Bundle, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_keeps_grouped_amounts() {
        let result = parser()
            .parse("batch: stake 1 sol, swap 1,000 usdc for sol and wrap 2 sol")
            .await
            .unwrap();
        match result {
            ChainParseResult::Batch { intents } => {
                assert_eq!(intents.len(), 3);
                assert_eq!(intents[1].amount(), Some(dec("1000")));
            }
            other => panic!("Expected Batch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_conditional_beats_sequence() {
        let result = parser()
            .parse("if SOL > 200 then sell 50% of BONK on pump")
            .await
            .unwrap();
        match result {
            ChainParseResult::Conditional {
                condition,
                then_intent,
            } => {
                assert_eq!(
                    condition,
                    Condition::Price {
                        token: "SOL".to_string(),
                        operator: Comparator::Gt,
                        value: dec("200"),
                    }
                );
                assert!(matches!(
                    then_intent,
                    TransactionIntent::LaunchSell {
                        amount: SellAmount::Percent { .. },
                        ..
                    }
                ));
            }
            other => panic!("Expected Conditional, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_condition() {
        let p = parser();
        assert_eq!(
            p.parse("if the moon is full then stake 1 sol").await.unwrap(),
            ChainParseResult::InvalidCondition {
                text: "the moon is full".to_string()
            }
        );
        assert!(matches!(
            p.parse("if sol pumps stake 1 sol").await.unwrap(),
            ChainParseResult::InvalidCondition { .. }
        ));
    }

    #[tokio::test]
    async fn test_time_condition() {
        let result = parser().parse("when it's 3pm, stake 1 sol").await.unwrap();
        assert!(matches!(
            result,
            ChainParseResult::Conditional {
                condition: Condition::Time { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_recurring() {
        let p = parser();
        match p.parse("every 2 hours swap 10 usdc for sol").await.unwrap() {
            ChainParseResult::Recurring {
                interval,
                intent,
                start_time,
            } => {
                assert_eq!(interval.every, 2);
                assert_eq!(interval.unit, IntervalUnit::Hour);
                assert_eq!(intent.amount(), Some(dec("10")));
                assert_eq!(start_time, monday_morning());
            }
            other => panic!("Expected Recurring, got {:?}", other),
        }

        match p.parse("every day at 9am stake 1 sol").await.unwrap() {
            ChainParseResult::Recurring { start_time, .. } => {
                assert_eq!(start_time, Utc.with_ymd_and_hms(2024, 6, 11, 9, 0, 0).unwrap());
            }
            other => panic!("Expected Recurring, got {:?}", other),
        }

        assert!(matches!(
            p.parse("daily stake 1 sol").await.unwrap(),
            ChainParseResult::Recurring { interval: Interval { unit: IntervalUnit::Day, .. }, .. }
        ));
        assert!(matches!(
            p.parse("every fortnight stake 1 sol").await.unwrap(),
            ChainParseResult::InvalidRecurrence { .. }
        ));
    }

    #[tokio::test]
    async fn test_scheduled_is_deterministic() {
        let p = parser();
        let result = p.parse("send 1 SOL to bob tomorrow at 3pm").await.unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 6, 11, 15, 0, 0).unwrap();
        match &result {
            ChainParseResult::Scheduled {
                intent,
                execution_time,
            } => {
                assert_eq!(*execution_time, expected);
                assert_eq!(intent.recipient().unwrap().address, BOB);
            }
            other => panic!("Expected Scheduled, got {:?}", other),
        }
        assert_eq!(
            result.delay_until(monday_morning()),
            Some(Duration::hours(29))
        );
    }

    #[tokio::test]
    async fn test_schedule_splits_where_time_resolves() {
        let input = format!("buy 0.1 sol of {} on pump at 3pm", MINT);
        match parser().parse(&input).await.unwrap() {
            ChainParseResult::Scheduled {
                intent: TransactionIntent::LaunchBuy { mint, .. },
                execution_time,
            } => {
                assert_eq!(mint, MINT);
                assert_eq!(execution_time, Utc.with_ymd_and_hms(2024, 6, 10, 15, 0, 0).unwrap());
            }
            other => panic!("Expected scheduled launch buy, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_arrow_is_a_sequence_connective() {
        let p = parser();
        match p.parse("stake 1 sol -> swap 1 sol for bonk").await.unwrap() {
            ChainParseResult::Sequential { steps } => {
                assert_eq!(steps.len(), 2);
                assert_eq!(steps[1].intent.kind(), IntentKind::Swap);
                assert_eq!(steps[1].depends_on, Some(0));
            }
            other => panic!("Expected Sequential, got {:?}", other),
        }

        let arrow_swap = p.intent_parser().parse("swap 1 sol -> bonk").await.unwrap();
        assert!(!arrow_swap.is_success());
    }

    #[tokio::test]
    async fn test_past_schedule_is_invalid() {
        let result = parser().parse("stake 1 sol on 2023-01-01").await.unwrap();
        assert!(matches!(result, ChainParseResult::InvalidSchedule { .. }));
    }

    #[tokio::test]
    async fn test_idioms() {
        let p = parser();
        assert_eq!(
            p.parse("cancel subscription 42").await.unwrap(),
            ChainParseResult::CancelSubscription {
                id: Some("42".to_string())
            }
        );
        assert_eq!(
            p.parse("copy trade bob 2x").await.unwrap(),
            ChainParseResult::CopyTrade {
                wallet: Recipient::new("bob", BOB),
                multiplier: dec("2"),
            }
        );
        assert_eq!(
            p.parse("snipe $bonk with 0.5 sol").await.unwrap(),
            ChainParseResult::Snipe {
                token_identifier: "BONK".to_string(),
                amount: Some(dec("0.5")),
            }
        );
        assert!(matches!(
            p.parse("copy trade nobody").await.unwrap(),
            ChainParseResult::ChainFailure { step_index: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_single_and_empty() {
        let p = parser();
        assert_eq!(p.parse("   ").await.unwrap(), ChainParseResult::Empty);

        match p.parse("stake 5 sol with tip 0.001").await.unwrap() {
            ChainParseResult::Single { intent, tip, .. } => {
                assert_eq!(intent.amount(), Some(dec("5")));
                assert_eq!(tip, Some(dec("0.001")));
            }
            other => panic!("Expected Single, got {:?}", other),
        }

        match p.parse("send 1 sol to nobody.sol").await.unwrap() {
            ChainParseResult::ChainFailure {
                step_index,
                suggestions,
                ..
            } => {
                assert_eq!(step_index, 0);
                assert!(suggestions.is_empty());
            }
            other => panic!("Expected ChainFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_map_last_intent() {
        let result = parser().parse("stake 5 sol").await.unwrap();
        let updated = result
            .map_last_intent(|intent| intent.with_amount(dec("7")))
            .unwrap();
        assert_eq!(updated.last_intent().unwrap().amount(), Some(dec("7")));
        assert!(ChainParseResult::Empty
            .map_last_intent(|intent| Some(intent.clone()))
            .is_none());
    }
}
