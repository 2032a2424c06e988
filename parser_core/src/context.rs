//! Conversation context snapshots and bounded history

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::chain::ChainParseResult;
use crate::types::{Recipient, TransactionIntent};

/// What the conversation knows after the latest turn.
///
/// Contexts are values: each turn derives a new one from the previous, so
/// the undo stack can hold old contexts as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub last_result: Option<ChainParseResult>,
    pub last_recipient: Option<Recipient>,
    pub last_token: Option<String>,
    pub last_amount: Option<Decimal>,
    pub last_error: Option<String>,
    pub confirmed: bool,
    pub turn: u64,
}

impl ConversationContext {
    pub fn last_intent(&self) -> Option<&TransactionIntent> {
        self.last_result.as_ref().and_then(|r| r.last_intent())
    }

    /// An unconfirmed result is waiting.
    pub fn has_pending(&self) -> bool {
        self.last_result.is_some() && !self.confirmed
    }

    /// Context after a successful turn. Fields the new result does not
    /// mention are carried forward from `self`.
    pub fn derive(&self, result: ChainParseResult) -> Self {
        let mut recipient = None;
        let mut token = None;
        let mut amount = None;

        for intent in result.intents() {
            if let Some(r) = intent.recipient() {
                recipient = Some(r.clone());
            }
            if let Some(t) = intent.token_symbol() {
                token = Some(t.to_string());
            }
            if let Some(a) = intent.amount() {
                amount = Some(a);
            }
        }
        match &result {
            ChainParseResult::CopyTrade { wallet, .. } => recipient = Some(wallet.clone()),
            ChainParseResult::Snipe {
                token_identifier,
                amount: snipe_amount,
            } => {
                token = Some(token_identifier.clone());
                amount = snipe_amount.or(amount);
            }
            _ => {}
        }

        Self {
            last_recipient: recipient.or_else(|| self.last_recipient.clone()),
            last_token: token.or_else(|| self.last_token.clone()),
            last_amount: amount.or(self.last_amount),
            last_result: Some(result),
            last_error: None,
            confirmed: false,
            turn: self.turn + 1,
        }
    }

    /// Same context with an error recorded; intent-bearing fields untouched.
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self {
            last_error: Some(error.into()),
            turn: self.turn + 1,
            ..self.clone()
        }
    }

    pub fn confirm(&self) -> Self {
        Self {
            confirmed: true,
            last_error: None,
            turn: self.turn + 1,
            ..self.clone()
        }
    }

    /// Empty context that keeps counting turns.
    pub fn reset(&self) -> Self {
        Self {
            turn: self.turn + 1,
            ..Self::default()
        }
    }
}

/// Log record of one successful turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub raw_input: String,
    pub resolved_input: String,
    pub result: ChainParseResult,
    pub timestamp: DateTime<Utc>,
}

/// Stack that drops its oldest entry once `limit` is reached
#[derive(Debug, Clone)]
pub struct HistoryStack<T> {
    items: VecDeque<T>,
    limit: usize,
}

impl<T> HistoryStack<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(limit.min(64)),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.limit {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenInfo;

    fn transfer(amount: u32, to: &str) -> ChainParseResult {
        ChainParseResult::Single {
            intent: TransactionIntent::Transfer {
                amount: Decimal::from(amount),
                token: TokenInfo::new("SOL", "So11111111111111111111111111111111111111112", 9),
                recipient: Recipient::new(to, "Addr1111111111111111111111111111111111111111"),
            },
            confidence: 0.95,
            tip: None,
        }
    }

    #[test]
    fn test_derive_carries_forward() {
        let first = ConversationContext::default().derive(transfer(5, "alice.sol"));
        assert_eq!(first.last_amount, Some(Decimal::from(5)));
        assert_eq!(first.last_token.as_deref(), Some("SOL"));
        assert!(first.has_pending());

        let balance = ChainParseResult::Single {
            intent: TransactionIntent::Balance {
                token: None,
                owner: None,
            },
            confidence: 0.95,
            tip: None,
        };
        let second = first.derive(balance);
        assert_eq!(second.last_amount, Some(Decimal::from(5)));
        assert_eq!(second.last_recipient.unwrap().input, "alice.sol");
        assert_eq!(second.turn, 2);
    }

    #[test]
    fn test_error_keeps_intent_fields() {
        let ctx = ConversationContext::default().derive(transfer(5, "alice.sol"));
        let failed = ctx.with_error("nope");
        assert_eq!(failed.last_result, ctx.last_result);
        assert_eq!(failed.last_error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_history_stack_evicts_oldest() {
        let mut stack = HistoryStack::new(2);
        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), None);
    }
}
