//! Anaphora substitution against the conversation context
//!
//! "double that", "half of that", "same amount", "them", "that wallet",
//! "that token" and "it" are rewritten to concrete values before the text
//! reaches the chain parser.

use regex::{Captures, Regex};
use rust_decimal::Decimal;
use tracing::debug;

use crate::context::ConversationContext;

/// One replacement that was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub phrase: String,
    pub value: String,
}

/// Text after substitution plus what happened on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedText {
    pub text: String,
    pub substitutions: Vec<Substitution>,
    /// Reference phrases the context had no value for.
    pub unresolved: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum AmountOp {
    Double,
    Half,
    Same,
}

pub struct ReferenceResolver {
    amounts: Vec<(Regex, AmountOp)>,
    recipient: Regex,
    token: Regex,
    pronoun: Regex,
    followed_by_to: Regex,
    condition_head: Regex,
    copula: Regex,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        let re = |pattern: &str| Regex::new(pattern).expect("Invalid regex pattern");
        Self {
            amounts: vec![
                (
                    re(r"(?i)\b(?:double|twice)\s+(?:that|it|the\s+amount|that\s+amount)\b"),
                    AmountOp::Double,
                ),
                (
                    re(r"(?i)\bhalf\s+(?:of\s+)?(?:that|it|the\s+amount|that\s+amount)\b"),
                    AmountOp::Half,
                ),
                (
                    re(r"(?i)\b(?:the\s+)?same\s+amount(?:\s+as\s+before)?\b"),
                    AmountOp::Same,
                ),
            ],
            recipient: re(
                r"(?i)\b(?:them|him|her|that\s+(?:wallet|address|person)|(?:the\s+)?same\s+(?:wallet|address|person|recipient))\b",
            ),
            token: re(r"(?i)\b(?:that\s+token|(?:the\s+)?same\s+token)\b"),
            pronoun: re(r"(?i)\bit\b"),
            followed_by_to: re(r"(?i)^\s+to\b"),
            condition_head: re(r"(?i)\b(?:if|when|once)\s+$"),
            copula: re(r"(?i)^\s+(?:is|was)\b"),
        }
    }

    /// Substitute every reference phrase the context can satisfy.
    pub fn resolve(&self, text: &str, ctx: &ConversationContext) -> ResolvedText {
        let mut substitutions = Vec::new();
        let mut unresolved = Vec::new();
        let mut current = text.to_string();

        for (pattern, op) in &self.amounts {
            let value = ctx.last_amount.map(|amount| match op {
                AmountOp::Double => amount * Decimal::TWO,
                AmountOp::Half => amount / Decimal::TWO,
                AmountOp::Same => amount,
            });
            current = self.replace(&current, pattern, &mut substitutions, &mut unresolved, |_, rest| {
                value.map(|v| {
                    let v = v.normalize().to_string();
                    // "send double that to bob" needs a token to parse
                    match (&ctx.last_token, self.followed_by_to.is_match(rest)) {
                        (Some(token), true) => format!("{} {}", v, token),
                        _ => v,
                    }
                })
            });
        }

        let recipient = ctx.last_recipient.as_ref().map(|r| r.input.clone());
        current = self.replace(
            &current,
            &self.recipient,
            &mut substitutions,
            &mut unresolved,
            |_, _| recipient.clone(),
        );

        let token = ctx.last_token.clone();
        current = self.replace(&current, &self.token, &mut substitutions, &mut unresolved, |_, _| {
            token.clone()
        });

        // "it's" is a contraction and "when it is 3pm" names a time
        current = self.replace(
            &current,
            &self.pronoun,
            &mut substitutions,
            &mut unresolved,
            |before, rest| {
                if rest.starts_with('\'')
                    || self.condition_head.is_match(before)
                    || self.copula.is_match(rest)
                {
                    None
                } else {
                    token.clone()
                }
            },
        );
        unresolved.retain(|phrase| !phrase.eq_ignore_ascii_case("it"));

        if !substitutions.is_empty() {
            debug!(from = %text, to = %current, "substituted references");
        }

        ResolvedText {
            text: current,
            substitutions,
            unresolved,
        }
    }

    // `value` gets the text before and after the match; `None` leaves the phrase.
    fn replace<F>(
        &self,
        text: &str,
        pattern: &Regex,
        substitutions: &mut Vec<Substitution>,
        unresolved: &mut Vec<String>,
        mut value: F,
    ) -> String
    where
        F: FnMut(&str, &str) -> Option<String>,
    {
        pattern
            .replace_all(text, |caps: &Captures<'_>| {
                let whole = &caps[0];
                let (start, end) = caps
                    .get(0)
                    .map(|m| (m.start(), m.end()))
                    .unwrap_or((0, text.len()));
                match value(&text[..start], &text[end..]) {
                    Some(v) => {
                        substitutions.push(Substitution {
                            phrase: whole.to_string(),
                            value: v.clone(),
                        });
                        v
                    }
                    None => {
                        unresolved.push(whole.to_string());
                        whole.to_string()
                    }
                }
            })
            .into_owned()
    }
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Recipient;

    fn context() -> ConversationContext {
        ConversationContext {
            last_amount: Some(Decimal::from(5)),
            last_recipient: Some(Recipient::new(
                "alice.sol",
                "A1iceWa11et111111111111111111111111111111111",
            )),
            ..ConversationContext::default()
        }
    }

    #[test]
    fn test_double_that_to_them() {
        let resolved = ReferenceResolver::new().resolve("send double that to them", &context());
        assert_eq!(resolved.text, "send 10 to alice.sol");
        assert_eq!(resolved.substitutions.len(), 2);
        assert!(resolved.unresolved.is_empty());
    }

    #[test]
    fn test_half_with_known_token() {
        let ctx = ConversationContext {
            last_token: Some("USDC".to_string()),
            ..context()
        };
        let resolved = ReferenceResolver::new().resolve("send half of that to the same address", &ctx);
        assert_eq!(resolved.text, "send 2.5 USDC to alice.sol");
    }

    #[test]
    fn test_it_means_last_token() {
        let ctx = ConversationContext {
            last_token: Some("BONK".to_string()),
            ..context()
        };
        let resolved = ReferenceResolver::new().resolve("swap 100 it for sol", &ctx);
        assert_eq!(resolved.text, "swap 100 BONK for sol");

        let untouched = ReferenceResolver::new().resolve("when it's 3pm, stake 1 sol", &ctx);
        assert_eq!(untouched.text, "when it's 3pm, stake 1 sol");

        let time_condition = ReferenceResolver::new().resolve("when it is 3pm, stake 2 sol", &ctx);
        assert_eq!(time_condition.text, "when it is 3pm, stake 2 sol");
        assert!(time_condition.substitutions.is_empty());

        let after_head = ReferenceResolver::new().resolve("once it hits 3pm, stake 2 sol", &ctx);
        assert_eq!(after_head.text, "once it hits 3pm, stake 2 sol");
    }

    #[test]
    fn test_unresolved_reported() {
        let resolved =
            ReferenceResolver::new().resolve("send 1 sol to them", &ConversationContext::default());
        assert_eq!(resolved.unresolved, vec!["them".to_string()]);
        assert_eq!(resolved.text, "send 1 sol to them");
    }

    #[test]
    fn test_plain_text_passes_through() {
        let resolved = ReferenceResolver::new().resolve("stake 5 sol", &context());
        assert_eq!(resolved.text, "stake 5 sol");
        assert!(resolved.substitutions.is_empty());
    }
}
