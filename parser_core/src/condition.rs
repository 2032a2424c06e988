//! Conditions for "if/when/once ..." commands

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::{parse_amount, AMOUNT_PATTERN};
use crate::schedule::TimeParser;

const OPERATORS: &str =
    r">=|<=|==|>|<|=|at least|at most|greater than|more than|less than|above|over|below|under|exceeds|equals|reaches|hits|is";
const VERBS: &str = r"is|goes|drops|falls|rises|gets|trades";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "==")]
    Eq,
}

impl Comparator {
    fn from_phrase(phrase: &str) -> Option<Self> {
        match phrase {
            ">" | "above" | "over" | "greater than" | "more than" | "exceeds" => Some(Self::Gt),
            "<" | "below" | "under" | "less than" => Some(Self::Lt),
            ">=" | "at least" => Some(Self::Gte),
            "<=" | "at most" => Some(Self::Lte),
            "==" | "=" | "equals" | "reaches" | "hits" | "is" => Some(Self::Eq),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Eq => "==",
        }
    }

    pub fn evaluate(&self, observed: Decimal, threshold: Decimal) -> bool {
        match self {
            Self::Gt => observed > threshold,
            Self::Lt => observed < threshold,
            Self::Gte => observed >= threshold,
            Self::Lte => observed <= threshold,
            Self::Eq => observed == threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Price {
        token: String,
        operator: Comparator,
        value: Decimal,
    },
    Balance {
        token: String,
        operator: Comparator,
        value: Decimal,
    },
    Time {
        value: DateTime<Utc>,
    },
}

/// Price, balance and time comparator grammars
pub struct ConditionParser {
    balance: Regex,
    price: Regex,
    time_prefix: Regex,
}

impl ConditionParser {
    pub fn new() -> Self {
        let balance = format!(
            r"^(?:my\s+)?(?:\$?([a-z0-9]+)\s+)?balance(?:\s+of\s+\$?([a-z0-9]+))?\s+(?:(?:{v})\s+)?({o})\s*{a}(?:\s+\$?([a-z0-9]+))?$",
            v = VERBS,
            o = OPERATORS,
            a = AMOUNT_PATTERN
        );
        let price = format!(
            r"^(?:the\s+)?(?:price\s+of\s+)?\$?([a-z0-9]+)(?:\s+price)?\s+(?:(?:{v})\s+)?({o})\s*\$?{a}(?:\s*(?:usd|usdc|dollars))?$",
            v = VERBS,
            o = OPERATORS,
            a = AMOUNT_PATTERN
        );
        Self {
            balance: Regex::new(&balance).expect("Invalid regex pattern"),
            price: Regex::new(&price).expect("Invalid regex pattern"),
            time_prefix: Regex::new(r"^(?:it'?s\s+|it\s+is\s+|the\s+time\s+is\s+|time\s+is\s+|after\s+)")
                .expect("Invalid regex pattern"),
        }
    }

    /// Parse condition text. `None` means the text fits no grammar.
    pub fn parse(&self, text: &str, times: &TimeParser, now: DateTime<Utc>) -> Option<Condition> {
        let text = text.trim();

        if let Some(caps) = self.balance.captures(text) {
            let operator = Comparator::from_phrase(&caps[3])?;
            let value = parse_amount(&caps[4]).ok()?;
            let token = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(5))
                .map(|m| m.as_str().to_ascii_uppercase())
                .unwrap_or_else(|| "SOL".to_string());
            return Some(Condition::Balance {
                token,
                operator,
                value,
            });
        }

        if let Some(caps) = self.price.captures(text) {
            let operator = Comparator::from_phrase(&caps[2])?;
            let value = parse_amount(&caps[3]).ok()?;
            return Some(Condition::Price {
                token: caps[1].to_ascii_uppercase(),
                operator,
                value,
            });
        }

        let rest = self.time_prefix.replace(text, "");
        if times.looks_like_time(&rest) {
            return times
                .resolve(&rest, now)
                .map(|value| Condition::Time { value });
        }

        None
    }
}

impl Default for ConditionParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap()
    }

    fn parse(text: &str) -> Option<Condition> {
        ConditionParser::new().parse(text, &TimeParser::new(0, 9), now())
    }

    #[test]
    fn test_price_conditions() {
        assert_eq!(
            parse("sol > 150"),
            Some(Condition::Price {
                token: "SOL".to_string(),
                operator: Comparator::Gt,
                value: Decimal::from(150),
            })
        );
        assert_eq!(
            parse("bonk price drops below 0.00002"),
            Some(Condition::Price {
                token: "BONK".to_string(),
                operator: Comparator::Lt,
                value: Decimal::from_str("0.00002").unwrap(),
            })
        );
        assert!(matches!(
            parse("the price of jup is at least $1.5"),
            Some(Condition::Price { operator: Comparator::Gte, .. })
        ));
    }

    #[test]
    fn test_balance_conditions() {
        assert_eq!(
            parse("my usdc balance is above 1k"),
            Some(Condition::Balance {
                token: "USDC".to_string(),
                operator: Comparator::Gt,
                value: Decimal::from(1000),
            })
        );
        assert!(matches!(
            parse("balance < 2"),
            Some(Condition::Balance { ref token, operator: Comparator::Lt, .. }) if token == "SOL"
        ));
    }

    #[test]
    fn test_time_condition() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 10, 15, 0, 0).unwrap();
        assert_eq!(parse("it's 3pm"), Some(Condition::Time { value: expected }));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse("the moon is full"), None);
        assert_eq!(parse("sol feels bullish"), None);
    }

    #[test]
    fn test_evaluate() {
        assert!(Comparator::Gte.evaluate(Decimal::from(5), Decimal::from(5)));
        assert!(!Comparator::Lt.evaluate(Decimal::from(5), Decimal::from(5)));
        assert_eq!(Comparator::Lte.symbol(), "<=");
    }
}
