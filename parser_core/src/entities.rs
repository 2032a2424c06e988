//! Entity extraction from user input

use crate::amount::AMOUNT_PATTERN;
use regex::Regex;
use serde::{Deserialize, Serialize};

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Kind of wallet entity found in free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tip,
    Amount,
    Domain,
    Address,
    Token,
}

/// Represents an extracted entity from user input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub value: String,
    pub original: String,
    pub start: usize,
    pub end: usize,
}

/// True for strings shaped like a base58 public key.
pub fn is_address_like(text: &str) -> bool {
    (32..=44).contains(&text.len()) && text.chars().all(|c| BASE58_ALPHABET.contains(c))
}

/// True for strings shaped like a naming-service domain (`alice.sol`).
pub fn is_domain_like(text: &str) -> bool {
    let Some((label, tld)) = text.rsplit_once('.') else {
        return false;
    };
    let label_ok = label
        .chars()
        .next()
        .map(|c| c.is_ascii_alphanumeric())
        .unwrap_or(false)
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    let tld_ok = (2..=10).contains(&tld.len()) && tld.chars().all(|c| c.is_ascii_alphabetic());
    label_ok && tld_ok
}

/// Extract wallet entities from user input
///
/// Identifies tips, amounts, domains, addresses and cashtag symbols. Earlier
/// patterns claim their span first; later overlapping matches are dropped.
pub struct EntityExtractor {
    patterns: Vec<(Regex, EntityKind)>, // (pattern, entity kind)
}

impl EntityExtractor {
    pub fn new() -> Self {
        // Compile regex patterns once - these should never fail
        let patterns = vec![
            (
                Regex::new(r"(?i)\b(?:jito\s+)?tip(?:\s+of)?\s+(\d[\d,]*(?:\.\d+)?k?)\b")
                    .expect("Invalid regex pattern"),
                EntityKind::Tip,
            ),
            (
                Regex::new(r"(?i)\b([a-z0-9][a-z0-9_-]*\.[a-z]{2,10})\b").expect("Invalid regex pattern"),
                EntityKind::Domain,
            ),
            (
                Regex::new(r"\b([1-9A-HJ-NP-Za-km-z]{32,44})\b").expect("Invalid regex pattern"),
                EntityKind::Address,
            ),
            (
                Regex::new(&format!(r"(?i)(?:^|\s){}", AMOUNT_PATTERN)).expect("Invalid regex pattern"),
                EntityKind::Amount,
            ),
            (
                Regex::new(r"\$([A-Za-z][A-Za-z0-9]{1,9})\b").expect("Invalid regex pattern"),
                EntityKind::Token,
            ),
        ];

        Self { patterns }
    }

    pub fn extract(&self, text: &str) -> Vec<Entity> {
        let mut entities: Vec<Entity> = Vec::new();
        let mut claimed: Vec<(usize, usize)> = Vec::new();

        for (pattern, kind) in &self.patterns {
            for cap in pattern.captures_iter(text) {
                let (Some(whole), Some(value)) = (cap.get(0), cap.get(1)) else {
                    continue;
                };
                let (start, end) = (value.start(), value.end());
                if claimed.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                // A numeric literal followed by ".xyz" is not a domain
                if *kind == EntityKind::Domain && is_numeric_domain(value.as_str()) {
                    continue;
                }
                claimed.push((whole.start().min(start), whole.end().max(end)));
                entities.push(Entity {
                    kind: *kind,
                    value: value.as_str().to_string(),
                    original: whole.as_str().trim().to_string(),
                    start,
                    end,
                });
            }
        }

        entities.sort_by_key(|e| e.start);
        entities
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_numeric_domain(value: &str) -> bool {
    value
        .split('.')
        .next()
        .map(|label| label.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_amount() {
        let extractor = EntityExtractor::new();
        let entities = extractor.extract("send 1.5k sol");

        assert!(entities
            .iter()
            .any(|e| e.kind == EntityKind::Amount && e.value == "1.5k"));
    }

    #[test]
    fn test_tip_claims_its_number() {
        let extractor = EntityExtractor::new();
        let entities = extractor.extract("with tip 10k");

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind, EntityKind::Tip);
        assert_eq!(entities[0].value, "10k");
    }

    #[test]
    fn test_extract_domain_and_address() {
        let extractor = EntityExtractor::new();
        let entities =
            extractor.extract("to alice.sol or 9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");

        assert!(entities
            .iter()
            .any(|e| e.kind == EntityKind::Domain && e.value == "alice.sol"));
        assert!(entities.iter().any(|e| e.kind == EntityKind::Address));
    }

    #[test]
    fn test_shape_checks() {
        assert!(is_address_like("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"));
        assert!(!is_address_like("alice.sol"));
        assert!(is_domain_like("alice.sol"));
        assert!(is_domain_like("my-wallet.bonk"));
        assert!(!is_domain_like("alice"));
        assert!(!is_domain_like("1.5"));
    }
}
