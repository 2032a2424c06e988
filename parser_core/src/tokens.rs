//! Well-known token table
//!
//! Built once at construction time and shared read-only afterwards.

use crate::types::TokenInfo;
use std::collections::HashMap;

const STANDARD_TOKENS: &[(&str, &str, u8)] = &[
    ("SOL", "So11111111111111111111111111111111111111112", 9),
    ("USDC", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6),
    ("USDT", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", 6),
    ("BONK", "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", 5),
    ("JUP", "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN", 6),
    ("WIF", "EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm", 6),
    ("RAY", "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R", 6),
    ("JTO", "jtojtomepa8beP8AuQc6eXt5FriJwfFMwQx2v2f9mCL", 9),
    ("PYTH", "HZ1JovNiVvGrGNiiYvEozEVgZ58xaU3RKwX8eACQBCt3", 6),
    ("MSOL", "mSoLzYCxHdYgdzU16g5QSh3i5K3z3KZK7ytfqcJm7So", 9),
];

// Alternative spellings users type for a listed symbol.
const SYMBOL_ALIASES: &[(&str, &str)] = &[
    ("SOLANA", "SOL"),
    ("WSOL", "SOL"),
    ("SOLS", "SOL"),
    ("JUPITER", "JUP"),
    ("RAYDIUM", "RAY"),
    ("DOGWIFHAT", "WIF"),
];

/// Immutable symbol <-> mint <-> decimals table
#[derive(Debug, Clone, Default)]
pub struct WellKnownTokens {
    by_symbol: HashMap<String, TokenInfo>,
    by_mint: HashMap<String, TokenInfo>,
    aliases: HashMap<String, String>,
}

impl WellKnownTokens {
    /// The default mainnet table.
    pub fn standard() -> Self {
        let mut table = Self::from_entries(
            STANDARD_TOKENS
                .iter()
                .map(|(symbol, mint, decimals)| TokenInfo::new(*symbol, *mint, *decimals)),
        );
        table.aliases = SYMBOL_ALIASES
            .iter()
            .map(|(alias, symbol)| (alias.to_string(), symbol.to_string()))
            .collect();
        table
    }

    pub fn from_entries(entries: impl IntoIterator<Item = TokenInfo>) -> Self {
        let mut by_symbol = HashMap::new();
        let mut by_mint = HashMap::new();
        for token in entries {
            by_mint.insert(token.mint.clone(), token.clone());
            by_symbol.insert(token.symbol.to_ascii_uppercase(), token);
        }
        Self {
            by_symbol,
            by_mint,
            aliases: HashMap::new(),
        }
    }

    /// Look up by symbol (case-insensitive, `$` prefix and aliases accepted).
    pub fn get(&self, symbol: &str) -> Option<&TokenInfo> {
        let key = symbol.trim().trim_start_matches('$').to_ascii_uppercase();
        self.by_symbol.get(&key).or_else(|| {
            self.aliases
                .get(&key)
                .and_then(|canonical| self.by_symbol.get(canonical))
        })
    }

    pub fn by_mint(&self, mint: &str) -> Option<&TokenInfo> {
        self.by_mint.get(mint)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = WellKnownTokens::standard();
        assert_eq!(table.get("bonk").unwrap().decimals, 5);
        assert_eq!(table.get("$USDC").unwrap().symbol, "USDC");
        assert_eq!(table.get("solana").unwrap().symbol, "SOL");
        assert!(table.get("BADTOKEN").is_none());
    }

    #[test]
    fn test_mint_lookup() {
        let table = WellKnownTokens::standard();
        let sol = table.get("SOL").unwrap();
        assert_eq!(table.by_mint(&sol.mint).unwrap().symbol, "SOL");
        assert_eq!(table.len(), STANDARD_TOKENS.len());
    }
}
