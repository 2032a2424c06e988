//! Entity resolution seam
//!
//! The parser never talks to a naming service or token registry directly; it
//! goes through [`EntityResolver`]. "Not found" is `Ok(None)`; `Err` is
//! reserved for I/O failures, which the parser propagates unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::entities::is_address_like;
use crate::error::Result;
use crate::tokens::WellKnownTokens;
use crate::types::TokenInfo;

/// Trait for resolving human-friendly names to canonical identifiers.
///
/// Implementations can use different backends:
/// - a naming-service client for `.sol` domains
/// - a token registry for symbols
/// - [`StaticResolver`] for tests and offline use
#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// Resolve a domain such as `alice.sol` to its owner address.
    async fn resolve_domain(&self, name: &str) -> Result<Option<String>>;

    /// Find the primary domain of an address.
    async fn reverse_lookup(&self, address: &str) -> Result<Option<String>>;

    /// All domains owned by an address.
    async fn get_domains(&self, owner: &str) -> Result<Vec<String>>;

    async fn resolve_token(&self, symbol: &str) -> Result<Option<TokenInfo>>;

    /// Cheap synchronous membership check against locally known tokens.
    fn is_known_token(&self, symbol: &str) -> bool;

    /// Resolve any freeform wallet reference (address, domain, alias).
    async fn resolve_address(&self, freeform: &str) -> Result<Option<String>>;

    /// Resolve an address-book alias such as `bob`.
    async fn lookup_alias(&self, alias: &str) -> Result<Option<String>>;
}

/// In-memory resolver backed by the well-known token table plus registered
/// domains and aliases.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    tokens: Arc<WellKnownTokens>,
    domains: HashMap<String, String>,
    aliases: HashMap<String, String>,
}

impl StaticResolver {
    pub fn new(tokens: Arc<WellKnownTokens>) -> Self {
        Self {
            tokens,
            domains: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>, address: impl Into<String>) -> Self {
        self.domains
            .insert(domain.into().to_ascii_lowercase(), address.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>, address: impl Into<String>) -> Self {
        self.aliases
            .insert(alias.into().to_ascii_lowercase(), address.into());
        self
    }

    pub fn tokens(&self) -> &WellKnownTokens {
        &self.tokens
    }
}

impl Default for StaticResolver {
    fn default() -> Self {
        Self::new(Arc::new(WellKnownTokens::standard()))
    }
}

#[async_trait]
impl EntityResolver for StaticResolver {
    async fn resolve_domain(&self, name: &str) -> Result<Option<String>> {
        Ok(self.domains.get(&name.to_ascii_lowercase()).cloned())
    }

    async fn reverse_lookup(&self, address: &str) -> Result<Option<String>> {
        let mut owned: Vec<&String> = self
            .domains
            .iter()
            .filter(|(_, owner)| owner.as_str() == address)
            .map(|(domain, _)| domain)
            .collect();
        owned.sort();
        Ok(owned.first().map(|d| d.to_string()))
    }

    async fn get_domains(&self, owner: &str) -> Result<Vec<String>> {
        let mut owned: Vec<String> = self
            .domains
            .iter()
            .filter(|(_, address)| address.as_str() == owner)
            .map(|(domain, _)| domain.clone())
            .collect();
        owned.sort();
        Ok(owned)
    }

    async fn resolve_token(&self, symbol: &str) -> Result<Option<TokenInfo>> {
        Ok(self.tokens.get(symbol).cloned())
    }

    fn is_known_token(&self, symbol: &str) -> bool {
        self.tokens.contains(symbol)
    }

    async fn resolve_address(&self, freeform: &str) -> Result<Option<String>> {
        let trimmed = freeform.trim();
        if is_address_like(trimmed) {
            return Ok(Some(trimmed.to_string()));
        }
        if let Some(address) = self.resolve_domain(trimmed).await? {
            return Ok(Some(address));
        }
        self.lookup_alias(trimmed).await
    }

    async fn lookup_alias(&self, alias: &str) -> Result<Option<String>> {
        Ok(self.aliases.get(&alias.to_ascii_lowercase()).cloned())
    }
}
