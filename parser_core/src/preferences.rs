//! Preference learning and persistence
//!
//! Learned counters only rank suggestions. They never change how text is
//! parsed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ahash::AHashMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::chain::ChainParseResult;
use crate::context::{ConversationContext, ConversationTurn};
use crate::error::{Error, Result};
use crate::types::{FeeLevel, IntentKind, TransactionIntent};

/// Persisted usage counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub intent_counts: BTreeMap<IntentKind, u32>,
    pub token_counts: BTreeMap<String, u32>,
    pub fee_level: FeeLevel,
}

/// MEV protection usage and the explicit user setting, if any
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MevPreferences {
    pub always_protect: Option<bool>,
    pub protected_swaps: u32,
    pub total_swaps: u32,
}

impl MevPreferences {
    pub fn usage_ratio(&self) -> f64 {
        if self.total_swaps == 0 {
            0.0
        } else {
            f64::from(self.protected_swaps) / f64::from(self.total_swaps)
        }
    }
}

/// Storage backend for preferences and the turn log.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn save_preferences(&self, user: &UserPreferences, mev: &MevPreferences) -> Result<()>;

    async fn load_preferences(&self) -> Result<Option<(UserPreferences, MevPreferences)>>;

    async fn save_history(&self, turns: &[ConversationTurn]) -> Result<()>;

    async fn load_history(&self) -> Result<Vec<ConversationTurn>>;
}

/// Store kept in process memory.
#[derive(Default)]
pub struct InMemoryPreferenceStore {
    preferences: Mutex<Option<(UserPreferences, MevPreferences)>>,
    history: Mutex<Vec<ConversationTurn>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn save_preferences(&self, user: &UserPreferences, mev: &MevPreferences) -> Result<()> {
        *self.preferences.lock().await = Some((user.clone(), mev.clone()));
        Ok(())
    }

    async fn load_preferences(&self) -> Result<Option<(UserPreferences, MevPreferences)>> {
        Ok(self.preferences.lock().await.clone())
    }

    async fn save_history(&self, turns: &[ConversationTurn]) -> Result<()> {
        *self.history.lock().await = turns.to_vec();
        Ok(())
    }

    async fn load_history(&self) -> Result<Vec<ConversationTurn>> {
        Ok(self.history.lock().await.clone())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredPreferences {
    user: UserPreferences,
    mev: MevPreferences,
}

/// Store that keeps `preferences.json` and `history.json` in a directory.
pub struct JsonFilePreferenceStore {
    dir: PathBuf,
}

impl JsonFilePreferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if dir.exists() && !dir.is_dir() {
            return Err(Error::PreferenceStore(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    fn preferences_path(&self) -> PathBuf {
        self.dir.join("preferences.json")
    }

    fn history_path(&self) -> PathBuf {
        self.dir.join("history.json")
    }

    async fn write(&self, path: PathBuf, contents: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    async fn read(&self, path: PathBuf) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn save_preferences(&self, user: &UserPreferences, mev: &MevPreferences) -> Result<()> {
        let stored = StoredPreferences {
            user: user.clone(),
            mev: mev.clone(),
        };
        let encoded = serde_json::to_string_pretty(&stored)?;
        self.write(self.preferences_path(), encoded).await
    }

    async fn load_preferences(&self) -> Result<Option<(UserPreferences, MevPreferences)>> {
        let Some(contents) = self.read(self.preferences_path()).await? else {
            return Ok(None);
        };
        let stored: StoredPreferences = serde_json::from_str(&contents)?;
        Ok(Some((stored.user, stored.mev)))
    }

    async fn save_history(&self, turns: &[ConversationTurn]) -> Result<()> {
        let encoded = serde_json::to_string(turns)?;
        self.write(self.history_path(), encoded).await
    }

    async fn load_history(&self) -> Result<Vec<ConversationTurn>> {
        match self.read(self.history_path()).await? {
            Some(contents) => Ok(serde_json::from_str(&contents)?),
            None => Ok(Vec::new()),
        }
    }
}

const GENERAL_SUGGESTIONS: &[(IntentKind, &str)] = &[
    (IntentKind::Balance, "what's my balance"),
    (IntentKind::Swap, "swap 1 SOL for USDC"),
    (IntentKind::Transfer, "send 1 SOL to alice.sol"),
    (IntentKind::Portfolio, "show my portfolio"),
    (IntentKind::Stake, "stake 1 SOL"),
    (IntentKind::TransactionHistory, "show my transaction history"),
];

/// Frequency counters plus the MEV usage ratio.
#[derive(Debug, Clone)]
pub struct PreferenceLearner {
    intent_counts: AHashMap<IntentKind, u32>,
    token_counts: AHashMap<String, u32>,
    fee_level: FeeLevel,
    mev: MevPreferences,
    max_suggestions: usize,
    mev_ratio_threshold: f64,
}

impl PreferenceLearner {
    pub fn new(max_suggestions: usize, mev_ratio_threshold: f64) -> Self {
        Self {
            intent_counts: AHashMap::new(),
            token_counts: AHashMap::new(),
            fee_level: FeeLevel::default(),
            mev: MevPreferences::default(),
            max_suggestions,
            mev_ratio_threshold,
        }
    }

    /// Replace learned state with saved preferences.
    pub fn load(&mut self, user: UserPreferences, mev: MevPreferences) {
        self.intent_counts = user.intent_counts.into_iter().collect();
        self.token_counts = user.token_counts.into_iter().collect();
        self.fee_level = user.fee_level;
        self.mev = mev;
    }

    pub fn snapshot(&self) -> (UserPreferences, MevPreferences) {
        let user = UserPreferences {
            intent_counts: self.intent_counts.iter().map(|(k, v)| (*k, *v)).collect(),
            token_counts: self
                .token_counts
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            fee_level: self.fee_level,
        };
        (user, self.mev.clone())
    }

    /// Count every intent in a successful result.
    pub fn observe(&mut self, result: &ChainParseResult) {
        for intent in result.intents() {
            *self.intent_counts.entry(intent.kind()).or_insert(0) += 1;
            if let Some(symbol) = intent.token_symbol() {
                *self.token_counts.entry(symbol.to_string()).or_insert(0) += 1;
            }
            if intent.kind() == IntentKind::Swap {
                self.mev.total_swaps += 1;
                if intent.uses_mev_protection() {
                    self.mev.protected_swaps += 1;
                }
            }
        }
    }

    pub fn count(&self, kind: IntentKind) -> u32 {
        self.intent_counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn set_mev_protection(&mut self, enabled: bool) {
        self.mev.always_protect = Some(enabled);
    }

    pub fn set_fee_level(&mut self, level: FeeLevel) {
        self.fee_level = level;
    }

    pub fn fee_level(&self) -> FeeLevel {
        self.fee_level
    }

    pub fn mev_ratio(&self) -> f64 {
        self.mev.usage_ratio()
    }

    /// Explicit setting first, then observed usage.
    pub fn prefers_mev_protection(&self) -> bool {
        match self.mev.always_protect {
            Some(setting) => setting,
            None => self.mev.total_swaps > 0 && self.mev_ratio() >= self.mev_ratio_threshold,
        }
    }

    fn favorite_token(&self) -> Option<&str> {
        let mut tokens: Vec<(&String, &u32)> = self.token_counts.iter().collect();
        tokens.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        tokens.first().map(|(symbol, _)| symbol.as_str())
    }

    /// Ranked follow-up suggestions for the given context.
    pub fn suggestions(&self, ctx: &ConversationContext) -> Vec<String> {
        let mut ranked: Vec<String> = Vec::new();

        if ctx.has_pending() {
            ranked.push("confirm".to_string());
            if let Some(TransactionIntent::Swap {
                mev_protection: false,
                ..
            }) = ctx.last_intent()
            {
                if self.prefers_mev_protection() {
                    ranked.push("enable mev protection".to_string());
                }
            }
        }

        let mut candidates: Vec<(IntentKind, String)> = Vec::new();
        match ctx.last_intent() {
            Some(TransactionIntent::Transfer { token, .. }) => {
                candidates.push((IntentKind::Balance, format!("what's my {} balance", token.symbol)));
                candidates.push((IntentKind::TransactionHistory, "show last 5 transactions".to_string()));
            }
            Some(TransactionIntent::Swap { to, .. }) => {
                candidates.push((IntentKind::Balance, format!("what's my {} balance", to.symbol)));
                candidates.push((IntentKind::TokenPrice, format!("price of {}", to.symbol)));
            }
            Some(TransactionIntent::Stake { .. }) => {
                candidates.push((IntentKind::Portfolio, "show my portfolio".to_string()));
            }
            Some(TransactionIntent::LaunchBuy { mint, .. }) => {
                candidates.push((IntentKind::LaunchSell, format!("sell 50% of {} on pump", mint)));
            }
            _ => {}
        }
        if let Some(token) = self.favorite_token() {
            candidates.push((IntentKind::TokenPrice, format!("price of {}", token)));
        }
        candidates.extend(
            GENERAL_SUGGESTIONS
                .iter()
                .map(|(kind, text)| (*kind, text.to_string())),
        );

        // Stable sort keeps declaration order among equal counts
        candidates.sort_by(|a, b| self.count(b.0).cmp(&self.count(a.0)));
        for (_, text) in candidates {
            if !ranked.contains(&text) {
                ranked.push(text);
            }
        }

        ranked.truncate(self.max_suggestions);
        ranked
    }
}

impl Default for PreferenceLearner {
    fn default() -> Self {
        Self::new(3, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenInfo;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn swap(protected: bool) -> ChainParseResult {
        ChainParseResult::Single {
            intent: TransactionIntent::Swap {
                amount: Decimal::ONE,
                from: TokenInfo::new("SOL", "So11111111111111111111111111111111111111112", 9),
                to: TokenInfo::new("USDC", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6),
                slippage_bps: None,
                mev_protection: protected,
            },
            confidence: 0.95,
            tip: None,
        }
    }

    #[test]
    fn test_mev_ratio_drives_preference() {
        let mut learner = PreferenceLearner::new(3, 0.5);
        assert!(!learner.prefers_mev_protection());

        learner.observe(&swap(true));
        learner.observe(&swap(false));
        assert_eq!(learner.mev_ratio(), 0.5);
        assert!(learner.prefers_mev_protection());

        learner.set_mev_protection(false);
        assert!(!learner.prefers_mev_protection());
    }

    #[test]
    fn test_suggestions_are_ranked_and_bounded() {
        let mut learner = PreferenceLearner::new(3, 0.5);
        for _ in 0..3 {
            learner.observe(&swap(false));
        }
        let ctx = ConversationContext::default().derive(swap(false));
        let suggestions = learner.suggestions(&ctx);

        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0], "confirm");
        assert_eq!(suggestions[1], "swap 1 SOL for USDC");
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryPreferenceStore::new();
        assert!(store.load_preferences().await.unwrap().is_none());

        let mut learner = PreferenceLearner::default();
        learner.observe(&swap(true));
        let (user, mev) = learner.snapshot();
        store.save_preferences(&user, &mev).await.unwrap();

        let (loaded_user, loaded_mev) = store.load_preferences().await.unwrap().unwrap();
        assert_eq!(loaded_user.intent_counts.get(&IntentKind::Swap), Some(&1));
        assert_eq!(loaded_mev.protected_swaps, 1);
    }

    #[tokio::test]
    async fn test_json_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = JsonFilePreferenceStore::new(dir.path().join("state")).unwrap();
        assert!(store.load_history().await.unwrap().is_empty());

        let turn = ConversationTurn {
            raw_input: "swap 1 sol for usdc".to_string(),
            resolved_input: "swap 1 sol for usdc".to_string(),
            result: swap(false),
            timestamp: Utc::now(),
        };
        store.save_history(&[turn.clone()]).await.unwrap();
        store
            .save_preferences(&UserPreferences::default(), &MevPreferences::default())
            .await
            .unwrap();

        // A fresh store over the same directory sees the saved state
        let reopened = JsonFilePreferenceStore::new(dir.path().join("state")).unwrap();
        assert_eq!(reopened.load_history().await.unwrap(), vec![turn]);
        assert!(reopened.load_preferences().await.unwrap().is_some());
    }
}
