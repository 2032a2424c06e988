//! Conversation engine - multi-turn state over the chain parser
//!
//! Each turn is either a meta-command (undo, redo, repeat, cancel, confirm,
//! modify, help, preference settings) or a command that goes through
//! reference substitution and then the chain parser. Turns take `&mut self`,
//! so a session processes exactly one turn at a time. Every turn publishes
//! an [`EngineSnapshot`] to watchers.

use std::mem;
use std::sync::Arc;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::amount::{parse_amount, parse_tip};
use crate::chain::{ChainParseResult, ChainParser};
use crate::config::EngineConfig;
use crate::context::{ConversationContext, ConversationTurn, HistoryStack};
use crate::entities::{EntityExtractor, EntityKind};
use crate::error::Result;
use crate::matcher::{normalize, IntentParser, Normalized, RecipientResolution};
use crate::preferences::{PreferenceLearner, PreferenceStore};
use crate::references::ReferenceResolver;
use crate::resolver::EntityResolver;
use crate::schedule::Clock;
use crate::types::FeeLevel;

pub const HELP_TEXT: &str = "\
Transfers:   send 1 SOL to alice.sol | pay bob 5 USDC
Swaps:       swap 0.5 SOL for BONK with 1% slippage and mev protection
Staking:     stake 10 SOL | unstake all
Launches:    buy 0.1 SOL of <mint> on pump | sell 50% of <token> on pump
Queries:     what's my balance | price of JUP | show last 5 transactions
Domains:     resolve alice.sol | list domains owned by alice.sol
Chains:      bundle: A then B | batch: A, B | if SOL > 200 then A
Schedules:   A tomorrow at 3pm | every day swap 10 USDC for SOL
Follow-ups:  send double that to them | change it to 3 | confirm
History:     undo | redo | repeat | cancel
Settings:    enable mev protection | set priority fee to high";

/// Published after every turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub context: ConversationContext,
    pub suggestions: Vec<String>,
}

/// Receiver that yields a new snapshot on every turn.
pub type EngineWatcher = watch::Receiver<EngineSnapshot>;

/// Which part of the pending command a modify turn changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifiedField {
    Amount,
    Recipient,
    Tip,
}

/// What a single turn did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOutcome {
    Parsed {
        result: ChainParseResult,
        resolved_input: String,
    },
    Failed {
        reason: String,
        result: Option<ChainParseResult>,
    },
    Undone,
    Redone,
    Repeated {
        result: ChainParseResult,
    },
    Cancelled,
    /// The pending command is ready to execute.
    Confirmed {
        result: ChainParseResult,
    },
    Modified {
        field: ModifiedField,
        result: ChainParseResult,
    },
    Help {
        text: String,
    },
    PreferenceUpdated {
        description: String,
    },
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum MetaCommand {
    Undo,
    Redo,
    Repeat,
    Cancel,
    Confirm,
    Modify(String),
    Help,
    SetMevProtection(bool),
    SetFeeLevel(FeeLevel),
}

struct MetaMatchers {
    undo: Regex,
    redo: Regex,
    repeat: Regex,
    cancel: Regex,
    confirm: Regex,
    modify_tip: Regex,
    modify: Vec<Regex>,
    help: Regex,
    mev_on: Regex,
    mev_off: Regex,
    fee: Regex,
}

impl MetaMatchers {
    fn new() -> Self {
        let re = |pattern: &str| Regex::new(pattern).expect("Invalid regex pattern");
        Self {
            undo: re(r"^(?:undo|go\s+back|revert)(?:\s+(?:that|it|last))?$"),
            redo: re(r"^redo(?:\s+(?:that|it))?$"),
            repeat: re(r"^(?:repeat(?:\s+(?:that|last))?|again|do\s+(?:it|that)\s+again|same\s+again)$"),
            cancel: re(r"^(?:cancel|nevermind|never\s+mind|abort|forget\s+it|start\s+over|reset)$"),
            confirm: re(
                r"^(?:confirm|yes|yep|yeah|y|ok|okay|sure|do\s+it|go\s+ahead|execute|approve|send\s+it)$",
            ),
            modify_tip: re(
                r"^(?:change|make|modify|update|set)\s+(?:the\s+)?(?:jito\s+)?tip\s+(?:to\s+)?(?P<value>\S+)$",
            ),
            modify: vec![
                re(
                    r"^(?:change|make|modify|update)\s+(?:it|that|(?:the\s+)?(?:amount|recipient|address|wallet))\s+(?:to\s+)?(?P<value>.+)$",
                ),
                re(r"^(?:change|modify|update)\s+to\s+(?P<value>.+)$"),
                re(
                    r"^actually\s+(?:(?:make\s+it|change\s+it\s+to|send\s+(?:it\s+)?to|to)\s+)?(?P<value>.+)$",
                ),
            ],
            help: re(r"^(?:help|commands|what\s+can\s+you\s+do|how\s+do\s+i\s+use\s+this)$"),
            mev_on: re(r"^(?:enable|turn\s+on|always\s+use)\s+mev(?:\s+protection)?$"),
            mev_off: re(r"^(?:disable|turn\s+off|never\s+use)\s+mev(?:\s+protection)?$"),
            fee: re(
                r"^(?:set\s+|use\s+)?(?:the\s+)?(?:priority\s+)?fee(?:\s+level)?\s+(?:to\s+)?(?P<level>low|medium|normal|high|turbo|max)$",
            ),
        }
    }

    // Checked in a fixed order; the first hit wins.
    fn matches(&self, n: &Normalized) -> Option<MetaCommand> {
        let text = n.lower.as_str();
        if self.undo.is_match(text) {
            return Some(MetaCommand::Undo);
        }
        if self.redo.is_match(text) {
            return Some(MetaCommand::Redo);
        }
        if self.repeat.is_match(text) {
            return Some(MetaCommand::Repeat);
        }
        if self.cancel.is_match(text) {
            return Some(MetaCommand::Cancel);
        }
        if self.confirm.is_match(text) {
            return Some(MetaCommand::Confirm);
        }
        if let Some(m) = self.modify_tip.captures(text).and_then(|c| c.name("value")) {
            let value = n.cased_slice(m.start(), m.end());
            return Some(MetaCommand::Modify(format!("tip {}", value)));
        }
        for pattern in &self.modify {
            if let Some(m) = pattern.captures(text).and_then(|c| c.name("value")) {
                return Some(MetaCommand::Modify(
                    n.cased_slice(m.start(), m.end()).to_string(),
                ));
            }
        }
        if self.help.is_match(text) {
            return Some(MetaCommand::Help);
        }
        if self.mev_on.is_match(text) {
            return Some(MetaCommand::SetMevProtection(true));
        }
        if self.mev_off.is_match(text) {
            return Some(MetaCommand::SetMevProtection(false));
        }
        if let Some(level) = self
            .fee
            .captures(text)
            .and_then(|c| c.name("level"))
            .and_then(|m| FeeLevel::from_word(m.as_str()))
        {
            return Some(MetaCommand::SetFeeLevel(level));
        }
        None
    }
}

/// Session-scoped conversation state machine
pub struct ConversationEngine {
    parser: ChainParser,
    references: ReferenceResolver,
    entities: EntityExtractor,
    meta: MetaMatchers,
    context: ConversationContext,
    undo: HistoryStack<ConversationContext>,
    redo: HistoryStack<ConversationContext>,
    turns: Vec<ConversationTurn>,
    learner: PreferenceLearner,
    store: Option<Arc<dyn PreferenceStore>>,
    snapshot: watch::Sender<EngineSnapshot>,
}

impl ConversationEngine {
    pub fn new(
        resolver: Arc<dyn EntityResolver>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let parser =
            ChainParser::with_parts(IntentParser::new(resolver), clock, config.time_parser());
        let learner = PreferenceLearner::new(config.max_suggestions, config.mev_ratio_threshold);
        let context = ConversationContext::default();
        let (snapshot, _rx) = watch::channel(EngineSnapshot {
            suggestions: learner.suggestions(&context),
            context: context.clone(),
        });

        Self {
            parser,
            references: ReferenceResolver::new(),
            entities: EntityExtractor::new(),
            meta: MetaMatchers::new(),
            context,
            undo: HistoryStack::new(config.history_limit),
            redo: HistoryStack::new(config.history_limit),
            turns: Vec::new(),
            learner,
            store: None,
            snapshot,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Reload preferences and the turn log from the store.
    ///
    /// The restored context remembers the last command's recipient, token
    /// and amount, but that command is not pending.
    pub async fn restore(&mut self) -> Result<()> {
        let Some(store) = self.store.clone() else {
            return Ok(());
        };
        if let Some((user, mev)) = store.load_preferences().await? {
            self.learner.load(user, mev);
        }
        self.turns = store.load_history().await?;
        if let Some(last) = self.turns.last() {
            let mut context = ConversationContext::default().derive(last.result.clone());
            context.confirmed = true;
            self.context = context;
        }
        info!(turns = self.turns.len(), "restored conversation");
        self.publish();
        Ok(())
    }

    pub fn subscribe(&self) -> EngineWatcher {
        self.snapshot.subscribe()
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn learner(&self) -> &PreferenceLearner {
        &self.learner
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn suggestions(&self) -> Vec<String> {
        self.learner.suggestions(&self.context)
    }

    /// Process one user turn.
    pub async fn process(&mut self, input: &str) -> Result<TurnOutcome> {
        let n = normalize(input);

        if let Some(command) = self.meta.matches(&n) {
            info!(?command, "meta-command");
            let outcome = self.run_meta(command, input).await?;
            self.publish();
            return Ok(outcome);
        }

        let resolved = self.references.resolve(&n.cased, &self.context);
        if let Some(phrase) = resolved.unresolved.first() {
            let reason = format!("I don't know what '{}' refers to yet.", phrase);
            return Ok(self.fail(reason, None));
        }

        let result = self.parser.parse(&resolved.text).await?;
        if !result.is_success() {
            let reason = result
                .failure_reason()
                .unwrap_or_else(|| "could not understand the command".to_string());
            return Ok(self.fail(reason, Some(result)));
        }

        self.accept(input, &resolved.text, result.clone()).await;
        Ok(TurnOutcome::Parsed {
            result,
            resolved_input: resolved.text,
        })
    }

    // Successful turn: save the old context for undo and derive a new one.
    async fn accept(&mut self, raw_input: &str, resolved_input: &str, result: ChainParseResult) {
        let next = self.context.derive(result.clone());
        let previous = mem::replace(&mut self.context, next);
        self.undo.push(previous);
        self.redo.clear();

        self.learner.observe(&result);
        self.turns.push(ConversationTurn {
            raw_input: raw_input.to_string(),
            resolved_input: resolved_input.to_string(),
            result,
            timestamp: self.parser.clock().now(),
        });
        info!(turn = self.context.turn, "context updated");

        self.persist().await;
        self.publish();
    }

    fn fail(&mut self, reason: String, result: Option<ChainParseResult>) -> TurnOutcome {
        debug!(%reason, "turn failed");
        self.context = self.context.with_error(reason.clone());
        self.publish();
        TurnOutcome::Failed { reason, result }
    }

    // Meta-command failures leave the context as it was.
    fn meta_failure(reason: impl Into<String>) -> TurnOutcome {
        TurnOutcome::Failed {
            reason: reason.into(),
            result: None,
        }
    }

    async fn run_meta(&mut self, command: MetaCommand, raw_input: &str) -> Result<TurnOutcome> {
        Ok(match command {
            MetaCommand::Undo => match self.undo.pop() {
                Some(previous) => {
                    let current = mem::replace(&mut self.context, previous);
                    self.redo.push(current);
                    TurnOutcome::Undone
                }
                None => Self::meta_failure("There's nothing to undo."),
            },
            MetaCommand::Redo => match self.redo.pop() {
                Some(next) => {
                    let current = mem::replace(&mut self.context, next);
                    self.undo.push(current);
                    TurnOutcome::Redone
                }
                None => Self::meta_failure("There's nothing to redo."),
            },
            MetaCommand::Repeat => match self.context.last_result.clone() {
                Some(result) => {
                    let resolved = self
                        .turns
                        .last()
                        .map(|t| t.resolved_input.clone())
                        .unwrap_or_else(|| raw_input.to_string());
                    self.accept(raw_input, &resolved, result.clone()).await;
                    TurnOutcome::Repeated { result }
                }
                None => Self::meta_failure("There's nothing to repeat."),
            },
            MetaCommand::Cancel => {
                let reset = self.context.reset();
                let previous = mem::replace(&mut self.context, reset);
                self.undo.push(previous);
                self.redo.clear();
                TurnOutcome::Cancelled
            }
            MetaCommand::Confirm => match (&self.context.last_result, self.context.has_pending()) {
                (Some(result), true) => {
                    let result = result.clone();
                    self.context = self.context.confirm();
                    TurnOutcome::Confirmed { result }
                }
                _ => Self::meta_failure("There's nothing to confirm."),
            },
            MetaCommand::Modify(value) => self.modify(&value, raw_input).await?,
            MetaCommand::Help => TurnOutcome::Help {
                text: HELP_TEXT.to_string(),
            },
            MetaCommand::SetMevProtection(enabled) => {
                self.learner.set_mev_protection(enabled);
                self.persist().await;
                TurnOutcome::PreferenceUpdated {
                    description: if enabled {
                        "MEV protection enabled".to_string()
                    } else {
                        "MEV protection disabled".to_string()
                    },
                }
            }
            MetaCommand::SetFeeLevel(level) => {
                self.learner.set_fee_level(level);
                self.persist().await;
                TurnOutcome::PreferenceUpdated {
                    description: format!("priority fee set to {}", level.as_str()),
                }
            }
        })
    }

    // Trial order: amount, then recipient, then tip.
    async fn modify(&mut self, value: &str, raw_input: &str) -> Result<TurnOutcome> {
        let value = value.trim();
        let pending = match (&self.context.last_result, self.context.has_pending()) {
            (Some(result), true) => result.clone(),
            _ => return Ok(Self::meta_failure("There's no pending command to modify.")),
        };
        let entities = self.entities.extract(value);

        // A leading amount, optionally followed by one word such as the token
        let leading_amount = entities.first().filter(|e| {
            e.kind == EntityKind::Amount
                && e.start == 0
                && value[e.end..].split_whitespace().count() <= 1
        });
        if let Some(entity) = leading_amount {
            if let Ok(amount) = parse_amount(&entity.value) {
                if amount > Decimal::ZERO {
                    if let Some(result) = pending.map_last_intent(|i| i.with_amount(amount)) {
                        return Ok(self.apply_modification(ModifiedField::Amount, result, raw_input).await);
                    }
                }
            }
        }

        if !value.contains(char::is_whitespace) {
            match self.parser.intent_parser().resolve_recipient(value).await? {
                RecipientResolution::Resolved(recipient)
                | RecipientResolution::Ambiguous(recipient, _) => {
                    if let Some(result) =
                        pending.map_last_intent(|i| i.with_recipient(recipient.clone()))
                    {
                        return Ok(self
                            .apply_modification(ModifiedField::Recipient, result, raw_input)
                            .await);
                    }
                }
                RecipientResolution::NotFound => {}
            }
        }

        if let Some(entity) = entities.iter().find(|e| e.kind == EntityKind::Tip) {
            if let Ok(tip) = parse_tip(&entity.value) {
                if let Some(result) = pending.with_tip(tip) {
                    return Ok(self.apply_modification(ModifiedField::Tip, result, raw_input).await);
                }
            }
        }

        Ok(Self::meta_failure(format!(
            "I couldn't apply '{}' to the pending command.",
            value
        )))
    }

    async fn apply_modification(
        &mut self,
        field: ModifiedField,
        result: ChainParseResult,
        raw_input: &str,
    ) -> TurnOutcome {
        debug!(?field, "modified pending command");
        self.accept(raw_input, raw_input, result.clone()).await;
        TurnOutcome::Modified { field, result }
    }

    // Best-effort; a failing store never fails the turn.
    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let (user, mev) = self.learner.snapshot();
        if let Err(err) = store.save_preferences(&user, &mev).await {
            warn!(%err, "failed to save preferences");
        }
        if let Err(err) = store.save_history(&self.turns).await {
            warn!(%err, "failed to save conversation history");
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(EngineSnapshot {
            context: self.context.clone(),
            suggestions: self.learner.suggestions(&self.context),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::preferences::InMemoryPreferenceStore;
    use crate::resolver::StaticResolver;
    use crate::schedule::FixedClock;
    use crate::types::TransactionIntent;
    use chrono::{TimeZone, Utc};

    const ALICE: &str = "A1iceWa11et111111111111111111111111111111111";
    const BOB: &str = "BobWa11et1111111111111111111111111111111111";

    fn engine() -> ConversationEngine {
        let resolver = StaticResolver::default()
            .with_domain("alice.sol", ALICE)
            .with_alias("bob", BOB);
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap());
        ConversationEngine::new(Arc::new(resolver), Arc::new(clock), EngineConfig::default())
    }

    fn last_intent(engine: &ConversationEngine) -> TransactionIntent {
        engine.context().last_intent().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_undo_redo_symmetry() {
        let mut engine = engine();
        let before = engine.context().clone();

        for amount in 1..=3 {
            let outcome = engine.process(&format!("stake {} sol", amount)).await.unwrap();
            assert!(outcome.is_success());
        }
        let after = engine.context().clone();

        for _ in 0..3 {
            assert_eq!(engine.process("undo").await.unwrap(), TurnOutcome::Undone);
        }
        assert_eq!(engine.context(), &before);
        assert!(!engine.process("undo").await.unwrap().is_success());

        for _ in 0..3 {
            assert_eq!(engine.process("redo").await.unwrap(), TurnOutcome::Redone);
        }
        assert_eq!(engine.context(), &after);
        assert!(!engine.can_redo());
    }

    #[tokio::test]
    async fn test_new_turn_clears_redo() {
        let mut engine = engine();
        engine.process("stake 1 sol").await.unwrap();
        engine.process("undo").await.unwrap();
        assert!(engine.can_redo());
        engine.process("stake 2 sol").await.unwrap();
        assert!(!engine.can_redo());
    }

    #[tokio::test]
    async fn test_confirm_requires_pending() {
        let mut engine = engine();
        assert!(!engine.process("confirm").await.unwrap().is_success());

        engine.process("stake 1 sol").await.unwrap();
        assert!(matches!(
            engine.process("yes").await.unwrap(),
            TurnOutcome::Confirmed { .. }
        ));
        assert!(engine.context().confirmed);
        assert!(!engine.process("confirm").await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_cancel_empties_and_is_undoable() {
        let mut engine = engine();
        assert_eq!(engine.process("cancel").await.unwrap(), TurnOutcome::Cancelled);

        engine.process("send 1 sol to bob").await.unwrap();
        assert_eq!(engine.process("never mind").await.unwrap(), TurnOutcome::Cancelled);
        assert!(engine.context().last_result.is_none());
        assert!(engine.context().last_recipient.is_none());

        engine.process("undo").await.unwrap();
        assert_eq!(engine.context().last_recipient.as_ref().unwrap().address, BOB);
    }

    #[tokio::test]
    async fn test_references_use_previous_turn() {
        let mut engine = engine();
        engine.process("send 5 sol to alice.sol").await.unwrap();

        let outcome = engine.process("send double that to them").await.unwrap();
        match outcome {
            TurnOutcome::Parsed { resolved_input, .. } => {
                assert_eq!(resolved_input, "send 10 SOL to alice.sol");
            }
            other => panic!("Expected Parsed, got {:?}", other),
        }
        let intent = last_intent(&engine);
        assert_eq!(intent.amount(), Some(Decimal::from(10)));
        assert_eq!(intent.recipient().unwrap().address, ALICE);
    }

    #[tokio::test]
    async fn test_unresolved_reference_fails_turn() {
        let mut engine = engine();
        let outcome = engine.process("send 1 sol to them").await.unwrap();
        assert!(!outcome.is_success());
        assert!(engine.context().last_error.is_some());
        assert!(engine.context().last_result.is_none());
        assert!(!engine.can_undo());
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_stacks() {
        let mut engine = engine();
        engine.process("stake 1 sol").await.unwrap();
        let outcome = engine.process("send 1 sol to nobody.sol").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed { result: Some(_), .. }));
        assert_eq!(last_intent(&engine).amount(), Some(Decimal::ONE));
        assert!(engine.context().last_error.is_some());

        engine.process("undo").await.unwrap();
        assert!(engine.context().last_result.is_none());
    }

    #[tokio::test]
    async fn test_modify_trial_order() {
        let mut engine = engine();
        engine.process("send 1 sol to bob").await.unwrap();

        assert!(matches!(
            engine.process("change it to 3").await.unwrap(),
            TurnOutcome::Modified { field: ModifiedField::Amount, .. }
        ));
        assert_eq!(last_intent(&engine).amount(), Some(Decimal::from(3)));

        assert!(matches!(
            engine.process("actually send it to alice.sol").await.unwrap(),
            TurnOutcome::Modified { field: ModifiedField::Recipient, .. }
        ));
        assert_eq!(last_intent(&engine).recipient().unwrap().address, ALICE);

        match engine.process("change the tip to 10k").await.unwrap() {
            TurnOutcome::Modified {
                field: ModifiedField::Tip,
                result: ChainParseResult::Single { tip, .. },
            } => assert_eq!(tip, Some(Decimal::from(10_000))),
            other => panic!("Expected tip modification, got {:?}", other),
        }

        match engine.process("change it to banana split").await.unwrap() {
            TurnOutcome::Failed { reason, .. } => assert!(reason.contains("banana split")),
            other => panic!("Expected failure, got {:?}", other),
        }

        // Each modification is undoable
        engine.process("undo").await.unwrap();
        assert_eq!(last_intent(&engine).recipient().unwrap().address, ALICE);
    }

    #[tokio::test]
    async fn test_repeat_and_help() {
        let mut engine = engine();
        assert!(!engine.process("repeat").await.unwrap().is_success());

        engine.process("stake 2 sol").await.unwrap();
        engine.process("confirm").await.unwrap();
        assert!(matches!(
            engine.process("again").await.unwrap(),
            TurnOutcome::Repeated { .. }
        ));
        assert!(engine.context().has_pending());
        assert_eq!(engine.turns().len(), 2);

        let before = engine.context().clone();
        assert!(matches!(
            engine.process("help").await.unwrap(),
            TurnOutcome::Help { .. }
        ));
        assert_eq!(engine.context(), &before);
    }

    #[tokio::test]
    async fn test_time_condition_after_token_turn() {
        let mut engine = engine();
        engine.process("stake 1 sol").await.unwrap();

        match engine.process("when it is 3pm, stake 2 sol").await.unwrap() {
            TurnOutcome::Parsed {
                result: ChainParseResult::Conditional { condition, .. },
                resolved_input,
            } => {
                assert_eq!(resolved_input, "when it is 3pm, stake 2 sol");
                assert_eq!(
                    condition,
                    Condition::Time {
                        value: Utc.with_ymd_and_hms(2024, 6, 10, 15, 0, 0).unwrap()
                    }
                );
            }
            other => panic!("Expected Conditional, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scheduled_turn() {
        let mut engine = engine();
        match engine.process("send 1 SOL to bob tomorrow at 3pm").await.unwrap() {
            TurnOutcome::Parsed {
                result: ChainParseResult::Scheduled { execution_time, .. },
                ..
            } => {
                assert_eq!(execution_time, Utc.with_ymd_and_hms(2024, 6, 11, 15, 0, 0).unwrap());
            }
            other => panic!("Expected Scheduled, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_preferences_and_snapshot() {
        let mut engine = engine();
        let mut watcher = engine.subscribe();

        assert!(matches!(
            engine.process("enable mev protection").await.unwrap(),
            TurnOutcome::PreferenceUpdated { .. }
        ));
        assert!(engine.learner().prefers_mev_protection());

        engine.process("set priority fee to turbo").await.unwrap();
        assert_eq!(engine.learner().fee_level(), FeeLevel::Turbo);

        engine.process("swap 1 sol for usdc").await.unwrap();
        assert!(watcher.has_changed().unwrap());
        let snapshot = watcher.borrow_and_update().clone();
        assert!(snapshot.context.last_result.is_some());
        assert_eq!(snapshot.suggestions[0], "confirm");
        assert_eq!(snapshot.suggestions[1], "enable mev protection");
    }

    #[tokio::test]
    async fn test_restore_from_store() {
        let store = Arc::new(InMemoryPreferenceStore::new());
        let mut first = engine().with_store(store.clone());
        first.process("send 5 sol to alice.sol").await.unwrap();
        first.process("swap 1 sol for usdc with protection").await.unwrap();

        let mut second = engine().with_store(store);
        second.restore().await.unwrap();
        assert_eq!(second.turns().len(), 2);
        assert!(!second.context().has_pending());
        assert_eq!(second.context().last_token.as_deref(), Some("SOL"));
        assert_eq!(second.learner().mev_ratio(), 1.0);
    }
}
