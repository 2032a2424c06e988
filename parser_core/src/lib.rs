//! Wallet intent - deterministic natural-language command parsing for a
//! Solana wallet assistant
//!
//! Three layers, each built on the one below:
//! - [`matcher::IntentParser`] turns one command into a typed intent
//! - [`chain::ChainParser`] handles sequences, bundles, batches, conditions,
//!   schedules and recurring commands
//! - [`conversation::ConversationEngine`] adds multi-turn context, references,
//!   undo/redo and learned suggestions

pub mod amount;
pub mod chain;
pub mod condition;
pub mod config;
pub mod context;
pub mod conversation;
pub mod entities;
pub mod error;
pub mod matcher;
pub mod preferences;
pub mod references;
pub mod resolver;
pub mod schedule;
pub mod tokens;
pub mod types;

pub use chain::{ChainParseResult, ChainParser, ChainStep, StepFailure};
pub use condition::{Comparator, Condition};
pub use config::EngineConfig;
pub use context::{ConversationContext, ConversationTurn};
pub use conversation::{ConversationEngine, EngineSnapshot, EngineWatcher, TurnOutcome};
pub use entities::{Entity, EntityExtractor, EntityKind};
pub use error::{Error, Result};
pub use matcher::IntentParser;
pub use preferences::{InMemoryPreferenceStore, JsonFilePreferenceStore, PreferenceStore};
pub use resolver::{EntityResolver, StaticResolver};
pub use schedule::{Clock, FixedClock, Interval, IntervalUnit, SystemClock};
pub use tokens::WellKnownTokens;
pub use types::*;

// Python bindings
#[cfg(feature = "python")]
pub mod py;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn wallet_intent(m: &Bound<'_, PyModule>) -> PyResult<()> {
    use py::*;
    m.add_class::<PyIntentParser>()?;
    m.add_class::<PyChainParser>()?;
    m.add_class::<PyConversation>()?;
    m.add_class::<PyEntityExtractor>()?;
    Ok(())
}
