mod broadcast;
mod chapter;
mod character;
mod condition;
mod dice;
mod effect;
mod item;
mod journal;
mod mutator;
mod roll;
mod session;
mod status;
mod user;

pub use broadcast::{BroadcastRegistry, ClientMessage, EventKind, SessionEvent};
pub use chapter::Chapter;
pub use character::{Character, Characteristics};
pub use condition::{ConditionDurationClass, ConditionKind, SanityCondition};
pub use dice::{classify_percentile, roll_formula, DiceError, RollOutput};
pub use effect::{ActiveEffect, EffectDuration, EffectKind};
pub use item::InventoryItem;
pub use journal::JournalEntry;
pub use mutator::{CharacterMutator, GaugeField, MutationOutcome, MutatorError};
pub use roll::{RollHistory, RollOutcome};
pub use session::{GameSession, ProjectionState, SessionStatus};
pub use status::{derive_status, Severity, StatusCondition};
pub use user::{User, UserRole};
