use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::json;
use sqlx::types::Uuid;
use sqlx::PgPool;
use strum_macros::{Display, EnumString};
use tokio::sync::Mutex;

use keeper_common::get_current_timestamp;
use keeper_database::{QueryCriteria, SqlxCrud, SqlxFilterQuery};

use crate::broadcast::{BroadcastRegistry, SessionEvent};
use crate::character::Character;
use crate::condition::SanityCondition;
use crate::effect::ActiveEffect;
use crate::status::{derive_status, StatusCondition};

/// A sanity loss at least this large in one application triggers a random
/// bout of madness.
const BOUT_THRESHOLD: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum GaugeField {
    HitPoints,
    Sanity,
    MagicPoints,
    Luck,
}

#[derive(Debug, thiserror::Error)]
pub enum MutatorError {
    #[error("character {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub character: Character,
    /// The freshly derived status set (empty unless HP or Sanity moved).
    pub conditions: Vec<StatusCondition>,
    /// Set when a large sanity loss inflicted a bout of madness.
    pub bout: Option<SanityCondition>,
}

/// Applies gauge deltas to characters. All sub-steps of an HP/Sanity change
/// (persist gauge, replace automatic debuffs, record a bout) commit as one
/// transaction; the `character_updated` broadcast fires only after commit,
/// so a failed write leaves nothing observable.
///
/// Writes to the same character are serialized through a per-character
/// async mutex; two concurrent damage applications cannot lose an update.
pub struct CharacterMutator {
    locks: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl Default for CharacterMutator {
    fn default() -> Self {
        Self::new()
    }
}

impl CharacterMutator {
    pub fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, character_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("character lock map poisoned");
        locks.entry(character_id).or_default().clone()
    }

    fn clamp(field: GaugeField, character: &Character, delta: i32) -> i32 {
        match field {
            GaugeField::HitPoints => {
                (character.hit_points + delta).clamp(0, character.max_hit_points)
            }
            GaugeField::Sanity => (character.sanity + delta).clamp(0, character.max_sanity),
            GaugeField::MagicPoints => {
                (character.magic_points + delta).clamp(0, character.max_magic_points)
            }
            GaugeField::Luck => (character.luck + delta).clamp(0, 99),
        }
    }

    pub async fn apply_delta(
        &self,
        db: &PgPool,
        registry: &BroadcastRegistry,
        character_id: Uuid,
        field: GaugeField,
        delta: i32,
        actor: Option<Uuid>,
    ) -> Result<MutationOutcome, MutatorError> {
        let lock = self.lock_for(character_id);
        let _guard = lock.lock().await;

        let mut tx = db.begin().await?;

        let mut character = Character::find_one_by_criteria(
            QueryCriteria::new().add_valued_filter("id", "=", character_id),
            &mut *tx,
        )
        .await?
        .ok_or(MutatorError::NotFound(character_id))?;

        let clamped = Self::clamp(field, &character, delta);
        match field {
            GaugeField::HitPoints => character.hit_points = clamped,
            GaugeField::Sanity => character.sanity = clamped,
            GaugeField::MagicPoints => character.magic_points = clamped,
            GaugeField::Luck => character.luck = clamped,
        }
        character.updated_at = get_current_timestamp();
        let character = character.update(&mut *tx).await?;

        let mut conditions = Vec::new();
        let mut bout = None;

        if matches!(field, GaugeField::HitPoints | GaugeField::Sanity) {
            // Replace the previous automatic debuff set wholesale; at most
            // one current status set exists per character.
            ActiveEffect::delete_by_criteria(
                QueryCriteria::new()
                    .add_valued_filter("character", "=", character_id)
                    .add_valued_filter("kind->>'auto'", "=", "true".to_string()),
                &mut *tx,
            )
            .await?;

            conditions = derive_status(
                character.hit_points,
                character.max_hit_points,
                character.sanity,
                character.max_sanity,
            );
            for condition in &conditions {
                ActiveEffect::automatic_debuff(character_id, condition, actor)
                    .create(&mut *tx)
                    .await?;
            }

            if field == GaugeField::Sanity && delta <= -BOUT_THRESHOLD {
                bout = Some(
                    SanityCondition::random_bout(character_id)
                        .create(&mut *tx)
                        .await?,
                );
            }
        }

        tx.commit().await?;

        tracing::info!(
            "[CharacterMutator::apply_delta] character {} {} {:+} -> {} ({} conditions)",
            character_id,
            field,
            delta,
            clamped,
            conditions.len()
        );

        registry
            .broadcast(
                character.session,
                SessionEvent::character_updated(json!({
                    "character": character,
                    "conditions": conditions,
                })),
            )
            .await;

        Ok(MutationOutcome {
            character,
            conditions,
            bout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::Characteristics;
    use std::collections::BTreeMap;

    fn character_with_gauges(hp: i32, max_hp: i32, sanity: i32, max_sanity: i32) -> Character {
        let mut character = Character::new(
            Uuid::new_v4(),
            None,
            "Test Subject",
            "Professor",
            Characteristics::default(),
            BTreeMap::new(),
            0,
        );
        character.hit_points = hp;
        character.max_hit_points = max_hp;
        character.sanity = sanity;
        character.max_sanity = max_sanity;
        character.magic_points = 5;
        character.max_magic_points = 10;
        character.luck = 50;
        character
    }

    #[test]
    fn clamps_damage_to_zero() {
        let character = character_with_gauges(20, 20, 50, 50);
        assert_eq!(
            CharacterMutator::clamp(GaugeField::HitPoints, &character, -25),
            0
        );
    }

    #[test]
    fn clamps_healing_to_max() {
        let character = character_with_gauges(18, 20, 50, 50);
        assert_eq!(
            CharacterMutator::clamp(GaugeField::HitPoints, &character, 10),
            20
        );
    }

    #[test]
    fn luck_clamps_to_ninety_nine() {
        let character = character_with_gauges(10, 10, 50, 50);
        assert_eq!(CharacterMutator::clamp(GaugeField::Luck, &character, 80), 99);
        assert_eq!(
            CharacterMutator::clamp(GaugeField::Luck, &character, -80),
            0
        );
    }

    #[test]
    fn zero_delta_is_identity_on_the_gauge() {
        let character = character_with_gauges(13, 20, 40, 50);
        assert_eq!(
            CharacterMutator::clamp(GaugeField::HitPoints, &character, 0),
            13
        );
    }

    #[test]
    fn lock_map_reuses_entries_per_character() {
        let mutator = CharacterMutator::new();
        let id = Uuid::new_v4();
        let first = mutator.lock_for(id);
        let second = mutator.lock_for(id);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &mutator.lock_for(Uuid::new_v4())));
    }
}
