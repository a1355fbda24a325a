use serde::{Deserialize, Serialize};
use sqlx::types::{Json, Uuid};

use keeper_common::get_current_timestamp;
use keeper_database::{PgQueryAs, SqlxCrud, SqlxFilterQuery, SqlxSchema};

use crate::status::{Severity, StatusCondition};

/// Closed set of applied-modifier shapes. Each variant carries its own
/// payload; derived status debuffs are the only rows with `auto = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    Buff {
        modifier: i32,
    },
    Debuff {
        modifier: i32,
        severity: Option<Severity>,
        auto: bool,
    },
    Damage {
        amount: i32,
    },
    SanityLoss {
        amount: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "amount", rename_all = "snake_case")]
pub enum EffectDuration {
    Rounds(i32),
    Hours(i32),
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEffect {
    pub id: Uuid,

    pub character: Uuid,

    pub kind: Json<EffectKind>,
    pub name: String,
    pub description: String,
    /// The magnitude exactly as the caller supplied it: a signed number or
    /// a dice formula.
    pub value: String,
    /// Descriptive only. Nothing reaps effects on a timer; expiry is a GM
    /// toggling `is_active` off.
    pub duration: Option<Json<EffectDuration>>,

    pub is_active: bool,
    pub applied_by: Option<Uuid>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl ActiveEffect {
    pub fn record(
        character: Uuid,
        kind: EffectKind,
        name: &str,
        description: &str,
        value: &str,
        duration: Option<EffectDuration>,
        applied_by: Option<Uuid>,
    ) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            character,
            kind: Json(kind),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            value: value.trim().to_string(),
            duration: duration.map(Json),
            is_active: true,
            applied_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// A derived status condition persisted as a debuff row. These are the
    /// rows the mutator wholly replaces on every HP/Sanity change.
    pub fn automatic_debuff(
        character: Uuid,
        condition: &StatusCondition,
        applied_by: Option<Uuid>,
    ) -> Self {
        Self::record(
            character,
            EffectKind::Debuff {
                modifier: condition.roll_malus,
                severity: Some(condition.severity),
                auto: true,
            },
            condition.name,
            condition.effect,
            &condition.roll_malus.to_string(),
            None,
            applied_by,
        )
    }

    pub fn is_automatic(&self) -> bool {
        matches!(*self.kind, EffectKind::Debuff { auto: true, .. })
    }
}

impl SqlxSchema for ActiveEffect {
    type Id = Uuid;

    const TABLE_NAME: &'static str = "active_effects";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "character",
        "kind",
        "name",
        "description",
        "value",
        "duration",
        "is_active",
        "applied_by",
        "created_at",
        "updated_at",
    ];
    const CREATE_TABLE_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS "active_effects" (
            id UUID PRIMARY KEY,
            "character" UUID NOT NULL REFERENCES "characters"(id) ON DELETE CASCADE,
            kind JSONB NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            value TEXT NOT NULL,
            duration JSONB,
            is_active BOOLEAN NOT NULL,
            applied_by UUID REFERENCES "users"(id) ON DELETE SET NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
    "#;
    const INDEXES_SQL: &'static [&'static str] = &[
        r#"CREATE INDEX IF NOT EXISTS idx_active_effects_character ON "active_effects" ("character")"#,
    ];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }
}

impl SqlxCrud for ActiveEffect {
    fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.id)
            .bind(self.character)
            .bind(self.kind.clone())
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.value.clone())
            .bind(self.duration.clone())
            .bind(self.is_active)
            .bind(self.applied_by)
            .bind(self.created_at)
            .bind(self.updated_at)
    }

    fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.character)
            .bind(self.kind.clone())
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.value.clone())
            .bind(self.duration.clone())
            .bind(self.is_active)
            .bind(self.applied_by)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.id)
    }
}

impl SqlxFilterQuery for ActiveEffect {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_tagged_json() {
        let kind = EffectKind::Debuff {
            modifier: -20,
            severity: Some(Severity::Severe),
            auto: true,
        };
        let raw = serde_json::to_string(&kind).unwrap();
        assert!(raw.contains(r#""type":"debuff""#));
        assert_eq!(serde_json::from_str::<EffectKind>(&raw).unwrap(), kind);
    }

    #[test]
    fn damage_kind_carries_amount() {
        let raw = r#"{"type":"damage","amount":7}"#;
        let kind: EffectKind = serde_json::from_str(raw).unwrap();
        assert_eq!(kind, EffectKind::Damage { amount: 7 });
    }

    #[test]
    fn automatic_flag_only_on_auto_debuffs() {
        let character = Uuid::new_v4();
        let manual = ActiveEffect::record(
            character,
            EffectKind::Buff { modifier: 10 },
            "Liquid Courage",
            "",
            "10",
            Some(EffectDuration::Hours(1)),
            None,
        );
        assert!(!manual.is_automatic());
    }
}
