use rand::random_range;
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use strum_macros::{Display, EnumString};

use keeper_common::get_current_timestamp;
use keeper_database::{PgQueryAs, SqlxCrud, SqlxFilterQuery, SqlxSchema};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
)]
#[sqlx(type_name = "condition_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConditionKind {
    Phobia,
    Mania,
    BoutOfMadness,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
)]
#[sqlx(type_name = "condition_duration", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConditionDurationClass {
    Temporary,
    Indefinite,
    Permanent,
}

/// The bouts of madness a large one-shot sanity loss can inflict. Drawn
/// uniformly; never cleared automatically.
const BOUT_CATALOG: &[(&str, &str)] = &[
    ("Amnesia", "No memory of events since the last safe moment"),
    ("Catatonia", "Frozen in place, unresponsive to the outside world"),
    ("Panic Flight", "Flees headlong from the source of the horror"),
    ("Violence", "Lashes out indiscriminately at anyone nearby"),
    ("Paranoia", "Trusts no one; sees conspiracy in every shadow"),
    ("Hysteria", "Uncontrollable laughing, weeping or screaming"),
];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SanityCondition {
    pub id: Uuid,

    pub character: Uuid,

    pub kind: ConditionKind,
    pub name: String,
    pub description: String,
    pub duration_class: ConditionDurationClass,

    pub is_active: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl SanityCondition {
    pub fn new(
        character: Uuid,
        kind: ConditionKind,
        name: &str,
        description: &str,
        duration_class: ConditionDurationClass,
    ) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            character,
            kind,
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            duration_class,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// A random temporary bout of madness, the consequence of losing five
    /// or more sanity in one hit.
    pub fn random_bout(character: Uuid) -> Self {
        let (name, description) = BOUT_CATALOG[random_range(0..BOUT_CATALOG.len())];
        Self::new(
            character,
            ConditionKind::BoutOfMadness,
            name,
            description,
            ConditionDurationClass::Temporary,
        )
    }
}

impl SqlxSchema for SanityCondition {
    type Id = Uuid;

    const TABLE_NAME: &'static str = "sanity_conditions";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "character",
        "kind",
        "name",
        "description",
        "duration_class",
        "is_active",
        "created_at",
        "updated_at",
    ];
    const CREATE_TYPE_SQL: &'static [&'static str] = &[
        r#"
        DO $$ BEGIN
            CREATE TYPE condition_kind AS ENUM ('phobia', 'mania', 'bout_of_madness');
        EXCEPTION WHEN duplicate_object THEN NULL; END $$;
    "#,
        r#"
        DO $$ BEGIN
            CREATE TYPE condition_duration AS ENUM ('temporary', 'indefinite', 'permanent');
        EXCEPTION WHEN duplicate_object THEN NULL; END $$;
    "#,
    ];
    const CREATE_TABLE_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS "sanity_conditions" (
            id UUID PRIMARY KEY,
            "character" UUID NOT NULL REFERENCES "characters"(id) ON DELETE CASCADE,
            kind condition_kind NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            duration_class condition_duration NOT NULL,
            is_active BOOLEAN NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
    "#;
    const INDEXES_SQL: &'static [&'static str] = &[
        r#"CREATE INDEX IF NOT EXISTS idx_sanity_conditions_character ON "sanity_conditions" ("character")"#,
    ];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }
}

impl SqlxCrud for SanityCondition {
    fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.id)
            .bind(self.character)
            .bind(self.kind)
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.duration_class)
            .bind(self.is_active)
            .bind(self.created_at)
            .bind(self.updated_at)
    }

    fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.character)
            .bind(self.kind)
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.duration_class)
            .bind(self.is_active)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.id)
    }
}

impl SqlxFilterQuery for SanityCondition {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bout_comes_from_the_catalog() {
        for _ in 0..20 {
            let bout = SanityCondition::random_bout(Uuid::new_v4());
            assert!(BOUT_CATALOG.iter().any(|(name, _)| *name == bout.name));
            assert_eq!(bout.kind, ConditionKind::BoutOfMadness);
            assert_eq!(bout.duration_class, ConditionDurationClass::Temporary);
            assert!(bout.is_active);
        }
    }
}
