use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::types::{Json, Uuid};

use keeper_common::get_current_timestamp;
use keeper_database::{PgQueryAs, SqlxCrud, SqlxFilterQuery, SqlxSchema};

/// The nine base characteristics of an investigator, percentile-scaled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Characteristics {
    pub strength: i32,
    pub constitution: i32,
    pub size: i32,
    pub dexterity: i32,
    pub appearance: i32,
    pub intelligence: i32,
    pub power: i32,
    pub education: i32,
    pub luck: i32,
}

impl Characteristics {
    /// Derived hit point maximum: (CON + SIZ) / 10.
    pub fn derived_max_hit_points(&self) -> i32 {
        (self.constitution + self.size) / 10
    }

    /// Starting sanity equals POW.
    pub fn derived_max_sanity(&self) -> i32 {
        self.power
    }

    /// Derived magic point maximum: POW / 5.
    pub fn derived_max_magic_points(&self) -> i32 {
        self.power / 5
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: Uuid,

    pub session: Uuid,
    pub player: Option<Uuid>,

    pub name: String,
    pub occupation: String,

    pub is_active: bool,
    pub skills_locked: bool,

    pub characteristics: Json<Characteristics>,

    pub hit_points: i32,
    pub max_hit_points: i32,
    pub sanity: i32,
    pub max_sanity: i32,
    pub magic_points: i32,
    pub max_magic_points: i32,
    pub luck: i32,

    pub skills: Json<BTreeMap<String, i32>>,
    pub money: i64,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Character {
    /// Builds a fresh investigator. Max gauges are derived from the
    /// characteristics unless the caller supplies explicit values, current
    /// gauges start at max, and skills lock immediately after creation.
    pub fn new(
        session: Uuid,
        player: Option<Uuid>,
        name: &str,
        occupation: &str,
        characteristics: Characteristics,
        skills: BTreeMap<String, i32>,
        money: i64,
    ) -> Self {
        let now = get_current_timestamp();
        let max_hit_points = characteristics.derived_max_hit_points().max(1);
        let max_sanity = characteristics.derived_max_sanity().max(1);
        let max_magic_points = characteristics.derived_max_magic_points().max(0);
        let luck = characteristics.luck.clamp(0, 99);

        let skills = skills
            .into_iter()
            .map(|(name, pct)| (name, pct.clamp(0, 100)))
            .collect();

        Self {
            id: Uuid::new_v4(),
            session,
            player,
            name: name.trim().to_string(),
            occupation: occupation.trim().to_string(),
            is_active: true,
            skills_locked: true,
            characteristics: Json(characteristics),
            hit_points: max_hit_points,
            max_hit_points,
            sanity: max_sanity,
            max_sanity,
            magic_points: max_magic_points,
            max_magic_points,
            luck,
            skills: Json(skills),
            money,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn skill_value(&self, skill_name: &str) -> Option<i32> {
        self.skills.get(skill_name).copied()
    }
}

impl SqlxSchema for Character {
    type Id = Uuid;

    const TABLE_NAME: &'static str = "characters";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "session",
        "player",
        "name",
        "occupation",
        "is_active",
        "skills_locked",
        "characteristics",
        "hit_points",
        "max_hit_points",
        "sanity",
        "max_sanity",
        "magic_points",
        "max_magic_points",
        "luck",
        "skills",
        "money",
        "created_at",
        "updated_at",
    ];
    const CREATE_TABLE_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS "characters" (
            id UUID PRIMARY KEY,
            session UUID NOT NULL REFERENCES "game_sessions"(id) ON DELETE CASCADE,
            player UUID REFERENCES "users"(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            occupation TEXT NOT NULL,
            is_active BOOLEAN NOT NULL,
            skills_locked BOOLEAN NOT NULL,
            characteristics JSONB NOT NULL,
            hit_points INTEGER NOT NULL,
            max_hit_points INTEGER NOT NULL,
            sanity INTEGER NOT NULL,
            max_sanity INTEGER NOT NULL,
            magic_points INTEGER NOT NULL,
            max_magic_points INTEGER NOT NULL,
            luck INTEGER NOT NULL,
            skills JSONB NOT NULL,
            money BIGINT NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
    "#;
    const INDEXES_SQL: &'static [&'static str] = &[
        r#"CREATE INDEX IF NOT EXISTS idx_characters_session ON "characters" (session)"#,
        r#"CREATE INDEX IF NOT EXISTS idx_characters_player ON "characters" (player)"#,
    ];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }
}

impl SqlxCrud for Character {
    fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.id)
            .bind(self.session)
            .bind(self.player)
            .bind(self.name.clone())
            .bind(self.occupation.clone())
            .bind(self.is_active)
            .bind(self.skills_locked)
            .bind(self.characteristics.clone())
            .bind(self.hit_points)
            .bind(self.max_hit_points)
            .bind(self.sanity)
            .bind(self.max_sanity)
            .bind(self.magic_points)
            .bind(self.max_magic_points)
            .bind(self.luck)
            .bind(self.skills.clone())
            .bind(self.money)
            .bind(self.created_at)
            .bind(self.updated_at)
    }

    fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.session)
            .bind(self.player)
            .bind(self.name.clone())
            .bind(self.occupation.clone())
            .bind(self.is_active)
            .bind(self.skills_locked)
            .bind(self.characteristics.clone())
            .bind(self.hit_points)
            .bind(self.max_hit_points)
            .bind(self.sanity)
            .bind(self.max_sanity)
            .bind(self.magic_points)
            .bind(self.max_magic_points)
            .bind(self.luck)
            .bind(self.skills.clone())
            .bind(self.money)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.id)
    }
}

impl SqlxFilterQuery for Character {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_characteristics() -> Characteristics {
        Characteristics {
            strength: 60,
            constitution: 70,
            size: 55,
            dexterity: 50,
            appearance: 45,
            intelligence: 80,
            power: 65,
            education: 75,
            luck: 40,
        }
    }

    #[test]
    fn gauges_derive_from_characteristics() {
        let character = Character::new(
            Uuid::new_v4(),
            None,
            "Harvey Walters",
            "Journalist",
            sample_characteristics(),
            BTreeMap::new(),
            42,
        );

        assert_eq!(character.max_hit_points, 12); // (70 + 55) / 10
        assert_eq!(character.hit_points, 12);
        assert_eq!(character.max_sanity, 65);
        assert_eq!(character.max_magic_points, 13);
        assert_eq!(character.luck, 40);
        assert!(character.skills_locked);
        assert!(character.is_active);
    }

    #[test]
    fn skill_percentages_are_clamped_at_creation() {
        let mut skills = BTreeMap::new();
        skills.insert("Spot Hidden".to_string(), 130);
        skills.insert("Library Use".to_string(), -5);

        let character = Character::new(
            Uuid::new_v4(),
            None,
            "Amelia Webb",
            "Librarian",
            sample_characteristics(),
            skills,
            0,
        );

        assert_eq!(character.skill_value("Spot Hidden"), Some(100));
        assert_eq!(character.skill_value("Library Use"), Some(0));
    }
}
