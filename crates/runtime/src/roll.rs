use serde::{Deserialize, Serialize};
use sqlx::types::{Json, Uuid};
use strum_macros::{Display, EnumString};

use keeper_common::get_current_timestamp;
use keeper_database::{PgQueryAs, SqlxCrud, SqlxFilterQuery, SqlxSchema};

use crate::dice::RollOutput;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
)]
#[sqlx(type_name = "roll_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RollOutcome {
    CriticalSuccess,
    ExtremeSuccess,
    HardSuccess,
    Success,
    Failure,
    Fumble,
}

impl RollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RollOutcome::CriticalSuccess
                | RollOutcome::ExtremeSuccess
                | RollOutcome::HardSuccess
                | RollOutcome::Success
        )
    }
}

/// One dice roll, written once and never mutated. Display and audit only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RollHistory {
    pub id: Uuid,

    pub session: Uuid,
    pub character: Option<Uuid>,
    pub roller: Uuid,

    pub formula: String,
    pub total: i64,
    pub rolls: Json<Vec<i64>>,

    pub skill_name: Option<String>,
    pub skill_value: Option<i32>,
    pub outcome: Option<RollOutcome>,

    pub is_secret: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl RollHistory {
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        session: Uuid,
        character: Option<Uuid>,
        roller: Uuid,
        formula: &str,
        output: &RollOutput,
        skill: Option<(String, i32)>,
        outcome: Option<RollOutcome>,
        is_secret: bool,
    ) -> Self {
        let now = get_current_timestamp();
        let (skill_name, skill_value) = match skill {
            Some((name, value)) => (Some(name), Some(value)),
            None => (None, None),
        };
        Self {
            id: Uuid::new_v4(),
            session,
            character,
            roller,
            formula: formula.trim().to_string(),
            total: output.total,
            rolls: Json(output.rolls.clone()),
            skill_name,
            skill_value,
            outcome,
            is_secret,
            created_at: now,
            updated_at: now,
        }
    }
}

impl SqlxSchema for RollHistory {
    type Id = Uuid;

    const TABLE_NAME: &'static str = "roll_history";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "session",
        "character",
        "roller",
        "formula",
        "total",
        "rolls",
        "skill_name",
        "skill_value",
        "outcome",
        "is_secret",
        "created_at",
        "updated_at",
    ];
    const CREATE_TYPE_SQL: &'static [&'static str] = &[r#"
        DO $$ BEGIN
            CREATE TYPE roll_outcome AS ENUM (
                'critical_success', 'extreme_success', 'hard_success',
                'success', 'failure', 'fumble'
            );
        EXCEPTION WHEN duplicate_object THEN NULL; END $$;
    "#];
    const CREATE_TABLE_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS "roll_history" (
            id UUID PRIMARY KEY,
            session UUID NOT NULL REFERENCES "game_sessions"(id) ON DELETE CASCADE,
            "character" UUID REFERENCES "characters"(id) ON DELETE CASCADE,
            roller UUID NOT NULL REFERENCES "users"(id) ON DELETE CASCADE,
            formula TEXT NOT NULL,
            total BIGINT NOT NULL,
            rolls JSONB NOT NULL,
            skill_name TEXT,
            skill_value INTEGER,
            outcome roll_outcome,
            is_secret BOOLEAN NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
    "#;
    const INDEXES_SQL: &'static [&'static str] = &[
        r#"CREATE INDEX IF NOT EXISTS idx_roll_history_session ON "roll_history" (session)"#,
    ];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }
}

impl SqlxCrud for RollHistory {
    fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.id)
            .bind(self.session)
            .bind(self.character)
            .bind(self.roller)
            .bind(self.formula.clone())
            .bind(self.total)
            .bind(self.rolls.clone())
            .bind(self.skill_name.clone())
            .bind(self.skill_value)
            .bind(self.outcome)
            .bind(self.is_secret)
            .bind(self.created_at)
            .bind(self.updated_at)
    }

    fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.session)
            .bind(self.character)
            .bind(self.roller)
            .bind(self.formula.clone())
            .bind(self.total)
            .bind(self.rolls.clone())
            .bind(self.skill_name.clone())
            .bind(self.skill_value)
            .bind(self.outcome)
            .bind(self.is_secret)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.id)
    }
}

impl SqlxFilterQuery for RollHistory {}
