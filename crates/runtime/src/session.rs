use rand::random_range;
use serde::{Deserialize, Serialize};
use sqlx::types::{Json, Uuid};
use strum_macros::{Display, EnumString};

use keeper_common::get_current_timestamp;
use keeper_database::{PgQueryAs, SqlxCrud, SqlxFilterQuery, SqlxSchema};

/// Join codes avoid lookalike characters so they survive being read aloud
/// at the table.
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const JOIN_CODE_LEN: usize = 6;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString, Default,
)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Preparation,
    Active,
    Ended,
}

/// What the table projector is currently showing. Stored as one JSONB blob;
/// the server only relays it, clients decide how to render it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionState {
    pub scene: Option<String>,
    pub backdrop_url: Option<String>,
    pub handout: Option<String>,
    #[serde(default)]
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub id: Uuid,

    pub name: String,
    pub description: String,

    pub gm: Uuid,
    pub join_code: String,
    pub status: SessionStatus,
    pub projection: Json<ProjectionState>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl GameSession {
    pub fn new(name: &str, description: &str, gm: Uuid) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            gm,
            join_code: Self::generate_join_code(),
            status: SessionStatus::Preparation,
            projection: Json(ProjectionState::default()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn generate_join_code() -> String {
        (0..JOIN_CODE_LEN)
            .map(|_| JOIN_CODE_ALPHABET[random_range(0..JOIN_CODE_ALPHABET.len())] as char)
            .collect()
    }
}

impl SqlxSchema for GameSession {
    type Id = Uuid;

    const TABLE_NAME: &'static str = "game_sessions";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "gm",
        "join_code",
        "status",
        "projection",
        "created_at",
        "updated_at",
    ];
    const CREATE_TYPE_SQL: &'static [&'static str] = &[r#"
        DO $$ BEGIN
            CREATE TYPE session_status AS ENUM ('preparation', 'active', 'ended');
        EXCEPTION WHEN duplicate_object THEN NULL; END $$;
    "#];
    const CREATE_TABLE_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS "game_sessions" (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            gm UUID NOT NULL REFERENCES "users"(id) ON DELETE CASCADE,
            join_code TEXT NOT NULL UNIQUE,
            status session_status NOT NULL,
            projection JSONB NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
    "#;
    const INDEXES_SQL: &'static [&'static str] = &[
        r#"CREATE INDEX IF NOT EXISTS idx_game_sessions_gm ON "game_sessions" (gm)"#,
        r#"CREATE INDEX IF NOT EXISTS idx_game_sessions_join_code ON "game_sessions" (join_code)"#,
    ];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }
}

impl SqlxCrud for GameSession {
    fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.id)
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.gm)
            .bind(self.join_code.clone())
            .bind(self.status)
            .bind(self.projection.clone())
            .bind(self.created_at)
            .bind(self.updated_at)
    }

    fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.gm)
            .bind(self.join_code.clone())
            .bind(self.status)
            .bind(self.projection.clone())
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.id)
    }
}

impl SqlxFilterQuery for GameSession {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_code_shape() {
        for _ in 0..50 {
            let code = GameSession::generate_join_code();
            assert_eq!(code.len(), JOIN_CODE_LEN);
            assert!(code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)));
        }
    }
}
