use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use keeper_common::get_current_timestamp;
use keeper_database::{PgQueryAs, SqlxCrud, SqlxFilterQuery, SqlxSchema};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: Uuid,

    pub session: Uuid,

    pub title: String,
    pub summary: String,
    pub ordinal: i32,
    pub is_current: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Chapter {
    pub fn new(session: Uuid, title: &str, summary: &str, ordinal: i32) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            session,
            title: title.trim().to_string(),
            summary: summary.trim().to_string(),
            ordinal,
            is_current: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl SqlxSchema for Chapter {
    type Id = Uuid;

    const TABLE_NAME: &'static str = "chapters";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "session",
        "title",
        "summary",
        "ordinal",
        "is_current",
        "created_at",
        "updated_at",
    ];
    const CREATE_TABLE_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS "chapters" (
            id UUID PRIMARY KEY,
            session UUID NOT NULL REFERENCES "game_sessions"(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            summary TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            is_current BOOLEAN NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
    "#;
    const INDEXES_SQL: &'static [&'static str] =
        &[r#"CREATE INDEX IF NOT EXISTS idx_chapters_session ON "chapters" (session)"#];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }
}

impl SqlxCrud for Chapter {
    fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.id)
            .bind(self.session)
            .bind(self.title.clone())
            .bind(self.summary.clone())
            .bind(self.ordinal)
            .bind(self.is_current)
            .bind(self.created_at)
            .bind(self.updated_at)
    }

    fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.session)
            .bind(self.title.clone())
            .bind(self.summary.clone())
            .bind(self.ordinal)
            .bind(self.is_current)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.id)
    }
}

impl SqlxFilterQuery for Chapter {}
