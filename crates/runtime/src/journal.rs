use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use keeper_common::get_current_timestamp;
use keeper_database::{PgQueryAs, SqlxCrud, SqlxFilterQuery, SqlxSchema};

/// A narrative entry in a session's shared journal. Secret entries are
/// filtered out for everyone but the GM.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: Uuid,

    pub session: Uuid,
    pub author: Uuid,

    pub title: String,
    pub body: String,
    pub is_secret: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl JournalEntry {
    pub fn new(session: Uuid, author: Uuid, title: &str, body: &str, is_secret: bool) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            session,
            author,
            title: title.trim().to_string(),
            body: body.to_string(),
            is_secret,
            created_at: now,
            updated_at: now,
        }
    }
}

impl SqlxSchema for JournalEntry {
    type Id = Uuid;

    const TABLE_NAME: &'static str = "journal_entries";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "session",
        "author",
        "title",
        "body",
        "is_secret",
        "created_at",
        "updated_at",
    ];
    const CREATE_TABLE_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS "journal_entries" (
            id UUID PRIMARY KEY,
            session UUID NOT NULL REFERENCES "game_sessions"(id) ON DELETE CASCADE,
            author UUID NOT NULL REFERENCES "users"(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            is_secret BOOLEAN NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
    "#;
    const INDEXES_SQL: &'static [&'static str] =
        &[r#"CREATE INDEX IF NOT EXISTS idx_journal_entries_session ON "journal_entries" (session)"#];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }
}

impl SqlxCrud for JournalEntry {
    fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.id)
            .bind(self.session)
            .bind(self.author)
            .bind(self.title.clone())
            .bind(self.body.clone())
            .bind(self.is_secret)
            .bind(self.created_at)
            .bind(self.updated_at)
    }

    fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.session)
            .bind(self.author)
            .bind(self.title.clone())
            .bind(self.body.clone())
            .bind(self.is_secret)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.id)
    }
}

impl SqlxFilterQuery for JournalEntry {}
