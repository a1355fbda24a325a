use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use strum_macros::{Display, EnumString};

use keeper_common::get_current_timestamp;
use keeper_database::{PgQueryAs, SqlxCrud, SqlxFilterQuery, SqlxSchema};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserRole {
    Admin,
    Keeper,
    #[default]
    Player,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,

    pub handle: String,
    pub display_name: String,
    pub role: UserRole,

    pub last_active: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(handle: &str, display_name: &str, role: UserRole) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            handle: handle.trim().to_lowercase(),
            display_name: display_name.trim().to_string(),
            role,
            last_active: now,
            created_at: now,
            updated_at: now,
        }
    }
}

impl SqlxSchema for User {
    type Id = Uuid;

    const TABLE_NAME: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "handle",
        "display_name",
        "role",
        "last_active",
        "created_at",
        "updated_at",
    ];
    const CREATE_TYPE_SQL: &'static [&'static str] = &[r#"
        DO $$ BEGIN
            CREATE TYPE user_role AS ENUM ('admin', 'keeper', 'player');
        EXCEPTION WHEN duplicate_object THEN NULL; END $$;
    "#];
    const CREATE_TABLE_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS "users" (
            id UUID PRIMARY KEY,
            handle TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            role user_role NOT NULL,
            last_active BIGINT NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
    "#;

    fn get_id_value(&self) -> Self::Id {
        self.id
    }
}

impl SqlxCrud for User {
    fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.id)
            .bind(self.handle.clone())
            .bind(self.display_name.clone())
            .bind(self.role)
            .bind(self.last_active)
            .bind(self.created_at)
            .bind(self.updated_at)
    }

    fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.handle.clone())
            .bind(self.display_name.clone())
            .bind(self.role)
            .bind(self.last_active)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.id)
    }
}

impl SqlxFilterQuery for User {}
