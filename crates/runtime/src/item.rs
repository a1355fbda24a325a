use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use keeper_common::get_current_timestamp;
use keeper_database::{PgQueryAs, SqlxCrud, SqlxFilterQuery, SqlxSchema};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,

    pub character: Uuid,

    pub name: String,
    pub description: String,
    pub quantity: i32,

    pub created_at: i64,
    pub updated_at: i64,
}

impl InventoryItem {
    pub fn new(character: Uuid, name: &str, description: &str, quantity: i32) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            character,
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            quantity: quantity.max(0),
            created_at: now,
            updated_at: now,
        }
    }
}

impl SqlxSchema for InventoryItem {
    type Id = Uuid;

    const TABLE_NAME: &'static str = "inventory_items";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "character",
        "name",
        "description",
        "quantity",
        "created_at",
        "updated_at",
    ];
    const CREATE_TABLE_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS "inventory_items" (
            id UUID PRIMARY KEY,
            "character" UUID NOT NULL REFERENCES "characters"(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        )
    "#;
    const INDEXES_SQL: &'static [&'static str] = &[
        r#"CREATE INDEX IF NOT EXISTS idx_inventory_items_character ON "inventory_items" ("character")"#,
    ];

    fn get_id_value(&self) -> Self::Id {
        self.id
    }
}

impl SqlxCrud for InventoryItem {
    fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.id)
            .bind(self.character)
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.quantity)
            .bind(self.created_at)
            .bind(self.updated_at)
    }

    fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(self.character)
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.quantity)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.id)
    }
}

impl SqlxFilterQuery for InventoryItem {}
