use keeper_common::define_module_client;
use keeper_database::init_databases;
use sqlx::PgPool;

init_databases!(
    default: [
        keeper_runtime::User,
        keeper_runtime::GameSession,
        keeper_runtime::Chapter,
        keeper_runtime::JournalEntry,
        keeper_runtime::Character,
        keeper_runtime::InventoryItem,
        keeper_runtime::ActiveEffect,
        keeper_runtime::SanityCondition,
        keeper_runtime::RollHistory,
    ]
);

define_module_client! {
    (struct PostgresClient, "postgres")
    client_type: &'static PgPool,
    env: ["DATABASE_URL"],
    setup: async {
        connect(false, true).await
    }
}
