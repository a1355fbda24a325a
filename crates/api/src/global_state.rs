use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;

use keeper_clients::PostgresClient;
use keeper_common::ModuleClient;
use keeper_runtime::{BroadcastRegistry, CharacterMutator};

#[derive(Clone)]
pub struct GlobalState {
    pub db: PostgresClient,
    pub broadcast: Arc<BroadcastRegistry>,
    pub mutator: Arc<CharacterMutator>,
}

impl GlobalState {
    pub async fn new() -> Result<Self> {
        let db = PostgresClient::setup_connection().await;

        Ok(Self {
            db,
            broadcast: Arc::new(BroadcastRegistry::new()),
            mutator: Arc::new(CharacterMutator::new()),
        })
    }

    pub fn pool(&self) -> &PgPool {
        self.db.get_client()
    }
}
