use std::collections::BTreeMap;

use sqlx::types::Uuid;
use sqlx::PgPool;

use keeper_database::{QueryCriteria, SqlxCrud, SqlxFilterQuery, SqlxSchema};
use keeper_runtime::{
    ActiveEffect, BroadcastRegistry, Character, Characteristics, CharacterMutator, EventKind,
    GameSession, GaugeField, User, UserRole,
};

/// These tests exercise the mutator against a live Postgres and are skipped
/// when DATABASE_URL is not configured.
async fn test_pool() -> Option<PgPool> {
    dotenv::dotenv().ok();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping: DATABASE_URL not set");
        return None;
    };
    let pool = PgPool::connect(&url).await.expect("connect to test database");

    for sql in User::CREATE_TYPE_SQL
        .iter()
        .chain(GameSession::CREATE_TYPE_SQL)
        .chain(keeper_runtime::SanityCondition::CREATE_TYPE_SQL)
    {
        sqlx::query(sql).execute(&pool).await.expect("create enum type");
    }
    for sql in [
        User::CREATE_TABLE_SQL,
        GameSession::CREATE_TABLE_SQL,
        Character::CREATE_TABLE_SQL,
        ActiveEffect::CREATE_TABLE_SQL,
        keeper_runtime::SanityCondition::CREATE_TABLE_SQL,
    ] {
        sqlx::query(sql).execute(&pool).await.expect("create table");
    }

    Some(pool)
}

async fn seed_character(pool: &PgPool) -> Character {
    let gm = User::new(&format!("gm-{}", Uuid::new_v4()), "The Keeper", UserRole::Keeper)
        .create(pool)
        .await
        .expect("create gm");
    let session = GameSession::new("The Haunting", "", gm.id)
        .create(pool)
        .await
        .expect("create session");

    let mut character = Character::new(
        session.id,
        None,
        "Walter Corbitt",
        "Recluse",
        Characteristics {
            strength: 50,
            constitution: 100,
            size: 100,
            dexterity: 50,
            appearance: 50,
            intelligence: 50,
            power: 50,
            education: 50,
            luck: 50,
        },
        BTreeMap::new(),
        0,
    );
    character.hit_points = 20;
    character.max_hit_points = 20;
    character.sanity = 50;
    character.max_sanity = 50;
    character.create(pool).await.expect("create character")
}

#[tokio::test]
async fn lethal_damage_clamps_derives_and_broadcasts() {
    let Some(pool) = test_pool().await else { return };
    let registry = BroadcastRegistry::new();
    let mutator = CharacterMutator::new();

    let character = seed_character(&pool).await;
    let mut rx = registry.subscribe(character.session, Uuid::new_v4()).await;

    // GM applies a damage effect of 25 against 20/20 HP.
    let outcome = mutator
        .apply_delta(
            &pool,
            &registry,
            character.id,
            GaugeField::HitPoints,
            -25,
            None,
        )
        .await
        .expect("apply delta");

    assert_eq!(outcome.character.hit_points, 0);
    assert!(outcome.conditions.iter().any(|c| c.name == "Dead"));

    let debuffs = ActiveEffect::find_by_criteria(
        QueryCriteria::new().add_valued_filter("character", "=", character.id),
        &pool,
    )
    .await
    .expect("list effects");
    assert!(debuffs.iter().any(|e| e.name == "Dead" && e.is_automatic()));

    let event = rx.try_recv().expect("character_updated must be broadcast");
    assert_eq!(event.kind, EventKind::CharacterUpdated);
}

#[tokio::test]
async fn zero_delta_still_rederives_status() {
    let Some(pool) = test_pool().await else { return };
    let registry = BroadcastRegistry::new();
    let mutator = CharacterMutator::new();

    let character = seed_character(&pool).await;
    let outcome = mutator
        .apply_delta(
            &pool,
            &registry,
            character.id,
            GaugeField::HitPoints,
            0,
            None,
        )
        .await
        .expect("apply delta");

    assert_eq!(outcome.character.hit_points, 20);
    assert!(outcome.conditions.is_empty());
}

#[tokio::test]
async fn large_sanity_loss_inflicts_a_bout_of_madness() {
    let Some(pool) = test_pool().await else { return };
    let registry = BroadcastRegistry::new();
    let mutator = CharacterMutator::new();

    let character = seed_character(&pool).await;
    let outcome = mutator
        .apply_delta(&pool, &registry, character.id, GaugeField::Sanity, -8, None)
        .await
        .expect("apply delta");

    assert_eq!(outcome.character.sanity, 42);
    let bout = outcome.bout.expect("a loss of 8 must trigger a bout");
    assert!(bout.is_active);

    // A small follow-up loss must not add another bout.
    let outcome = mutator
        .apply_delta(&pool, &registry, character.id, GaugeField::Sanity, -2, None)
        .await
        .expect("apply delta");
    assert!(outcome.bout.is_none());
}
