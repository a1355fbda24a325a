/// Initializes the application database pool and bootstraps the schema.
///
/// Single point of entry for connection setup: creates a process-wide pool
/// and, when asked, runs every registered model's DDL (enum types, table,
/// indexes) against it in declaration order.
///
/// # Generated function
/// - `async fn connect(drop_tables: bool, create_tables: bool) -> &'static PgPool`
#[macro_export]
macro_rules! init_databases {
    (
        default: [$($default_type:ty),* $(,)?]
    ) => {
        static POOL: tokio::sync::OnceCell<sqlx::PgPool> = tokio::sync::OnceCell::const_new();

        pub async fn connect(drop_tables: bool, create_tables: bool) -> &'static sqlx::PgPool {
            POOL.get_or_init(|| async {
                let database_url = std::env::var("DATABASE_URL")
                    .expect("DATABASE_URL environment variable not set");

                let pool = sqlx::PgPool::connect(&database_url).await
                    .expect("Failed to connect to database");

                if drop_tables {
                    $(
                        let drop_sql = format!(
                            "DROP TABLE IF EXISTS \"{}\" CASCADE",
                            <$default_type as $crate::SqlxSchema>::TABLE_NAME
                        );
                        sqlx::query(&drop_sql).execute(&pool).await
                            .unwrap_or_else(|e| {
                                tracing::warn!("Failed to drop table for '{}': {:?}", stringify!($default_type), e);
                                sqlx::postgres::PgQueryResult::default()
                            });
                    )*
                }

                if create_tables {
                    $(
                        for type_sql in <$default_type as $crate::SqlxSchema>::CREATE_TYPE_SQL {
                            sqlx::query(type_sql).execute(&pool).await
                                .unwrap_or_else(|e| panic!("Failed to create enum type for '{}'. Error: {:?}", stringify!($default_type), e));
                        }

                        let create_sql = <$default_type as $crate::SqlxSchema>::CREATE_TABLE_SQL;
                        sqlx::query(create_sql).execute(&pool).await
                            .unwrap_or_else(|e| panic!("Failed to create table for '{}'. Error: {:?}", stringify!($default_type), e));

                        for index_sql in <$default_type as $crate::SqlxSchema>::INDEXES_SQL {
                            sqlx::query(index_sql).execute(&pool).await
                                .unwrap_or_else(|e| panic!("Failed to create index for '{}'. Error: {:?}", stringify!($default_type), e));
                        }
                    )*
                }

                pool
            }).await
        }
    };
}
