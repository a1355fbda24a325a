mod postgres;

pub use postgres::PostgresClient;
