mod postgres_connect;
mod sqlx_postgres;

pub use sqlx_postgres::*;
