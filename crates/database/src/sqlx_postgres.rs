use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::QueryAs;
use sqlx::{Error as SqlxError, Executor, FromRow, Postgres};

/// Shorthand for the typed-query shape `bind_insert`/`bind_update` thread.
pub type PgQueryAs<'q, T> = QueryAs<'q, Postgres, T, PgArguments>;

/// Schema description for a persisted object. Implementations list their
/// table, columns, and the DDL the connection bootstrap executes.
pub trait SqlxSchema:
    Send + Sync + Unpin + Clone + std::fmt::Debug + for<'r> FromRow<'r, PgRow>
{
    /// The type of the primary key for this database object.
    type Id: Send + Sync + for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Clone;

    const TABLE_NAME: &'static str;
    const ID_COLUMN_NAME: &'static str = "id";
    /// Every column, in the order `bind_insert` binds them. Must include
    /// the id column first.
    const COLUMNS: &'static [&'static str];
    /// `CREATE TYPE` statements this table relies on, wrapped so they are
    /// idempotent. Executed before `CREATE_TABLE_SQL`.
    const CREATE_TYPE_SQL: &'static [&'static str] = &[];
    const CREATE_TABLE_SQL: &'static str;
    const INDEXES_SQL: &'static [&'static str] = &[];

    fn table_name() -> &'static str { Self::TABLE_NAME }
    fn id_column_name() -> &'static str { Self::ID_COLUMN_NAME }
    fn columns() -> &'static [&'static str] { Self::COLUMNS }

    /// Retrieves the value of the primary key for an instance of the object.
    fn get_id_value(&self) -> Self::Id;
}

/// CRUD (Create, Read by id, Update, Delete) operations. The SQL is
/// assembled from `SqlxSchema::COLUMNS`; implementations only supply the
/// bind order.
#[async_trait::async_trait]
pub trait SqlxCrud: SqlxSchema + Sized {
    /// Binds the struct fields to an insert query, in `COLUMNS` order.
    fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self>;

    /// Binds the struct fields to an update query: every non-id column in
    /// `COLUMNS` order, then the id.
    fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self>;

    fn insert_sql() -> String {
        let placeholders = (1..=Self::COLUMNS.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let columns = Self::COLUMNS
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *",
            Self::TABLE_NAME,
            columns,
            placeholders
        )
    }

    fn update_sql() -> String {
        let assignments = Self::COLUMNS
            .iter()
            .filter(|c| **c != Self::ID_COLUMN_NAME)
            .enumerate()
            .map(|(i, c)| format!("\"{}\" = ${}", c, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE \"{}\" SET {} WHERE {} = ${} RETURNING *",
            Self::TABLE_NAME,
            assignments,
            Self::ID_COLUMN_NAME,
            Self::COLUMNS.len()
        )
    }

    /// Creates a new record in the database.
    async fn create<'e, E>(self, executor: E) -> Result<Self, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        let sql = Self::insert_sql();
        let query = sqlx::query_as::<Postgres, Self>(&sql);
        self.bind_insert(query).fetch_one(executor).await
    }

    /// Updates an existing record (identified by its primary key).
    async fn update<'e, E>(self, executor: E) -> Result<Self, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        let sql = Self::update_sql();
        let query = sqlx::query_as::<Postgres, Self>(&sql);
        self.bind_update(query).fetch_one(executor).await
    }

    /// Deletes a record by its primary key. Returns affected row count.
    async fn delete<'e, E>(self, executor: E) -> Result<u64, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE {} = $1",
            Self::TABLE_NAME,
            Self::ID_COLUMN_NAME
        );
        let result = sqlx::query(&sql)
            .bind(self.get_id_value())
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Specifies the direction for ordering query results.
#[derive(Debug, Clone, Copy)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// A trait to allow boxing of different types that can be encoded as sqlx
/// arguments; lets `QueryCriteria` hold heterogeneous condition values.
pub trait AsSqlxArg: Send + Sync {
    fn add_to_args(&self, args: &mut PgArguments) -> Result<(), SqlxError>;
}

impl<T> AsSqlxArg for T
where
    T: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
{
    fn add_to_args(&self, args: &mut PgArguments) -> Result<(), SqlxError> {
        use sqlx::Arguments;
        args.add(self.clone()).map_err(SqlxError::Encode)
    }
}

/// Quotes `column` when it is a plain identifier; computed expressions
/// (e.g. `kind->>'auto'`) pass through untouched.
fn quoted(column: &str) -> String {
    if column
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        format!("\"{column}\"")
    } else {
        column.to_string()
    }
}

/// Represents a single filter condition for a database query.
pub struct FilterCondition {
    pub column: &'static str,
    pub operator: &'static str,
    /// Holds the value for the condition's placeholder, if any.
    pub value: Option<Box<dyn AsSqlxArg>>,
}

/// The complete criteria for a filtered query: conditions, ordering, and
/// paging. `build_where` renders the SQL tail and the bound arguments.
#[derive(Default)]
pub struct QueryCriteria {
    pub conditions: Vec<FilterCondition>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order_by: Vec<(&'static str, OrderDirection)>,
}

impl QueryCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter condition that may or may not have a value
    /// (`IS NULL`-style operators take none).
    pub fn add_filter<V>(mut self, column: &'static str, operator: &'static str, value: Option<V>) -> Self
    where
        V: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
    {
        self.conditions.push(FilterCondition {
            column,
            operator,
            value: value.map(|v| Box::new(v) as Box<dyn AsSqlxArg>),
        });
        self
    }

    /// A convenience method for `add_filter` that requires a value.
    pub fn add_valued_filter<V>(self, column: &'static str, operator: &'static str, value: V) -> Self
    where
        V: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
    {
        self.add_filter(column, operator, Some(value))
    }

    pub fn limit(mut self, limit_val: i64) -> Self {
        self.limit = Some(limit_val);
        self
    }

    pub fn offset(mut self, offset_val: i64) -> Self {
        self.offset = Some(offset_val);
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: OrderDirection) -> Self {
        self.order_by.push((column, direction));
        self
    }

    /// Renders `WHERE ... ORDER BY ... LIMIT ... OFFSET ...` plus the bound
    /// arguments. The WHERE clause is omitted when there are no conditions.
    pub fn build_where(&self) -> Result<(String, PgArguments), SqlxError> {
        let mut sql = String::new();
        let mut args = PgArguments::default();
        let mut placeholder = 0usize;

        if !self.conditions.is_empty() {
            let mut clauses = Vec::with_capacity(self.conditions.len());
            for condition in &self.conditions {
                match &condition.value {
                    Some(value) => {
                        placeholder += 1;
                        value.add_to_args(&mut args)?;
                        clauses.push(format!(
                            "{} {} ${}",
                            quoted(condition.column),
                            condition.operator,
                            placeholder
                        ));
                    }
                    None => clauses.push(format!(
                        "{} {}",
                        quoted(condition.column),
                        condition.operator
                    )),
                }
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|(col, dir)| format!("{} {}", quoted(col), dir.as_sql()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok((sql, args))
    }
}

/// Finding and bulk-deleting records based on dynamic filter criteria.
#[async_trait::async_trait]
pub trait SqlxFilterQuery: SqlxSchema + Sized {
    async fn find_by_criteria<'e, E>(
        criteria: QueryCriteria,
        executor: E,
    ) -> Result<Vec<Self>, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        let (tail, args) = criteria.build_where()?;
        let sql = format!("SELECT * FROM \"{}\"{}", Self::TABLE_NAME, tail);
        sqlx::query_as_with::<Postgres, Self, _>(&sql, args)
            .fetch_all(executor)
            .await
    }

    /// Finds a single optional record. If multiple records match, takes the
    /// first one returned by `find_by_criteria`.
    async fn find_one_by_criteria<'e, E>(
        mut criteria: QueryCriteria,
        executor: E,
    ) -> Result<Option<Self>, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        if criteria.limit.is_none() {
            criteria = criteria.limit(1);
        };
        let mut results = Self::find_by_criteria(criteria, executor).await?;
        Ok(results.pop())
    }

    async fn count_by_criteria<'e, E>(
        criteria: QueryCriteria,
        executor: E,
    ) -> Result<i64, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        let (tail, args) = criteria.build_where()?;
        let sql = format!("SELECT COUNT(*) FROM \"{}\"{}", Self::TABLE_NAME, tail);
        sqlx::query_scalar_with::<Postgres, i64, _>(&sql, args)
            .fetch_one(executor)
            .await
    }

    async fn delete_by_criteria<'e, E>(
        criteria: QueryCriteria,
        executor: E,
    ) -> Result<u64, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send,
    {
        let (tail, args) = criteria.build_where()?;
        let sql = format!("DELETE FROM \"{}\"{}", Self::TABLE_NAME, tail);
        let result = sqlx::query_with(&sql, args).execute(executor).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Uuid;

    #[derive(Debug, Clone, sqlx::FromRow)]
    struct Sample {
        id: Uuid,
        name: String,
        count: i64,
    }

    impl SqlxSchema for Sample {
        type Id = Uuid;

        const TABLE_NAME: &'static str = "samples";
        const COLUMNS: &'static [&'static str] = &["id", "name", "count"];
        const CREATE_TABLE_SQL: &'static str = "";

        fn get_id_value(&self) -> Self::Id {
            self.id
        }
    }

    impl SqlxCrud for Sample {
        fn bind_insert<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
            query.bind(self.id).bind(self.name.clone()).bind(self.count)
        }

        fn bind_update<'q>(&self, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
            query.bind(self.name.clone()).bind(self.count).bind(self.id)
        }
    }

    #[test]
    fn insert_sql_lists_every_column() {
        assert_eq!(
            Sample::insert_sql(),
            "INSERT INTO \"samples\" (\"id\", \"name\", \"count\") VALUES ($1, $2, $3) RETURNING *"
        );
    }

    #[test]
    fn update_sql_assigns_non_id_columns_and_filters_by_id() {
        assert_eq!(
            Sample::update_sql(),
            "UPDATE \"samples\" SET \"name\" = $1, \"count\" = $2 WHERE id = $3 RETURNING *"
        );
    }

    #[test]
    fn build_where_renders_conditions_in_order() {
        let (sql, _args) = QueryCriteria::new()
            .add_valued_filter("name", "=", "harvey".to_string())
            .add_valued_filter("count", ">", 3i64)
            .order_by("count", OrderDirection::Desc)
            .limit(10)
            .offset(5)
            .build_where()
            .unwrap();
        assert_eq!(
            sql,
            " WHERE \"name\" = $1 AND \"count\" > $2 ORDER BY \"count\" DESC LIMIT 10 OFFSET 5"
        );
    }

    #[test]
    fn build_where_is_empty_without_criteria() {
        let (sql, _args) = QueryCriteria::new().build_where().unwrap();
        assert!(sql.is_empty());
    }

    #[test]
    fn computed_column_expressions_are_not_quoted() {
        let (sql, _args) = QueryCriteria::new()
            .add_valued_filter("kind->>'auto'", "=", "true".to_string())
            .build_where()
            .unwrap();
        assert_eq!(sql, " WHERE kind->>'auto' = $1");
    }
}
