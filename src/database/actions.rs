pub mod attributes;
pub mod recipe_books;
pub mod recipes;
pub mod users;

use std::{collections::HashMap, future::Future, time::Duration};

use log::{info, warn};
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    constants::DB_WAIT_PERIOD,
    error::{ApiError, FieldErrors, QueryError},
    schema::{Id, Link, LinkTable},
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Runs `probe` until it succeeds, sleeping `period` between attempts.
pub async fn wait_until_ready<T, E, F, Fut>(mut probe: F, period: Duration) -> T
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        match probe().await {
            Ok(value) => return value,
            Err(e) => {
                warn!(
                    "Database unavailable ({e}). Waiting {} seconds.",
                    period.as_secs_f32()
                );
                tokio::time::sleep(period).await;
            }
        }
    }
}

/// Blocks until the database accepts connections and returns a pool.
pub async fn wait_for_db(database_url: &str) -> Pool<Postgres> {
    info!("Waiting for database...");

    let pool = wait_until_ready(
        move || async move {
            PgPoolOptions::new()
                .connect(database_url)
                .await
                .map_err(QueryError::from)
        },
        Duration::from_secs(DB_WAIT_PERIOD),
    )
    .await;

    info!("Database available");
    pool
}

pub async fn migrate(pool: &Pool<Postgres>) -> Result<(), ApiError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| QueryError::from(sqlx::Error::from(e)))?;

    Ok(())
}

/// Field error for ids that don't resolve to a row, mirroring the
/// primary-key field messages clients already handle.
pub fn invalid_pk(field: &str, id: Id) -> ApiError {
    ApiError::Validation(FieldErrors::single(
        field,
        format!("Invalid pk \"{id}\" - object does not exist."),
    ))
}

/// Fails with a field error on the first id that has no row in
/// `link.member_table`. With `owner_id` only that user's rows count.
pub async fn ensure_members_exist(
    link: &LinkTable,
    field: &str,
    ids: &[Id],
    owner_id: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT id FROM {} WHERE id = ANY(", link.member_table));
    query_builder.push_bind(ids.to_vec());
    query_builder.push(")");

    if let Some(owner_id) = owner_id {
        query_builder.push(" AND user_id = ");
        query_builder.push_bind(owner_id);
    }

    let rows: Vec<(Id,)> = query_builder.build_query_as().fetch_all(pool).await?;

    match ids
        .iter()
        .find(|id| !rows.iter().any(|row| row.0 == **id))
    {
        Some(id) => Err(invalid_pk(field, *id)),
        None => Ok(()),
    }
}

/// Member ids per owner id. Owners without members are absent from the map.
pub async fn list_links(
    link: &LinkTable,
    owner_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<Id>>, ApiError> {
    if owner_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<Link> = sqlx::query_as(&format!(
        "SELECT {owner} AS owner_id, {member} AS member_id FROM {table} WHERE {owner} = ANY($1) ORDER BY {member}",
        owner = link.owner_column,
        member = link.member_column,
        table = link.table,
    ))
    .bind(owner_ids.to_vec())
    .fetch_all(pool)
    .await?;

    let mut hashmap: HashMap<Id, Vec<Id>> = HashMap::new();
    rows.into_iter()
        .for_each(|row| hashmap.entry(row.owner_id).or_default().push(row.member_id));

    Ok(hashmap)
}

/// Replaces every member of `owner_id` with `member_ids`. Duplicates collapse.
pub async fn replace_links(
    link: &LinkTable,
    owner_id: Id,
    member_ids: &[Id],
    conn: &mut PgConnection,
) -> Result<(), ApiError> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE {} = $1",
        link.table, link.owner_column
    ))
    .bind(owner_id)
    .execute(&mut *conn)
    .await?;

    if member_ids.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} ({}, {}) ",
        link.table, link.owner_column, link.member_column
    ));

    query_builder.push_values(member_ids.iter().take(65535 / 2), |mut b, member_id| {
        b.push_bind(owner_id).push_bind(*member_id);
    });
    query_builder.push(" ON CONFLICT DO NOTHING");

    query_builder.build().execute(&mut *conn).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[tokio::test]
    async fn wait_until_ready_retries_until_success() {
        let attempts = Cell::new(0);

        let value = wait_until_ready(
            || {
                attempts.set(attempts.get() + 1);
                let attempt = attempts.get();
                async move {
                    if attempt < 3 {
                        Err("connection refused")
                    } else {
                        Ok(attempt)
                    }
                }
            },
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(value, 3);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn invalid_pk_names_the_field() {
        match invalid_pk("tags", 42) {
            ApiError::Validation(errors) => assert_eq!(
                errors.get("tags").unwrap(),
                &vec!["Invalid pk \"42\" - object does not exist.".to_string()]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
