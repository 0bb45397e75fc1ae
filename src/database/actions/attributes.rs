use std::collections::HashMap;

use crate::{
    actions::list_links,
    error::ApiError,
    schema::{Attribute, Id},
};

use sqlx::{Pool, Postgres, QueryBuilder};

/// Rows of `T` owned by `user_id`, by name descending. With `assigned_only`
/// only rows attached to at least one recipe are kept, each once.
pub async fn list_attributes<T: Attribute>(
    user_id: Id,
    assigned_only: bool,
    pool: &Pool<Postgres>,
) -> Result<Vec<T>, ApiError> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT DISTINCT a.* FROM {} a WHERE a.user_id = ", T::TABLE));
    query_builder.push_bind(user_id);

    if assigned_only {
        query_builder.push(format!(
            " AND EXISTS (SELECT 1 FROM {} l WHERE l.{} = a.id)",
            T::LINK.table,
            T::LINK.member_column
        ));
    }

    query_builder.push(" ORDER BY a.name DESC, a.id DESC");

    let rows: Vec<T> = query_builder.build_query_as().fetch_all(pool).await?;

    Ok(rows)
}

pub async fn create_attribute<T: Attribute>(
    user_id: Id,
    name: &str,
    pool: &Pool<Postgres>,
) -> Result<T, ApiError> {
    let row: T = sqlx::query_as(&format!(
        "INSERT INTO {} (name, user_id) VALUES ($1, $2) RETURNING *",
        T::TABLE
    ))
    .bind(name)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Attributes of every recipe in `recipe_ids`, keyed by recipe id.
pub async fn list_recipe_attributes<T: Attribute>(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<T>>, ApiError> {
    let links = list_links(&T::LINK, recipe_ids, pool).await?;

    let mut member_ids: Vec<Id> = links.values().flatten().copied().collect();
    member_ids.sort_unstable();
    member_ids.dedup();

    if member_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<T> = sqlx::query_as(&format!("SELECT * FROM {} WHERE id = ANY($1)", T::TABLE))
        .bind(member_ids)
        .fetch_all(pool)
        .await?;

    Ok(links
        .into_iter()
        .map(|(recipe_id, ids)| {
            let attributes = ids
                .iter()
                .filter_map(|id| rows.iter().find(|row| row.id() == *id).cloned())
                .collect();
            (recipe_id, attributes)
        })
        .collect())
}
