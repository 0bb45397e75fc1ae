use crate::{
    actions::{ensure_members_exist, replace_links},
    error::ApiError,
    schema::{Id, LinkTable, Recipe, RECIPE_INGREDIENTS, RECIPE_TAGS},
};

use log::info;
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, QueryBuilder};

/// Id lists from the `tags` / `ingredients` query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<Id>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<Id>,
    pub ingredients: Vec<Id>,
}

/// Column updates; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<Id>>,
}

impl From<NewRecipe> for RecipeChanges {
    fn from(recipe: NewRecipe) -> Self {
        Self {
            title: Some(recipe.title),
            time_minutes: Some(recipe.time_minutes),
            price: Some(recipe.price),
            link: Some(recipe.link),
            tags: Some(recipe.tags),
            ingredients: Some(recipe.ingredients),
        }
    }
}

fn push_member_filter(query_builder: &mut QueryBuilder<Postgres>, link: &LinkTable, ids: &[Id]) {
    query_builder.push(format!(
        " AND EXISTS (SELECT 1 FROM {} l WHERE l.{} = r.id AND l.{} = ANY(",
        link.table, link.owner_column, link.member_column
    ));
    query_builder.push_bind(ids.to_vec());
    query_builder.push("))");
}

/// Recipes of `user_id`, newest first. Each filter keeps recipes linked to
/// any of its ids; both filters must hold when both are given.
pub async fn list_recipes(
    user_id: Id,
    filter: &RecipeFilter,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ApiError> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.* FROM recipes r WHERE r.user_id = ");
    query_builder.push_bind(user_id);

    if let Some(tags) = &filter.tags {
        push_member_filter(&mut query_builder, &RECIPE_TAGS, tags);
    }
    if let Some(ingredients) = &filter.ingredients {
        push_member_filter(&mut query_builder, &RECIPE_INGREDIENTS, ingredients);
    }

    query_builder.push(" ORDER BY r.id DESC");

    let rows: Vec<Recipe> = query_builder.build_query_as().fetch_all(pool).await?;

    Ok(rows)
}

/// Recipes of `user_id` with the given ids, in id order.
pub async fn list_recipes_by_id(
    user_id: Id,
    ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ApiError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let rows: Vec<Recipe> =
        sqlx::query_as("SELECT * FROM recipes WHERE id = ANY($1) AND user_id = $2 ORDER BY id")
            .bind(ids.to_vec())
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    Ok(rows)
}

pub async fn get_recipe(
    user_id: Id,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Like [`get_recipe`] but a foreign or missing id is an error.
pub async fn get_recipe_mut(
    user_id: Id,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    get_recipe(user_id, id, pool).await?.ok_or(ApiError::NotFound)
}

async fn ensure_attributes_exist(
    tags: Option<&[Id]>,
    ingredients: Option<&[Id]>,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    if let Some(tags) = tags {
        ensure_members_exist(&RECIPE_TAGS, "tags", tags, None, pool).await?;
    }
    if let Some(ingredients) = ingredients {
        ensure_members_exist(&RECIPE_INGREDIENTS, "ingredients", ingredients, None, pool)
            .await?;
    }

    Ok(())
}

pub async fn create_recipe(
    user_id: Id,
    recipe: NewRecipe,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    ensure_attributes_exist(
        Some(recipe.tags.as_slice()),
        Some(recipe.ingredients.as_slice()),
        pool,
    )
    .await?;

    let mut tr = pool.begin().await?;

    let row: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (user_id, title, time_minutes, price, link)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(user_id)
    .bind(recipe.title)
    .bind(recipe.time_minutes)
    .bind(recipe.price)
    .bind(recipe.link)
    .fetch_one(&mut *tr)
    .await?;

    replace_links(&RECIPE_TAGS, row.id, &recipe.tags, &mut *tr).await?;
    replace_links(&RECIPE_INGREDIENTS, row.id, &recipe.ingredients, &mut *tr).await?;

    tr.commit().await?;

    info!("User {user_id} created recipe {}", row.id);

    Ok(row)
}

pub async fn update_recipe(
    id: Id,
    changes: RecipeChanges,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    ensure_attributes_exist(
        changes.tags.as_deref(),
        changes.ingredients.as_deref(),
        pool,
    )
    .await?;

    let mut tr = pool.begin().await?;

    let row: Recipe = sqlx::query_as(
        "
        UPDATE recipes SET
        title = COALESCE($1, title),
        time_minutes = COALESCE($2, time_minutes),
        price = COALESCE($3, price),
        link = COALESCE($4, link)
        WHERE id = $5
        RETURNING *
    ",
    )
    .bind(changes.title)
    .bind(changes.time_minutes)
    .bind(changes.price)
    .bind(changes.link)
    .bind(id)
    .fetch_one(&mut *tr)
    .await?;

    if let Some(tags) = &changes.tags {
        replace_links(&RECIPE_TAGS, id, tags, &mut *tr).await?;
    }
    if let Some(ingredients) = &changes.ingredients {
        replace_links(&RECIPE_INGREDIENTS, id, ingredients, &mut *tr).await?;
    }

    tr.commit().await?;

    Ok(row)
}

pub async fn set_recipe_image(
    id: Id,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let row: Recipe = sqlx::query_as("UPDATE recipes SET image = $1 WHERE id = $2 RETURNING *")
        .bind(image)
        .bind(id)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_recipe_becomes_full_replacement() {
        let changes = RecipeChanges::from(NewRecipe {
            title: "Spaghetti carbonara".to_string(),
            time_minutes: 25,
            price: Decimal::new(500, 2),
            link: String::new(),
            tags: vec![],
            ingredients: vec![3],
        });

        assert_eq!(changes.link, Some(String::new()));
        assert_eq!(changes.tags, Some(vec![]));
        assert_eq!(changes.ingredients, Some(vec![3]));
    }

    #[test]
    fn member_filter_binds_id_list() {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.* FROM recipes r WHERE r.user_id = ");
        query_builder.push_bind(1);
        push_member_filter(&mut query_builder, &RECIPE_TAGS, &[1, 2]);

        assert_eq!(
            query_builder.sql(),
            "SELECT r.* FROM recipes r WHERE r.user_id = $1 AND EXISTS (SELECT 1 FROM recipe_tags l WHERE l.recipe_id = r.id AND l.tag_id = ANY($2))"
        );
    }
}
