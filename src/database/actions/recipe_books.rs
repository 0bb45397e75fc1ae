use crate::{
    actions::{ensure_members_exist, replace_links},
    error::ApiError,
    schema::{Id, RecipeBook, RECIPE_BOOK_RECIPES},
};

use log::info;
use sqlx::{Pool, Postgres};

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipeBook {
    pub title: String,
    pub recipes: Vec<Id>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeBookChanges {
    pub title: Option<String>,
    pub recipes: Option<Vec<Id>>,
}

impl From<NewRecipeBook> for RecipeBookChanges {
    fn from(book: NewRecipeBook) -> Self {
        Self {
            title: Some(book.title),
            recipes: Some(book.recipes),
        }
    }
}

pub async fn list_recipe_books(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeBook>, ApiError> {
    let rows: Vec<RecipeBook> =
        sqlx::query_as("SELECT * FROM recipe_books WHERE user_id = $1 ORDER BY id DESC")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    Ok(rows)
}

pub async fn get_recipe_book_mut(
    user_id: Id,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeBook, ApiError> {
    let row: Option<RecipeBook> =
        sqlx::query_as("SELECT * FROM recipe_books WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    row.ok_or(ApiError::NotFound)
}

pub async fn create_recipe_book(
    user_id: Id,
    book: NewRecipeBook,
    pool: &Pool<Postgres>,
) -> Result<RecipeBook, ApiError> {
    ensure_members_exist(
        &RECIPE_BOOK_RECIPES,
        "recipes",
        &book.recipes,
        Some(user_id),
        pool,
    )
    .await?;

    let mut tr = pool.begin().await?;

    let row: RecipeBook =
        sqlx::query_as("INSERT INTO recipe_books (user_id, title) VALUES ($1, $2) RETURNING *")
            .bind(user_id)
            .bind(book.title)
            .fetch_one(&mut *tr)
            .await?;

    replace_links(&RECIPE_BOOK_RECIPES, row.id, &book.recipes, &mut *tr).await?;

    tr.commit().await?;

    info!("User {user_id} created recipe book {}", row.id);

    Ok(row)
}

/// Members must be recipes of `user_id`, the book's owner.
pub async fn update_recipe_book(
    user_id: Id,
    id: Id,
    changes: RecipeBookChanges,
    pool: &Pool<Postgres>,
) -> Result<RecipeBook, ApiError> {
    if let Some(recipes) = &changes.recipes {
        ensure_members_exist(&RECIPE_BOOK_RECIPES, "recipes", recipes, Some(user_id), pool)
            .await?;
    }

    let mut tr = pool.begin().await?;

    let row: RecipeBook = sqlx::query_as(
        "UPDATE recipe_books SET title = COALESCE($1, title) WHERE id = $2 RETURNING *",
    )
    .bind(changes.title)
    .bind(id)
    .fetch_one(&mut *tr)
    .await?;

    if let Some(recipes) = &changes.recipes {
        replace_links(&RECIPE_BOOK_RECIPES, id, recipes, &mut *tr).await?;
    }

    tr.commit().await?;

    Ok(row)
}

pub async fn delete_recipe_book(id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM recipe_books WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
