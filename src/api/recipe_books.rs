use std::{collections::HashMap, sync::Arc};

use sqlx::{Pool, Postgres};
use warp::{http::StatusCode, reject::Rejection, Reply};

use crate::{
    actions::{
        list_links,
        recipe_books::{
            create_recipe_book, delete_recipe_book, get_recipe_book_mut, list_recipe_books,
            update_recipe_book, RecipeBookChanges,
        },
        recipes::list_recipes_by_id,
    },
    api::recipes::recipe_detail_responses,
    error::ApiError,
    schema::{Id, RecipeBook, User, RECIPE_BOOK_RECIPES},
    serializers::{RecipeBookDetailResponse, RecipeBookPayload, RecipeBookResponse},
    state::State,
};

async fn book_responses(
    books: Vec<RecipeBook>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeBookResponse>, ApiError> {
    let ids: Vec<Id> = books.iter().map(|book| book.id).collect();
    let mut recipes = list_links(&RECIPE_BOOK_RECIPES, &ids, pool).await?;

    Ok(books
        .into_iter()
        .map(|book| {
            let id = book.id;
            RecipeBookResponse::new(book, recipes.remove(&id).unwrap_or_default())
        })
        .collect())
}

async fn book_response(book: RecipeBook, pool: &Pool<Postgres>) -> Result<RecipeBookResponse, ApiError> {
    book_responses(vec![book], pool)
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError::NotFound)
}

/// `GET /recipe/recipebooks`
pub async fn list_view(user: User, state: Arc<State>) -> Result<impl Reply, Rejection> {
    let books = list_recipe_books(user.id, &state.pool).await?;
    let body = book_responses(books, &state.pool).await?;

    Ok(warp::reply::json(&body))
}

/// `POST /recipe/recipebooks`
pub async fn create_view(
    user: User,
    payload: RecipeBookPayload,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let new_book = payload.into_new()?;
    let book = create_recipe_book(user.id, new_book, &state.pool).await?;
    let body = book_response(book, &state.pool).await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&body),
        StatusCode::CREATED,
    ))
}

/// `GET /recipe/recipebooks/{id}`, recipes nested in their detail shape.
pub async fn retrieve_view(id: Id, user: User, state: Arc<State>) -> Result<impl Reply, Rejection> {
    let book = get_recipe_book_mut(user.id, id, &state.pool).await?;

    let recipe_ids = list_links(&RECIPE_BOOK_RECIPES, &[book.id], &state.pool)
        .await?
        .remove(&book.id)
        .unwrap_or_default();
    let recipes = list_recipes_by_id(user.id, &recipe_ids, &state.pool).await?;

    // Keep the link order
    let mut details: HashMap<Id, _> = recipe_detail_responses(recipes, &state.pool)
        .await?
        .into_iter()
        .map(|detail| (detail.id, detail))
        .collect();
    let recipes = recipe_ids
        .iter()
        .filter_map(|id| details.remove(id))
        .collect();

    Ok(warp::reply::json(&RecipeBookDetailResponse {
        id: book.id,
        title: book.title,
        recipes,
    }))
}

/// `PUT /recipe/recipebooks/{id}`
pub async fn replace_view(
    id: Id,
    user: User,
    payload: RecipeBookPayload,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let book = get_recipe_book_mut(user.id, id, &state.pool).await?;
    let changes = RecipeBookChanges::from(payload.into_new()?);

    let book = update_recipe_book(user.id, book.id, changes, &state.pool).await?;
    let body = book_response(book, &state.pool).await?;

    Ok(warp::reply::json(&body))
}

/// `PATCH /recipe/recipebooks/{id}`
pub async fn update_view(
    id: Id,
    user: User,
    payload: RecipeBookPayload,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let book = get_recipe_book_mut(user.id, id, &state.pool).await?;
    let changes = payload.into_changes()?;

    let book = update_recipe_book(user.id, book.id, changes, &state.pool).await?;
    let body = book_response(book, &state.pool).await?;

    Ok(warp::reply::json(&body))
}

/// `DELETE /recipe/recipebooks/{id}`
pub async fn destroy_view(id: Id, user: User, state: Arc<State>) -> Result<impl Reply, Rejection> {
    let book = get_recipe_book_mut(user.id, id, &state.pool).await?;
    delete_recipe_book(book.id, &state.pool).await?;

    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT))
}
