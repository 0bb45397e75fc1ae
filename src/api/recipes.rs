use std::sync::Arc;

use futures::TryStreamExt;
use log::info;
use sqlx::{Pool, Postgres};
use warp::{http::StatusCode, multipart::FormData, reject::Rejection, Buf, Reply};

use crate::{
    actions::{
        attributes::list_recipe_attributes,
        list_links,
        recipes::{
            create_recipe, delete_recipe, get_recipe_mut, list_recipes, set_recipe_image,
            update_recipe, RecipeChanges, RecipeFilter,
        },
    },
    constants::{MSG_NO_FILE, RECIPE_IMAGE_FIELD},
    error::{ApiError, FieldErrors},
    form::{Form, QueryData},
    schema::{Id, Ingredient, Recipe, Tag, User, RECIPE_INGREDIENTS, RECIPE_TAGS},
    serializers::{RecipeDetailResponse, RecipeImageResponse, RecipePayload, RecipeResponse},
    state::State,
    storage::{media_url, recipe_image_path, save_file, validate_image},
};

/// Bare shapes, tags and ingredients as ids.
pub async fn recipe_responses(
    recipes: Vec<Recipe>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeResponse>, ApiError> {
    let ids: Vec<Id> = recipes.iter().map(|recipe| recipe.id).collect();
    let tags = list_links(&RECIPE_TAGS, &ids, pool).await?;
    let ingredients = list_links(&RECIPE_INGREDIENTS, &ids, pool).await?;

    Ok(RecipeResponse::from_rows(recipes, tags, ingredients))
}

/// Detail shapes, tags and ingredients nested.
pub async fn recipe_detail_responses(
    recipes: Vec<Recipe>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeDetailResponse>, ApiError> {
    let ids: Vec<Id> = recipes.iter().map(|recipe| recipe.id).collect();
    let tags = list_recipe_attributes::<Tag>(&ids, pool).await?;
    let ingredients = list_recipe_attributes::<Ingredient>(&ids, pool).await?;

    Ok(RecipeDetailResponse::from_rows(recipes, tags, ingredients))
}

async fn recipe_response(recipe: Recipe, pool: &Pool<Postgres>) -> Result<RecipeResponse, ApiError> {
    recipe_responses(vec![recipe], pool)
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError::NotFound)
}

/// `GET /recipe/recipes`
pub async fn list_view(
    user: User,
    query: QueryData,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let form = Form::from_data(query);
    let filter = RecipeFilter {
        tags: form.get_id_list("tags")?,
        ingredients: form.get_id_list("ingredients")?,
    };

    let recipes = list_recipes(user.id, &filter, &state.pool).await?;
    let body = recipe_responses(recipes, &state.pool).await?;

    Ok(warp::reply::json(&body))
}

/// `POST /recipe/recipes`
pub async fn create_view(
    user: User,
    payload: RecipePayload,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let new_recipe = payload.into_new()?;
    let recipe = create_recipe(user.id, new_recipe, &state.pool).await?;
    let body = recipe_response(recipe, &state.pool).await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&body),
        StatusCode::CREATED,
    ))
}

/// `GET /recipe/recipes/{id}`
pub async fn retrieve_view(id: Id, user: User, state: Arc<State>) -> Result<impl Reply, Rejection> {
    let recipe = get_recipe_mut(user.id, id, &state.pool).await?;
    let body = recipe_detail_responses(vec![recipe], &state.pool)
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError::NotFound)?;

    Ok(warp::reply::json(&body))
}

/// `PUT /recipe/recipes/{id}`
pub async fn replace_view(
    id: Id,
    user: User,
    payload: RecipePayload,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let recipe = get_recipe_mut(user.id, id, &state.pool).await?;
    let changes = RecipeChanges::from(payload.into_new()?);

    let recipe = update_recipe(recipe.id, changes, &state.pool).await?;
    let body = recipe_response(recipe, &state.pool).await?;

    Ok(warp::reply::json(&body))
}

/// `PATCH /recipe/recipes/{id}`
pub async fn update_view(
    id: Id,
    user: User,
    payload: RecipePayload,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let recipe = get_recipe_mut(user.id, id, &state.pool).await?;
    let changes = payload.into_changes()?;

    let recipe = update_recipe(recipe.id, changes, &state.pool).await?;
    let body = recipe_response(recipe, &state.pool).await?;

    Ok(warp::reply::json(&body))
}

/// `DELETE /recipe/recipes/{id}`
pub async fn destroy_view(id: Id, user: User, state: Arc<State>) -> Result<impl Reply, Rejection> {
    let recipe = get_recipe_mut(user.id, id, &state.pool).await?;
    delete_recipe(recipe.id, &state.pool).await?;

    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT))
}

/// First part named `field`: its file name and contents.
async fn read_upload(
    form: FormData,
    field: &str,
) -> Result<Option<(Option<String>, Vec<u8>)>, ApiError> {
    let invalid = |e: warp::Error| ApiError::InvalidRequest(format!("Invalid multipart body: {e}"));

    futures::pin_mut!(form);
    while let Some(part) = form.try_next().await.map_err(invalid)? {
        if part.name() != field {
            continue;
        }

        let filename = part.filename().map(str::to_string);
        let mut bytes = Vec::new();

        let stream = part.stream();
        futures::pin_mut!(stream);
        while let Some(mut chunk) = stream.try_next().await.map_err(invalid)? {
            while chunk.has_remaining() {
                let len = {
                    let slice = chunk.chunk();
                    bytes.extend_from_slice(slice);
                    slice.len()
                };
                chunk.advance(len);
            }
        }

        return Ok(Some((filename, bytes)));
    }

    Ok(None)
}

/// `POST /recipe/recipes/{id}/upload-image`
pub async fn upload_image_view(
    id: Id,
    user: User,
    form: FormData,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let recipe = get_recipe_mut(user.id, id, &state.pool).await?;

    let (filename, bytes) = read_upload(form, RECIPE_IMAGE_FIELD)
        .await?
        .ok_or_else(|| ApiError::Validation(FieldErrors::single(RECIPE_IMAGE_FIELD, MSG_NO_FILE)))?;

    let (format, bytes) = tokio::task::spawn_blocking(move || {
        validate_image(&bytes).map(|format| (format, bytes))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Image validation failed: {e}")))??;

    let path = recipe_image_path(filename.as_deref(), format);
    save_file(&state.config.media_root, &path, &bytes).await?;

    let recipe = set_recipe_image(recipe.id, &path, &state.pool).await?;
    info!("Stored image {path} for recipe {}", recipe.id);

    Ok(warp::reply::json(&RecipeImageResponse {
        id: recipe.id,
        image: recipe
            .image
            .map(|image| media_url(&state.config.media_url, &image)),
    }))
}
