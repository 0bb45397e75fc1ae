use std::{convert::Infallible, sync::Arc};

use log::{debug, error};
use serde::{de::DeserializeOwned, Serialize};
use warp::{
    http::{header::WWW_AUTHENTICATE, StatusCode},
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader,
        PayloadTooLarge, UnsupportedMediaType,
    },
    reply::Response,
    Filter, Rejection, Reply,
};

use crate::{
    api::{attributes, recipe_books, recipes, users},
    authentication::middleware::with_user,
    constants::{API_ROOT, JSON_BODY_LIMIT, MSG_NOT_FOUND},
    error::ApiError,
    form::QueryData,
    schema::{Attribute, Id, Ingredient, Tag},
    state::{with_state, State},
};

#[derive(Serialize)]
struct ErrorMessage {
    detail: String,
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

fn user_routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let create = warp::path!("user" / "create")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::create_user_view);

    let token = warp::path!("user" / "token")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::create_token_view);

    let me = warp::path!("user" / "me")
        .and(warp::get())
        .and(with_user(state.clone()))
        .and_then(users::retrieve_me_view);

    let update_me = warp::path!("user" / "me")
        .and(warp::patch())
        .and(with_user(state.clone()))
        .and(json_body())
        .and(with_state(state))
        .and_then(users::update_me_view);

    create.or(token).or(me).or(update_me)
}

/// `/recipe/<name>` list and create, shared by tags and ingredients.
fn attribute_routes<T: Attribute + 'static>(
    name: &'static str,
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let path = warp::path("recipe").and(warp::path(name)).and(warp::path::end());

    let list = path
        .and(warp::get())
        .and(with_user(state.clone()))
        .and(warp::query::<QueryData>())
        .and(with_state(state.clone()))
        .and_then(attributes::list_view::<T>);

    let create = path
        .and(warp::post())
        .and(with_user(state.clone()))
        .and(json_body())
        .and(with_state(state))
        .and_then(attributes::create_view::<T>);

    list.or(create)
}

fn recipe_routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("recipe" / "recipes")
        .and(warp::get())
        .and(with_user(state.clone()))
        .and(warp::query::<QueryData>())
        .and(with_state(state.clone()))
        .and_then(recipes::list_view);

    let create = warp::path!("recipe" / "recipes")
        .and(warp::post())
        .and(with_user(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(recipes::create_view);

    let retrieve = warp::path!("recipe" / "recipes" / Id)
        .and(warp::get())
        .and(with_user(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::retrieve_view);

    let replace = warp::path!("recipe" / "recipes" / Id)
        .and(warp::put())
        .and(with_user(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(recipes::replace_view);

    let update = warp::path!("recipe" / "recipes" / Id)
        .and(warp::patch())
        .and(with_user(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(recipes::update_view);

    let destroy = warp::path!("recipe" / "recipes" / Id)
        .and(warp::delete())
        .and(with_user(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::destroy_view);

    let upload_image = warp::path!("recipe" / "recipes" / Id / "upload-image")
        .and(warp::post())
        .and(with_user(state.clone()))
        .and(warp::multipart::form().max_length(state.config.max_upload_bytes))
        .and(with_state(state))
        .and_then(recipes::upload_image_view);

    list.or(create)
        .or(retrieve)
        .or(replace)
        .or(update)
        .or(destroy)
        .or(upload_image)
}

fn recipe_book_routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("recipe" / "recipebooks")
        .and(warp::get())
        .and(with_user(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipe_books::list_view);

    let create = warp::path!("recipe" / "recipebooks")
        .and(warp::post())
        .and(with_user(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(recipe_books::create_view);

    let retrieve = warp::path!("recipe" / "recipebooks" / Id)
        .and(warp::get())
        .and(with_user(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipe_books::retrieve_view);

    let replace = warp::path!("recipe" / "recipebooks" / Id)
        .and(warp::put())
        .and(with_user(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(recipe_books::replace_view);

    let update = warp::path!("recipe" / "recipebooks" / Id)
        .and(warp::patch())
        .and(with_user(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(recipe_books::update_view);

    let destroy = warp::path!("recipe" / "recipebooks" / Id)
        .and(warp::delete())
        .and(with_user(state.clone()))
        .and(with_state(state))
        .and_then(recipe_books::destroy_view);

    list.or(create)
        .or(retrieve)
        .or(replace)
        .or(update)
        .or(destroy)
}

/// The whole service: `/api/...` endpoints plus `/media/...` files.
///
/// Method filters run before authentication, so a wrong method is a 405
/// even for anonymous callers.
pub fn routes(
    state: Arc<State>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = warp::path(API_ROOT).and(
        user_routes(state.clone())
            .or(attribute_routes::<Tag>("tags", state.clone()))
            .or(attribute_routes::<Ingredient>("ingredients", state.clone()))
            .or(recipe_routes(state.clone()))
            .or(recipe_book_routes(state.clone())),
    );

    let media = warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(state.config.media_root.clone()));

    api.or(media)
        .with(warp::log("recipe_api"))
        .recover(handle_rejection)
}

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn detail(message: impl Into<String>, status: StatusCode) -> Response {
    json_reply(
        &ErrorMessage {
            detail: message.into(),
        },
        status,
    )
}

fn api_error_reply(err: &ApiError) -> Response {
    match err {
        ApiError::Validation(errors) => json_reply(errors, StatusCode::BAD_REQUEST),
        ApiError::InvalidRequest(message) => detail(message.as_str(), StatusCode::BAD_REQUEST),
        ApiError::NotAuthenticated | ApiError::InvalidToken(_) => warp::reply::with_header(
            detail(err.to_string(), StatusCode::UNAUTHORIZED),
            WWW_AUTHENTICATE,
            format!("Bearer realm=\"{API_ROOT}\""),
        )
        .into_response(),
        ApiError::NotFound => detail(MSG_NOT_FOUND, StatusCode::NOT_FOUND),
        ApiError::Query(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
            error!("{err}");
            detail("A server error occurred.", StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Renders every rejection as a JSON body with a matching status.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<ApiError>() {
        return Ok(api_error_reply(e));
    }

    if err.is_not_found() {
        return Ok(detail(MSG_NOT_FOUND, StatusCode::NOT_FOUND));
    }

    let response = if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        detail(format!("JSON parse error - {e}"), StatusCode::BAD_REQUEST)
    } else if let Some(e) = err.find::<InvalidQuery>() {
        detail(e.to_string(), StatusCode::BAD_REQUEST)
    } else if err.find::<MethodNotAllowed>().is_some() {
        detail("Method not allowed.", StatusCode::METHOD_NOT_ALLOWED)
    } else if err.find::<PayloadTooLarge>().is_some() {
        detail("Request body too large.", StatusCode::PAYLOAD_TOO_LARGE)
    } else if let Some(e) = err.find::<UnsupportedMediaType>() {
        detail(e.to_string(), StatusCode::UNSUPPORTED_MEDIA_TYPE)
    } else if err.find::<LengthRequired>().is_some() {
        detail("Content-Length required.", StatusCode::LENGTH_REQUIRED)
    } else if let Some(e) = err.find::<MissingHeader>() {
        detail(e.to_string(), StatusCode::BAD_REQUEST)
    } else if let Some(e) = err.find::<InvalidHeader>() {
        detail(e.to_string(), StatusCode::BAD_REQUEST)
    } else {
        error!("Unhandled rejection: {err:?}");
        detail("A server error occurred.", StatusCode::INTERNAL_SERVER_ERROR)
    };

    debug!("Rejected with {}", response.status());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::{config::Config, jwt::generate_token, schema::User};

    const SECRET: &str = "test-secret";

    fn state() -> Arc<State> {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/recipe_api_test")
            .unwrap();

        State::new(
            pool,
            Config {
                database_url: "postgres://localhost/recipe_api_test".to_string(),
                port: 8000,
                secret_key: SECRET.to_string(),
                token_lifetime_hours: 24,
                media_root: std::env::temp_dir(),
                media_url: "/media/".to_string(),
                max_upload_bytes: 1024,
            },
        )
    }

    fn body(bytes: &[u8]) -> serde_json::Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn me_requires_authentication() {
        let response = warp::test::request()
            .method("GET")
            .path("/api/user/me")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));
        assert!(body(response.body())["detail"].is_string());
    }

    #[tokio::test]
    async fn post_to_me_is_not_allowed() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/user/me")
            .json(&serde_json::json!({}))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn tags_reject_updates() {
        let response = warp::test::request()
            .method("PUT")
            .path("/api/recipe/tags")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn recipes_require_authentication() {
        for (method, path) in [
            ("GET", "/api/recipe/recipes"),
            ("GET", "/api/recipe/tags"),
            ("POST", "/api/recipe/ingredients"),
            ("GET", "/api/recipe/recipebooks"),
            ("DELETE", "/api/recipe/recipes/1"),
        ] {
            let response = warp::test::request()
                .method(method)
                .path(path)
                .reply(&routes(state()))
                .await;

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {path}");
        }
    }

    #[tokio::test]
    async fn rejects_forged_tokens() {
        let user = User {
            id: 1,
            email: "test@example.com".to_string(),
            name: "Test".to_string(),
            password: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        };
        let token = generate_token(&user, "another-secret", 24).unwrap();

        let response = warp::test::request()
            .method("GET")
            .path("/api/user/me")
            .header("authorization", format!("Bearer {token}"))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_user_validates_payload() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/user/create")
            .json(&serde_json::json!({
                "email": "not-an-email",
                "password": "pw",
                "name": "Test",
            }))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body(response.body());
        assert!(body["email"].is_array());
        assert!(body["password"].is_array());
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/user/token")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body(response.body())["detail"].is_string());
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        for path in ["/api/nothing", "/api/recipe/recipes/abc", "/api/recipe/tags/1"] {
            let response = warp::test::request()
                .method("GET")
                .path(path)
                .reply(&routes(state()))
                .await;

            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        }
    }
}
