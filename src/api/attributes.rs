use std::sync::Arc;

use warp::{http::StatusCode, reject::Rejection, Reply};

use crate::{
    actions::attributes::{create_attribute, list_attributes},
    form::{Form, QueryData},
    schema::{Attribute, User},
    serializers::AttributePayload,
    state::State,
};

/// `GET /recipe/tags`, `GET /recipe/ingredients`
pub async fn list_view<T: Attribute>(
    user: User,
    query: QueryData,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let assigned_only = Form::from_data(query).get_flag("assigned_only")?;
    let rows: Vec<T> = list_attributes(user.id, assigned_only, &state.pool).await?;

    Ok(warp::reply::json(&rows))
}

/// `POST /recipe/tags`, `POST /recipe/ingredients`
pub async fn create_view<T: Attribute>(
    user: User,
    payload: AttributePayload,
    state: Arc<State>,
) -> Result<impl Reply, Rejection> {
    let name = payload.into_name()?;
    let row: T = create_attribute(user.id, &name, &state.pool).await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&row),
        StatusCode::CREATED,
    ))
}
