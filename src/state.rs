use std::{convert::Infallible, sync::Arc};

use sqlx::{Pool, Postgres};
use warp::Filter;

use crate::config::Config;

pub struct State {
    pub pool: Pool<Postgres>,
    pub config: Config,
}

impl State {
    pub fn new(pool: Pool<Postgres>, config: Config) -> Arc<Self> {
        Arc::new(Self { pool, config })
    }
}

pub fn with_state(
    state: Arc<State>,
) -> impl Filter<Extract = (Arc<State>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
