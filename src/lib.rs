mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
}
mod api {
    pub mod attributes;
    pub mod recipe_books;
    pub mod recipes;
    pub mod routes;
    pub mod serializers;
    pub mod users;
}
mod constants;

pub mod config;
pub mod state;
pub mod storage;

pub use api::*;
pub use authentication::*;
pub use constants::*;
pub use database::*;
