//! Request payloads and response shapes.
//!
//! Payload fields are all optional so that absent and present-but-invalid
//! values produce per-field messages. Full payloads (create, PUT) require the
//! mandatory fields; partial payloads (PATCH) only check what was sent.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    actions::{
        recipe_books::{NewRecipeBook, RecipeBookChanges},
        recipes::{NewRecipe, RecipeChanges},
        users::UserChanges,
    },
    constants::{MSG_BLANK, MSG_REQUIRED, PRICE_DECIMAL_PLACES, PRICE_MAX_DIGITS},
    error::{ApiError, FieldErrors},
    schema::{Id, Ingredient, Recipe, RecipeBook, Tag, User},
};

/// Collects the derive-level validation failures of `payload`.
pub fn field_errors(payload: &impl Validate) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if let Err(e) = payload.validate() {
        for (field, list) in e.field_errors() {
            for error in list.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                errors.add(&field, message);
            }
        }
    }

    errors
}

fn require<T>(value: Option<T>, field: &str, errors: &mut FieldErrors) -> Option<T> {
    if value.is_none() {
        errors.add(field, MSG_REQUIRED);
    }
    value
}

fn check_not_blank(value: &Option<String>, field: &str, errors: &mut FieldErrors) {
    if matches!(value, Some(v) if v.trim().is_empty()) {
        errors.add(field, MSG_BLANK);
    }
}

/// At most 5 digits, 2 of them after the decimal point.
pub fn check_price(price: &Decimal) -> Result<(), String> {
    let normalized = price.normalize();

    if normalized.scale() > PRICE_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."
        ));
    }

    let whole_digits = normalized.trunc().abs().to_string().trim_start_matches('0').len() as u32;
    let max_whole_digits = PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES;
    if whole_digits > max_whole_digits {
        return Err(format!(
            "Ensure that there are no more than {max_whole_digits} digits before the decimal point."
        ));
    }

    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

// Users

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateUserPayload {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub email: Option<String>,

    #[validate(length(min = 5, message = "Ensure this field has at least 5 characters."))]
    pub password: Option<String>,

    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub name: Option<String>,
}

#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl CreateUserPayload {
    pub fn into_new(self) -> Result<NewUser, ApiError> {
        let mut errors = field_errors(&self);
        check_not_blank(&self.email, "email", &mut errors);
        check_not_blank(&self.password, "password", &mut errors);
        check_not_blank(&self.name, "name", &mut errors);

        let email = require(trimmed(self.email), "email", &mut errors);
        let password = require(self.password, "password", &mut errors);
        let name = require(trimmed(self.name), "name", &mut errors);

        match (email, password, name) {
            (Some(email), Some(password), Some(name)) if errors.is_empty() => Ok(NewUser {
                email,
                password,
                name,
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserPayload {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub email: Option<String>,

    #[validate(length(min = 5, message = "Ensure this field has at least 5 characters."))]
    pub password: Option<String>,

    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub name: Option<String>,
}

impl UpdateUserPayload {
    pub fn into_changes(self) -> Result<UserChanges, ApiError> {
        let mut errors = field_errors(&self);
        check_not_blank(&self.email, "email", &mut errors);
        check_not_blank(&self.password, "password", &mut errors);
        check_not_blank(&self.name, "name", &mut errors);
        errors.into_result()?;

        Ok(UserChanges {
            email: trimmed(self.email),
            name: trimmed(self.name),
            password: self.password,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl TokenPayload {
    pub fn into_credentials(self) -> Result<(String, String), ApiError> {
        let mut errors = FieldErrors::new();
        check_not_blank(&self.email, "email", &mut errors);
        check_not_blank(&self.password, "password", &mut errors);

        let email = require(self.email, "email", &mut errors);
        let password = require(self.password, "password", &mut errors);

        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => Ok((email, password)),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
        }
    }
}

// Tags and ingredients

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AttributePayload {
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub name: Option<String>,
}

impl AttributePayload {
    pub fn into_name(self) -> Result<String, ApiError> {
        let mut errors = field_errors(&self);
        check_not_blank(&self.name, "name", &mut errors);
        let name = require(trimmed(self.name), "name", &mut errors);

        match name {
            Some(name) if errors.is_empty() => Ok(name),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

// Recipes

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RecipePayload {
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub title: Option<String>,

    pub time_minutes: Option<i32>,

    pub price: Option<Decimal>,

    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub link: Option<String>,

    pub tags: Option<Vec<Id>>,

    pub ingredients: Option<Vec<Id>>,
}

impl RecipePayload {
    fn common_errors(&self) -> FieldErrors {
        let mut errors = field_errors(self);
        check_not_blank(&self.title, "title", &mut errors);

        if let Some(price) = &self.price {
            if let Err(message) = check_price(price) {
                errors.add("price", message);
            }
        }

        errors
    }

    /// Full payload: used for create and PUT. Omitted optional fields reset.
    pub fn into_new(self) -> Result<NewRecipe, ApiError> {
        let mut errors = self.common_errors();

        let title = require(trimmed(self.title), "title", &mut errors);
        let time_minutes = require(self.time_minutes, "time_minutes", &mut errors);
        let price = require(self.price, "price", &mut errors);

        match (title, time_minutes, price) {
            (Some(title), Some(time_minutes), Some(price)) if errors.is_empty() => Ok(NewRecipe {
                title,
                time_minutes,
                price: price.round_dp(PRICE_DECIMAL_PLACES),
                link: self.link.unwrap_or_default(),
                tags: self.tags.unwrap_or_default(),
                ingredients: self.ingredients.unwrap_or_default(),
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }

    /// Partial payload: used for PATCH. Omitted fields stay untouched.
    pub fn into_changes(self) -> Result<RecipeChanges, ApiError> {
        self.common_errors().into_result()?;

        Ok(RecipeChanges {
            title: trimmed(self.title),
            time_minutes: self.time_minutes,
            price: self.price.map(|p| p.round_dp(PRICE_DECIMAL_PLACES)),
            link: self.link,
            tags: self.tags,
            ingredients: self.ingredients,
        })
    }
}

/// List/create/update shape: related rows by id.
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: Id,
    pub title: String,
    pub ingredients: Vec<Id>,
    pub tags: Vec<Id>,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
}

impl RecipeResponse {
    pub fn new(recipe: Recipe, tags: Vec<Id>, ingredients: Vec<Id>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            ingredients,
            tags,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
        }
    }

    /// Pairs every recipe with its links, keeping the recipe order.
    pub fn from_rows(
        recipes: Vec<Recipe>,
        mut tags: HashMap<Id, Vec<Id>>,
        mut ingredients: HashMap<Id, Vec<Id>>,
    ) -> Vec<Self> {
        recipes
            .into_iter()
            .map(|recipe| {
                let id = recipe.id;
                Self::new(
                    recipe,
                    tags.remove(&id).unwrap_or_default(),
                    ingredients.remove(&id).unwrap_or_default(),
                )
            })
            .collect()
    }
}

/// Retrieve shape: related rows nested in full.
#[derive(Debug, Serialize)]
pub struct RecipeDetailResponse {
    pub id: Id,
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub tags: Vec<Tag>,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
}

impl RecipeDetailResponse {
    pub fn new(recipe: Recipe, tags: Vec<Tag>, ingredients: Vec<Ingredient>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            ingredients,
            tags,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
        }
    }

    pub fn from_rows(
        recipes: Vec<Recipe>,
        mut tags: HashMap<Id, Vec<Tag>>,
        mut ingredients: HashMap<Id, Vec<Ingredient>>,
    ) -> Vec<Self> {
        recipes
            .into_iter()
            .map(|recipe| {
                let id = recipe.id;
                Self::new(
                    recipe,
                    tags.remove(&id).unwrap_or_default(),
                    ingredients.remove(&id).unwrap_or_default(),
                )
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: Id,
    pub image: Option<String>,
}

// Recipe books

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RecipeBookPayload {
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub title: Option<String>,

    pub recipes: Option<Vec<Id>>,
}

impl RecipeBookPayload {
    pub fn into_new(self) -> Result<NewRecipeBook, ApiError> {
        let mut errors = field_errors(&self);
        check_not_blank(&self.title, "title", &mut errors);
        let title = require(trimmed(self.title), "title", &mut errors);

        match title {
            Some(title) if errors.is_empty() => Ok(NewRecipeBook {
                title,
                recipes: self.recipes.unwrap_or_default(),
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }

    pub fn into_changes(self) -> Result<RecipeBookChanges, ApiError> {
        let mut errors = field_errors(&self);
        check_not_blank(&self.title, "title", &mut errors);
        errors.into_result()?;

        Ok(RecipeBookChanges {
            title: trimmed(self.title),
            recipes: self.recipes,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeBookResponse {
    pub id: Id,
    pub title: String,
    pub recipes: Vec<Id>,
}

impl RecipeBookResponse {
    pub fn new(book: RecipeBook, recipes: Vec<Id>) -> Self {
        Self {
            id: book.id,
            title: book.title,
            recipes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeBookDetailResponse {
    pub id: Id,
    pub title: String,
    pub recipes: Vec<RecipeDetailResponse>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    fn recipe_payload(value: serde_json::Value) -> RecipePayload {
        serde_json::from_value(value).unwrap()
    }

    fn errors_of<T: std::fmt::Debug>(result: Result<T, ApiError>) -> FieldErrors {
        match result {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn create_user_requires_valid_email() {
        let payload = CreateUserPayload {
            email: Some("nilo.com".to_string()),
            password: Some("1234567".to_string()),
            name: Some("Test Name".to_string()),
        };

        let errors = errors_of(payload.into_new());
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn create_user_rejects_short_password() {
        let payload = CreateUserPayload {
            email: Some("nilo@test.com".to_string()),
            password: Some("123".to_string()),
            name: Some("Test Name".to_string()),
        };

        let errors = errors_of(payload.into_new());
        assert_eq!(
            errors.get("password").unwrap(),
            &vec!["Ensure this field has at least 5 characters.".to_string()]
        );
    }

    #[test]
    fn create_user_reports_every_missing_field() {
        let errors = errors_of(CreateUserPayload::default().into_new());

        for field in ["email", "password", "name"] {
            assert_eq!(errors.get(field).unwrap(), &vec![MSG_REQUIRED.to_string()]);
        }
    }

    #[test]
    fn create_user_accepts_valid_payload() {
        let payload = CreateUserPayload {
            email: Some("nilo@test.com".to_string()),
            password: Some("12345".to_string()),
            name: Some("Test Name".to_string()),
        };

        let user = payload.into_new().unwrap();
        assert_eq!(user.email, "nilo@test.com");
        assert_eq!(user.password, "12345");
    }

    #[test]
    fn update_user_allows_partial_payload() {
        let changes = UpdateUserPayload {
            name: Some("new name".to_string()),
            ..Default::default()
        }
        .into_changes()
        .unwrap();

        assert_eq!(changes.name.as_deref(), Some("new name"));
        assert!(changes.password.is_none());
        assert!(changes.email.is_none());
    }

    #[test]
    fn update_user_still_checks_password_length() {
        let payload = UpdateUserPayload {
            password: Some("abc".to_string()),
            ..Default::default()
        };

        assert!(errors_of(payload.into_changes()).get("password").is_some());
    }

    #[test]
    fn token_payload_requires_both_fields() {
        let errors = errors_of(
            TokenPayload {
                email: Some("one@test.com".to_string()),
                password: Some(String::new()),
            }
            .into_credentials(),
        );

        assert_eq!(errors.get("password").unwrap(), &vec![MSG_BLANK.to_string()]);
    }

    #[test]
    fn attribute_name_may_not_be_blank() {
        let errors = errors_of(
            AttributePayload {
                name: Some(String::new()),
            }
            .into_name(),
        );
        assert_eq!(errors.get("name").unwrap(), &vec![MSG_BLANK.to_string()]);

        let errors = errors_of(AttributePayload::default().into_name());
        assert_eq!(errors.get("name").unwrap(), &vec![MSG_REQUIRED.to_string()]);
    }

    #[test]
    fn full_recipe_payload_needs_required_fields() {
        let errors = errors_of(recipe_payload(json!({ "title": "Chocolate cheesecake" })).into_new());

        assert!(errors.get("title").is_none());
        assert!(errors.get("time_minutes").is_some());
        assert!(errors.get("price").is_some());
    }

    #[test]
    fn full_recipe_payload_resets_omitted_fields() {
        let recipe = recipe_payload(json!({
            "title": "Cheesecake",
            "time_minutes": 5,
            "price": 8.00
        }))
        .into_new()
        .unwrap();

        assert_eq!(recipe.price, Decimal::from_str("8.00").unwrap());
        assert_eq!(recipe.link, "");
        assert!(recipe.tags.is_empty());
        assert!(recipe.ingredients.is_empty());
    }

    #[test]
    fn partial_recipe_payload_leaves_omitted_fields() {
        let changes = recipe_payload(json!({ "title": "Chicken tikka", "tags": [2] }))
            .into_changes()
            .unwrap();

        assert_eq!(changes.title.as_deref(), Some("Chicken tikka"));
        assert_eq!(changes.tags, Some(vec![2]));
        assert!(changes.ingredients.is_none());
        assert!(changes.price.is_none());
    }

    #[test]
    fn partial_recipe_payload_still_validates_sent_fields() {
        let errors = errors_of(recipe_payload(json!({ "title": "" })).into_changes());
        assert_eq!(errors.get("title").unwrap(), &vec![MSG_BLANK.to_string()]);
    }

    #[test]
    fn price_accepts_strings_and_numbers() {
        let from_str = recipe_payload(json!({ "price": "5.00" }));
        let from_float = recipe_payload(json!({ "price": 5.0 }));

        assert_eq!(from_str.price, from_float.price.map(|p| p.round_dp(2)));
    }

    #[test]
    fn price_is_bounded() {
        assert!(check_price(&Decimal::from_str("999.99").unwrap()).is_ok());
        assert!(check_price(&Decimal::from_str("0.5").unwrap()).is_ok());
        assert!(check_price(&Decimal::from_str("8.000").unwrap()).is_ok());
        assert!(check_price(&Decimal::from_str("1000").unwrap()).is_err());
        assert!(check_price(&Decimal::from_str("1.234").unwrap()).is_err());
    }

    #[test]
    fn recipe_response_renders_price_as_decimal_string() {
        let recipe = Recipe {
            id: 1,
            user_id: 1,
            title: "Cheesecake".to_string(),
            time_minutes: 5,
            price: Decimal::from_str("8.00").unwrap(),
            link: String::new(),
            image: None,
        };

        let body = serde_json::to_value(RecipeResponse::new(recipe, vec![2, 1], vec![])).unwrap();
        assert_eq!(
            body,
            json!({
                "id": 1,
                "title": "Cheesecake",
                "ingredients": [],
                "tags": [2, 1],
                "time_minutes": 5,
                "price": "8.00",
                "link": ""
            })
        );
    }

    #[test]
    fn recipe_rows_keep_their_order_and_links() {
        let recipe = |id: Id| Recipe {
            id,
            user_id: 1,
            title: format!("Recipe {id}"),
            time_minutes: 10,
            price: Decimal::new(500, 2),
            link: String::new(),
            image: None,
        };
        let tags = HashMap::from([(2, vec![7])]);

        let rows = RecipeResponse::from_rows(vec![recipe(2), recipe(1)], tags, HashMap::new());

        assert_eq!(rows[0].id, 2);
        assert_eq!(rows[0].tags, vec![7]);
        assert!(rows[1].tags.is_empty());
    }

    #[test]
    fn recipe_book_payload_requires_title() {
        let errors = errors_of(RecipeBookPayload::default().into_new());
        assert!(errors.get("title").is_some());

        let changes = RecipeBookPayload {
            title: None,
            recipes: Some(vec![1]),
        }
        .into_changes()
        .unwrap();
        assert!(changes.title.is_none());
        assert_eq!(changes.recipes, Some(vec![1]));
    }
}
