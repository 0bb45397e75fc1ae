use std::fmt::{self, Display};

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow};

pub type Id = i32;

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    #[serde(skip)]
    pub user_id: Id,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    #[serde(skip)]
    pub user_id: Id,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Id,
    pub user_id: Id,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeBook {
    pub id: Id,
    pub user_id: Id,
    pub title: String,
}

/// A row link from a recipe (or recipe book) to one of its members.
#[derive(sqlx::FromRow, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub owner_id: Id,
    pub member_id: Id,
}

/// Many-to-many join table between an owning row and its members.
#[derive(Debug, Clone, Copy)]
pub struct LinkTable {
    pub table: &'static str,
    pub owner_column: &'static str,
    pub member_column: &'static str,
    pub member_table: &'static str,
}

pub const RECIPE_TAGS: LinkTable = LinkTable {
    table: "recipe_tags",
    owner_column: "recipe_id",
    member_column: "tag_id",
    member_table: "tags",
};

pub const RECIPE_INGREDIENTS: LinkTable = LinkTable {
    table: "recipe_ingredients",
    owner_column: "recipe_id",
    member_column: "ingredient_id",
    member_table: "ingredients",
};

pub const RECIPE_BOOK_RECIPES: LinkTable = LinkTable {
    table: "recipe_book_recipes",
    owner_column: "recipe_book_id",
    member_column: "recipe_id",
    member_table: "recipes",
};

/// Named, user-owned rows attached to recipes: tags and ingredients share
/// their storage layout and their list/create behavior.
pub trait Attribute: for<'r> FromRow<'r, PgRow> + Serialize + Clone + Send + Unpin {
    const TABLE: &'static str;
    const LINK: LinkTable;
    const FIELD: &'static str;

    fn id(&self) -> Id;
}

impl Attribute for Tag {
    const TABLE: &'static str = "tags";
    const LINK: LinkTable = RECIPE_TAGS;
    const FIELD: &'static str = "tags";

    fn id(&self) -> Id {
        self.id
    }
}

impl Attribute for Ingredient {
    const TABLE: &'static str = "ingredients";
    const LINK: LinkTable = RECIPE_INGREDIENTS;
    const FIELD: &'static str = "ingredients";

    fn id(&self) -> Id {
        self.id
    }
}

impl Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.email)
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

impl Display for RecipeBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_name_or_title() {
        let tag = Tag {
            id: 1,
            name: "Vegan".to_string(),
            user_id: 1,
        };
        let ingredient = Ingredient {
            id: 1,
            name: "Cucumber".to_string(),
            user_id: 1,
        };
        let recipe = Recipe {
            id: 1,
            user_id: 1,
            title: "Steak and mushroom sauce".to_string(),
            time_minutes: 5,
            price: Decimal::new(500, 2),
            link: String::new(),
            image: None,
        };
        let book = RecipeBook {
            id: 1,
            user_id: 1,
            title: "My Book".to_string(),
        };

        assert_eq!(tag.to_string(), "Vegan");
        assert_eq!(ingredient.to_string(), "Cucumber");
        assert_eq!(recipe.to_string(), "Steak and mushroom sauce");
        assert_eq!(book.to_string(), "My Book");
    }

    #[test]
    fn attribute_owner_is_not_serialized() {
        let tag = Tag {
            id: 3,
            name: "Dessert".to_string(),
            user_id: 9,
        };

        assert_eq!(
            serde_json::to_value(&tag).unwrap(),
            serde_json::json!({ "id": 3, "name": "Dessert" })
        );
    }
}
