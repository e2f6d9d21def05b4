//! Static tool schemas advertised to the routing model.

use petwise_core::ToolDeclaration;
use serde_json::{Value, json};

pub const SEARCH_PRODUCTS: &str = "search_products";
pub const SEARCH_ARTICLES: &str = "search_articles";

/// Allowed values for `category_level_1`.
pub const CATEGORY_LEVEL_1: &[&str] =
    &["Dog", "Cat", "Small Pet", "Bird", "Fish", "Reptile", "Farm Animal"];

/// Allowed values for `category_level_2`.
pub const CATEGORY_LEVEL_2: &[&str] = &[
    "Food",
    "Treats",
    "Toys",
    "Beds, Crates & Gear",
    "Health & Wellness",
    "Litter & Accessories",
    "Grooming",
    "Bowls & Feeders",
    "Leashes & Collars",
    "Cleaning & Potty",
    "Flea & Tick",
    "Pharmacy",
    "Clothing & Accessories",
    "Habitats & Supplies",
];

fn string_list(description: &str) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "description": description,
    })
}

fn enum_list(values: &[&str], description: &str) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string", "enum": values },
        "description": description,
    })
}

pub fn search_products_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "minLength": 1,
                "description": "Short product search phrase, without ingredient or category constraints (e.g. 'puppy food')."
            },
            "required_ingredients": string_list(
                "Ingredients every product must contain, lowercase (e.g. 'salmon')."
            ),
            "excluded_ingredients": string_list(
                "Ingredients products must not contain, lowercase (e.g. 'chicken'). Include anything the user says their pet cannot have."
            ),
            "category_level_1": enum_list(
                CATEGORY_LEVEL_1,
                "Animal categories to restrict to. Leave empty when the animal is unknown."
            ),
            "category_level_2": enum_list(
                CATEGORY_LEVEL_2,
                "Product departments to restrict to (e.g. 'Food' for food, 'Beds, Crates & Gear' for beds)."
            ),
        },
        "required": ["query"],
        "additionalProperties": false,
    })
}

pub fn search_articles_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "minLength": 1,
                "description": "The pet-care question to find articles for."
            }
        },
        "required": ["query"],
        "additionalProperties": false,
    })
}

/// Declarations for every tool, in the order the model sees them.
pub fn declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration::new(
            SEARCH_PRODUCTS,
            "Search the pet product catalog. Use for any request to find, recommend, or shop for products.",
            search_products_schema(),
        ),
        ToolDeclaration::new(
            SEARCH_ARTICLES,
            "Search pet-care articles. Use for advice, how-to, health, training or new-pet questions that are not a shopping request.",
            search_articles_schema(),
        ),
    ]
}
