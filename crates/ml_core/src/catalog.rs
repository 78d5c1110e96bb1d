//! Built-in food catalog and per-category portion distributions

use serde::{Deserialize, Serialize};

/// A catalog entry with its calorie density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    pub category: String,
    pub base_calories_per_100g: f64,
}

impl FoodItem {
    pub fn new(name: &str, category: &str, base_calories_per_100g: f64) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            base_calories_per_100g,
        }
    }
}

/// Normal distribution parameters for portion sizes (grams).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortionDistribution {
    pub mean: f64,
    pub std_dev: f64,
}

/// Typical portion for a category. Unlisted categories use the protein profile.
pub fn portion_for_category(category: &str) -> PortionDistribution {
    let (mean, std_dev) = match category {
        "fat" => (15.0, 5.0),
        "nuts" => (30.0, 10.0),
        "fruit" => (150.0, 40.0),
        "vegetable" => (100.0, 30.0),
        "grain" => (75.0, 20.0),
        _ => (120.0, 30.0),
    };
    PortionDistribution { mean, std_dev }
}

/// The default 17-item catalog.
pub fn default_catalog() -> Vec<FoodItem> {
    vec![
        // Protein
        FoodItem::new("Chicken Breast", "protein", 165.0),
        FoodItem::new("Salmon", "protein", 208.0),
        FoodItem::new("Greek Yogurt", "dairy", 59.0),
        FoodItem::new("Eggs", "protein", 155.0),
        FoodItem::new("Tofu", "protein", 76.0),
        // Carbohydrates
        FoodItem::new("Brown Rice", "grain", 111.0),
        FoodItem::new("Quinoa", "grain", 120.0),
        FoodItem::new("Sweet Potato", "vegetable", 86.0),
        FoodItem::new("Oats", "grain", 389.0),
        FoodItem::new("Banana", "fruit", 89.0),
        // Vegetables
        FoodItem::new("Broccoli", "vegetable", 34.0),
        FoodItem::new("Spinach", "vegetable", 23.0),
        FoodItem::new("Carrots", "vegetable", 41.0),
        FoodItem::new("Bell Peppers", "vegetable", 31.0),
        // Fats and nuts
        FoodItem::new("Almonds", "nuts", 579.0),
        FoodItem::new("Avocado", "fruit", 160.0),
        FoodItem::new("Olive Oil", "fat", 884.0),
    ]
}
