use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::slugify;
use crate::shared::AppError;

pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Fields a seller provides when listing a product
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, message = "A product must have a name"))]
    pub name: String,
    #[validate(length(min = 1, message = "A product must have a description"))]
    pub description: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    /// Percentage taken off `price`
    pub price_discount: Option<f64>,
    pub category_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub colors: Vec<Uuid>,
    #[serde(default)]
    pub sizes: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductModel {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub main_image: Option<String>,
    pub main_image_id: Option<String>,
    pub images: Vec<String>,
    pub images_id: Vec<String>,
    pub description: String,
    pub category_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub price_after_discount: f64,
    pub colors: Vec<Uuid>,
    pub sizes: Vec<Uuid>,
    pub quantity: u32,
    pub sold: u32,
    pub is_out_of_stock: bool,
    pub ratings_average: f64,
    pub ratings_quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductModel {
    pub fn new(input: NewProduct) -> Result<Self, AppError> {
        let input = NewProduct {
            name: input.name.trim().to_string(),
            ..input
        };
        input.validate()?;

        if let Some(discount) = input.price_discount {
            if discount < 0.0 || discount >= input.price {
                return Err(AppError::BadRequest(format!(
                    "Discount price ({}) should be below regular price",
                    discount
                )));
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            slug: slugify(&input.name),
            price_after_discount: price_after_discount(input.price, input.price_discount),
            name: input.name,
            main_image: None,
            main_image_id: None,
            images: Vec::new(),
            images_id: Vec::new(),
            description: input.description,
            category_id: input.category_id,
            seller_id: input.seller_id,
            price: input.price,
            price_discount: input.price_discount,
            colors: input.colors,
            sizes: input.sizes,
            quantity: input.quantity,
            sold: 0,
            is_out_of_stock: input.quantity == 0,
            ratings_average: DEFAULT_RATINGS_AVERAGE,
            ratings_quantity: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Renaming keeps the slug in sync
    pub fn rename(&mut self, name: &str) -> Result<(), AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("A product must have a name".to_string()));
        }
        self.name = name.to_string();
        self.slug = slugify(name);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Stored rounded to one decimal place
    pub fn set_ratings_average(&mut self, value: f64) -> Result<(), AppError> {
        if value < 1.0 {
            return Err(AppError::BadRequest("Rating must be above 1.0".to_string()));
        }
        if value > 5.0 {
            return Err(AppError::BadRequest("Rating must be below 5.0".to_string()));
        }
        self.ratings_average = (value * 10.0).round() / 10.0;
        Ok(())
    }

    pub fn set_main_image(&mut self, url: String, id: String) {
        self.main_image = Some(url);
        self.main_image_id = Some(id);
        self.updated_at = Utc::now();
    }

    pub fn add_image(&mut self, url: String, id: String) {
        self.images.push(url);
        self.images_id.push(id);
        self.updated_at = Utc::now();
    }
}

pub fn price_after_discount(price: f64, discount: Option<f64>) -> f64 {
    price - (price / 100.0) * discount.unwrap_or(0.0)
}
