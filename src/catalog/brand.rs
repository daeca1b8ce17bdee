use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrandModel {
    pub id: Uuid,
    pub name: String,
    pub category_id: Option<Uuid>,
}

impl BrandModel {
    pub fn new(name: &str, category_id: Option<Uuid>) -> Result<Self, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("A brand must have a name".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category_id,
        })
    }
}
