// Catalog models: products and brands
pub use brand::BrandModel;
pub use product::{NewProduct, ProductModel};

pub mod brand;
pub mod product;

/// Lowercase, ASCII-alphanumeric words joined by single dashes
pub fn slugify(text: &str) -> String {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
