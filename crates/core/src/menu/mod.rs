pub mod catalog;
pub mod resolver;

pub use catalog::{is_denylisted_beverage, Catalog, CatalogItem, CatalogSource};
pub use resolver::{best_match, match_score, normalize, resolve, tokenize, CatalogMatch};
