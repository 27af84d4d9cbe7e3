pub mod chat;
pub mod ingredient;
pub mod order;
pub mod product;
pub mod promotion;
