use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use mesero_core::domain::chat::ChatTurn;
use mesero_core::domain::ingredient::{Ingredient, IngredientId, IngredientPatch, NewIngredient};
use mesero_core::domain::order::{Order, OrderId, OrderStatus};
use mesero_core::domain::product::{NewProduct, Product, ProductId, ProductPatch};
use mesero_core::domain::promotion::{NewPromotion, Promotion, PromotionId, PromotionPatch};

use super::{
    new_id, ChatRepository, IngredientRepository, OrderFilter, OrderRepository,
    ProductRepository, PromotionRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

impl InMemoryProductRepository {
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|product| (product.id.0.clone(), product));
        Self { products: RwLock::new(products.collect()) }
    }
}

fn sorted_products(products: impl Iterator<Item = Product>) -> Vec<Product> {
    let mut products = products.collect::<Vec<_>>();
    products.sort_by(|left, right| {
        left.category.cmp(&right.category).then_with(|| left.name.cmp(&right.name))
    });
    products
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn list_active(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(sorted_products(products.values().filter(|product| product.is_active).cloned()))
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(sorted_products(products.values().cloned()))
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let now = Utc::now();
        let product = Product {
            id: ProductId(new_id()),
            name: product.name,
            description: product.description,
            category: product.category,
            price: product.price,
            is_active: true,
            is_featured: false,
            is_combo: product.is_combo,
            principal_ingredient: product.principal_ingredient,
            stock_quantity: product.stock_quantity,
            min_stock_alert: None,
            created_at: now,
            updated_at: now,
        };

        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product.clone());
        Ok(product)
    }

    async fn update(
        &self,
        id: &ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound { entity: "product", id: id.0.clone() })?;
        patch.apply(product, Utc::now());
        Ok(product.clone())
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let mut products = self.products.write().await;
        Ok(products.remove(&id.0).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryIngredientRepository {
    ingredients: RwLock<HashMap<String, Ingredient>>,
}

impl InMemoryIngredientRepository {
    pub fn with_ingredients(ingredients: impl IntoIterator<Item = Ingredient>) -> Self {
        let ingredients =
            ingredients.into_iter().map(|ingredient| (ingredient.id.0.clone(), ingredient));
        Self { ingredients: RwLock::new(ingredients.collect()) }
    }
}

fn sorted_ingredients(ingredients: impl Iterator<Item = Ingredient>) -> Vec<Ingredient> {
    let mut ingredients = ingredients.collect::<Vec<_>>();
    ingredients.sort_by(|left, right| left.name.cmp(&right.name));
    ingredients
}

#[async_trait::async_trait]
impl IngredientRepository for InMemoryIngredientRepository {
    async fn list_all(&self) -> Result<Vec<Ingredient>, RepositoryError> {
        let ingredients = self.ingredients.read().await;
        Ok(sorted_ingredients(ingredients.values().cloned()))
    }

    async fn list_available(&self) -> Result<Vec<Ingredient>, RepositoryError> {
        let ingredients = self.ingredients.read().await;
        Ok(sorted_ingredients(
            ingredients
                .values()
                .filter(|ingredient| ingredient.is_available && ingredient.stock_quantity > 0)
                .cloned(),
        ))
    }

    async fn find_by_id(&self, id: &IngredientId) -> Result<Option<Ingredient>, RepositoryError> {
        let ingredients = self.ingredients.read().await;
        Ok(ingredients.get(&id.0).cloned())
    }

    async fn create(&self, ingredient: NewIngredient) -> Result<Ingredient, RepositoryError> {
        let now = Utc::now();
        let ingredient = Ingredient {
            id: IngredientId(new_id()),
            name: ingredient.name,
            unit: ingredient.unit,
            stock_quantity: ingredient.stock_quantity,
            min_stock_alert: ingredient.min_stock_alert,
            is_available: true,
            is_sellable: ingredient.is_sellable,
            extra_price: ingredient.extra_price,
            created_at: now,
            updated_at: now,
        };

        let mut ingredients = self.ingredients.write().await;
        ingredients.insert(ingredient.id.0.clone(), ingredient.clone());
        Ok(ingredient)
    }

    async fn update(
        &self,
        id: &IngredientId,
        patch: &IngredientPatch,
    ) -> Result<Ingredient, RepositoryError> {
        let mut ingredients = self.ingredients.write().await;
        let ingredient = ingredients
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound { entity: "ingredient", id: id.0.clone() })?;
        patch.apply(ingredient, Utc::now());
        Ok(ingredient.clone())
    }
}

/// Keeps insertion order so listings match the SQL `created_at` ordering.
#[derive(Default)]
pub struct InMemoryPromotionRepository {
    promotions: RwLock<Vec<Promotion>>,
}

impl InMemoryPromotionRepository {
    pub fn with_promotions(promotions: impl IntoIterator<Item = Promotion>) -> Self {
        Self { promotions: RwLock::new(promotions.into_iter().collect()) }
    }
}

#[async_trait::async_trait]
impl PromotionRepository for InMemoryPromotionRepository {
    async fn list_all(&self) -> Result<Vec<Promotion>, RepositoryError> {
        Ok(self.promotions.read().await.clone())
    }

    async fn list_active(&self) -> Result<Vec<Promotion>, RepositoryError> {
        let promotions = self.promotions.read().await;
        Ok(promotions.iter().filter(|promotion| promotion.is_active).cloned().collect())
    }

    async fn create(&self, promotion: NewPromotion) -> Result<Promotion, RepositoryError> {
        let now = Utc::now();
        let promotion = Promotion {
            id: PromotionId(new_id()),
            name: promotion.name,
            description: promotion.description,
            discount_type: promotion.discount_type,
            discount_value: promotion.discount_value,
            min_purchase: promotion.min_purchase,
            is_active: true,
            starts_at: promotion.starts_at,
            ends_at: promotion.ends_at,
            created_at: now,
            updated_at: now,
        };

        self.promotions.write().await.push(promotion.clone());
        Ok(promotion)
    }

    async fn update(
        &self,
        id: &PromotionId,
        patch: &PromotionPatch,
    ) -> Result<Promotion, RepositoryError> {
        let mut promotions = self.promotions.write().await;
        let promotion = promotions
            .iter_mut()
            .find(|promotion| promotion.id == *id)
            .ok_or_else(|| RepositoryError::NotFound { entity: "promotion", id: id.0.clone() })?;
        patch.apply(promotion, Utc::now());
        Ok(promotion.clone())
    }

    async fn delete(&self, id: &PromotionId) -> Result<bool, RepositoryError> {
        let mut promotions = self.promotions.write().await;
        let before = promotions.len();
        promotions.retain(|promotion| promotion.id != *id);
        Ok(promotions.len() != before)
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderRepository {
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let orders = orders.into_iter().map(|order| (order.id.0.clone(), order));
        Self { orders: RwLock::new(orders.collect()) }
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut matching =
            orders.values().filter(|order| filter.matches(order)).cloned().collect::<Vec<_>>();
        matching.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| right.id.0.cmp(&left.id.0))
        });
        if let Some(limit) = filter.limit {
            matching.truncate(limit as usize);
        }
        Ok(matching)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn create(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound { entity: "order", id: id.0.clone() })?;
        order.status = status;
        order.updated_at = updated_at;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryChatRepository {
    sessions: RwLock<HashMap<String, Vec<ChatTurn>>>,
}

#[async_trait::async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn append_turn(&self, session_id: &str, turn: &ChatTurn) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.to_string()).or_default().push(turn.clone());
        Ok(())
    }

    async fn list_session(&self, session_id: &str) -> Result<Vec<ChatTurn>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }
}
