//! Executors behind the admin tools.
//!
//! Every executor re-reads the collection it works on, resolves names with
//! [`best_match`], and reports through a [`ToolResult`]. Repository failures
//! are folded into `success: false` results by [`ToolExecutor::execute`].

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use mesero_core::alerts::{render_message, AlertSnapshot};
use mesero_core::cache::Clock;
use mesero_core::domain::ingredient::{Ingredient, IngredientPatch, NewIngredient};
use mesero_core::domain::order::{Order, OrderStatus};
use mesero_core::domain::product::{NewProduct, Product, ProductPatch};
use mesero_core::domain::promotion::{
    validate_discount, DiscountType, NewPromotion, Promotion, PromotionPatch,
};
use mesero_core::insights::{product_sales, SalesPeriod, SalesSummary};
use mesero_core::menu::{best_match, normalize};
use mesero_core::metrics::MetricsSink;
use mesero_db::{OrderFilter, RepositoryError};

use super::registry::{
    AdminTool, BulkUpdateIngredientStockArgs, CreateIngredientArgs, CreateProductArgs,
    CreatePromotionArgs, OrderIdentifierArgs, ProductNameArgs, ProductSalesArgs,
    PromotionNameArgs, SalesByPeriodArgs, ToggleIngredientAvailabilityArgs, ToggleProductArgs,
    ToggleProductFeaturedArgs, TogglePromotionArgs, UpdateIngredientInfoArgs,
    UpdateIngredientStockArgs, UpdateOrderStatusArgs, UpdateProductArgs, UpdatePromotionArgs,
};
use super::ToolResult;
use crate::llm::FunctionCall;
use crate::Repositories;

const LAST_ORDER_SENTINELS: [&str; 3] = ["last", "ultimo", "ultima"];
const ACTIVE_ORDERS_SHOWN: usize = 10;

type ExecutorResult = Result<ToolResult, RepositoryError>;

pub struct ToolExecutor {
    repositories: Repositories,
    low_stock_threshold: i64,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
}

impl ToolExecutor {
    pub fn new(
        repositories: Repositories,
        low_stock_threshold: i64,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self { repositories, low_stock_threshold, clock, metrics }
    }

    /// Entry point for model-issued calls. Unknown tools and malformed arguments
    /// come back as failed results, never as errors.
    pub async fn execute_call(&self, call: &FunctionCall, correlation_id: &str) -> ToolResult {
        match AdminTool::from_call(&call.name, &call.args) {
            Ok(tool) => self.execute(tool, correlation_id).await,
            Err(error) => {
                warn!(
                    event_name = "agent.admin.tool_rejected",
                    correlation_id,
                    tool = %call.name,
                    error = %error,
                    "tool call rejected before execution"
                );
                self.metrics.record_tool_call(&call.name, false);
                ToolResult::failed(call.name.clone(), format!("No pude ejecutar la acción: {error}"))
            }
        }
    }

    #[instrument(skip(self, tool), fields(tool = tool.name(), correlation_id = %correlation_id))]
    pub async fn execute(&self, tool: AdminTool, correlation_id: &str) -> ToolResult {
        let name = tool.name();
        let result = match self.dispatch(tool).await {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    event_name = "agent.admin.tool_persistence_failed",
                    correlation_id,
                    tool = name,
                    error = %error,
                    "repository failure during tool execution"
                );
                ToolResult::failed(name, format!("No pude completar la operación: {error}"))
            }
        };

        self.metrics.record_tool_call(name, result.success);
        if result.success {
            info!(event_name = "agent.admin.tool_executed", correlation_id, tool = name, "tool executed");
        } else {
            warn!(
                event_name = "agent.admin.tool_failed",
                correlation_id,
                tool = name,
                description = %result.description,
                "tool reported failure"
            );
        }
        result
    }

    async fn dispatch(&self, tool: AdminTool) -> ExecutorResult {
        match tool {
            AdminTool::UpdateIngredientStock(args) => self.update_ingredient_stock(args).await,
            AdminTool::BulkUpdateIngredientStock(args) => {
                self.bulk_update_ingredient_stock(args).await
            }
            AdminTool::ToggleIngredientAvailability(args) => {
                self.toggle_ingredient_availability(args).await
            }
            AdminTool::UpdateIngredientInfo(args) => self.update_ingredient_info(args).await,
            AdminTool::CreateIngredient(args) => self.create_ingredient(args).await,
            AdminTool::ToggleProduct(args) => self.toggle_product(args).await,
            AdminTool::ToggleProductFeatured(args) => self.toggle_product_featured(args).await,
            AdminTool::UpdateProduct(args) => self.update_product(args).await,
            AdminTool::CreateProduct(args) => self.create_product(args).await,
            AdminTool::DeleteProduct(args) => self.delete_product(args).await,
            AdminTool::GetProductDetails(args) => self.get_product_details(args).await,
            AdminTool::TogglePromotion(args) => self.toggle_promotion(args).await,
            AdminTool::CreatePromotion(args) => self.create_promotion(args).await,
            AdminTool::UpdatePromotion(args) => self.update_promotion(args).await,
            AdminTool::DeletePromotion(args) => self.delete_promotion(args).await,
            AdminTool::UpdateOrderStatus(args) => self.update_order_status(args).await,
            AdminTool::GetOrderDetails(args) => self.get_order_details(args).await,
            AdminTool::GetActiveOrders => self.get_active_orders().await,
            AdminTool::AnalyzeStock => self.analyze_stock().await,
            AdminTool::GetSalesByPeriod(args) => self.get_sales_by_period(args).await,
            AdminTool::GetProductSales(args) => self.get_product_sales(args).await,
        }
    }

    async fn find_ingredient(&self, name: &str) -> Result<Option<Ingredient>, RepositoryError> {
        let ingredients = self.repositories.ingredients.list_all().await?;
        Ok(best_match(name, &ingredients, |ingredient| ingredient.name.as_str())
            .map(|(ingredient, _)| ingredient.clone()))
    }

    async fn find_product(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let products = self.repositories.products.list_all().await?;
        Ok(best_match(name, &products, |product| product.name.as_str())
            .map(|(product, _)| product.clone()))
    }

    async fn find_promotion(&self, name: &str) -> Result<Option<Promotion>, RepositoryError> {
        let promotions = self.repositories.promotions.list_all().await?;
        Ok(best_match(name, &promotions, |promotion| promotion.name.as_str())
            .map(|(promotion, _)| promotion.clone()))
    }

    /// `last`, an order-number fragment, or a customer name/email fragment.
    async fn find_order(&self, identifier: &str) -> Result<Option<Order>, RepositoryError> {
        let orders = self.repositories.orders.list(&OrderFilter::default()).await?;
        let wanted = normalize(identifier);
        if wanted.is_empty() {
            return Ok(None);
        }
        if LAST_ORDER_SENTINELS.contains(&wanted.as_str()) {
            return Ok(orders.into_iter().next());
        }

        let by_number = orders
            .iter()
            .find(|order| normalize(&order.order_number).contains(&wanted))
            .cloned();
        if by_number.is_some() {
            return Ok(by_number);
        }

        Ok(orders.into_iter().find(|order| {
            normalize(&order.customer.name).contains(&wanted)
                || order
                    .customer
                    .email
                    .as_deref()
                    .is_some_and(|email| normalize(email).contains(&wanted))
        }))
    }

    async fn update_ingredient_stock(&self, args: UpdateIngredientStockArgs) -> ExecutorResult {
        const TOOL: &str = "update_ingredient_stock";
        match self.apply_stock_update(&args).await? {
            Ok(line) => Ok(ToolResult::ok(TOOL, line)),
            Err(line) => Ok(ToolResult::failed(TOOL, line)),
        }
    }

    /// Inner `Err` is a validation or lookup failure for this one ingredient.
    async fn apply_stock_update(
        &self,
        args: &UpdateIngredientStockArgs,
    ) -> Result<Result<String, String>, RepositoryError> {
        if args.quantity < 0 {
            return Ok(Err(format!(
                "La cantidad de {} no puede ser negativa ({}).",
                args.ingredient_name, args.quantity
            )));
        }
        let Some(ingredient) = self.find_ingredient(&args.ingredient_name).await? else {
            return Ok(Err(not_found("el ingrediente", &args.ingredient_name)));
        };

        let updated = self
            .repositories
            .ingredients
            .update(&ingredient.id, &IngredientPatch::stock(args.quantity))
            .await?;
        Ok(Ok(format!(
            "Stock de {}: {} → {} {}",
            updated.name, ingredient.stock_quantity, updated.stock_quantity, updated.unit
        )))
    }

    async fn bulk_update_ingredient_stock(
        &self,
        args: BulkUpdateIngredientStockArgs,
    ) -> ExecutorResult {
        const TOOL: &str = "bulk_update_ingredient_stock";
        if args.updates.is_empty() {
            return Ok(ToolResult::failed(TOOL, "No recibí ningún ingrediente para actualizar."));
        }

        let mut lines = Vec::with_capacity(args.updates.len());
        let mut succeeded = 0usize;
        for update in &args.updates {
            let outcome = match self.apply_stock_update(update).await {
                Ok(outcome) => outcome,
                Err(error) => Err(format!(
                    "No pude actualizar {}: {error}",
                    update.ingredient_name
                )),
            };
            match outcome {
                Ok(line) => {
                    succeeded += 1;
                    lines.push(format!("- OK {line}"));
                }
                Err(line) => lines.push(format!("- ERROR {line}")),
            }
        }

        let description = format!(
            "Actualicé {succeeded} de {} ingredientes:\n{}",
            args.updates.len(),
            lines.join("\n")
        );
        Ok(if succeeded > 0 {
            ToolResult::ok(TOOL, description)
        } else {
            ToolResult::failed(TOOL, description)
        })
    }

    async fn toggle_ingredient_availability(
        &self,
        args: ToggleIngredientAvailabilityArgs,
    ) -> ExecutorResult {
        const TOOL: &str = "toggle_ingredient_availability";
        let Some(ingredient) = self.find_ingredient(&args.ingredient_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("el ingrediente", &args.ingredient_name)));
        };

        let target = args.is_available.unwrap_or(!ingredient.is_available);
        let updated = self
            .repositories
            .ingredients
            .update(&ingredient.id, &IngredientPatch::availability(target))
            .await?;
        Ok(ToolResult::ok(
            TOOL,
            format!(
                "{}: {} → {}",
                updated.name,
                availability_label(ingredient.is_available),
                availability_label(updated.is_available)
            ),
        ))
    }

    async fn update_ingredient_info(&self, args: UpdateIngredientInfoArgs) -> ExecutorResult {
        const TOOL: &str = "update_ingredient_info";
        if args.min_stock_alert.is_some_and(|minimum| minimum < 0) {
            return Ok(ToolResult::failed(TOOL, "El mínimo de alerta no puede ser negativo."));
        }
        if args.extra_price.is_some_and(|price| price < Decimal::ZERO) {
            return Ok(ToolResult::failed(TOOL, "El precio como extra no puede ser negativo."));
        }
        let Some(ingredient) = self.find_ingredient(&args.ingredient_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("el ingrediente", &args.ingredient_name)));
        };

        let patch = IngredientPatch {
            name: non_blank(args.new_name),
            unit: non_blank(args.unit),
            min_stock_alert: args.min_stock_alert,
            extra_price: args.extra_price,
            is_sellable: args.is_sellable,
            ..IngredientPatch::default()
        };
        if patch == IngredientPatch::default() {
            return Ok(ToolResult::failed(
                TOOL,
                format!("No indicaste qué cambiar de {}.", ingredient.name),
            ));
        }

        let updated = self.repositories.ingredients.update(&ingredient.id, &patch).await?;
        let mut changes = Vec::new();
        if patch.name.is_some() {
            changes.push(format!("nombre: {} → {}", ingredient.name, updated.name));
        }
        if patch.unit.is_some() {
            changes.push(format!("unidad: {} → {}", ingredient.unit, updated.unit));
        }
        if patch.min_stock_alert.is_some() {
            changes.push(format!(
                "mínimo de alerta: {} → {}",
                optional_number(ingredient.min_stock_alert),
                optional_number(updated.min_stock_alert)
            ));
        }
        if patch.extra_price.is_some() {
            changes.push(format!(
                "precio como extra: {} → {}",
                money(ingredient.extra_price),
                money(updated.extra_price)
            ));
        }
        if patch.is_sellable.is_some() {
            changes.push(format!(
                "se vende como extra: {} → {}",
                yes_no(ingredient.is_sellable),
                yes_no(updated.is_sellable)
            ));
        }
        Ok(ToolResult::ok(TOOL, format!("Actualicé {} ({})", updated.name, changes.join(", "))))
    }

    async fn create_ingredient(&self, args: CreateIngredientArgs) -> ExecutorResult {
        const TOOL: &str = "create_ingredient";
        let name = args.name.trim().to_string();
        if name.is_empty() {
            return Ok(ToolResult::failed(TOOL, "El ingrediente necesita un nombre."));
        }
        if args.stock_quantity < 0 {
            return Ok(ToolResult::failed(TOOL, "El stock inicial no puede ser negativo."));
        }
        if args.extra_price.is_some_and(|price| price < Decimal::ZERO) {
            return Ok(ToolResult::failed(TOOL, "El precio como extra no puede ser negativo."));
        }

        let existing = self.repositories.ingredients.list_all().await?;
        if existing.iter().any(|ingredient| normalize(&ingredient.name) == normalize(&name)) {
            return Ok(ToolResult::failed(TOOL, format!("Ya existe un ingrediente llamado {name}.")));
        }

        let created = self
            .repositories
            .ingredients
            .create(NewIngredient {
                name,
                unit: args.unit.trim().to_string(),
                stock_quantity: args.stock_quantity,
                min_stock_alert: args.min_stock_alert,
                is_sellable: args.is_sellable.unwrap_or(false),
                extra_price: args.extra_price.unwrap_or(Decimal::ZERO),
            })
            .await?;
        Ok(ToolResult::ok(
            TOOL,
            format!(
                "Registré el ingrediente {} con {} {}",
                created.name, created.stock_quantity, created.unit
            ),
        ))
    }

    async fn toggle_product(&self, args: ToggleProductArgs) -> ExecutorResult {
        const TOOL: &str = "toggle_product";
        let Some(product) = self.find_product(&args.product_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("el producto", &args.product_name)));
        };

        let target = args.is_active.unwrap_or(!product.is_active);
        let patch = ProductPatch { is_active: Some(target), ..ProductPatch::default() };
        let updated = self.repositories.products.update(&product.id, &patch).await?;
        Ok(ToolResult::ok(
            TOOL,
            format!(
                "{}: {} → {}",
                updated.name,
                active_label(product.is_active),
                active_label(updated.is_active)
            ),
        ))
    }

    async fn toggle_product_featured(&self, args: ToggleProductFeaturedArgs) -> ExecutorResult {
        const TOOL: &str = "toggle_product_featured";
        let Some(product) = self.find_product(&args.product_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("el producto", &args.product_name)));
        };

        let target = args.is_featured.unwrap_or(!product.is_featured);
        let patch = ProductPatch { is_featured: Some(target), ..ProductPatch::default() };
        let updated = self.repositories.products.update(&product.id, &patch).await?;
        Ok(ToolResult::ok(
            TOOL,
            format!(
                "{}: destacado {} → {}",
                updated.name,
                yes_no(product.is_featured),
                yes_no(updated.is_featured)
            ),
        ))
    }

    async fn update_product(&self, args: UpdateProductArgs) -> ExecutorResult {
        const TOOL: &str = "update_product";
        if let Some(price) = args.price.filter(|price| *price <= Decimal::ZERO) {
            return Ok(ToolResult::failed(
                TOOL,
                format!("El precio debe ser mayor que cero (recibí {}).", money(price)),
            ));
        }
        if args.stock_quantity.is_some_and(|stock| stock < 0) {
            return Ok(ToolResult::failed(TOOL, "El stock no puede ser negativo."));
        }
        if args.min_stock_alert.is_some_and(|minimum| minimum < 0) {
            return Ok(ToolResult::failed(TOOL, "El mínimo de alerta no puede ser negativo."));
        }
        let Some(product) = self.find_product(&args.product_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("el producto", &args.product_name)));
        };

        let patch = ProductPatch {
            name: non_blank(args.new_name),
            description: args.description,
            category: non_blank(args.category),
            price: args.price,
            stock_quantity: args.stock_quantity,
            min_stock_alert: args.min_stock_alert,
            ..ProductPatch::default()
        };
        if patch == ProductPatch::default() {
            return Ok(ToolResult::failed(
                TOOL,
                format!("No indicaste qué cambiar de {}.", product.name),
            ));
        }

        let updated = self.repositories.products.update(&product.id, &patch).await?;
        let mut changes = Vec::new();
        if patch.price.is_some() {
            changes.push(format!("precio: {} → {}", money(product.price), money(updated.price)));
        }
        if patch.name.is_some() {
            changes.push(format!("nombre: {} → {}", product.name, updated.name));
        }
        if patch.category.is_some() {
            changes.push(format!("categoría: {} → {}", product.category, updated.category));
        }
        if patch.description.is_some() {
            changes.push("descripción actualizada".to_string());
        }
        if patch.stock_quantity.is_some() {
            changes.push(format!(
                "stock: {} → {}",
                optional_number(product.stock_quantity),
                optional_number(updated.stock_quantity)
            ));
        }
        if patch.min_stock_alert.is_some() {
            changes.push(format!(
                "mínimo de alerta: {} → {}",
                optional_number(product.min_stock_alert),
                optional_number(updated.min_stock_alert)
            ));
        }
        Ok(ToolResult::ok(TOOL, format!("Actualicé {} ({})", updated.name, changes.join(", "))))
    }

    async fn create_product(&self, args: CreateProductArgs) -> ExecutorResult {
        const TOOL: &str = "create_product";
        let name = args.name.trim().to_string();
        if name.is_empty() {
            return Ok(ToolResult::failed(TOOL, "El producto necesita un nombre."));
        }
        if args.price <= Decimal::ZERO {
            return Ok(ToolResult::failed(
                TOOL,
                format!("El precio debe ser mayor que cero (recibí {}).", money(args.price)),
            ));
        }
        if args.stock_quantity.is_some_and(|stock| stock < 0) {
            return Ok(ToolResult::failed(TOOL, "El stock no puede ser negativo."));
        }

        let existing = self.repositories.products.list_all().await?;
        if existing.iter().any(|product| normalize(&product.name) == normalize(&name)) {
            return Ok(ToolResult::failed(TOOL, format!("Ya existe un producto llamado {name}.")));
        }

        let created = self
            .repositories
            .products
            .create(NewProduct {
                name,
                description: args.description.unwrap_or_default(),
                category: args.category.trim().to_lowercase(),
                price: args.price,
                is_combo: args.is_combo.unwrap_or(false),
                principal_ingredient: non_blank(args.principal_ingredient),
                stock_quantity: args.stock_quantity,
            })
            .await?;
        Ok(ToolResult::ok(
            TOOL,
            format!(
                "Agregué {} ({}) al menú a {}",
                created.name,
                created.category,
                money(created.price)
            ),
        ))
    }

    async fn delete_product(&self, args: ProductNameArgs) -> ExecutorResult {
        const TOOL: &str = "delete_product";
        let Some(product) = self.find_product(&args.product_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("el producto", &args.product_name)));
        };

        if self.repositories.products.delete(&product.id).await? {
            Ok(ToolResult::ok(TOOL, format!("Eliminé {} del menú.", product.name)))
        } else {
            Ok(ToolResult::failed(TOOL, format!("{} ya no estaba en el menú.", product.name)))
        }
    }

    async fn get_product_details(&self, args: ProductNameArgs) -> ExecutorResult {
        const TOOL: &str = "get_product_details";
        let Some(product) = self.find_product(&args.product_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("el producto", &args.product_name)));
        };

        let mut lines = vec![
            format!("{} ({})", product.name, product.category),
            format!("Precio: {}", money(product.price)),
            format!("Estado: {}", active_label(product.is_active)),
            format!("Destacado: {}", yes_no(product.is_featured)),
            format!(
                "Stock: {}",
                product
                    .stock_quantity
                    .map_or_else(|| "se prepara al momento".to_string(), |stock| stock.to_string())
            ),
        ];
        if product.is_combo {
            lines.push("Combo: incluye bebida".to_string());
        }
        if let Some(principal) = &product.principal_ingredient {
            lines.push(format!("Ingrediente principal: {principal}"));
        }
        if !product.description.trim().is_empty() {
            lines.push(format!("Descripción: {}", product.description.trim()));
        }
        Ok(ToolResult::ok(TOOL, lines.join("\n")))
    }

    async fn toggle_promotion(&self, args: TogglePromotionArgs) -> ExecutorResult {
        const TOOL: &str = "toggle_promotion";
        let Some(promotion) = self.find_promotion(&args.promotion_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("la promoción", &args.promotion_name)));
        };

        let target = args.is_active.unwrap_or(!promotion.is_active);
        let patch = PromotionPatch { is_active: Some(target), ..PromotionPatch::default() };
        let updated = self.repositories.promotions.update(&promotion.id, &patch).await?;
        Ok(ToolResult::ok(
            TOOL,
            format!(
                "Promoción {}: {} → {}",
                updated.name,
                active_label(promotion.is_active),
                active_label(updated.is_active)
            ),
        ))
    }

    async fn create_promotion(&self, args: CreatePromotionArgs) -> ExecutorResult {
        const TOOL: &str = "create_promotion";
        let name = args.name.trim().to_string();
        if name.is_empty() {
            return Ok(ToolResult::failed(TOOL, "La promoción necesita un nombre."));
        }
        let discount_type = match args.discount_type.parse::<DiscountType>() {
            Ok(discount_type) => discount_type,
            Err(_) => return Ok(ToolResult::failed(TOOL, unknown_discount_type(&args.discount_type))),
        };
        if let Err(error) = validate_discount(discount_type, args.discount_value) {
            return Ok(ToolResult::failed(TOOL, invariant_message(&error)));
        }
        let min_purchase = args.min_purchase.unwrap_or(Decimal::ZERO);
        if min_purchase < Decimal::ZERO {
            return Ok(ToolResult::failed(TOOL, "La compra mínima no puede ser negativa."));
        }

        let created = self
            .repositories
            .promotions
            .create(NewPromotion {
                name,
                description: args.description.unwrap_or_default(),
                discount_type,
                discount_value: args.discount_value,
                min_purchase,
                starts_at: None,
                ends_at: None,
            })
            .await?;
        Ok(ToolResult::ok(
            TOOL,
            format!(
                "Creé la promoción {}: {} (compra mínima {})",
                created.name,
                created.describe_discount(),
                money(created.min_purchase)
            ),
        ))
    }

    async fn update_promotion(&self, args: UpdatePromotionArgs) -> ExecutorResult {
        const TOOL: &str = "update_promotion";
        let discount_type = match args.discount_type.as_deref().map(str::parse::<DiscountType>) {
            None => None,
            Some(Ok(discount_type)) => Some(discount_type),
            Some(Err(_)) => {
                let raw = args.discount_type.as_deref().unwrap_or_default();
                return Ok(ToolResult::failed(TOOL, unknown_discount_type(raw)));
            }
        };
        if args.min_purchase.is_some_and(|minimum| minimum < Decimal::ZERO) {
            return Ok(ToolResult::failed(TOOL, "La compra mínima no puede ser negativa."));
        }
        let Some(promotion) = self.find_promotion(&args.promotion_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("la promoción", &args.promotion_name)));
        };

        let patch = PromotionPatch {
            name: non_blank(args.new_name),
            description: args.description,
            discount_type,
            discount_value: args.discount_value,
            min_purchase: args.min_purchase,
            ..PromotionPatch::default()
        };
        if patch == PromotionPatch::default() {
            return Ok(ToolResult::failed(
                TOOL,
                format!("No indicaste qué cambiar de la promoción {}.", promotion.name),
            ));
        }
        if let Err(error) = validate_discount(
            patch.discount_type.unwrap_or(promotion.discount_type),
            patch.discount_value.unwrap_or(promotion.discount_value),
        ) {
            return Ok(ToolResult::failed(TOOL, invariant_message(&error)));
        }

        let updated = self.repositories.promotions.update(&promotion.id, &patch).await?;
        let mut changes = Vec::new();
        if patch.name.is_some() {
            changes.push(format!("nombre: {} → {}", promotion.name, updated.name));
        }
        if patch.discount_type.is_some() || patch.discount_value.is_some() {
            changes.push(format!(
                "descuento: {} → {}",
                promotion.describe_discount(),
                updated.describe_discount()
            ));
        }
        if patch.min_purchase.is_some() {
            changes.push(format!(
                "compra mínima: {} → {}",
                money(promotion.min_purchase),
                money(updated.min_purchase)
            ));
        }
        if patch.description.is_some() {
            changes.push("descripción actualizada".to_string());
        }
        Ok(ToolResult::ok(
            TOOL,
            format!("Actualicé la promoción {} ({})", updated.name, changes.join(", ")),
        ))
    }

    async fn delete_promotion(&self, args: PromotionNameArgs) -> ExecutorResult {
        const TOOL: &str = "delete_promotion";
        let Some(promotion) = self.find_promotion(&args.promotion_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("la promoción", &args.promotion_name)));
        };

        if self.repositories.promotions.delete(&promotion.id).await? {
            Ok(ToolResult::ok(TOOL, format!("Eliminé la promoción {}.", promotion.name)))
        } else {
            Ok(ToolResult::failed(TOOL, format!("La promoción {} ya no existía.", promotion.name)))
        }
    }

    async fn update_order_status(&self, args: UpdateOrderStatusArgs) -> ExecutorResult {
        const TOOL: &str = "update_order_status";
        let status = match args.status.parse::<OrderStatus>() {
            Ok(status) => status,
            Err(_) => {
                return Ok(ToolResult::failed(
                    TOOL,
                    format!(
                        "No reconozco el estado \"{}\". Usa pending, confirmed, preparing, ready, delivered o cancelled.",
                        args.status
                    ),
                ))
            }
        };
        let Some(order) = self.find_order(&args.order_identifier).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("el pedido", &args.order_identifier)));
        };

        let previous = order.status;
        let mut next = order.clone();
        if next.transition_to(status).is_err() {
            return Ok(ToolResult::failed(
                TOOL,
                format!(
                    "El pedido {} está {} y no puede pasar a {}.",
                    order.order_number,
                    previous.label_es(),
                    status.label_es()
                ),
            ));
        }

        self.repositories.orders.update_status(&order.id, status, self.clock.now()).await?;
        Ok(ToolResult::ok(
            TOOL,
            format!(
                "Pedido {} ({}): {} → {}",
                order.order_number,
                order.customer.name,
                previous.label_es(),
                status.label_es()
            ),
        ))
    }

    async fn get_order_details(&self, args: OrderIdentifierArgs) -> ExecutorResult {
        const TOOL: &str = "get_order_details";
        let Some(order) = self.find_order(&args.order_identifier).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("el pedido", &args.order_identifier)));
        };

        let mut lines = vec![
            format!("Pedido {} ({})", order.order_number, order.status.label_es()),
            format!(
                "Cliente: {}{}",
                order.customer.name,
                order.customer.email.as_deref().map(|email| format!(" <{email}>")).unwrap_or_default()
            ),
            format!("Creado: {}", order.created_at.format("%Y-%m-%d %H:%M")),
        ];
        for item in &order.items {
            lines.push(format!(
                "- {} x{}: {}",
                item.item_name,
                item.quantity,
                money(item.line_total())
            ));
        }
        if order.discount > Decimal::ZERO {
            lines.push(format!("Descuento: -{}", money(order.discount)));
        }
        lines.push(format!("Total: {}", money(order.total)));
        if let Some(notes) = order.notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
            lines.push(format!("Notas: {notes}"));
        }
        Ok(ToolResult::ok(TOOL, lines.join("\n")))
    }

    async fn get_active_orders(&self) -> ExecutorResult {
        const TOOL: &str = "get_active_orders";
        let orders = self.repositories.orders.list(&OrderFilter::active()).await?;
        if orders.is_empty() {
            return Ok(ToolResult::ok(TOOL, "No hay pedidos activos en este momento."));
        }

        let mut lines = vec![format!("Hay {} pedidos activos:", orders.len())];
        for order in orders.iter().take(ACTIVE_ORDERS_SHOWN) {
            lines.push(format!(
                "- {} | {} | {} | {} artículos | {}",
                order.order_number,
                order.customer.name,
                order.status.label_es(),
                order.item_count(),
                money(order.total)
            ));
        }
        if orders.len() > ACTIVE_ORDERS_SHOWN {
            lines.push(format!("... y {} más", orders.len() - ACTIVE_ORDERS_SHOWN));
        }
        Ok(ToolResult::ok(TOOL, lines.join("\n")))
    }

    async fn analyze_stock(&self) -> ExecutorResult {
        const TOOL: &str = "analyze_stock";
        let products = self.repositories.products.list_all().await?;
        let ingredients = self.repositories.ingredients.list_all().await?;
        let snapshot = AlertSnapshot::compute(&products, &ingredients, self.low_stock_threshold);

        if !snapshot.has_alerts() {
            return Ok(ToolResult::ok(TOOL, "Todo el inventario está en niveles normales."));
        }
        Ok(ToolResult::ok(TOOL, render_message(&snapshot)))
    }

    async fn get_sales_by_period(&self, args: SalesByPeriodArgs) -> ExecutorResult {
        const TOOL: &str = "get_sales_by_period";
        let period = match args.period.parse::<SalesPeriod>() {
            Ok(period) => period,
            Err(message) => return Ok(ToolResult::failed(TOOL, message)),
        };

        let now = self.clock.now();
        let orders = self.repositories.orders.list(&OrderFilter::since(period.since(now))).await?;
        let summary = SalesSummary::for_period(&orders, period, now);

        let mut lines = vec![
            format!("Ventas de {}:", period.label_es()),
            format!("- Pedidos: {}", summary.order_count),
            format!("- Ingresos: {}", money(summary.revenue)),
            format!("- Ticket promedio: {}", money(summary.average_ticket)),
        ];
        if !summary.top_items.is_empty() {
            lines.push("Más vendidos:".to_string());
            for (position, item) in summary.top_items.iter().enumerate() {
                lines.push(format!(
                    "{}. {} ({} unidades, {})",
                    position + 1,
                    item.name,
                    item.units,
                    money(item.revenue)
                ));
            }
        }
        Ok(ToolResult::ok(TOOL, lines.join("\n")))
    }

    async fn get_product_sales(&self, args: ProductSalesArgs) -> ExecutorResult {
        const TOOL: &str = "get_product_sales";
        let period = match args.period.as_deref().map(str::parse::<SalesPeriod>) {
            None => SalesPeriod::Week,
            Some(Ok(period)) => period,
            Some(Err(message)) => return Ok(ToolResult::failed(TOOL, message)),
        };
        let Some(product) = self.find_product(&args.product_name).await? else {
            return Ok(ToolResult::failed(TOOL, not_found("el producto", &args.product_name)));
        };

        let now = self.clock.now();
        let orders = self.repositories.orders.list(&OrderFilter::since(period.since(now))).await?;
        let tally = product_sales(&orders, &product.name, period, now);
        Ok(ToolResult::ok(
            TOOL,
            format!(
                "{} en {}: {} unidades, {} en ingresos",
                product.name,
                period.label_es(),
                tally.units,
                money(tally.revenue)
            ),
        ))
    }
}

fn not_found(entity: &str, query: &str) -> String {
    format!("No encontré {entity} \"{}\".", query.trim())
}

fn unknown_discount_type(raw: &str) -> String {
    format!("No reconozco el tipo de descuento \"{raw}\". Usa percentage o fixed.")
}

fn invariant_message(error: &mesero_core::errors::DomainError) -> String {
    match error {
        mesero_core::errors::DomainError::InvariantViolation(message) => {
            let mut message = message.clone();
            if let Some(first) = message.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            format!("{message}.")
        }
        other => other.to_string(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}

fn optional_number(value: Option<i64>) -> String {
    value.map_or_else(|| "sin definir".to_string(), |value| value.to_string())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "sí"
    } else {
        "no"
    }
}

fn active_label(active: bool) -> &'static str {
    if active {
        "activo"
    } else {
        "inactivo"
    }
}

fn availability_label(available: bool) -> &'static str {
    if available {
        "disponible"
    } else {
        "no disponible"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    use mesero_core::cache::ManualClock;
    use mesero_core::domain::order::{CustomerInfo, Order, OrderId, OrderItem, OrderStatus};
    use mesero_core::domain::promotion::{DiscountType, Promotion, PromotionId};
    use mesero_core::metrics::InMemoryMetricsSink;
    use mesero_db::repositories::{
        InMemoryChatRepository, InMemoryIngredientRepository, InMemoryOrderRepository,
        InMemoryProductRepository, InMemoryPromotionRepository,
    };
    use mesero_db::OrderFilter;

    use super::ToolExecutor;
    use crate::llm::FunctionCall;
    use crate::testing::{sample_ingredient, sample_product};
    use crate::tools::AdminTool;
    use crate::Repositories;

    fn order(id: &str, number: &str, customer: &str, status: OrderStatus, age_hours: i64) -> Order {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).single().expect("valid date")
            - Duration::hours(age_hours);
        Order {
            id: OrderId(id.to_string()),
            order_number: number.to_string(),
            customer: CustomerInfo {
                name: customer.to_string(),
                email: Some(format!("{}@example.com", customer.to_lowercase())),
                phone: None,
            },
            status,
            items: vec![OrderItem {
                item_id: "prod-hotdog".to_string(),
                item_name: "Hot Dog".to_string(),
                quantity: 2,
                unit_price: Decimal::new(350, 2),
                customizations: None,
            }],
            subtotal: Decimal::new(700, 2),
            discount: Decimal::ZERO,
            total: Decimal::new(700, 2),
            applied_promotion: None,
            notes: None,
            created_at,
            updated_at: created_at,
        }
    }

    struct Harness {
        executor: ToolExecutor,
        repositories: Repositories,
        metrics: Arc<InMemoryMetricsSink>,
    }

    fn harness() -> Harness {
        let mut hot_dog = sample_product("prod-hotdog", "Hot Dog", "comida", 350);
        hot_dog.stock_quantity = Some(12);
        let repositories = Repositories {
            products: Arc::new(InMemoryProductRepository::with_products([
                hot_dog,
                sample_product("prod-papas", "Papas Fritas", "acompañamientos", 299),
            ])),
            ingredients: Arc::new(InMemoryIngredientRepository::with_ingredients([
                sample_ingredient("ing-queso", "Queso cheddar", 12),
                sample_ingredient("ing-tomate", "Tomate", 3),
            ])),
            promotions: Arc::new(InMemoryPromotionRepository::with_promotions([Promotion {
                id: PromotionId("promo-martes".to_string()),
                name: "Martes de descuento".to_string(),
                description: String::new(),
                discount_type: DiscountType::Percentage,
                discount_value: Decimal::from(10),
                min_purchase: Decimal::from(20),
                is_active: true,
                starts_at: None,
                ends_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }])),
            orders: Arc::new(InMemoryOrderRepository::with_orders([
                order("order-1", "ORD-20260310-AAAA", "Ana", OrderStatus::Ready, 5),
                order("order-2", "ORD-20260310-BBBB", "Luis", OrderStatus::Pending, 1),
                order("order-3", "ORD-20260309-CCCC", "Marta", OrderStatus::Delivered, 30),
            ])),
            chat: Arc::new(InMemoryChatRepository::default()),
        };
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 18, 30, 0).single().expect("valid date"),
        ));
        let metrics = Arc::new(InMemoryMetricsSink::default());
        let executor = ToolExecutor::new(repositories.clone(), 5, clock, metrics.clone());
        Harness { executor, repositories, metrics }
    }

    async fn run(harness: &Harness, name: &str, args: serde_json::Value) -> super::ToolResult {
        harness
            .executor
            .execute_call(&FunctionCall { name: name.to_string(), args }, "test-correlation")
            .await
    }

    #[tokio::test]
    async fn stock_update_resolves_partial_names_and_reports_before_and_after() {
        let harness = harness();
        let result = run(
            &harness,
            "update_ingredient_stock",
            json!({ "ingredient_name": "queso", "quantity": 50 }),
        )
        .await;

        assert!(result.success, "{}", result.description);
        assert_eq!(result.kind, "update_ingredient_stock");
        assert!(result.description.contains("12 → 50"));

        let ingredients = harness.repositories.ingredients.list_all().await.expect("list");
        let queso = ingredients.iter().find(|item| item.name == "Queso cheddar").expect("queso");
        assert_eq!(queso.stock_quantity, 50);
    }

    #[tokio::test]
    async fn bulk_update_keeps_successes_when_one_item_fails() {
        let harness = harness();
        let result = run(
            &harness,
            "bulk_update_ingredient_stock",
            json!({ "updates": [
                { "ingredient_name": "tomate", "quantity": 40 },
                { "ingredient_name": "unicornio", "quantity": 10 }
            ] }),
        )
        .await;

        assert!(result.success);
        assert!(result.description.starts_with("Actualicé 1 de 2"));
        assert_eq!(result.description.matches("- OK").count(), 1);
        assert_eq!(result.description.matches("- ERROR").count(), 1);
        assert!(result.description.contains("No encontré el ingrediente \"unicornio\""));

        let ingredients = harness.repositories.ingredients.list_all().await.expect("list");
        let tomate = ingredients.iter().find(|item| item.name == "Tomate").expect("tomate");
        assert_eq!(tomate.stock_quantity, 40);
    }

    #[tokio::test]
    async fn bulk_update_fails_when_nothing_succeeds() {
        let harness = harness();
        let result = run(
            &harness,
            "bulk_update_ingredient_stock",
            json!({ "updates": [{ "ingredient_name": "queso", "quantity": -3 }] }),
        )
        .await;

        assert!(!result.success);
        assert!(result.description.contains("no puede ser negativa"));
    }

    #[tokio::test]
    async fn unknown_names_are_failed_results_not_errors() {
        let harness = harness();
        let result = run(&harness, "toggle_product", json!({ "product_name": "Sushi" })).await;
        assert!(!result.success);
        assert_eq!(result.description, "No encontré el producto \"Sushi\".");

        let result = run(&harness, "launch_rockets", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.kind, "launch_rockets");

        let snapshot = harness.metrics.snapshot();
        assert_eq!(snapshot.tool_failures.get("toggle_product"), Some(&1));
        assert_eq!(snapshot.tool_failures.get("launch_rockets"), Some(&1));
    }

    #[tokio::test]
    async fn price_changes_are_validated_and_audited() {
        let harness = harness();
        let rejected = run(
            &harness,
            "update_product",
            json!({ "product_name": "hot dog", "price": 0 }),
        )
        .await;
        assert!(!rejected.success);

        let accepted = run(
            &harness,
            "update_product",
            json!({ "product_name": "hot dog", "price": "4.25" }),
        )
        .await;
        assert!(accepted.success, "{}", accepted.description);
        assert!(accepted.description.contains("precio: $3.50 → $4.25"));
    }

    #[tokio::test]
    async fn last_order_sentinel_targets_the_newest_order() {
        let harness = harness();
        let result = run(
            &harness,
            "update_order_status",
            json!({ "order_identifier": "last", "status": "preparando" }),
        )
        .await;

        assert!(result.success, "{}", result.description);
        assert!(result.description.contains("ORD-20260310-BBBB"));
        let active = harness.repositories.orders.list(&OrderFilter::active()).await.expect("list");
        let luis = active.iter().find(|order| order.customer.name == "Luis").expect("luis");
        assert_eq!(luis.status, OrderStatus::Preparing);
    }

    #[tokio::test]
    async fn order_lookup_by_number_fragment_and_customer() {
        let harness = harness();
        let by_number =
            run(&harness, "get_order_details", json!({ "order_identifier": "aaaa" })).await;
        assert!(by_number.success);
        assert!(by_number.description.contains("Ana"));

        let by_customer =
            run(&harness, "get_order_details", json!({ "order_identifier": "marta@example" })).await;
        assert!(by_customer.success);
        assert!(by_customer.description.contains("ORD-20260309-CCCC"));
    }

    #[tokio::test]
    async fn invalid_transitions_leave_the_order_untouched() {
        let harness = harness();
        let result = run(
            &harness,
            "update_order_status",
            json!({ "order_identifier": "Marta", "status": "pending" }),
        )
        .await;

        assert!(!result.success);
        assert!(result.description.contains("está entregado"));
        let order = harness
            .repositories
            .orders
            .find_by_id(&OrderId("order-3".to_string()))
            .await
            .expect("find")
            .expect("order exists");
        assert_eq!(order.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn promotions_reject_out_of_range_percentages() {
        let harness = harness();
        let result = run(
            &harness,
            "create_promotion",
            json!({ "name": "Locura", "discount_type": "porcentaje", "discount_value": 150 }),
        )
        .await;
        assert!(!result.success);
        assert!(result.description.contains("100%"));

        let result = run(
            &harness,
            "update_promotion",
            json!({ "promotion_name": "martes", "discount_value": 15 }),
        )
        .await;
        assert!(result.success, "{}", result.description);
        assert!(result.description.contains("10% de descuento → 15% de descuento"));
    }

    #[tokio::test]
    async fn analytics_read_live_orders() {
        let harness = harness();
        let sales = harness
            .executor
            .execute(
                AdminTool::from_call("get_sales_by_period", &json!({ "period": "today" }))
                    .expect("valid call"),
                "test-correlation",
            )
            .await;
        assert!(sales.success);
        assert!(sales.description.contains("- Pedidos: 2"));
        assert!(sales.description.contains("- Ingresos: $14.00"));

        let product = run(
            &harness,
            "get_product_sales",
            json!({ "product_name": "hot dog", "period": "month" }),
        )
        .await;
        assert!(product.success);
        assert!(product.description.contains("6 unidades"));

        let stock = run(&harness, "analyze_stock", json!({})).await;
        assert!(stock.success);
        assert!(stock.description.contains("Tomate"));
    }
}
