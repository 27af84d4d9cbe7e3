//! Keyword responder used when the tool-calling model is unavailable.

use std::sync::Arc;

use tracing::warn;

use mesero_core::alerts::{render_message, AlertSnapshot};
use mesero_core::cache::Clock;
use mesero_core::insights::{SalesPeriod, SalesSummary};
use mesero_core::menu::{normalize, tokenize};
use mesero_db::{OrderFilter, RepositoryError};

use crate::Repositories;

const DEGRADED_MESSAGE: &str = "Estoy en modo básico y ahora mismo no puedo consultar los datos del \
restaurante. Intenta de nuevo en unos minutos.";

const HELP_MESSAGE: &str = "Estoy en modo básico. Puedo contarte cómo va el inventario \
(\"stock\"), las ventas de hoy (\"ventas\") o las promociones activas (\"promociones\"). \
Los cambios tendrán que esperar a que vuelva el asistente completo.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackIntent {
    Stock,
    Sales,
    Promotions,
    Greeting,
    Help,
}

const STOCK_PREFIXES: &[&str] =
    &["stock", "inventario", "agot", "ingrediente", "existencia", "falta", "queda"];
const SALES_PREFIXES: &[&str] = &["venta", "vend", "ingreso", "ganancia", "factur"];
const PROMOTION_PREFIXES: &[&str] = &["promo", "descuento", "oferta"];
const GREETING_WORDS: &[&str] = &["hola", "buenas", "buenos", "hey", "saludos", "que tal"];

impl FallbackIntent {
    /// Topic keywords win over greetings.
    pub fn classify(message: &str) -> Self {
        let normalized = normalize(message);
        let tokens = tokenize(&normalized)
            .into_iter()
            .map(|token| token.trim_matches(|character: char| !character.is_alphanumeric()))
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>();
        let mentions = |prefixes: &[&str]| {
            tokens.iter().any(|token| prefixes.iter().any(|prefix| token.starts_with(prefix)))
        };

        if mentions(STOCK_PREFIXES) {
            Self::Stock
        } else if mentions(SALES_PREFIXES) {
            Self::Sales
        } else if mentions(PROMOTION_PREFIXES) {
            Self::Promotions
        } else if GREETING_WORDS.iter().any(|word| {
            tokens.contains(word) || (word.contains(' ') && normalized.contains(word))
        }) {
            Self::Greeting
        } else {
            Self::Help
        }
    }
}

pub struct FallbackResponder {
    repositories: Repositories,
    low_stock_threshold: i64,
    clock: Arc<dyn Clock>,
}

impl FallbackResponder {
    pub fn new(repositories: Repositories, low_stock_threshold: i64, clock: Arc<dyn Clock>) -> Self {
        Self { repositories, low_stock_threshold, clock }
    }

    /// Never fails: when live reads break too, a static message is returned.
    pub async fn respond(&self, message: &str, correlation_id: &str) -> String {
        let intent = FallbackIntent::classify(message);
        match self.answer(intent).await {
            Ok(text) => text,
            Err(error) => {
                warn!(
                    event_name = "agent.admin.fallback_degraded",
                    correlation_id,
                    intent = ?intent,
                    error = %error,
                    "fallback responder could not read live data"
                );
                DEGRADED_MESSAGE.to_string()
            }
        }
    }

    async fn answer(&self, intent: FallbackIntent) -> Result<String, RepositoryError> {
        match intent {
            FallbackIntent::Stock => self.stock().await,
            FallbackIntent::Sales => self.sales().await,
            FallbackIntent::Promotions => self.promotions().await,
            FallbackIntent::Greeting => self.greeting().await,
            FallbackIntent::Help => Ok(HELP_MESSAGE.to_string()),
        }
    }

    async fn snapshot(&self) -> Result<AlertSnapshot, RepositoryError> {
        let products = self.repositories.products.list_all().await?;
        let ingredients = self.repositories.ingredients.list_all().await?;
        Ok(AlertSnapshot::compute(&products, &ingredients, self.low_stock_threshold))
    }

    async fn stock(&self) -> Result<String, RepositoryError> {
        let snapshot = self.snapshot().await?;
        if !snapshot.has_alerts() {
            return Ok("Todo el inventario está en niveles normales.".to_string());
        }
        Ok(render_message(&snapshot))
    }

    async fn sales(&self) -> Result<String, RepositoryError> {
        let now = self.clock.now();
        let period = SalesPeriod::Today;
        let orders = self.repositories.orders.list(&OrderFilter::since(period.since(now))).await?;
        let summary = SalesSummary::for_period(&orders, period, now);

        let mut text = format!(
            "Hoy llevamos {} pedidos con ${:.2} en ingresos (ticket promedio ${:.2}).",
            summary.order_count, summary.revenue, summary.average_ticket
        );
        if let Some(top) = summary.top_items.first() {
            text.push_str(&format!(" Lo más vendido: {} ({} unidades).", top.name, top.units));
        }
        Ok(text)
    }

    async fn promotions(&self) -> Result<String, RepositoryError> {
        let now = self.clock.now();
        let promotions = self.repositories.promotions.list_active().await?;
        let running = promotions
            .iter()
            .filter(|promotion| promotion.is_running_at(now))
            .map(|promotion| format!("- {}: {}", promotion.name, promotion.describe_discount()))
            .collect::<Vec<_>>();

        if running.is_empty() {
            return Ok("No hay promociones activas en este momento.".to_string());
        }
        Ok(format!("Promociones activas:\n{}", running.join("\n")))
    }

    async fn greeting(&self) -> Result<String, RepositoryError> {
        let snapshot = self.snapshot().await?;
        let active = self.repositories.orders.list(&OrderFilter::active()).await?;
        let counts = snapshot.critical_counts();
        Ok(format!(
            "¡Hola! Estoy en modo básico. Hay {} pedidos activos, {} productos y {} ingredientes \
             agotados. Pregúntame por el stock, las ventas o las promociones.",
            active.len(),
            counts.prod_agotados,
            counts.ing_agotados
        ))
    }
}
