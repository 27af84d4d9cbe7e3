//! System prompts rendered from the embedded `templates/prompts` files.

use serde::Serialize;
use tera::{Context, Tera};

use mesero_core::domain::chat::{ChatRole, ChatTurn};
use mesero_core::domain::ingredient::Ingredient;
use mesero_core::domain::product::Product;
use mesero_core::insights::{BestSellers, DayPart, PreferenceProfile};
use mesero_core::menu::is_denylisted_beverage;

use crate::error::AgentError;

const CUSTOMER_TEMPLATE: &str = "customer_system.tera";
const ADMIN_TEMPLATE: &str = "admin_system.tera";

pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    pub fn new() -> Result<Self, AgentError> {
        let mut tera = Tera::default();
        tera.add_raw_template(
            CUSTOMER_TEMPLATE,
            include_str!("../../../templates/prompts/customer_system.tera"),
        )?;
        tera.add_raw_template(
            ADMIN_TEMPLATE,
            include_str!("../../../templates/prompts/admin_system.tera"),
        )?;
        Ok(Self { tera })
    }

    pub fn customer(&self, context: &CustomerPromptContext) -> Result<String, AgentError> {
        Ok(self.tera.render(CUSTOMER_TEMPLATE, &Context::from_serialize(context)?)?)
    }

    pub fn admin(&self, context: &AdminPromptContext) -> Result<String, AgentError> {
        Ok(self.tera.render(ADMIN_TEMPLATE, &Context::from_serialize(context)?)?)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MenuLine {
    pub name: String,
    pub category: String,
    pub price: String,
    pub description: String,
    pub is_combo: bool,
    pub stock: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExtraLine {
    pub name: String,
    pub price: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LowStockLine {
    pub name: String,
    pub quantity: i64,
    pub unit: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProfileView {
    pub favourites: Vec<String>,
    pub standing_additions: Vec<String>,
    pub standing_removals: Vec<String>,
    pub never_ordered_categories: Vec<String>,
    pub usual_day_part: Option<String>,
}

impl From<&PreferenceProfile> for ProfileView {
    fn from(profile: &PreferenceProfile) -> Self {
        Self {
            favourites: profile.favourites.clone(),
            standing_additions: profile.standing_additions.clone(),
            standing_removals: profile.standing_removals.clone(),
            never_ordered_categories: profile.never_ordered_categories.clone(),
            usual_day_part: profile.usual_day_part.map(|part| part.label_es().to_string()),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TranscriptLine {
    pub speaker: &'static str,
    pub content: String,
}

/// Ingredients split the way the ordering prompt presents them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngredientPartition {
    pub unavailable: Vec<String>,
    pub low_stock: Vec<LowStockLine>,
    pub extras: Vec<Ingredient>,
}

impl IngredientPartition {
    pub fn from_ingredients(ingredients: &[Ingredient], default_threshold: i64) -> Self {
        let mut partition = Self::default();
        for ingredient in ingredients {
            if !ingredient.is_available || !ingredient.in_stock() {
                partition.unavailable.push(ingredient.name.clone());
                continue;
            }

            let threshold = ingredient.min_stock_alert.unwrap_or(default_threshold);
            if ingredient.stock_quantity <= threshold {
                partition.low_stock.push(LowStockLine {
                    name: ingredient.name.clone(),
                    quantity: ingredient.stock_quantity,
                    unit: ingredient.unit.clone(),
                });
            }
            if ingredient.is_orderable_extra() && !is_denylisted_beverage(&ingredient.name) {
                partition.extras.push(ingredient.clone());
            }
        }
        partition
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CustomerPromptContext {
    pub day_part: &'static str,
    pub menu: Vec<MenuLine>,
    pub sold_out: Vec<String>,
    pub extras: Vec<ExtraLine>,
    pub unavailable: Vec<String>,
    pub low_stock: Vec<LowStockLine>,
    pub best_sellers: Vec<String>,
    pub profile: Option<ProfileView>,
    pub transcript: Vec<TranscriptLine>,
}

impl CustomerPromptContext {
    pub fn build(
        products: &[Product],
        partition: &IngredientPartition,
        best_sellers: Option<&BestSellers>,
        profile: Option<&PreferenceProfile>,
        day_part: DayPart,
        history: &[ChatTurn],
    ) -> Self {
        let (available, sold_out): (Vec<&Product>, Vec<&Product>) = products
            .iter()
            .filter(|product| product.is_active)
            .partition(|product| product.stock_quantity.map_or(true, |stock| stock > 0));

        let menu = available
            .into_iter()
            .map(|product| MenuLine {
                name: product.name.clone(),
                category: product.category.clone(),
                price: format!("{:.2}", product.price),
                description: product.description.clone(),
                is_combo: product.is_combo,
                stock: product.stock_quantity,
            })
            .collect();

        let extras = partition
            .extras
            .iter()
            .map(|ingredient| ExtraLine {
                name: ingredient.name.clone(),
                price: format!("{:.2}", ingredient.extra_price),
            })
            .collect();

        Self {
            day_part: day_part.label_es(),
            menu,
            sold_out: sold_out.into_iter().map(|product| product.name.clone()).collect(),
            extras,
            unavailable: partition.unavailable.clone(),
            low_stock: partition.low_stock.clone(),
            best_sellers: best_sellers
                .map(|sellers| sellers.items.iter().map(|tally| tally.name.clone()).collect())
                .unwrap_or_default(),
            profile: profile.filter(|profile| !profile.is_empty()).map(ProfileView::from),
            transcript: history
                .iter()
                .map(|turn| TranscriptLine {
                    speaker: match turn.role {
                        ChatRole::User => "Cliente",
                        ChatRole::Assistant => "María",
                    },
                    content: turn.content.trim().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AdminPromptContext {
    pub day_part: &'static str,
    pub alerts: Option<String>,
}
