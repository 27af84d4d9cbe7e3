//! Order history aggregates: best sellers, customer preferences, sales per period.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Local, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::{Order, OrderStatus};
use crate::domain::product::Product;
use crate::menu::normalize;

const STANDING_CUSTOMIZATION_MIN_ORDERS: usize = 2;
const FAVOURITE_LIMIT: usize = 3;
pub const TOP_ITEMS_LIMIT: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPart {
    Morning,
    Midday,
    Afternoon,
    Night,
}

impl DayPart {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=15 => Self::Midday,
            16..=19 => Self::Afternoon,
            _ => Self::Night,
        }
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self::from_hour(instant.with_timezone(&Local).hour())
    }

    pub fn label_es(&self) -> &'static str {
        match self {
            Self::Morning => "mañana",
            Self::Midday => "mediodía",
            Self::Afternoon => "tarde",
            Self::Night => "noche",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTally {
    pub name: String,
    pub units: u32,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestSellers {
    pub items: Vec<ItemTally>,
}

impl BestSellers {
    pub fn from_orders(orders: &[Order], since: DateTime<Utc>, limit: usize) -> Self {
        let window = orders.iter().filter(|order| order.created_at >= since);
        Self { items: top_items(window, limit) }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What a returning customer usually orders. Built from that customer's own history only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub favourites: Vec<String>,
    pub standing_additions: Vec<String>,
    pub standing_removals: Vec<String>,
    pub never_ordered_categories: Vec<String>,
    pub usual_day_part: Option<DayPart>,
    pub order_count: usize,
}

impl PreferenceProfile {
    pub fn from_orders(orders: &[Order], menu: &[Product]) -> Self {
        let orders = orders
            .iter()
            .filter(|order| order.status != OrderStatus::Cancelled)
            .collect::<Vec<_>>();
        if orders.is_empty() {
            return Self::default();
        }

        let favourites = top_items(orders.iter().copied(), FAVOURITE_LIMIT)
            .into_iter()
            .map(|tally| tally.name)
            .collect();

        let mut additions: BTreeMap<String, HashSet<&str>> = BTreeMap::new();
        let mut removals: BTreeMap<String, HashSet<&str>> = BTreeMap::new();
        let mut ordered_items = HashSet::new();
        for order in &orders {
            for item in &order.items {
                ordered_items.insert(normalize(&item.item_name));
                let Some(customizations) = &item.customizations else {
                    continue;
                };
                for addition in &customizations.additions {
                    additions.entry(normalize(addition)).or_default().insert(order.id.0.as_str());
                }
                for removal in &customizations.removals {
                    removals.entry(normalize(removal)).or_default().insert(order.id.0.as_str());
                }
            }
        }

        let mut ordered_categories = HashSet::new();
        let mut menu_categories = Vec::new();
        for product in menu.iter().filter(|product| product.is_active) {
            let category = normalize(&product.category);
            if ordered_items.contains(&normalize(&product.name)) {
                ordered_categories.insert(category.clone());
            }
            if !menu_categories.contains(&category) {
                menu_categories.push(category);
            }
        }
        let never_ordered_categories = menu_categories
            .into_iter()
            .filter(|category| !ordered_categories.contains(category))
            .collect();

        let mut day_parts: HashMap<DayPart, usize> = HashMap::new();
        for order in &orders {
            *day_parts.entry(DayPart::at(order.created_at)).or_default() += 1;
        }
        let usual_day_part = [DayPart::Morning, DayPart::Midday, DayPart::Afternoon, DayPart::Night]
            .into_iter()
            .filter_map(|part| day_parts.get(&part).map(|count| (part, *count)))
            .fold(None, |best: Option<(DayPart, usize)>, (part, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((part, count)),
            })
            .map(|(part, _)| part);

        Self {
            favourites,
            standing_additions: standing(additions),
            standing_removals: standing(removals),
            never_ordered_categories,
            usual_day_part,
            order_count: orders.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }
}

fn standing(occurrences: BTreeMap<String, HashSet<&str>>) -> Vec<String> {
    occurrences
        .into_iter()
        .filter(|(_, orders)| orders.len() >= STANDING_CUSTOMIZATION_MIN_ORDERS)
        .map(|(name, _)| name)
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesPeriod {
    Today,
    Week,
    Month,
}

impl SalesPeriod {
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc())
                .unwrap_or(now),
            Self::Week => now - Duration::days(7),
            Self::Month => now - Duration::days(30),
        }
    }

    pub fn label_es(&self) -> &'static str {
        match self {
            Self::Today => "hoy",
            Self::Week => "los últimos 7 días",
            Self::Month => "los últimos 30 días",
        }
    }
}

impl std::str::FromStr for SalesPeriod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value).as_str() {
            "today" | "hoy" | "day" | "dia" => Ok(Self::Today),
            "week" | "semana" => Ok(Self::Week),
            "month" | "mes" => Ok(Self::Month),
            other => Err(format!("periodo desconocido `{other}` (usa today|week|month)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub period: SalesPeriod,
    pub order_count: usize,
    pub revenue: Decimal,
    pub average_ticket: Decimal,
    pub top_items: Vec<ItemTally>,
}

impl SalesSummary {
    pub fn for_period(orders: &[Order], period: SalesPeriod, now: DateTime<Utc>) -> Self {
        let since = period.since(now);
        let window = orders
            .iter()
            .filter(|order| order.created_at >= since && order.status != OrderStatus::Cancelled)
            .collect::<Vec<_>>();

        let revenue: Decimal = window.iter().map(|order| order.total).sum();
        let average_ticket = if window.is_empty() {
            Decimal::ZERO
        } else {
            (revenue / Decimal::from(window.len())).round_dp(2)
        };

        Self {
            period,
            order_count: window.len(),
            revenue,
            average_ticket,
            top_items: top_items(window.into_iter(), TOP_ITEMS_LIMIT),
        }
    }
}

/// Units and revenue of items whose name matches `product_name` after normalisation.
pub fn product_sales(
    orders: &[Order],
    product_name: &str,
    period: SalesPeriod,
    now: DateTime<Utc>,
) -> ItemTally {
    let since = period.since(now);
    let wanted = normalize(product_name);
    let mut tally = ItemTally { name: product_name.to_string(), units: 0, revenue: Decimal::ZERO };

    for order in orders
        .iter()
        .filter(|order| order.created_at >= since && order.status != OrderStatus::Cancelled)
    {
        for item in order.items.iter().filter(|item| normalize(&item.item_name) == wanted) {
            tally.units += item.quantity;
            tally.revenue += item.line_total();
        }
    }
    tally
}

fn top_items<'a, I>(orders: I, limit: usize) -> Vec<ItemTally>
where
    I: Iterator<Item = &'a Order>,
{
    let mut tallies: Vec<ItemTally> = Vec::new();
    for order in orders.filter(|order| order.status != OrderStatus::Cancelled) {
        for item in &order.items {
            match tallies.iter_mut().find(|tally| tally.name == item.item_name) {
                Some(tally) => {
                    tally.units += item.quantity;
                    tally.revenue += item.line_total();
                }
                None => tallies.push(ItemTally {
                    name: item.item_name.clone(),
                    units: item.quantity,
                    revenue: item.line_total(),
                }),
            }
        }
    }

    tallies.sort_by(|left, right| right.units.cmp(&left.units));
    tallies.truncate(limit);
    tallies
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{product_sales, BestSellers, DayPart, PreferenceProfile, SalesPeriod, SalesSummary};
    use crate::domain::order::{
        CustomerInfo, Customizations, Order, OrderId, OrderItem, OrderStatus,
    };
    use crate::domain::product::{Product, ProductId};

    fn item(name: &str, quantity: u32, removals: &[&str]) -> OrderItem {
        OrderItem {
            item_id: format!("p-{name}"),
            item_name: name.to_string(),
            quantity,
            unit_price: Decimal::from(5),
            customizations: (!removals.is_empty()).then(|| Customizations {
                removals: removals.iter().map(|value| value.to_string()).collect(),
                ..Customizations::default()
            }),
        }
    }

    fn order(id: &str, items: Vec<OrderItem>, status: OrderStatus, days_ago: i64) -> Order {
        let total = items.iter().map(OrderItem::line_total).sum();
        Order {
            id: OrderId(id.to_string()),
            order_number: format!("ORD-{id}"),
            customer: CustomerInfo {
                name: "Ana".to_string(),
                email: Some("ana@example.com".to_string()),
                phone: None,
            },
            status,
            items,
            subtotal: total,
            discount: Decimal::ZERO,
            total,
            applied_promotion: None,
            notes: None,
            created_at: Utc::now() - Duration::days(days_ago),
            updated_at: Utc::now(),
        }
    }

    fn menu_product(name: &str, category: &str) -> Product {
        Product {
            id: ProductId(format!("p-{name}")),
            name: name.to_string(),
            description: String::new(),
            category: category.to_string(),
            price: Decimal::from(5),
            is_active: true,
            is_featured: false,
            is_combo: false,
            principal_ingredient: None,
            stock_quantity: None,
            min_stock_alert: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn day_parts_follow_local_hour_ranges() {
        assert_eq!(DayPart::from_hour(5), DayPart::Morning);
        assert_eq!(DayPart::from_hour(12), DayPart::Midday);
        assert_eq!(DayPart::from_hour(19), DayPart::Afternoon);
        assert_eq!(DayPart::from_hour(23), DayPart::Night);
        assert_eq!(DayPart::from_hour(2).label_es(), "noche");
    }

    #[test]
    fn best_sellers_rank_by_units_and_skip_cancelled_or_old_orders() {
        let orders = vec![
            order("1", vec![item("Papas", 3, &[])], OrderStatus::Delivered, 1),
            order("2", vec![item("Hamburguesa", 2, &[])], OrderStatus::Delivered, 1),
            order("3", vec![item("Hamburguesa", 5, &[])], OrderStatus::Cancelled, 1),
            order("4", vec![item("Hot Dog", 9, &[])], OrderStatus::Delivered, 60),
        ];

        let best = BestSellers::from_orders(&orders, Utc::now() - Duration::days(30), 5);
        let names = best.items.iter().map(|tally| tally.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Papas", "Hamburguesa"]);
    }

    #[test]
    fn profile_detects_standing_removals_and_untried_categories() {
        let orders = vec![
            order("1", vec![item("Hamburguesa", 1, &["Cebolla"])], OrderStatus::Delivered, 3),
            order("2", vec![item("Hamburguesa", 1, &["cebolla", "pepinillos"])], OrderStatus::Delivered, 2),
        ];
        let menu = vec![menu_product("Hamburguesa", "hamburguesas"), menu_product("Sundae", "postres")];

        let profile = PreferenceProfile::from_orders(&orders, &menu);
        assert_eq!(profile.favourites, vec!["Hamburguesa".to_string()]);
        assert_eq!(profile.standing_removals, vec!["cebolla".to_string()]);
        assert_eq!(profile.never_ordered_categories, vec!["postres".to_string()]);
        assert!(profile.usual_day_part.is_some());
        assert_eq!(profile.order_count, 2);
    }

    #[test]
    fn sales_summary_counts_only_period_orders() {
        let orders = vec![
            order("1", vec![item("Papas", 2, &[])], OrderStatus::Delivered, 2),
            order("2", vec![item("Papas", 2, &[])], OrderStatus::Ready, 3),
            order("3", vec![item("Papas", 2, &[])], OrderStatus::Delivered, 20),
        ];

        let summary = SalesSummary::for_period(&orders, SalesPeriod::Week, Utc::now());
        assert_eq!(summary.order_count, 2);
        assert_eq!(summary.revenue, Decimal::from(20));
        assert_eq!(summary.average_ticket, Decimal::from(10));

        let sales = product_sales(&orders, "papas", SalesPeriod::Month, Utc::now());
        assert_eq!(sales.units, 6);
    }

    #[test]
    fn sales_period_parses_spanish_names() {
        assert_eq!("semana".parse::<SalesPeriod>().ok(), Some(SalesPeriod::Week));
        assert_eq!("Hoy".parse::<SalesPeriod>().ok(), Some(SalesPeriod::Today));
        assert!("año".parse::<SalesPeriod>().is_err());
    }
}
