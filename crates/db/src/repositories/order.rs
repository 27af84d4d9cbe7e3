use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};

use mesero_core::domain::order::{
    CustomerInfo, Customizations, Order, OrderId, OrderItem, OrderStatus,
};
use mesero_core::domain::promotion::PromotionId;

use super::{
    decode_error, format_timestamp, parse_decimal, parse_timestamp, OrderFilter, OrderRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_id: &str) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT item_id, item_name, quantity, unit_price, customizations_json
             FROM order_items
             WHERE order_id = ?
             ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_item).collect()
    }
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<OrderItem, RepositoryError> {
    let quantity: i64 = row.try_get("quantity").map_err(decode_error)?;
    let unit_price: String = row.try_get("unit_price").map_err(decode_error)?;
    let customizations_json: Option<String> =
        row.try_get("customizations_json").map_err(decode_error)?;
    let customizations = customizations_json
        .as_deref()
        .map(serde_json::from_str::<Customizations>)
        .transpose()
        .map_err(decode_error)?;

    Ok(OrderItem {
        item_id: row.try_get("item_id").map_err(decode_error)?,
        item_name: row.try_get("item_name").map_err(decode_error)?,
        quantity: u32::try_from(quantity).map_err(decode_error)?,
        unit_price: parse_decimal(&unit_price)?,
        customizations,
    })
}

fn row_to_order(
    row: &sqlx::sqlite::SqliteRow,
    items: Vec<OrderItem>,
) -> Result<Order, RepositoryError> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    let subtotal: String = row.try_get("subtotal").map_err(decode_error)?;
    let discount: String = row.try_get("discount").map_err(decode_error)?;
    let total: String = row.try_get("total").map_err(decode_error)?;
    let applied_promotion: Option<String> =
        row.try_get("applied_promotion_id").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Order {
        id: OrderId(row.try_get("id").map_err(decode_error)?),
        order_number: row.try_get("order_number").map_err(decode_error)?,
        customer: CustomerInfo {
            name: row.try_get("customer_name").map_err(decode_error)?,
            email: row.try_get("customer_email").map_err(decode_error)?,
            phone: row.try_get("customer_phone").map_err(decode_error)?,
        },
        status: status.parse::<OrderStatus>().map_err(decode_error)?,
        items,
        subtotal: parse_decimal(&subtotal)?,
        discount: parse_decimal(&discount)?,
        total: parse_decimal(&total)?,
        applied_promotion: applied_promotion.map(PromotionId),
        notes: row.try_get("notes").map_err(decode_error)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

const ORDER_COLUMNS: &str = "id, order_number, customer_name, customer_email, customer_phone,
    status, subtotal, discount, total, applied_promotion_id, notes, created_at, updated_at";

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        query.push(" WHERE 1=1");

        if !filter.statuses.is_empty() {
            query.push(" AND status IN (");
            let mut separated = query.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(status.as_str());
            }
            query.push(")");
        }

        if let Some(since) = filter.since {
            query.push(" AND created_at >= ");
            query.push_bind(format_timestamp(since));
        }

        if let Some(email) = &filter.customer_email {
            query.push(" AND LOWER(customer_email) = LOWER(");
            query.push_bind(email.clone());
            query.push(")");
        }

        query.push(" ORDER BY created_at DESC, id DESC");

        if let Some(limit) = filter.limit {
            query.push(" LIMIT ");
            query.push_bind(i64::from(limit));
        }

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(decode_error)?;
            let items = self.load_items(&id).await?;
            orders.push(row_to_order(row, items)?);
        }

        Ok(orders)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items = self.load_items(&id.0).await?;
                row_to_order(&row, items).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn create(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, order_number, customer_name, customer_email, customer_phone,
                                 status, subtotal, discount, total, applied_promotion_id, notes,
                                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.order_number)
        .bind(&order.customer.name)
        .bind(&order.customer.email)
        .bind(&order.customer.phone)
        .bind(order.status.as_str())
        .bind(order.subtotal.to_string())
        .bind(order.discount.to_string())
        .bind(order.total.to_string())
        .bind(order.applied_promotion.as_ref().map(|id| id.0.clone()))
        .bind(&order.notes)
        .bind(format_timestamp(order.created_at))
        .bind(format_timestamp(order.updated_at))
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            let customizations = item
                .customizations
                .as_ref()
                .filter(|value| !value.is_empty())
                .map(serde_json::to_string)
                .transpose()
                .map_err(decode_error)?;

            sqlx::query(
                "INSERT INTO order_items (order_id, position, item_id, item_name, quantity,
                                          unit_price, customizations_json)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&order.id.0)
            .bind(i64::try_from(position).map_err(decode_error)?)
            .bind(&item.item_id)
            .bind(&item.item_name)
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.to_string())
            .bind(customizations)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(format_timestamp(updated_at))
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "order", id: id.0.clone() });
        }
        Ok(())
    }
}
