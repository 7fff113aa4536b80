use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use super::{Order, UploadedFile};
use crate::db::PgPool;
use crate::models::{NewOrderRow, OrderRow, STATUS_PENDING};
use crate::schema::orders;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub record_id: String,
}

/// What the status endpoint exposes about a stored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatus {
    pub order_id: String,
    pub status: String,
    pub submitted_at: NaiveDate,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_count: Option<usize>,
}

/// Tabular store holding one row per order.
///
/// Inserts never check for an existing row with the same order id.
#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    async fn create_order(&self, order: &Order, files: &[UploadedFile]) -> Result<CreatedOrder>;

    async fn find_order(&self, order_id: &str) -> Result<Option<OrderStatus>>;
}

pub struct PgOrderRepository {
    pool: PgPool,
    store_files_metadata: bool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool, store_files_metadata: bool) -> Self {
        Self {
            pool,
            store_files_metadata,
        }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(&self, order: &Order, files: &[UploadedFile]) -> Result<CreatedOrder> {
        let order_number: i64 = order
            .order_id
            .parse()
            .with_context(|| format!("order id {} is not numeric", order.order_id))?;
        let files = if self.store_files_metadata {
            Some(serde_json::to_value(files).context("failed to encode files metadata")?)
        } else {
            None
        };

        let row = NewOrderRow {
            id: Uuid::new_v4(),
            order_number,
            name: order.name.clone(),
            email: order.email.clone(),
            phone: order.phone.clone(),
            description: order.description.clone(),
            submitted_on: order.submitted_at,
            status: STATUS_PENDING.to_string(),
            files,
        };

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<CreatedOrder> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("database pool error: {err}"))?;
            diesel::insert_into(orders::table)
                .values(&row)
                .execute(&mut conn)
                .context("failed to insert order row")?;
            Ok(CreatedOrder {
                record_id: row.id.to_string(),
            })
        })
        .await
        .context("order insert task panicked")?
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<OrderStatus>> {
        // Identifiers are all digits; anything else cannot match a row.
        let Ok(order_number) = order_id.parse::<i64>() else {
            return Ok(None);
        };

        let pool = self.pool.clone();
        let row = tokio::task::spawn_blocking(move || -> Result<Option<OrderRow>> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("database pool error: {err}"))?;
            let row = orders::table
                .filter(orders::order_number.eq(order_number))
                .order(orders::created_at.asc())
                .first::<OrderRow>(&mut conn)
                .optional()
                .context("failed to look up order")?;
            Ok(row)
        })
        .await
        .context("order lookup task panicked")??;

        Ok(row.map(to_order_status))
    }
}

fn to_order_status(row: OrderRow) -> OrderStatus {
    OrderStatus {
        order_id: row.order_number.to_string(),
        status: row.status,
        submitted_at: row.submitted_on,
        created_at: to_iso(row.created_at),
        updated_at: to_iso(row.updated_at),
        files_count: row
            .files
            .as_ref()
            .and_then(|files| files.as_array())
            .map(|files| files.len()),
    }
}

fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
