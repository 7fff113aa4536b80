use axum::extract::{Json, Path, State};
use serde::Serialize;
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::orders::repository::OrderStatus;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub success: bool,
    pub data: OrderStatus,
}

pub async fn order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<OrderStatusResponse>> {
    let orders = state
        .orders
        .clone()
        .ok_or_else(|| AppError::unavailable("order store is not configured"))?;

    match orders.find_order(&order_id).await {
        Ok(Some(status)) => Ok(Json(OrderStatusResponse {
            success: true,
            data: status,
        })),
        Ok(None) => Err(AppError::not_found(
            "ORDER_NOT_FOUND",
            format!("order {order_id} was not found"),
        )),
        Err(err) => {
            error!(%order_id, error = ?err, "order status lookup failed");
            Err(AppError::internal().with_order_id(Some(order_id)))
        }
    }
}
