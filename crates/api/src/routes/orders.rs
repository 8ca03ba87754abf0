//! Order checkout and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{CheckoutCoordinator, PlaceOrder};
use common::{OrderId, UserId};
use order_store::{MealCatalog, Order, OrderItem, OrderStatus, OrderStore};
use payment::{CardDetails, PaymentGateway, PaymentRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore + Clone, G: PaymentGateway> {
    pub coordinator: CheckoutCoordinator<S, G>,
    pub store: S,
    pub catalog: Arc<dyn MealCatalog>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub items: Vec<OrderItemRequest>,
    pub total_cents: i64,
    pub shipping_address: String,
    pub payment: PaymentDetailsRequest,
    pub idempotency_key: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub meal_id: i64,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct PaymentDetailsRequest {
    pub method: String,
    pub card_number: Option<String>,
    pub expiry: Option<String>,
    pub cvv: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub message: String,
    pub order_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub status: String,
}

#[derive(Serialize)]
pub struct UpdateStatusResponse {
    pub updated: bool,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: i64,
    pub user_id: i64,
    pub total_cents: i64,
    pub status: String,
    pub shipping_address: String,
    pub items: Vec<OrderItemResponse>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub meal_id: i64,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price_cents: Option<i64>,
}

// -- Handlers --

/// POST /orders — run the checkout saga for a new order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError>
where
    S: OrderStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let payment = parse_payment(&req.payment)?;

    let items: Vec<OrderItem> = req
        .items
        .iter()
        .map(|i| OrderItem::new(i.meal_id, i.quantity))
        .collect();

    let receipt = state
        .coordinator
        .place_order(PlaceOrder {
            user_id: UserId::new(req.user_id),
            items,
            total_price: common::Money::from_cents(req.total_cents),
            shipping_address: req.shipping_address,
            payment,
            idempotency_key: req.idempotency_key,
        })
        .await?;

    // A replay of an already-placed order is not a new resource.
    let status_code = if receipt.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((
        status_code,
        Json(CheckoutResponse {
            success: true,
            message: receipt.message,
            order_id: receipt.order_id.as_i64(),
            payment_id: receipt.payment_id,
            status: receipt.status.as_str().to_string(),
        }),
    ))
}

/// POST /orders/:id/status — administrative status update.
///
/// Goes through the same state machine as the saga; an unreachable
/// transition is a conflict, not a write.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, ApiError>
where
    S: OrderStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown order status '{}'", req.status)))?;

    let updated = state.store.update_status(OrderId::new(id), status).await?;

    Ok(Json(UpdateStatusResponse { updated }))
}

/// GET /orders/:id — load one order with catalog-enriched items.
#[tracing::instrument(skip(state))]
pub async fn get<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: OrderStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let order = state
        .store
        .get_order(OrderId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    let response = to_order_response(&order, state.catalog.as_ref()).await?;
    Ok(Json(response))
}

/// GET /users/:user_id/orders — a user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_user<S, G>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    S: OrderStore + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let orders = state.store.get_orders_for_user(UserId::new(user_id)).await?;

    let mut responses = Vec::with_capacity(orders.len());
    for order in &orders {
        responses.push(to_order_response(order, state.catalog.as_ref()).await?);
    }

    Ok(Json(responses))
}

fn parse_payment(req: &PaymentDetailsRequest) -> Result<PaymentRequest, ApiError> {
    match req.method.as_str() {
        "cash" => Ok(PaymentRequest::Cash),
        "card" => {
            let (Some(card_number), Some(expiry), Some(cvv)) =
                (&req.card_number, &req.expiry, &req.cvv)
            else {
                return Err(ApiError::BadRequest(
                    "card payments require card_number, expiry, and cvv".to_string(),
                ));
            };
            Ok(PaymentRequest::Card(CardDetails {
                card_number: card_number.clone(),
                expiry: expiry.clone(),
                cvv: cvv.clone(),
            }))
        }
        _ => Err(ApiError::BadRequest("invalid payment method".to_string())),
    }
}

/// Builds an order response, enriching each line item with the meal's
/// display name and unit price when the catalog knows it. The stored
/// total is returned as-is, never recomputed from the catalog.
async fn to_order_response(
    order: &Order,
    catalog: &dyn MealCatalog,
) -> Result<OrderResponse, ApiError> {
    let mut items = Vec::with_capacity(order.items.len());
    for item in &order.items {
        let meal = catalog.get_meal(item.meal_id).await?;
        items.push(OrderItemResponse {
            meal_id: item.meal_id.as_i64(),
            quantity: item.quantity,
            meal_name: meal.as_ref().map(|m| m.name.clone()),
            unit_price_cents: meal.as_ref().map(|m| m.price.cents()),
        });
    }

    Ok(OrderResponse {
        order_id: order.order_id.as_i64(),
        user_id: order.user_id.as_i64(),
        total_cents: order.total_price.cents(),
        status: order.status.as_str().to_string(),
        shipping_address: order.shipping_address.clone(),
        items,
        created_at: order.created_at.to_rfc3339(),
    })
}
