//! Back-office routes. Deployed behind the auth proxy; everything here is
//! admin-only.

use super::{ApiResult, AppState};
use crate::bundles::{BundlePatch, NewBundle};
use crate::catalog::{NewProduct, ProductPatch, StockSummary};
use crate::entities::{bundle, order, premium_membership, product, product_variant, support_ticket};
use crate::pricing::{FlashSaleConfig, ProductDiscount};
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::NaiveDateTime;
use fulfillment::model::{MembershipStatus, ModelId, OrderStatus};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/{id}/approve", post(approve_order))
        .route("/orders/{id}/reject", post(reject_order))
        .route("/orders/{id}", delete(delete_order))
        .route("/products", post(create_product))
        .route("/products/{id}", put(update_product))
        .route("/products/{id}/variants", post(add_variant))
        .route("/products/{id}/stock-keys", post(upload_stock_keys))
        .route("/products/{id}/manual-stock", put(set_manual_stock))
        .route("/products/{id}/stock", get(stock_summary))
        .route("/flash-sale", put(save_flash_sale))
        .route("/bundles", post(create_bundle).get(list_bundles))
        .route("/bundles/{id}", put(update_bundle).delete(delete_bundle))
        .route("/memberships", get(list_memberships))
        .route("/memberships/{id}/approve", post(approve_membership))
        .route("/memberships/{id}/reject", post(reject_membership))
        .route("/memberships/{id}/revoke", post(revoke_membership))
        .route("/memberships/{id}/extend", post(extend_membership))
        .route("/memberships/{id}", delete(delete_membership))
        .route("/tickets", get(list_tickets))
        .route("/tickets/{id}/reply", post(reply_ticket))
        .route("/tickets/{id}/close", post(close_ticket))
}

#[derive(Deserialize)]
struct OrdersQuery {
    status: Option<OrderStatus>,
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> ApiResult<Vec<order::Model>> {
    Ok(Json(state.orders.list_by_status(query.status).await?))
}

#[derive(Deserialize, Default)]
struct ApproveRequest {
    /// Optional hand-filled credentials; key-delivery products default to
    /// the claimed stock key.
    credentials: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ApprovedOrder {
    id: ModelId,
    status: OrderStatus,
    total_amount: i64,
}

async fn approve_order(
    State(state): State<AppState>,
    Path(order_id): Path<ModelId>,
    Json(req): Json<ApproveRequest>,
) -> ApiResult<ApprovedOrder> {
    let approved = state.approval.approve(order_id, req.credentials).await?;
    Ok(Json(ApprovedOrder {
        id: approved.id,
        status: approved.status,
        total_amount: approved.total_amount,
    }))
}

#[derive(Deserialize)]
struct RejectRequest {
    reason: String,
}

async fn reject_order(
    State(state): State<AppState>,
    Path(order_id): Path<ModelId>,
    Json(req): Json<RejectRequest>,
) -> ApiResult<ApprovedOrder> {
    let rejected = state.approval.reject(order_id, &req.reason).await?;
    Ok(Json(ApprovedOrder {
        id: rejected.id,
        status: rejected.status,
        total_amount: rejected.total_amount,
    }))
}

async fn delete_order(
    State(state): State<AppState>,
    Path(order_id): Path<ModelId>,
) -> ApiResult<serde_json::Value> {
    state.orders.delete_order(order_id).await?;
    Ok(Json(serde_json::json!({ "deleted": order_id })))
}

async fn create_product(
    State(state): State<AppState>,
    Json(new): Json<NewProduct>,
) -> ApiResult<product::Model> {
    Ok(Json(state.catalog.create_product(new).await?))
}

async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<ModelId>,
    Json(patch): Json<ProductPatch>,
) -> ApiResult<product::Model> {
    Ok(Json(state.catalog.update_product(product_id, patch).await?))
}

#[derive(Deserialize)]
struct NewVariant {
    name: String,
    sale_price: i64,
}

async fn add_variant(
    State(state): State<AppState>,
    Path(product_id): Path<ModelId>,
    Json(req): Json<NewVariant>,
) -> ApiResult<product_variant::Model> {
    Ok(Json(
        state
            .catalog
            .add_variant(product_id, req.name, req.sale_price)
            .await?,
    ))
}

#[derive(Deserialize)]
struct StockKeysUpload {
    payloads: Vec<String>,
}

async fn upload_stock_keys(
    State(state): State<AppState>,
    Path(product_id): Path<ModelId>,
    Json(req): Json<StockKeysUpload>,
) -> ApiResult<serde_json::Value> {
    let count = state
        .catalog
        .upload_stock_keys(product_id, req.payloads)
        .await?;
    Ok(Json(serde_json::json!({ "uploaded": count })))
}

#[derive(Deserialize)]
struct ManualStock {
    count: i32,
}

async fn set_manual_stock(
    State(state): State<AppState>,
    Path(product_id): Path<ModelId>,
    Json(req): Json<ManualStock>,
) -> ApiResult<serde_json::Value> {
    state.catalog.set_manual_stock(product_id, req.count).await?;
    Ok(Json(serde_json::json!({ "manual_stock_count": req.count })))
}

async fn stock_summary(
    State(state): State<AppState>,
    Path(product_id): Path<ModelId>,
) -> ApiResult<StockSummary> {
    Ok(Json(state.catalog.stock_summary(product_id).await?))
}

#[derive(Deserialize)]
struct FlashSaleSave {
    enabled: bool,
    ends_at: Option<NaiveDateTime>,
    #[serde(default)]
    discounts: Vec<ProductDiscount>,
}

async fn save_flash_sale(
    State(state): State<AppState>,
    Json(req): Json<FlashSaleSave>,
) -> ApiResult<FlashSaleConfig> {
    Ok(Json(
        state
            .flash
            .save(req.enabled, req.ends_at, req.discounts)
            .await?,
    ))
}

async fn create_bundle(
    State(state): State<AppState>,
    Json(new): Json<NewBundle>,
) -> ApiResult<bundle::Model> {
    Ok(Json(state.bundles.create(new).await?))
}

async fn list_bundles(State(state): State<AppState>) -> ApiResult<Vec<bundle::Model>> {
    Ok(Json(state.bundles.list_all().await?))
}

async fn update_bundle(
    State(state): State<AppState>,
    Path(bundle_id): Path<ModelId>,
    Json(patch): Json<BundlePatch>,
) -> ApiResult<bundle::Model> {
    Ok(Json(state.bundles.update(bundle_id, patch).await?))
}

async fn delete_bundle(
    State(state): State<AppState>,
    Path(bundle_id): Path<ModelId>,
) -> ApiResult<serde_json::Value> {
    state.bundles.delete(bundle_id).await?;
    Ok(Json(serde_json::json!({ "deleted": bundle_id })))
}

#[derive(Deserialize)]
struct MembershipsQuery {
    status: Option<MembershipStatus>,
}

async fn list_memberships(
    State(state): State<AppState>,
    Query(query): Query<MembershipsQuery>,
) -> ApiResult<Vec<premium_membership::Model>> {
    Ok(Json(state.memberships.list_by_status(query.status).await?))
}

#[derive(Deserialize)]
struct ApproveMembership {
    duration_days: i64,
}

async fn approve_membership(
    State(state): State<AppState>,
    Path(id): Path<ModelId>,
    Json(req): Json<ApproveMembership>,
) -> ApiResult<premium_membership::Model> {
    Ok(Json(state.memberships.approve(id, req.duration_days).await?))
}

async fn reject_membership(
    State(state): State<AppState>,
    Path(id): Path<ModelId>,
) -> ApiResult<premium_membership::Model> {
    Ok(Json(state.memberships.reject(id).await?))
}

#[derive(Deserialize)]
struct RevokeMembership {
    reason: String,
}

async fn revoke_membership(
    State(state): State<AppState>,
    Path(id): Path<ModelId>,
    Json(req): Json<RevokeMembership>,
) -> ApiResult<premium_membership::Model> {
    Ok(Json(state.memberships.revoke(id, &req.reason).await?))
}

#[derive(Deserialize)]
struct ExtendMembership {
    days: i64,
}

async fn extend_membership(
    State(state): State<AppState>,
    Path(id): Path<ModelId>,
    Json(req): Json<ExtendMembership>,
) -> ApiResult<premium_membership::Model> {
    Ok(Json(state.memberships.extend(id, req.days).await?))
}

async fn delete_membership(
    State(state): State<AppState>,
    Path(id): Path<ModelId>,
) -> ApiResult<serde_json::Value> {
    state.memberships.delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

async fn list_tickets(State(state): State<AppState>) -> ApiResult<Vec<support_ticket::Model>> {
    Ok(Json(state.tickets.list_unresolved().await?))
}

#[derive(Deserialize)]
struct TicketReply {
    text: String,
}

async fn reply_ticket(
    State(state): State<AppState>,
    Path(id): Path<ModelId>,
    Json(req): Json<TicketReply>,
) -> ApiResult<support_ticket::Model> {
    Ok(Json(state.tickets.reply(id, &req.text).await?))
}

async fn close_ticket(
    State(state): State<AppState>,
    Path(id): Path<ModelId>,
) -> ApiResult<support_ticket::Model> {
    Ok(Json(state.tickets.close(id).await?))
}
