//! Customer-facing routes.

use super::{ApiResult, AppState, caller_id};
use crate::catalog::PricedProduct;
use crate::entities::{
    coupon, loyalty_account, order, point_transaction, premium_membership, referral,
    support_ticket,
};
use crate::pricing::FlashSaleConfig;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use fulfillment::model::ModelId;
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payment-info", get(payment_info))
        .route("/products", get(list_products))
        .route("/bundles", get(list_bundles))
        .route("/flash-sale", get(flash_sale))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/proof", post(upload_proof))
        .route("/loyalty", get(loyalty_account))
        .route("/loyalty/transactions", get(loyalty_transactions))
        .route("/loyalty/redeem", post(redeem_coupon))
        .route("/loyalty/coupons", get(list_coupons))
        .route("/referrals", post(register_referral).get(list_referrals))
        .route("/referrals/code", get(referral_code))
        .route("/memberships", post(request_membership).get(list_memberships))
        .route("/tickets", post(open_ticket).get(list_tickets))
}

#[derive(Serialize)]
struct PaymentInfo {
    upi_vpa: String,
}

async fn payment_info(State(state): State<AppState>) -> Json<PaymentInfo> {
    Json(PaymentInfo {
        upi_vpa: state.upi_vpa.clone(),
    })
}

async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<PricedProduct>> {
    Ok(Json(state.catalog.storefront_listing().await?))
}

async fn list_bundles(State(state): State<AppState>) -> ApiResult<Vec<crate::entities::bundle::Model>> {
    Ok(Json(state.bundles.list_active(Utc::now().naive_utc()).await?))
}

async fn flash_sale(State(state): State<AppState>) -> ApiResult<FlashSaleConfig> {
    Ok(Json(state.flash.get().await?))
}

#[derive(Deserialize)]
struct CreateOrderRequest {
    product_id: ModelId,
    variant_id: Option<ModelId>,
}

async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<order::Model> {
    let user = caller_id(&headers)?;
    Ok(Json(
        state
            .orders
            .create_order(&user, req.product_id, req.variant_id)
            .await?,
    ))
}

async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<order::Model>> {
    let user = caller_id(&headers)?;
    Ok(Json(state.orders.list_for_user(&user).await?))
}

async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<ModelId>,
) -> ApiResult<order::Model> {
    let user = caller_id(&headers)?;
    Ok(Json(state.orders.get_for_user(&user, order_id).await?))
}

/// Raw upload: the body is the file, the content type its MIME type.
async fn upload_proof(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<ModelId>,
    body: Bytes,
) -> ApiResult<order::Model> {
    let user = caller_id(&headers)?;
    let content_type = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    Ok(Json(
        state
            .orders
            .submit_payment_proof(&user, order_id, &body, content_type)
            .await?,
    ))
}

async fn loyalty_account(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<loyalty_account::Model> {
    let user = caller_id(&headers)?;
    Ok(Json(state.loyalty.get_account(&user).await?))
}

async fn loyalty_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<point_transaction::Model>> {
    let user = caller_id(&headers)?;
    Ok(Json(state.loyalty.list_transactions(&user).await?))
}

async fn redeem_coupon(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<coupon::Model> {
    let user = caller_id(&headers)?;
    Ok(Json(state.loyalty.redeem_for_coupon(&user).await?))
}

async fn list_coupons(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<coupon::Model>> {
    let user = caller_id(&headers)?;
    Ok(Json(state.loyalty.list_coupons(&user).await?))
}

#[derive(Deserialize)]
struct RegisterReferralRequest {
    code: String,
}

async fn register_referral(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterReferralRequest>,
) -> ApiResult<referral::Model> {
    let user = caller_id(&headers)?;
    Ok(Json(state.referrals.register(&req.code, &user).await?))
}

async fn list_referrals(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<referral::Model>> {
    let user = caller_id(&headers)?;
    Ok(Json(state.referrals.list_for_referrer(&user).await?))
}

#[derive(Serialize)]
struct ReferralCode {
    code: String,
}

async fn referral_code(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<ReferralCode> {
    let user = caller_id(&headers)?;
    Ok(Json(ReferralCode {
        code: state.referrals.code_for(&user).await?,
    }))
}

#[derive(Deserialize)]
struct MembershipRequest {
    plan_type: String,
    price_paid: i64,
    payment_proof_url: Option<String>,
}

async fn request_membership(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MembershipRequest>,
) -> ApiResult<premium_membership::Model> {
    let user = caller_id(&headers)?;
    Ok(Json(
        state
            .memberships
            .request(&user, &req.plan_type, req.price_paid, req.payment_proof_url)
            .await?,
    ))
}

async fn list_memberships(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<premium_membership::Model>> {
    let user = caller_id(&headers)?;
    Ok(Json(state.memberships.list_for_user(&user).await?))
}

#[derive(Deserialize)]
struct OpenTicketRequest {
    subject: String,
    body: String,
}

async fn open_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OpenTicketRequest>,
) -> ApiResult<support_ticket::Model> {
    let user = caller_id(&headers)?;
    Ok(Json(state.tickets.open(&user, &req.subject, &req.body).await?))
}

async fn list_tickets(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<support_ticket::Model>> {
    let user = caller_id(&headers)?;
    Ok(Json(state.tickets.list_for_user(&user).await?))
}
