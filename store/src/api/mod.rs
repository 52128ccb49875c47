//! HTTP surface: storefront routes under `/api`, back-office under
//! `/admin`. Authentication is an external collaborator; callers arrive
//! with an `x-user-id` header and the admin router is deployed behind the
//! auth proxy.

pub mod admin;
pub mod storefront;

use crate::bundles::BundleService;
use crate::catalog::CatalogService;
use crate::loyalty::LoyaltyService;
use crate::memberships::MembershipService;
use crate::orders::OrderService;
use crate::pricing::FlashSaleService;
use crate::proofs::{MAX_PROOF_BYTES, ProofStore};
use crate::referrals::ReferralService;
use crate::storage::StoreStorage;
use crate::tickets::TicketService;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use fulfillment::approval::ApprovalService;
use fulfillment::error::Error;
use fulfillment::executable_utils::{cors_layer, health_check};
use fulfillment::queue::QueueService;
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub orders: OrderService,
    pub loyalty: LoyaltyService,
    pub referrals: ReferralService,
    pub memberships: MembershipService,
    pub bundles: BundleService,
    pub tickets: TicketService,
    pub flash: FlashSaleService,
    pub approval: ApprovalService,
    pub upi_vpa: String,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        proofs: Arc<dyn ProofStore>,
        queue: Arc<dyn QueueService>,
        upi_vpa: String,
    ) -> Self {
        let storage = Arc::new(StoreStorage::new(db.clone()));
        let approval = ApprovalService::new(
            storage.clone(),
            storage.clone(),
            storage.clone(),
            queue,
        );
        Self {
            catalog: CatalogService::new(db.clone()),
            orders: OrderService::new(db.clone(), proofs),
            loyalty: LoyaltyService::new(StoreStorage::new(db.clone())),
            referrals: ReferralService::new(db.clone()),
            memberships: MembershipService::new(db.clone()),
            bundles: BundleService::new(db.clone()),
            tickets: TicketService::new(db.clone()),
            flash: FlashSaleService::new(db),
            approval,
            upi_vpa,
        }
    }
}

/// Error mapped to a status code and a JSON body at the boundary only.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) | Error::Upload(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_)
            | Error::StockExhausted { .. }
            | Error::InsufficientPoints { .. } => StatusCode::CONFLICT,
            Error::Queue(_) | Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// The calling user, from the auth proxy's `x-user-id` header.
pub fn caller_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError(Error::validation("missing x-user-id header")))
}

pub fn router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .nest("/api", storefront::routes())
        .nest("/admin", admin::routes())
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_PROOF_BYTES + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
        .with_state(state)
}
