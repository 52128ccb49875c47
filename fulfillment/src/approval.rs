//! Admin approval flow: the one place an order turns into a fulfilled sale.

use crate::credentials::{resolve_credentials, validate_credentials};
use crate::error::{Error, Result};
use crate::model::{ModelId, OrderRecord, OrderStatus, StockClaim, StockProfile};
use crate::queue::QueueService;
use crate::storage::{OrderStore, StockStore, TaskStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Drives `submitted -> completed` (approve) and `-> cancelled` (reject).
///
/// The stock claim happens synchronously and atomically inside `approve`;
/// reward side effects are deferred to the queue-driven [`crate::rewards`]
/// processor so they can be replayed safely.
#[derive(Clone)]
pub struct ApprovalService {
    orders: Arc<dyn OrderStore>,
    stock: Arc<dyn StockStore>,
    tasks: Arc<dyn TaskStore>,
    queue: Arc<dyn QueueService>,
}

impl ApprovalService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        stock: Arc<dyn StockStore>,
        tasks: Arc<dyn TaskStore>,
        queue: Arc<dyn QueueService>,
    ) -> Self {
        Self {
            orders,
            stock,
            tasks,
            queue,
        }
    }

    /// Approve a submitted order.
    ///
    /// Stock is claimed before the order is touched: when the product is
    /// sold out the approval fails with `StockExhausted` and the order
    /// stays `submitted`, it never completes without credentials.
    pub async fn approve(
        &self,
        order_id: ModelId,
        admin_payload: Option<serde_json::Value>,
    ) -> Result<OrderRecord> {
        let order = self.orders.get_order(order_id).await?;
        if order.status != OrderStatus::Submitted {
            return Err(Error::conflict(format!(
                "order {} cannot be approved from status {:?}",
                order_id, order.status
            )));
        }

        let profile = self.stock.stock_profile(order.product_id).await?;
        // Validate any admin payload before touching stock; a rejected
        // payload must not leave a claimed key behind.
        if let Some(ref payload) = admin_payload {
            validate_credentials(profile.delivery_type, payload)?;
        } else if profile.use_manual_stock && profile.delivery_type.uses_key_inventory() {
            // Manually counted stock yields no key to hand out, so the
            // payload has to come from the admin.
            return Err(Error::validation(
                "this delivery type needs a credentials payload when stock is counted manually",
            ));
        }
        let claim = self.claim_stock(&profile, &order).await?;
        let credentials = resolve_credentials(profile.delivery_type, admin_payload, &claim)?;

        self.orders.mark_completed(order_id, credentials).await?;
        info!(order_id, product_id = order.product_id, "order approved");

        // Reward side effects run out of band; the persisted task row makes
        // them replayable without double-paying.
        self.tasks.ensure(order_id).await?;
        self.queue.enqueue(order_id).await?;

        self.orders.get_order(order_id).await
    }

    /// Reject a pending or submitted order with a reason. No stock or
    /// loyalty effects, matching the order state machine.
    pub async fn reject(&self, order_id: ModelId, reason: &str) -> Result<OrderRecord> {
        if reason.trim().is_empty() {
            return Err(Error::validation("a cancellation reason is required"));
        }
        self.orders.mark_cancelled(order_id, reason).await?;
        info!(order_id, reason, "order rejected");
        self.orders.get_order(order_id).await
    }

    async fn claim_stock(&self, profile: &StockProfile, order: &OrderRecord) -> Result<StockClaim> {
        if profile.use_manual_stock {
            self.stock.decrement_manual(profile.product_id).await?;
            return Ok(StockClaim::Decremented);
        }
        if profile.delivery_type.uses_key_inventory() {
            let assignment = self
                .stock
                .assign_key(profile.product_id, order.id, &order.user_id)
                .await?;
            return Ok(StockClaim::Key(assignment));
        }
        warn!(
            product_id = profile.product_id,
            "product tracks no stock; approving without a claim"
        );
        Ok(StockClaim::NotRequired)
    }
}
