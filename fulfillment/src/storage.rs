use crate::error::Result;
use crate::model::{
    KeyAssignment, ModelId, OrderRecord, PendingReferral, PointsAward, RewardsTask, StockProfile,
};
use async_trait::async_trait;

/// Order reads and the two monotonic state transitions the engine performs.
/// Implementations guard the transition in the database (conditional update
/// on the current status), not just in memory.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, order_id: ModelId) -> Result<OrderRecord>;

    /// `submitted -> completed`, attaching the credentials payload.
    /// `Conflict` when the order is in any other state.
    async fn mark_completed(&self, order_id: ModelId, credentials: serde_json::Value)
    -> Result<()>;

    /// `{pending, submitted} -> cancelled` with a reason.
    async fn mark_cancelled(&self, order_id: ModelId, reason: &str) -> Result<()>;
}

/// Stock ledger operations. Both claim paths are atomic conditional
/// updates so concurrent approvals can never double-sell.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn stock_profile(&self, product_id: ModelId) -> Result<StockProfile>;

    /// Decrement the manual counter, refusing to go below zero.
    /// `StockExhausted` when the counter is already zero.
    async fn decrement_manual(&self, product_id: ModelId) -> Result<()>;

    /// Claim one available key for the order. `StockExhausted` when none
    /// are left; a key that loses a claim race is skipped, never reused.
    async fn assign_key(
        &self,
        product_id: ModelId,
        order_id: ModelId,
        user_id: &str,
    ) -> Result<KeyAssignment>;
}

#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    /// Append a point transaction and fold it into the account balance and
    /// tier. Returns false (and changes nothing) when a transaction with
    /// the same kind and order/referral reference already exists.
    async fn award_points(&self, award: &PointsAward) -> Result<bool>;

    /// Conditional deduction: only succeeds while the balance covers the
    /// cost. `InsufficientPoints` otherwise, balance untouched.
    async fn deduct_points(&self, user_id: &str, points: i64, description: &str) -> Result<()>;
}

#[async_trait]
pub trait ReferralStore: Send + Sync {
    async fn find_pending_for(&self, referred_id: &str) -> Result<Option<PendingReferral>>;

    /// Check-and-set on `reward_given`. Exactly one caller wins; only the
    /// winner may pay out rewards.
    async fn begin_completion(&self, referral_id: ModelId) -> Result<bool>;

    /// Mark the referral completed once rewards have been paid.
    async fn finish_completion(&self, referral_id: ModelId) -> Result<()>;
}

/// Persisted saga state for the rewards task of one order.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Upsert the task row and return its current step state.
    async fn ensure(&self, order_id: ModelId) -> Result<RewardsTask>;

    async fn set_points_awarded(&self, order_id: ModelId) -> Result<()>;

    async fn set_referral_completed(&self, order_id: ModelId) -> Result<()>;
}
