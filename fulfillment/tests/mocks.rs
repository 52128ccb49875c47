//! mockall doubles for the engine's storage and queue seams.

use async_trait::async_trait;
use chrono::Utc;
use fulfillment::error::Result;
use fulfillment::model::{
    KeyAssignment, ModelId, OrderRecord, OrderStatus, PendingReferral, PointsAward, RewardsTask,
    StockProfile,
};
use fulfillment::queue::QueueService;
use fulfillment::storage::{LoyaltyStore, OrderStore, ReferralStore, StockStore, TaskStore};

mockall::mock! {
    pub Orders {}

    #[async_trait]
    impl OrderStore for Orders {
        async fn get_order(&self, order_id: ModelId) -> Result<OrderRecord>;
        async fn mark_completed(
            &self,
            order_id: ModelId,
            credentials: serde_json::Value,
        ) -> Result<()>;
        async fn mark_cancelled(&self, order_id: ModelId, reason: &str) -> Result<()>;
    }
}

mockall::mock! {
    pub Stock {}

    #[async_trait]
    impl StockStore for Stock {
        async fn stock_profile(&self, product_id: ModelId) -> Result<StockProfile>;
        async fn decrement_manual(&self, product_id: ModelId) -> Result<()>;
        async fn assign_key(
            &self,
            product_id: ModelId,
            order_id: ModelId,
            user_id: &str,
        ) -> Result<KeyAssignment>;
    }
}

mockall::mock! {
    pub Loyalty {}

    #[async_trait]
    impl LoyaltyStore for Loyalty {
        async fn award_points(&self, award: &PointsAward) -> Result<bool>;
        async fn deduct_points(&self, user_id: &str, points: i64, description: &str) -> Result<()>;
    }
}

mockall::mock! {
    pub Referrals {}

    #[async_trait]
    impl ReferralStore for Referrals {
        async fn find_pending_for(&self, referred_id: &str) -> Result<Option<PendingReferral>>;
        async fn begin_completion(&self, referral_id: ModelId) -> Result<bool>;
        async fn finish_completion(&self, referral_id: ModelId) -> Result<()>;
    }
}

mockall::mock! {
    pub Tasks {}

    #[async_trait]
    impl TaskStore for Tasks {
        async fn ensure(&self, order_id: ModelId) -> Result<RewardsTask>;
        async fn set_points_awarded(&self, order_id: ModelId) -> Result<()>;
        async fn set_referral_completed(&self, order_id: ModelId) -> Result<()>;
    }
}

mockall::mock! {
    pub Queue {}

    #[async_trait]
    impl QueueService for Queue {
        async fn enqueue(&self, order_id: ModelId) -> Result<()>;
        async fn fetch_next(&self) -> Result<Option<(ModelId, i64)>>;
        async fn mark_processed(&self, msg_id: i64) -> Result<()>;
    }
}

pub fn order(id: ModelId, status: OrderStatus, total_amount: i64, user_id: &str) -> OrderRecord {
    OrderRecord {
        id,
        user_id: user_id.to_string(),
        product_id: 10,
        variant_id: None,
        status,
        total_amount,
        created_at: Utc::now().naive_utc(),
    }
}

pub fn task(order_id: ModelId, points_awarded: bool, referral_completed: bool) -> RewardsTask {
    RewardsTask {
        order_id,
        points_awarded,
        referral_completed,
    }
}
