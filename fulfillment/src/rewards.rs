//! Queue-driven rewards processor: the loyalty and referral side effects of
//! an approved order, applied as an idempotent, replayable task.

use crate::error::Result;
use crate::model::{
    ModelId, OrderStatus, PointKind, PointsAward, REFERRED_BONUS_POINTS, REFERRER_REWARD_POINTS,
    points_for_amount,
};
use crate::queue::QueueService;
use crate::storage::{LoyaltyStore, OrderStore, ReferralStore, TaskStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace};

pub struct RewardsProcessor {
    queue: Arc<dyn QueueService>,
    orders: Arc<dyn OrderStore>,
    tasks: Arc<dyn TaskStore>,
    loyalty: Arc<dyn LoyaltyStore>,
    referrals: Arc<dyn ReferralStore>,
}

impl RewardsProcessor {
    pub fn new(
        queue: Arc<dyn QueueService>,
        orders: Arc<dyn OrderStore>,
        tasks: Arc<dyn TaskStore>,
        loyalty: Arc<dyn LoyaltyStore>,
        referrals: Arc<dyn ReferralStore>,
    ) -> Self {
        Self {
            queue,
            orders,
            tasks,
            loyalty,
            referrals,
        }
    }

    /// Fetch and run one task. Returns the order id when a task was
    /// processed, `None` when the queue was empty.
    ///
    /// The message is acknowledged only after every step succeeded; a
    /// failed step leaves it to reappear after the visibility timeout, and
    /// the persisted step flags make the replay skip whatever already
    /// landed.
    pub async fn process_next(&self) -> Result<Option<ModelId>> {
        trace!("polling rewards queue");
        let Some((order_id, msg_id)) = self.queue.fetch_next().await? else {
            return Ok(None);
        };
        info!(order_id, "running rewards task");
        self.run_task(order_id).await?;
        self.queue.mark_processed(msg_id).await?;
        Ok(Some(order_id))
    }

    /// Apply the reward steps for one completed order. Safe to call any
    /// number of times.
    pub async fn run_task(&self, order_id: ModelId) -> Result<()> {
        let order = self.orders.get_order(order_id).await?;
        if order.status != OrderStatus::Completed {
            // Cancelled or deleted between enqueue and processing; nothing
            // to pay out.
            debug!(order_id, status = ?order.status, "skipping rewards for non-completed order");
            return Ok(());
        }

        let task = self.tasks.ensure(order_id).await?;

        if !task.points_awarded {
            let points = points_for_amount(order.total_amount);
            if points > 0 {
                let applied = self
                    .loyalty
                    .award_points(&PointsAward {
                        user_id: order.user_id.clone(),
                        points,
                        kind: PointKind::Earned,
                        description: format!("Purchase reward for order #{order_id}"),
                        order_id: Some(order_id),
                        referral_id: None,
                    })
                    .await?;
                debug!(order_id, points, applied, "purchase points step");
            }
            self.tasks.set_points_awarded(order_id).await?;
        }

        if !task.referral_completed {
            self.complete_referral(&order.user_id).await?;
            self.tasks.set_referral_completed(order_id).await?;
        }

        Ok(())
    }

    /// First completed order of a referred user pays both sides. The
    /// `reward_given` check-and-set makes sure only one caller ever does.
    async fn complete_referral(&self, user_id: &str) -> Result<()> {
        let Some(referral) = self.referrals.find_pending_for(user_id).await? else {
            return Ok(());
        };
        if !self.referrals.begin_completion(referral.id).await? {
            debug!(referral_id = referral.id, "referral rewards already granted");
            return Ok(());
        }

        self.loyalty
            .award_points(&PointsAward {
                user_id: referral.referrer_id.clone(),
                points: REFERRER_REWARD_POINTS,
                kind: PointKind::ReferralReward,
                description: format!("Referral reward: {} made a purchase", referral.referred_id),
                order_id: None,
                referral_id: Some(referral.id),
            })
            .await?;
        self.loyalty
            .award_points(&PointsAward {
                user_id: referral.referred_id.clone(),
                points: REFERRED_BONUS_POINTS,
                kind: PointKind::ReferralBonus,
                description: "Welcome bonus for joining through a referral".to_string(),
                order_id: None,
                referral_id: Some(referral.id),
            })
            .await?;
        self.referrals.finish_completion(referral.id).await?;
        info!(
            referral_id = referral.id,
            referrer = %referral.referrer_id,
            referred = %referral.referred_id,
            "referral completed"
        );
        Ok(())
    }

    /// Poll loop for the worker binary. Errors are logged and retried, the
    /// loop never exits.
    pub async fn run(&self, sleep_ms: u64) {
        info!("rewards worker started");
        loop {
            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => tokio::time::sleep(Duration::from_millis(sleep_ms)).await,
                Err(e) => {
                    error!(error = %e, "rewards task failed");
                    tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                }
            }
        }
    }
}
