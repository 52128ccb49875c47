//! Loyalty reads and the coupon redemption flow. Earning happens in the
//! rewards worker through the storage layer's idempotent award.

use crate::entities::{coupon, loyalty_account, point_transaction};
use crate::storage::StoreStorage;
use chrono::Utc;
use fulfillment::error::Result;
use fulfillment::model::{COUPON_VALUE_RUPEES, REDEEM_COST_POINTS, Tier};
use fulfillment::storage::LoyaltyStore;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, QueryOrder, Set};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct LoyaltyService {
    storage: StoreStorage,
}

impl LoyaltyService {
    pub fn new(storage: StoreStorage) -> Self {
        Self { storage }
    }

    /// The user's account; users who never earned read as an empty bronze
    /// account rather than an error.
    pub async fn get_account(&self, user_id: &str) -> Result<loyalty_account::Model> {
        let found = loyalty_account::Entity::find_by_id(user_id.to_string())
            .one(&self.storage.db)
            .await?;
        Ok(found.unwrap_or(loyalty_account::Model {
            user_id: user_id.to_string(),
            total_points: 0,
            lifetime_points: 0,
            tier: Tier::Bronze,
            updated_at: Utc::now().naive_utc(),
        }))
    }

    pub async fn list_transactions(&self, user_id: &str) -> Result<Vec<point_transaction::Model>> {
        Ok(point_transaction::Entity::find()
            .filter(point_transaction::Column::UserId.eq(user_id))
            .order_by_desc(point_transaction::Column::Id)
            .all(&self.storage.db)
            .await?)
    }

    /// Trade points for a fixed-value coupon. The deduction is conditional
    /// on the balance covering the cost, so a double redeem of the same
    /// balance fails instead of going negative.
    pub async fn redeem_for_coupon(&self, user_id: &str) -> Result<coupon::Model> {
        self.storage
            .deduct_points(
                user_id,
                REDEEM_COST_POINTS,
                "Redeemed points for a discount coupon",
            )
            .await?;

        let code = format!(
            "CPN-{}",
            &Uuid::new_v4().simple().to_string()[..10].to_uppercase()
        );
        let issued = coupon::ActiveModel {
            id: NotSet,
            user_id: Set(user_id.to_string()),
            code: Set(code),
            value: Set(COUPON_VALUE_RUPEES),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(&self.storage.db)
        .await?;

        info!(user_id, coupon_id = issued.id, "coupon redeemed");
        Ok(issued)
    }

    pub async fn list_coupons(&self, user_id: &str) -> Result<Vec<coupon::Model>> {
        Ok(coupon::Entity::find()
            .filter(coupon::Column::UserId.eq(user_id))
            .order_by_desc(coupon::Column::Id)
            .all(&self.storage.db)
            .await?)
    }
}
