use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub type ModelId = i64;

/// Points cost of one coupon redemption.
pub const REDEEM_COST_POINTS: i64 = 5000;
/// Face value of a redeemed coupon, in rupees.
pub const COUPON_VALUE_RUPEES: i64 = 500;
/// Points paid to the referrer when a referral completes.
pub const REFERRER_REWARD_POINTS: i64 = 100;
/// Bonus points paid to the referred user when a referral completes.
pub const REFERRED_BONUS_POINTS: i64 = 50;

/// Points earned for a completed order: 10 points per 100 rupees spent.
pub fn points_for_amount(total_amount: i64) -> i64 {
    if total_amount <= 0 { 0 } else { total_amount / 10 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Terminal orders accept no further transitions (delete excepted).
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

/// How a purchased product is handed to the customer. Fulfillment behavior
/// is dispatched on this closed set, never on free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    #[sea_orm(string_value = "credentials")]
    Credentials,
    #[sea_orm(string_value = "coupon_code")]
    CouponCode,
    #[sea_orm(string_value = "manual_activation")]
    ManualActivation,
    #[sea_orm(string_value = "instant_key")]
    InstantKey,
}

impl DeliveryType {
    /// Delivery types fulfilled from the single-use key inventory.
    pub fn uses_key_inventory(self) -> bool {
        !matches!(self, DeliveryType::ManualActivation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum StockKeyStatus {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "used")]
    Used,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[sea_orm(string_value = "bronze")]
    Bronze,
    #[sea_orm(string_value = "silver")]
    Silver,
    #[sea_orm(string_value = "gold")]
    Gold,
    #[sea_orm(string_value = "platinum")]
    Platinum,
}

impl Tier {
    /// Tier derived from lifetime points. Monotonic: lifetime points never
    /// decrease, so neither does the tier.
    pub fn from_lifetime(lifetime_points: i64) -> Self {
        match lifetime_points {
            p if p >= 5000 => Tier::Platinum,
            p if p >= 1500 => Tier::Gold,
            p if p >= 500 => Tier::Silver,
            _ => Tier::Bronze,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    #[sea_orm(string_value = "earned")]
    Earned,
    #[sea_orm(string_value = "redeemed")]
    Redeemed,
    #[sea_orm(string_value = "referral_reward")]
    ReferralReward,
    #[sea_orm(string_value = "referral_bonus")]
    ReferralBonus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "revoked")]
    Revoked,
    #[sea_orm(string_value = "expired")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "answered")]
    Answered,
    #[sea_orm(string_value = "closed")]
    Closed,
}

/// The slice of an order the workflow engine operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: ModelId,
    pub user_id: String,
    pub product_id: ModelId,
    pub variant_id: Option<ModelId>,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub created_at: NaiveDateTime,
}

/// What the approval flow needs to know about a product to claim stock.
#[derive(Debug, Clone)]
pub struct StockProfile {
    pub product_id: ModelId,
    pub delivery_type: DeliveryType,
    pub use_manual_stock: bool,
}

#[derive(Debug, Clone)]
pub struct KeyAssignment {
    pub key_id: ModelId,
    pub payload: String,
}

/// Outcome of the stock claim performed during approval.
#[derive(Debug, Clone)]
pub enum StockClaim {
    /// A single-use key was atomically assigned to the order.
    Key(KeyAssignment),
    /// The manual stock counter was atomically decremented.
    Decremented,
    /// The product carries no tracked stock.
    NotRequired,
}

/// One loyalty credit. `order_id`/`referral_id` double as the idempotency
/// reference: a second award with the same kind and reference is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsAward {
    pub user_id: String,
    pub points: i64,
    pub kind: PointKind,
    pub description: String,
    pub order_id: Option<ModelId>,
    pub referral_id: Option<ModelId>,
}

/// Persisted per-order saga state. Replaying a task skips finished steps.
#[derive(Debug, Clone, Copy)]
pub struct RewardsTask {
    pub order_id: ModelId,
    pub points_awarded: bool,
    pub referral_completed: bool,
}

#[derive(Debug, Clone)]
pub struct PendingReferral {
    pub id: ModelId,
    pub referrer_id: String,
    pub referred_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_are_one_tenth_of_amount_floored() {
        assert_eq!(points_for_amount(999), 99);
        assert_eq!(points_for_amount(1000), 100);
        assert_eq!(points_for_amount(9), 0);
        assert_eq!(points_for_amount(0), 0);
        assert_eq!(points_for_amount(-50), 0);
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(Tier::from_lifetime(0), Tier::Bronze);
        assert_eq!(Tier::from_lifetime(499), Tier::Bronze);
        assert_eq!(Tier::from_lifetime(500), Tier::Silver);
        assert_eq!(Tier::from_lifetime(1499), Tier::Silver);
        assert_eq!(Tier::from_lifetime(1500), Tier::Gold);
        assert_eq!(Tier::from_lifetime(4999), Tier::Gold);
        assert_eq!(Tier::from_lifetime(5000), Tier::Platinum);
    }

    #[test]
    fn tier_is_monotonic_in_lifetime_points() {
        let mut last = Tier::Bronze;
        for lifetime in (0..6000).step_by(100) {
            let tier = Tier::from_lifetime(lifetime);
            assert!(tier >= last, "tier regressed at {lifetime}");
            last = tier;
        }
    }

    #[test]
    fn key_inventory_dispatch() {
        assert!(DeliveryType::InstantKey.uses_key_inventory());
        assert!(DeliveryType::CouponCode.uses_key_inventory());
        assert!(DeliveryType::Credentials.uses_key_inventory());
        assert!(!DeliveryType::ManualActivation.uses_key_inventory());
    }
}
