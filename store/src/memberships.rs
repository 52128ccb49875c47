//! Premium membership requests and the admin actions on them.

use crate::entities::premium_membership;
use chrono::{Duration, NaiveDateTime, Utc};
use fulfillment::error::{Error, Result};
use fulfillment::model::{MembershipStatus, ModelId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};
use tracing::info;

#[derive(Clone)]
pub struct MembershipService {
    db: DatabaseConnection,
}

impl MembershipService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn request(
        &self,
        user_id: &str,
        plan_type: &str,
        price_paid: i64,
        payment_proof_url: Option<String>,
    ) -> Result<premium_membership::Model> {
        if plan_type.trim().is_empty() {
            return Err(Error::validation("a plan type is required"));
        }
        if price_paid < 0 {
            return Err(Error::validation("price cannot be negative"));
        }
        let now = Utc::now().naive_utc();
        Ok(premium_membership::ActiveModel {
            id: NotSet,
            user_id: Set(user_id.to_string()),
            plan_type: Set(plan_type.to_string()),
            status: Set(MembershipStatus::Pending),
            price_paid: Set(price_paid),
            payment_proof_url: Set(payment_proof_url),
            expires_at: Set(None),
            revoke_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?)
    }

    async fn get(&self, id: ModelId) -> Result<premium_membership::Model> {
        premium_membership::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("membership {id}")))
    }

    fn require_status(
        membership: &premium_membership::Model,
        expected: MembershipStatus,
        action: &str,
    ) -> Result<()> {
        if membership.status != expected {
            return Err(Error::conflict(format!(
                "membership {} is {:?} and cannot be {action}",
                membership.id, membership.status
            )));
        }
        Ok(())
    }

    pub async fn approve(
        &self,
        id: ModelId,
        duration_days: i64,
    ) -> Result<premium_membership::Model> {
        if duration_days <= 0 {
            return Err(Error::validation("duration must be positive"));
        }
        let membership = self.get(id).await?;
        Self::require_status(&membership, MembershipStatus::Pending, "approved")?;

        let now = Utc::now().naive_utc();
        let mut active: premium_membership::ActiveModel = membership.into();
        active.status = Set(MembershipStatus::Approved);
        active.expires_at = Set(Some(now + Duration::days(duration_days)));
        active.updated_at = Set(now);
        let updated = active.update(&self.db).await?;
        info!(membership_id = id, duration_days, "membership approved");
        Ok(updated)
    }

    pub async fn reject(&self, id: ModelId) -> Result<premium_membership::Model> {
        let membership = self.get(id).await?;
        Self::require_status(&membership, MembershipStatus::Pending, "rejected")?;

        let mut active: premium_membership::ActiveModel = membership.into();
        active.status = Set(MembershipStatus::Rejected);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    /// Revoke an approved membership. Orders already fulfilled under it
    /// stay fulfilled.
    pub async fn revoke(&self, id: ModelId, reason: &str) -> Result<premium_membership::Model> {
        if reason.trim().is_empty() {
            return Err(Error::validation("a revoke reason is required"));
        }
        let membership = self.get(id).await?;
        Self::require_status(&membership, MembershipStatus::Approved, "revoked")?;

        let mut active: premium_membership::ActiveModel = membership.into();
        active.status = Set(MembershipStatus::Revoked);
        active.revoke_reason = Set(Some(reason.to_string()));
        active.updated_at = Set(Utc::now().naive_utc());
        let updated = active.update(&self.db).await?;
        info!(membership_id = id, reason, "membership revoked");
        Ok(updated)
    }

    /// Add days to the expiry, counting from now when none is set.
    pub async fn extend(&self, id: ModelId, days: i64) -> Result<premium_membership::Model> {
        if days <= 0 {
            return Err(Error::validation("extension must be positive"));
        }
        let membership = self.get(id).await?;
        Self::require_status(&membership, MembershipStatus::Approved, "extended")?;

        let now = Utc::now().naive_utc();
        let base = membership.expires_at.unwrap_or(now);
        let mut active: premium_membership::ActiveModel = membership.into();
        active.expires_at = Set(Some(base + Duration::days(days)));
        active.updated_at = Set(now);
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, id: ModelId) -> Result<()> {
        let result = premium_membership::Entity::delete_by_id(id)
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(Error::not_found(format!("membership {id}")));
        }
        Ok(())
    }

    pub async fn list_by_status(
        &self,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<premium_membership::Model>> {
        let mut query =
            premium_membership::Entity::find().order_by_desc(premium_membership::Column::Id);
        if let Some(status) = status {
            query = query.filter(premium_membership::Column::Status.eq(status));
        }
        Ok(query.all(&self.db).await?)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<premium_membership::Model>> {
        Ok(premium_membership::Entity::find()
            .filter(premium_membership::Column::UserId.eq(user_id))
            .order_by_desc(premium_membership::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Worker housekeeping: flip approved memberships past their expiry to
    /// expired. Returns how many rows changed.
    pub async fn expire_due(&self, now: NaiveDateTime) -> Result<u64> {
        let result = premium_membership::Entity::update_many()
            .col_expr(
                premium_membership::Column::Status,
                Expr::value(MembershipStatus::Expired),
            )
            .col_expr(premium_membership::Column::UpdatedAt, Expr::value(now))
            .filter(premium_membership::Column::Status.eq(MembershipStatus::Approved))
            .filter(premium_membership::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            info!(count = result.rows_affected, "memberships expired");
        }
        Ok(result.rows_affected)
    }
}
