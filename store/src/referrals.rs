//! Referral codes and registration. Completion rewards are paid by the
//! rewards worker once the referred user's first order completes.

use crate::entities::{referral, referral_code};
use chrono::Utc;
use fulfillment::error::{Error, Result};
use fulfillment::model::ReferralStatus;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};
use tracing::info;
use uuid::Uuid;

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{8}$").expect("valid code pattern"));

fn generate_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

#[derive(Clone)]
pub struct ReferralService {
    db: DatabaseConnection,
}

impl ReferralService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The user's stable referral code, created on first ask.
    pub async fn code_for(&self, user_id: &str) -> Result<String> {
        if let Some(existing) = referral_code::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
        {
            return Ok(existing.code);
        }

        // Codes are unique; retry the slim chance of a collision.
        let mut last_err = None;
        for _ in 0..3 {
            let code = generate_code();
            let insert = referral_code::ActiveModel {
                user_id: Set(user_id.to_string()),
                code: Set(code.clone()),
                created_at: Set(Utc::now().naive_utc()),
            }
            .insert(&self.db)
            .await;
            match insert {
                Ok(_) => return Ok(code),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.expect("retry loop ran").into())
    }

    /// Record that `referred_id` signed up through `code`. One referral per
    /// user, and never through their own code.
    pub async fn register(&self, code: &str, referred_id: &str) -> Result<referral::Model> {
        let code = code.trim().to_uppercase();
        if !CODE_RE.is_match(&code) {
            return Err(Error::validation(format!("malformed referral code {code:?}")));
        }

        let owner = referral_code::Entity::find()
            .filter(referral_code::Column::Code.eq(code.clone()))
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("referral code {code}")))?;

        if owner.user_id == referred_id {
            return Err(Error::validation("you cannot refer yourself"));
        }

        let already_referred = referral::Entity::find()
            .filter(referral::Column::ReferredId.eq(referred_id))
            .one(&self.db)
            .await?
            .is_some();
        if already_referred {
            return Err(Error::conflict(format!(
                "user {referred_id} was already referred"
            )));
        }

        let created = referral::ActiveModel {
            id: NotSet,
            referrer_id: Set(owner.user_id.clone()),
            referred_id: Set(referred_id.to_string()),
            status: Set(ReferralStatus::Pending),
            reward_given: Set(false),
            created_at: Set(Utc::now().naive_utc()),
            completed_at: Set(None),
        }
        .insert(&self.db)
        .await?;

        info!(
            referral_id = created.id,
            referrer = %owner.user_id,
            referred = referred_id,
            "referral registered"
        );
        Ok(created)
    }

    /// Referrals the user made, newest first.
    pub async fn list_for_referrer(&self, user_id: &str) -> Result<Vec<referral::Model>> {
        Ok(referral::Entity::find()
            .filter(referral::Column::ReferrerId.eq(user_id))
            .order_by_desc(referral::Column::Id)
            .all(&self.db)
            .await?)
    }
}
