//! Support tickets for the admin back-office.

use crate::entities::support_ticket;
use chrono::Utc;
use fulfillment::error::{Error, Result};
use fulfillment::model::{ModelId, TicketStatus};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};

#[derive(Clone)]
pub struct TicketService {
    db: DatabaseConnection,
}

impl TicketService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn open(
        &self,
        user_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<support_ticket::Model> {
        if subject.trim().is_empty() || body.trim().is_empty() {
            return Err(Error::validation("a ticket needs a subject and a body"));
        }
        let now = Utc::now().naive_utc();
        Ok(support_ticket::ActiveModel {
            id: NotSet,
            user_id: Set(user_id.to_string()),
            subject: Set(subject.trim().to_string()),
            body: Set(body.to_string()),
            status: Set(TicketStatus::Open),
            reply: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?)
    }

    async fn get(&self, id: ModelId) -> Result<support_ticket::Model> {
        support_ticket::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("ticket {id}")))
    }

    pub async fn reply(&self, id: ModelId, text: &str) -> Result<support_ticket::Model> {
        if text.trim().is_empty() {
            return Err(Error::validation("an empty reply helps nobody"));
        }
        let ticket = self.get(id).await?;
        if ticket.status == TicketStatus::Closed {
            return Err(Error::conflict(format!("ticket {id} is closed")));
        }
        let mut active: support_ticket::ActiveModel = ticket.into();
        active.reply = Set(Some(text.to_string()));
        active.status = Set(TicketStatus::Answered);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    pub async fn close(&self, id: ModelId) -> Result<support_ticket::Model> {
        let ticket = self.get(id).await?;
        let mut active: support_ticket::ActiveModel = ticket.into();
        active.status = Set(TicketStatus::Closed);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<support_ticket::Model>> {
        Ok(support_ticket::Entity::find()
            .filter(support_ticket::Column::UserId.eq(user_id))
            .order_by_desc(support_ticket::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Admin inbox: everything not yet closed.
    pub async fn list_unresolved(&self) -> Result<Vec<support_ticket::Model>> {
        Ok(support_ticket::Entity::find()
            .filter(support_ticket::Column::Status.ne(TicketStatus::Closed))
            .order_by_asc(support_ticket::Column::Id)
            .all(&self.db)
            .await?)
    }
}
