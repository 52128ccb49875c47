
use fulfillment::error::Error;
use fulfillment::model::TicketStatus;
use store::tickets::TicketService;
use test_helpers::*;

#[tokio::test]
async fn a_reply_marks_the_ticket_answered() {
    let store = test_store().await;
    let service = TicketService::new(store.db.clone());

    let ticket = service
        .open("alice", "Login broken", "The account stopped working")
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);

    let answered = service.reply(ticket.id, "Fresh credentials sent").await.unwrap();
    assert_eq!(answered.status, TicketStatus::Answered);
    assert_eq!(answered.reply.as_deref(), Some("Fresh credentials sent"));

    let closed = service.close(ticket.id).await.unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);

    // Closed tickets take no further replies.
    assert!(matches!(
        service.reply(ticket.id, "one more thing").await,
        Err(Error::Conflict(_))
    ));
}

#[tokio::test]
async fn empty_subjects_and_replies_are_rejected() {
    let store = test_store().await;
    let service = TicketService::new(store.db.clone());

    assert!(matches!(
        service.open("alice", " ", "body").await,
        Err(Error::Validation(_))
    ));

    let ticket = service.open("alice", "subject", "body").await.unwrap();
    assert!(matches!(
        service.reply(ticket.id, "  ").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn the_admin_inbox_hides_closed_tickets() {
    let store = test_store().await;
    let service = TicketService::new(store.db.clone());

    let first = service.open("alice", "One", "body").await.unwrap();
    let second = service.open("bob", "Two", "body").await.unwrap();
    service.reply(second.id, "done").await.unwrap();
    service.close(first.id).await.unwrap();

    let unresolved = service.list_unresolved().await.unwrap();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].id, second.id);

    let alices = service.list_for_user("alice").await.unwrap();
    assert_eq!(alices.len(), 1);
    assert_eq!(alices[0].status, TicketStatus::Closed);
}
