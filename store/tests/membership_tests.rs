
use chrono::{Duration, Utc};
use fulfillment::error::Error;
use fulfillment::model::MembershipStatus;
use store::memberships::MembershipService;
use test_helpers::*;

#[tokio::test]
async fn approval_sets_the_expiry_from_the_duration() {
    let store = test_store().await;
    let service = MembershipService::new(store.db.clone());

    let membership = service.request("alice", "premium", 299, None).await.unwrap();
    assert_eq!(membership.status, MembershipStatus::Pending);
    assert!(membership.expires_at.is_none());

    let approved = service.approve(membership.id, 30).await.unwrap();
    assert_eq!(approved.status, MembershipStatus::Approved);
    let expires = approved.expires_at.unwrap();
    let expected = Utc::now().naive_utc() + Duration::days(30);
    assert!((expires - expected).num_seconds().abs() < 5);
}

#[tokio::test]
async fn extend_adds_days_on_top_of_the_current_expiry() {
    let store = test_store().await;
    let service = MembershipService::new(store.db.clone());

    let membership = service.request("alice", "premium", 299, None).await.unwrap();
    let approved = service.approve(membership.id, 30).await.unwrap();
    let first_expiry = approved.expires_at.unwrap();

    let extended = service.extend(membership.id, 30).await.unwrap();
    assert_eq!(
        extended.expires_at.unwrap(),
        first_expiry + Duration::days(30)
    );
}

#[tokio::test]
async fn status_transitions_are_guarded() {
    let store = test_store().await;
    let service = MembershipService::new(store.db.clone());
    let membership = service.request("alice", "premium", 299, None).await.unwrap();

    // Pending memberships cannot be revoked or extended.
    assert!(matches!(
        service.revoke(membership.id, "fraud").await,
        Err(Error::Conflict(_))
    ));
    assert!(matches!(
        service.extend(membership.id, 30).await,
        Err(Error::Conflict(_))
    ));

    service.approve(membership.id, 30).await.unwrap();
    // Approved memberships cannot be approved or rejected again.
    assert!(matches!(
        service.approve(membership.id, 30).await,
        Err(Error::Conflict(_))
    ));
    assert!(matches!(
        service.reject(membership.id).await,
        Err(Error::Conflict(_))
    ));

    let revoked = service.revoke(membership.id, "chargeback").await.unwrap();
    assert_eq!(revoked.status, MembershipStatus::Revoked);
    assert_eq!(revoked.revoke_reason.as_deref(), Some("chargeback"));
}

#[tokio::test]
async fn the_expiry_sweep_only_touches_overdue_approvals() {
    let store = test_store().await;
    let service = MembershipService::new(store.db.clone());

    let overdue = service.request("alice", "premium", 299, None).await.unwrap();
    service.approve(overdue.id, 30).await.unwrap();
    let current = service.request("bob", "premium", 299, None).await.unwrap();
    service.approve(current.id, 60).await.unwrap();
    let pending = service.request("carol", "premium", 299, None).await.unwrap();

    // Sweep as if 31 days passed: only the 30-day approval is overdue.
    let future = Utc::now().naive_utc() + Duration::days(31);
    let expired_now = service.expire_due(future).await.unwrap();
    assert_eq!(expired_now, 1);

    // Re-run changes nothing further.
    assert_eq!(service.expire_due(future).await.unwrap(), 0);

    let statuses = service.list_by_status(None).await.unwrap();
    let of = |id: i64| statuses.iter().find(|m| m.id == id).unwrap().status;
    assert_eq!(of(overdue.id), MembershipStatus::Expired);
    assert_eq!(of(current.id), MembershipStatus::Approved);
    assert_eq!(of(pending.id), MembershipStatus::Pending);
}

#[tokio::test]
async fn deleting_a_membership_removes_it() {
    let store = test_store().await;
    let service = MembershipService::new(store.db.clone());
    let membership = service.request("alice", "premium", 299, None).await.unwrap();

    service.delete(membership.id).await.unwrap();
    assert!(matches!(
        service.delete(membership.id).await,
        Err(Error::NotFound(_))
    ));
    assert!(service.list_for_user("alice").await.unwrap().is_empty());
}
