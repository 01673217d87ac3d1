// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store.
//!
//! Mirrors the Firestore adapter's semantics (store-assigned ids and
//! timestamps, live profile listeners) without any network access.

use crate::db::{Database, ProfileEvent, ProfileSubscription, ALREADY_REVIEWED};
use crate::error::AppError;
use crate::ids::random_id;
use crate::models::{NewPointRequest, PointRequest, RequestStatus, ReviewDecision, User};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

const PROFILE_EVENT_BUFFER: usize = 16;

#[derive(Default)]
struct Inner {
    users: DashMap<String, User>,
    profile_channels: DashMap<String, watch::Sender<Option<User>>>,
    point_requests: DashMap<String, PointRequest>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
    subscriptions_opened: AtomicUsize,
    subscriptions_closed: AtomicUsize,
}

/// In-memory [`Database`]. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// `(opened, closed)` profile subscription counts.
    pub fn subscription_counts(&self) -> (usize, usize) {
        (
            self.inner.subscriptions_opened.load(Ordering::SeqCst),
            self.inner.subscriptions_closed.load(Ordering::SeqCst),
        )
    }

    /// Delete a profile record, notifying listeners.
    pub fn remove_user(&self, uid: &str) {
        self.inner.users.remove(uid);
        if let Some(channel) = self.inner.profile_channels.get(uid) {
            channel.send_replace(None);
        }
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("Database unavailable".to_string()));
        }
        Ok(())
    }

    fn profile_receiver(&self, uid: &str) -> watch::Receiver<Option<User>> {
        let sender = self
            .inner
            .profile_channels
            .entry(uid.to_string())
            .or_insert_with(|| watch::channel(None).0);
        let receiver = sender.subscribe();

        // Re-read after subscribing so a concurrent upsert cannot be missed.
        let current = self.inner.users.get(uid).map(|u| u.clone());
        sender.send_if_modified(|value| {
            if *value != current {
                *value = current;
                true
            } else {
                false
            }
        });
        receiver
    }
}

#[async_trait]
impl Database for MemoryDb {
    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.check_available()?;
        Ok(self.inner.users.get(uid).map(|u| u.clone()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.check_available()?;
        self.inner.users.insert(user.uid.clone(), user.clone());
        if let Some(channel) = self.inner.profile_channels.get(&user.uid) {
            channel.send_replace(Some(user.clone()));
        }
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn watch_user(&self, uid: &str) -> Result<ProfileSubscription, AppError> {
        self.check_available()?;

        let mut profile = self.profile_receiver(uid);
        let (tx, events) = mpsc::channel(PROFILE_EVENT_BUFFER);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let initial = profile.borrow_and_update().clone();
            if tx.send(ProfileEvent::Snapshot(initial)).await.is_err() {
                return;
            }
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    changed = profile.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = profile.borrow_and_update().clone();
                        if tx.send(ProfileEvent::Snapshot(snapshot)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.inner
            .subscriptions_opened
            .fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.clone();
        Ok(ProfileSubscription::new(uid, events, move || {
            inner.subscriptions_closed.fetch_add(1, Ordering::SeqCst);
            let _ = stop_tx.send(());
        }))
    }

    async fn insert_point_request(&self, request: &NewPointRequest) -> Result<String, AppError> {
        self.check_available()?;
        let id = random_id()?;
        let record = request.clone().into_record(id.clone(), chrono::Utc::now());
        self.inner.point_requests.insert(id.clone(), record);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn get_point_request(&self, id: &str) -> Result<Option<PointRequest>, AppError> {
        self.check_available()?;
        Ok(self.inner.point_requests.get(id).map(|r| r.clone()))
    }

    async fn list_point_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PointRequest>, AppError> {
        self.check_available()?;
        let mut requests: Vec<PointRequest> = self
            .inner
            .point_requests
            .iter()
            .filter(|entry| status.map_or(true, |s| entry.status() == s))
            .map(|entry| entry.value().clone())
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    async fn record_review(&self, id: &str, decision: &ReviewDecision) -> Result<(), AppError> {
        self.check_available()?;
        let mut record = self
            .inner
            .point_requests
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Point request {} not found", id)))?;
        // The shard lock is held until `record` drops, so check and write are atomic.
        if record.status() != RequestStatus::Pending {
            return Err(AppError::Validation(ALREADY_REVIEWED.to_string()));
        }
        record.review = Some(decision.clone().stamp(chrono::Utc::now()));
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn user(uid: &str, name: &str) -> User {
        User {
            uid: uid.to_string(),
            email: Some(format!("{}@example.com", uid)),
            name: Some(name.to_string()),
            role: Role::Student,
        }
    }

    #[tokio::test]
    async fn test_watch_user_streams_updates() {
        let db = MemoryDb::new();
        let mut sub = db.watch_user("u1").await.unwrap();

        assert_eq!(sub.next().await, Some(ProfileEvent::Snapshot(None)));

        db.upsert_user(&user("u1", "Ann")).await.unwrap();
        assert_eq!(
            sub.next().await,
            Some(ProfileEvent::Snapshot(Some(user("u1", "Ann"))))
        );

        db.remove_user("u1");
        assert_eq!(sub.next().await, Some(ProfileEvent::Snapshot(None)));

        drop(sub);
        assert_eq!(db.subscription_counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let db = MemoryDb::new();
        let new = NewPointRequest {
            user_id: "u1".to_string(),
            student_name: "Ann".to_string(),
            reason: "Organized the charity drive".to_string(),
        };
        let first = db.insert_point_request(&new).await.unwrap();
        db.insert_point_request(&new).await.unwrap();
        db.record_review(
            &first,
            &ReviewDecision::Reject {
                admin_notes: String::new(),
            },
        )
        .await
        .unwrap();

        let pending = db
            .list_point_requests(Some(RequestStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(db.list_point_requests(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_review_of_missing_request() {
        let db = MemoryDb::new();
        let err = db
            .record_review(
                "missing",
                &ReviewDecision::Reject {
                    admin_notes: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(db.write_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reviews_apply_once() {
        let db = MemoryDb::new();
        let id = db
            .insert_point_request(&NewPointRequest {
                user_id: "u1".to_string(),
                student_name: "Ann".to_string(),
                reason: "Organized the charity drive".to_string(),
            })
            .await
            .unwrap();

        let approve = ReviewDecision::Approve {
            points_awarded: 10,
            admin_notes: String::new(),
        };
        let reject = ReviewDecision::Reject {
            admin_notes: String::new(),
        };
        let (a, b) = tokio::join!(
            tokio::spawn({
                let db = db.clone();
                let id = id.clone();
                async move { db.record_review(&id, &approve).await }
            }),
            tokio::spawn({
                let db = db.clone();
                let id = id.clone();
                async move { db.record_review(&id, &reject).await }
            }),
        );
        let results = [a.unwrap(), b.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(AppError::Validation(m)) if m == ALREADY_REVIEWED
        )));
        // One insert plus exactly one review.
        assert_eq!(db.write_count(), 2);
    }

    #[tokio::test]
    async fn test_reviewed_request_keeps_first_decision() {
        let db = MemoryDb::new();
        let id = db
            .insert_point_request(&NewPointRequest {
                user_id: "u1".to_string(),
                student_name: "Ann".to_string(),
                reason: "Organized the charity drive".to_string(),
            })
            .await
            .unwrap();
        db.record_review(
            &id,
            &ReviewDecision::Approve {
                points_awarded: 10,
                admin_notes: String::new(),
            },
        )
        .await
        .unwrap();

        let err = db
            .record_review(
                &id,
                &ReviewDecision::Reject {
                    admin_notes: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == ALREADY_REVIEWED));

        let stored = db.get_point_request(&id).await.unwrap().unwrap();
        assert_eq!(stored.status(), RequestStatus::Approved);
        assert_eq!(stored.points_awarded(), Some(10));
    }
}
