//! Database layer.
//!
//! [`Database`] is the document-store seam. [`FirestoreDb`] talks to Cloud
//! Firestore; [`MemoryDb`] keeps everything in process for local runs and tests.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{NewPointRequest, PointRequest, RequestStatus, ReviewDecision, User};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const POINT_REQUESTS: &str = "pointRequests";
}

/// Message for a review of a request that is no longer pending.
pub const ALREADY_REVIEWED: &str = "This request has already been reviewed.";

/// Document store operations used by the application.
#[async_trait]
pub trait Database: Send + Sync {
    /// Point lookup of a profile record.
    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError>;

    /// Create or replace a profile record.
    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;

    /// Live subscription to one profile record.
    ///
    /// The first event reflects the current state of the document (including
    /// its absence); later events follow every write.
    async fn watch_user(&self, uid: &str) -> Result<ProfileSubscription, AppError>;

    /// Insert a new request; the store assigns the id and `requested_at`.
    async fn insert_point_request(&self, request: &NewPointRequest) -> Result<String, AppError>;

    async fn get_point_request(&self, id: &str) -> Result<Option<PointRequest>, AppError>;

    /// List requests, filtered by equality on status when given.
    async fn list_point_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PointRequest>, AppError>;

    /// Record a review on an existing request; the store assigns `reviewed_at`.
    ///
    /// Only the review fields are written. The pending check and the write
    /// are atomic: of two concurrent reviews exactly one succeeds. Fails with
    /// `NotFound` if the document does not exist and with a `Validation`
    /// error ([`ALREADY_REVIEWED`]) if it has already been reviewed.
    async fn record_review(&self, id: &str, decision: &ReviewDecision) -> Result<(), AppError>;
}

/// A change to a watched profile record.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileEvent {
    /// Current document contents; `None` when the document does not exist.
    Snapshot(Option<User>),
    /// The listener failed; no further events follow.
    Error(String),
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Handle to a live profile listener.
///
/// Dropping the handle cancels the listener. Cancellation runs at most once.
pub struct ProfileSubscription {
    uid: String,
    events: mpsc::Receiver<ProfileEvent>,
    cancel: Option<CancelFn>,
}

impl ProfileSubscription {
    pub fn new(
        uid: impl Into<String>,
        events: mpsc::Receiver<ProfileEvent>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            uid: uid.into(),
            events,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// The uid this subscription watches.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Wait for the next event. Returns `None` once the listener has ended.
    pub async fn next(&mut self) -> Option<ProfileEvent> {
        if self.cancel.is_none() {
            return None;
        }
        self.events.recv().await
    }

    /// Stop the listener. Later calls are no-ops.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            tracing::debug!(uid = %self.uid, "Cancelling profile subscription");
            cancel();
            self.events.close();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Drop for ProfileSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ProfileSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileSubscription")
            .field("uid", &self.uid)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cancel_runs_once_and_ends_stream() {
        let (tx, rx) = mpsc::channel(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut sub = ProfileSubscription::new("u1", rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.send(ProfileEvent::Snapshot(None)).await.unwrap();
        assert_eq!(sub.next().await, Some(ProfileEvent::Snapshot(None)));

        sub.cancel();
        sub.cancel();
        assert!(sub.next().await.is_none());
        drop(sub);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
