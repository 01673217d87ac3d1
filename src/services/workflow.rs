// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point request workflow.
//!
//! Students submit requests; admins list them by status and review each one
//! exactly once. All input is validated before storage is touched.

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{NewPointRequest, PointRequestView, RequestStatus, ReviewDecision};
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use validator::{Validate, ValidationError};

pub const REASON_MIN_CHARS: usize = 10;
pub const REASON_MAX_CHARS: usize = 500;
pub const NOTES_MAX_CHARS: usize = 500;
pub const REJECTION_NOTES_MIN_CHARS: usize = 5;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn validate_reason(reason: &str) -> std::result::Result<(), ValidationError> {
    let len = reason.chars().count();
    if len < REASON_MIN_CHARS {
        return Err(invalid("length", "Reason must be at least 10 characters."));
    }
    if len > REASON_MAX_CHARS {
        return Err(invalid("length", "Reason too long."));
    }
    Ok(())
}

fn validate_admin_notes(notes: &str) -> std::result::Result<(), ValidationError> {
    if notes.chars().count() > NOTES_MAX_CHARS {
        return Err(invalid("length", "Admin notes too long."));
    }
    Ok(())
}

/// Rejection notes are optional, but when given must say something.
fn validate_rejection_notes(notes: &str) -> std::result::Result<(), ValidationError> {
    let trimmed = notes.trim();
    if !trimmed.is_empty() && trimmed.chars().count() < REJECTION_NOTES_MIN_CHARS {
        return Err(invalid(
            "length",
            "Rejection notes must be at least 5 characters.",
        ));
    }
    validate_admin_notes(notes)
}

/// Student submission.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequestInput {
    #[validate(custom(function = "validate_reason"))]
    pub reason: String,
    #[validate(length(min = 1, message = "User ID is required."))]
    pub user_id: String,
    #[validate(length(min = 1, message = "Student name is required."))]
    pub student_name: String,
}

/// Admin approval.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequestInput {
    #[validate(length(min = 1, message = "Request ID is required."))]
    pub request_id: String,
    #[validate(range(min = 1, message = "Points must be at least 1."))]
    pub points_awarded: i64,
    #[serde(default)]
    #[validate(custom(function = "validate_admin_notes"))]
    pub admin_notes: String,
}

/// Admin rejection.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequestInput {
    #[validate(length(min = 1, message = "Request ID is required."))]
    pub request_id: String,
    #[serde(default)]
    #[validate(custom(function = "validate_rejection_notes"))]
    pub admin_notes: String,
}

/// Point request submission and review.
#[derive(Clone)]
pub struct PointRequestWorkflow {
    db: Arc<dyn Database>,
}

impl PointRequestWorkflow {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Validate and store a new pending request. Returns the generated id.
    pub async fn submit_request(&self, input: SubmitRequestInput) -> Result<String> {
        input
            .validate()
            .map_err(|e| AppError::validation("Invalid input: ", &e))?;

        let request = NewPointRequest {
            user_id: input.user_id,
            student_name: input.student_name,
            reason: input.reason,
        };
        let id = self.db.insert_point_request(&request).await?;

        tracing::info!(
            request_id = %id,
            user_id = %request.user_id,
            "Point request submitted"
        );
        Ok(id)
    }

    /// List requests, optionally only those with `status`. Newest first.
    pub async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PointRequestView>> {
        let requests = self.db.list_point_requests(status).await?;
        tracing::debug!(status = ?status, count = requests.len(), "Listed point requests");
        Ok(requests.iter().map(PointRequestView::from).collect())
    }

    /// Approve a pending request. Student totals are not touched.
    ///
    /// The store refuses the write if the request is missing or was reviewed
    /// meanwhile, so a request changes status at most once.
    pub async fn approve_request(&self, input: ApproveRequestInput) -> Result<()> {
        input
            .validate()
            .map_err(|e| AppError::validation("Invalid input for approval: ", &e))?;
        let points_awarded = u32::try_from(input.points_awarded).map_err(|_| {
            AppError::Validation("Invalid input for approval: Points value is too large.".into())
        })?;

        self.db
            .record_review(
                &input.request_id,
                &ReviewDecision::Approve {
                    points_awarded,
                    admin_notes: input.admin_notes.trim().to_string(),
                },
            )
            .await?;

        tracing::info!(
            request_id = %input.request_id,
            points_awarded,
            "Point request approved"
        );
        Ok(())
    }

    /// Reject a pending request.
    pub async fn reject_request(&self, input: RejectRequestInput) -> Result<()> {
        input
            .validate()
            .map_err(|e| AppError::validation("Invalid input for rejection: ", &e))?;

        self.db
            .record_review(
                &input.request_id,
                &ReviewDecision::Reject {
                    admin_notes: input.admin_notes.trim().to_string(),
                },
            )
            .await?;

        tracing::info!(request_id = %input.request_id, "Point request rejected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryDb, ALREADY_REVIEWED};

    fn setup() -> (MemoryDb, PointRequestWorkflow) {
        let db = MemoryDb::new();
        let workflow = PointRequestWorkflow::new(Arc::new(db.clone()));
        (db, workflow)
    }

    fn submission(reason: &str) -> SubmitRequestInput {
        SubmitRequestInput {
            reason: reason.to_string(),
            user_id: "student-1".to_string(),
            student_name: "Alice".to_string(),
        }
    }

    fn approval(id: &str, points: i64) -> ApproveRequestInput {
        ApproveRequestInput {
            request_id: id.to_string(),
            points_awarded: points,
            admin_notes: String::new(),
        }
    }

    fn rejection(id: &str, notes: &str) -> RejectRequestInput {
        RejectRequestInput {
            request_id: id.to_string(),
            admin_notes: notes.to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_creates_pending_request() {
        let (_, workflow) = setup();
        let id = workflow
            .submit_request(submission("Tutored classmates in algebra"))
            .await
            .unwrap();

        let requests = workflow.list_requests(None).await.unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.id, id);
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.points_awarded.is_none());
        assert!(request.reviewed_at.is_none());
        assert!(request.requested_at.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_reason_length_bounds() {
        let (db, workflow) = setup();

        let err = workflow
            .submit_request(submission("too short"))
            .await
            .unwrap_err();
        match err {
            AppError::Validation(msg) => assert_eq!(
                msg,
                "Invalid input: Reason must be at least 10 characters."
            ),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = workflow
            .submit_request(submission(&"x".repeat(501)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("Reason too long.")));
        assert_eq!(db.write_count(), 0);

        workflow
            .submit_request(submission(&"x".repeat(10)))
            .await
            .unwrap();
        workflow
            .submit_request(submission(&"é".repeat(500)))
            .await
            .unwrap();
        assert_eq!(db.write_count(), 2);
    }

    #[tokio::test]
    async fn test_submit_requires_identity_fields() {
        let (db, workflow) = setup();
        let mut input = submission("Organized the food drive");
        input.user_id.clear();
        input.student_name.clear();

        let err = workflow.submit_request(input).await.unwrap_err();
        match err {
            AppError::Validation(msg) => assert_eq!(
                msg,
                "Invalid input: Student name is required., User ID is required."
            ),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(db.write_count(), 0);
    }

    #[tokio::test]
    async fn test_approve_flow() {
        let (db, workflow) = setup();
        let id = workflow
            .submit_request(submission("Won the regional chess tournament"))
            .await
            .unwrap();

        let err = workflow.approve_request(approval(&id, 0)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ref m) if m == "Invalid input for approval: Points must be at least 1."
        ));
        assert_eq!(db.write_count(), 1);

        workflow.approve_request(approval(&id, 10)).await.unwrap();

        let approved = workflow
            .list_requests(Some(RequestStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].points_awarded, Some(10));
        assert_eq!(approved[0].admin_notes.as_deref(), Some(""));
        assert!(approved[0].reviewed_at.is_some());
    }

    #[tokio::test]
    async fn test_reject_flow() {
        let (_, workflow) = setup();
        let id = workflow
            .submit_request(submission("Volunteered at the library"))
            .await
            .unwrap();

        workflow
            .reject_request(rejection(&id, "Please attach evidence"))
            .await
            .unwrap();

        let rejected = workflow
            .list_requests(Some(RequestStatus::Rejected))
            .await
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].points_awarded.is_none());
        assert!(rejected[0].reviewed_at.is_some());
        assert_eq!(
            rejected[0].admin_notes.as_deref(),
            Some("Please attach evidence")
        );
    }

    #[tokio::test]
    async fn test_rejection_notes_rules() {
        let (_, workflow) = setup();
        let id = workflow
            .submit_request(submission("Volunteered at the library"))
            .await
            .unwrap();

        let err = workflow
            .reject_request(rejection(&id, "no"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ref m)
                if m == "Invalid input for rejection: Rejection notes must be at least 5 characters."
        ));

        // Blank notes are the same as none.
        workflow.reject_request(rejection(&id, "   ")).await.unwrap();
    }

    #[tokio::test]
    async fn test_review_happens_once() {
        let (_, workflow) = setup();
        let id = workflow
            .submit_request(submission("Captained the debate team"))
            .await
            .unwrap();
        workflow.approve_request(approval(&id, 5)).await.unwrap();

        let err = workflow
            .reject_request(rejection(&id, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == ALREADY_REVIEWED));

        let err = workflow.approve_request(approval(&id, 7)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let all = workflow.list_requests(None).await.unwrap();
        assert_eq!(all[0].points_awarded, Some(5));
    }

    /// Store whose request reads and review writes take a network round trip.
    struct SlowStore(MemoryDb);

    const ROUND_TRIP: std::time::Duration = std::time::Duration::from_millis(50);

    #[async_trait::async_trait]
    impl Database for SlowStore {
        async fn get_user(&self, uid: &str) -> Result<Option<crate::models::User>> {
            self.0.get_user(uid).await
        }

        async fn upsert_user(&self, user: &crate::models::User) -> Result<()> {
            self.0.upsert_user(user).await
        }

        async fn watch_user(&self, uid: &str) -> Result<crate::db::ProfileSubscription> {
            self.0.watch_user(uid).await
        }

        async fn insert_point_request(&self, request: &NewPointRequest) -> Result<String> {
            self.0.insert_point_request(request).await
        }

        async fn get_point_request(
            &self,
            id: &str,
        ) -> Result<Option<crate::models::PointRequest>> {
            tokio::time::sleep(ROUND_TRIP).await;
            self.0.get_point_request(id).await
        }

        async fn list_point_requests(
            &self,
            status: Option<RequestStatus>,
        ) -> Result<Vec<crate::models::PointRequest>> {
            self.0.list_point_requests(status).await
        }

        async fn record_review(&self, id: &str, decision: &ReviewDecision) -> Result<()> {
            tokio::time::sleep(ROUND_TRIP).await;
            self.0.record_review(id, decision).await
        }
    }

    #[tokio::test]
    async fn test_overlapping_reviews_only_one_succeeds() {
        let db = MemoryDb::new();
        let workflow = PointRequestWorkflow::new(Arc::new(SlowStore(db.clone())));
        let id = workflow
            .submit_request(submission("Captained the debate team"))
            .await
            .unwrap();

        let (approved, rejected) = tokio::join!(
            workflow.approve_request(approval(&id, 10)),
            workflow.reject_request(rejection(&id, "")),
        );

        assert!(
            approved.is_ok() != rejected.is_ok(),
            "exactly one review must win: approve={:?} reject={:?}",
            approved,
            rejected
        );
        let loser = approved.err().or(rejected.err()).unwrap();
        assert!(matches!(loser, AppError::Validation(ref m) if m == ALREADY_REVIEWED));

        let stored = db.get_point_request(&id).await.unwrap().unwrap();
        assert!(stored.review.is_some());
        // One insert, one review.
        assert_eq!(db.write_count(), 2);
    }

    #[tokio::test]
    async fn test_review_of_unknown_request() {
        let (_, workflow) = setup();
        let err = workflow
            .approve_request(approval("missing", 3))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filter_is_subset_of_all() {
        let (_, workflow) = setup();
        let first = workflow
            .submit_request(submission("Started a recycling program"))
            .await
            .unwrap();
        workflow
            .submit_request(submission("Mentored first-year students"))
            .await
            .unwrap();
        workflow
            .reject_request(rejection(&first, ""))
            .await
            .unwrap();

        let pending = workflow
            .list_requests(Some(RequestStatus::Pending))
            .await
            .unwrap();
        let all = workflow.list_requests(None).await.unwrap();

        assert_eq!(pending.len(), 1);
        assert!(pending.iter().all(|r| r.status == RequestStatus::Pending));
        assert!(pending.iter().all(|p| all.iter().any(|r| r.id == p.id)));
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_is_persistence_error() {
        let (db, workflow) = setup();
        db.set_unavailable(true);
        let err = workflow
            .submit_request(submission("Ran the school newspaper"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }
}
