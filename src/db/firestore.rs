// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile records, including live listeners)
//! - Point requests (student submissions and admin reviews)

use crate::db::{collections, Database, ProfileEvent, ProfileSubscription, ALREADY_REVIEWED};
use crate::error::AppError;
use crate::models::{
    NewPointRequest, PointRequest, RequestStatus, Review, ReviewDecision, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::{
    FirestoreConsistencySelector, FirestoreListenEvent, FirestoreListenerTarget,
    FirestoreMemListenStateStorage,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

const PROFILE_LISTEN_TARGET_ID: u32 = 1;
const PROFILE_EVENT_BUFFER: usize = 16;

/// Point request as laid out in the `pointRequests` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointRequestDocument {
    #[serde(alias = "_firestore_id", default, skip_serializing)]
    id: Option<String>,
    user_id: String,
    student_name: String,
    reason: String,
    status: RequestStatus,
    #[serde(with = "firestore::serialize_as_timestamp")]
    requested_at: DateTime<Utc>,
    #[serde(
        default,
        with = "firestore::serialize_as_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    points_awarded: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    admin_notes: Option<String>,
}

/// The subset of fields written when a request is reviewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewFields {
    status: RequestStatus,
    #[serde(with = "firestore::serialize_as_timestamp")]
    reviewed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    points_awarded: Option<u32>,
    admin_notes: String,
}

impl ReviewFields {
    fn from_review(review: &Review) -> Self {
        match review {
            Review::Approved {
                points_awarded,
                admin_notes,
                reviewed_at,
            } => Self {
                status: RequestStatus::Approved,
                reviewed_at: *reviewed_at,
                points_awarded: Some(*points_awarded),
                admin_notes: admin_notes.clone(),
            },
            Review::Rejected {
                admin_notes,
                reviewed_at,
            } => Self {
                status: RequestStatus::Rejected,
                reviewed_at: *reviewed_at,
                points_awarded: None,
                admin_notes: admin_notes.clone(),
            },
        }
    }

    /// Field mask for the partial update.
    fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = vec!["status", "reviewedAt", "adminNotes"];
        if self.points_awarded.is_some() {
            paths.push("pointsAwarded");
        }
        paths
    }
}

impl PointRequestDocument {
    fn from_new(request: &NewPointRequest, requested_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id: request.user_id.clone(),
            student_name: request.student_name.clone(),
            reason: request.reason.clone(),
            status: RequestStatus::Pending,
            requested_at,
            reviewed_at: None,
            points_awarded: None,
            admin_notes: None,
        }
    }
}

impl TryFrom<PointRequestDocument> for PointRequest {
    type Error = AppError;

    fn try_from(doc: PointRequestDocument) -> Result<Self, Self::Error> {
        let id = doc.id.ok_or_else(|| {
            AppError::Persistence("Point request document is missing its id".to_string())
        })?;
        let malformed =
            |what: &str| AppError::Persistence(format!("Point request {} is malformed: {}", id, what));

        let review = match (doc.status, doc.reviewed_at) {
            (RequestStatus::Pending, _) => None,
            (RequestStatus::Approved, Some(reviewed_at)) => Some(Review::Approved {
                points_awarded: doc
                    .points_awarded
                    .ok_or_else(|| malformed("approved without pointsAwarded"))?,
                admin_notes: doc.admin_notes.unwrap_or_default(),
                reviewed_at,
            }),
            (RequestStatus::Rejected, Some(reviewed_at)) => Some(Review::Rejected {
                admin_notes: doc.admin_notes.unwrap_or_default(),
                reviewed_at,
            }),
            (_, None) => return Err(malformed("reviewed without reviewedAt")),
        };

        Ok(PointRequest {
            id,
            user_id: doc.user_id,
            student_name: doc.student_name,
            reason: doc.reason,
            requested_at: doc.requested_at,
            review,
        })
    }
}

fn db_error(e: impl std::fmt::Display) -> AppError {
    AppError::Persistence(e.to_string())
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any token; skip credential discovery entirely.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Persistence(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or_else(|| {
            AppError::Persistence("Database not connected (offline mode)".to_string())
        })
    }

    /// Start a listener on one user document, forwarding changes into `tx`.
    async fn start_profile_listener(
        &self,
        uid: &str,
        tx: mpsc::Sender<ProfileEvent>,
    ) -> Result<oneshot::Sender<()>, AppError> {
        let client = self.get_client()?;

        let mut listener = client
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(db_error)?;

        client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .batch_listen([uid.to_string()])
            .add_target(FirestoreListenerTarget::new(PROFILE_LISTEN_TARGET_ID), &mut listener)
            .map_err(db_error)?;

        listener
            .start(move |event| {
                let tx = tx.clone();
                async move {
                    let forwarded = match event {
                        FirestoreListenEvent::DocumentChange(ref change) => {
                            change.document.as_ref().map(|doc| {
                                match firestore::FirestoreDb::deserialize_doc_to::<User>(doc) {
                                    Ok(user) => ProfileEvent::Snapshot(Some(user)),
                                    Err(e) => ProfileEvent::Error(e.to_string()),
                                }
                            })
                        }
                        FirestoreListenEvent::DocumentDelete(_)
                        | FirestoreListenEvent::DocumentRemove(_) => {
                            Some(ProfileEvent::Snapshot(None))
                        }
                        _ => None,
                    };
                    if let Some(event) = forwarded {
                        // Receiver gone means the subscription was cancelled.
                        let _ = tx.send(event).await;
                    }
                    Ok(())
                }
            })
            .await
            .map_err(db_error)?;

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let uid = uid.to_string();
        tokio::spawn(async move {
            let _ = stop_rx.await;
            if let Err(e) = listener.shutdown().await {
                tracing::warn!(uid = %uid, error = %e, "Failed to shut down profile listener");
            }
        });

        Ok(stop_tx)
    }
}

#[async_trait]
impl Database for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(db_error)
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .execute()
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn watch_user(&self, uid: &str) -> Result<ProfileSubscription, AppError> {
        let (tx, events) = mpsc::channel(PROFILE_EVENT_BUFFER);

        // Listeners only report changes, so seed with the current document.
        let current = self.get_user(uid).await?;
        tx.send(ProfileEvent::Snapshot(current))
            .await
            .map_err(|_| AppError::Persistence("Profile listener closed".to_string()))?;

        let stop = self.start_profile_listener(uid, tx).await?;
        tracing::debug!(uid, "Profile listener started");

        Ok(ProfileSubscription::new(uid, events, move || {
            let _ = stop.send(());
        }))
    }

    // ─── Point Request Operations ────────────────────────────────

    async fn insert_point_request(&self, request: &NewPointRequest) -> Result<String, AppError> {
        let doc = PointRequestDocument::from_new(request, Utc::now());

        let created: PointRequestDocument = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::POINT_REQUESTS)
            .generate_document_id()
            .object(&doc)
            .execute()
            .await
            .map_err(db_error)?;

        created.id.ok_or_else(|| {
            AppError::Persistence("Firestore did not return a document id".to_string())
        })
    }

    async fn get_point_request(&self, id: &str) -> Result<Option<PointRequest>, AppError> {
        let doc: Option<PointRequestDocument> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::POINT_REQUESTS)
            .obj()
            .one(id)
            .await
            .map_err(db_error)?;

        doc.map(PointRequest::try_from).transpose()
    }

    async fn list_point_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PointRequest>, AppError> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::POINT_REQUESTS);

        let docs: Vec<PointRequestDocument> = match status {
            Some(status) => {
                query
                    .filter(move |q| q.field("status").eq(status.as_str()))
                    .obj::<PointRequestDocument>()
                    .query()
                    .await
            }
            None => query.obj::<PointRequestDocument>().query().await,
        }
        .map_err(db_error)?;

        // Sorted here rather than in the query: status + requestedAt ordering
        // would need a composite index.
        let mut requests = docs
            .into_iter()
            .map(PointRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    async fn record_review(&self, id: &str, decision: &ReviewDecision) -> Result<(), AppError> {
        let fields = ReviewFields::from_review(&decision.clone().stamp(Utc::now()));
        let client = self.get_client()?;

        let mut transaction = client.begin_transaction().await.map_err(db_error)?;

        // Reading inside the transaction makes a concurrent review's commit
        // conflict with this one.
        let current: Option<PointRequestDocument> = client
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collections::POINT_REQUESTS)
            .obj()
            .one(id)
            .await
            .map_err(db_error)?;

        match current {
            None => {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!(
                    "Point request {} not found",
                    id
                )));
            }
            Some(doc) if doc.status != RequestStatus::Pending => {
                let _ = transaction.rollback().await;
                tracing::info!(request_id = id, "Review of already-reviewed request refused");
                return Err(AppError::Validation(ALREADY_REVIEWED.to_string()));
            }
            Some(_) => {}
        }

        client
            .fluent()
            .update()
            .fields(fields.field_paths())
            .in_col(collections::POINT_REQUESTS)
            .document_id(id)
            .object(&fields)
            .add_to_transaction(&mut transaction)
            .map_err(db_error)?;

        transaction.commit().await.map_err(|e| {
            AppError::Persistence(format!("Review commit failed: {}", e))
        })?;

        tracing::info!(request_id = id, status = %fields.status, "Point request reviewed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(status: RequestStatus) -> PointRequestDocument {
        PointRequestDocument {
            id: Some("req-1".to_string()),
            user_id: "u1".to_string(),
            student_name: "Ann".to_string(),
            reason: "Led the robotics club".to_string(),
            status,
            requested_at: Utc::now(),
            reviewed_at: None,
            points_awarded: None,
            admin_notes: None,
        }
    }

    #[test]
    fn test_pending_document_converts() {
        let request = PointRequest::try_from(doc(RequestStatus::Pending)).unwrap();
        assert_eq!(request.status(), RequestStatus::Pending);
        assert!(request.review.is_none());
    }

    #[test]
    fn test_reviewed_document_without_timestamp_is_rejected() {
        let err = PointRequest::try_from(doc(RequestStatus::Rejected)).unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }

    #[test]
    fn test_approved_document_requires_points() {
        let mut approved = doc(RequestStatus::Approved);
        approved.reviewed_at = Some(Utc::now());
        assert!(PointRequest::try_from(approved.clone()).is_err());

        approved.points_awarded = Some(25);
        let request = PointRequest::try_from(approved).unwrap();
        assert_eq!(request.points_awarded(), Some(25));
    }

    #[test]
    fn test_review_field_mask() {
        let approve = ReviewDecision::Approve {
            points_awarded: 10,
            admin_notes: String::new(),
        }
        .stamp(Utc::now());
        assert!(ReviewFields::from_review(&approve)
            .field_paths()
            .contains(&"pointsAwarded"));

        let reject = ReviewDecision::Reject {
            admin_notes: "Duplicate".to_string(),
        }
        .stamp(Utc::now());
        assert!(!ReviewFields::from_review(&reject)
            .field_paths()
            .contains(&"pointsAwarded"));
    }

    #[tokio::test]
    async fn test_offline_mode_reports_persistence_error() {
        let db = FirestoreDb::new_mock();
        let err = db.list_point_requests(None).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }
}
