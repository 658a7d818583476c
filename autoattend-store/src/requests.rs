//! Request store: access requests waiting for operator approval

use autoattend_core::{AccessRequest, AttendError, AttendResult, Identity, RequestStatus, Secret};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::credentials::UPSERT_USER;

#[derive(Debug, sqlx::FromRow)]
struct RequestRecord {
    request_id: i64,
    user_id: i64,
    username: String,
    password: String,
    status: Option<String>,
}

impl RequestRecord {
    fn into_request(self) -> AttendResult<AccessRequest> {
        let status = match self.status.as_deref() {
            Some(raw) => raw.parse()?,
            None => RequestStatus::Pending,
        };

        Ok(AccessRequest {
            request_id: self.request_id,
            identity: self.user_id,
            username: self.username,
            secret: Secret::new(self.password),
            status,
        })
    }
}

const SELECT_REQUEST: &str =
    "SELECT request_id, user_id, username, password, status FROM requests WHERE request_id = ?";

/// Result of approving or rejecting a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDecision {
    /// The request was pending and now carries the new status
    Applied(AccessRequest),
    /// The request had already been decided; nothing was written
    Unchanged(AccessRequest),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct RequestStore {
    pool: SqlitePool,
}

impl RequestStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Queue a new pending request and return its id
    pub async fn submit(
        &self,
        identity: Identity,
        username: &str,
        secret: &Secret,
    ) -> AttendResult<i64> {
        let result =
            sqlx::query("INSERT INTO requests (user_id, username, password) VALUES (?, ?, ?)")
                .bind(identity)
                .bind(username)
                .bind(secret.expose())
                .execute(&self.pool)
                .await
                .map_err(|e| AttendError::storage("Failed to save request", e, "submit"))?;

        let request_id = result.last_insert_rowid();
        info!(request_id, identity, "Access request submitted");
        Ok(request_id)
    }

    pub async fn get(&self, request_id: i64) -> AttendResult<Option<AccessRequest>> {
        sqlx::query_as::<_, RequestRecord>(SELECT_REQUEST)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AttendError::storage("Failed to load request", e, "get_request"))?
            .map(RequestRecord::into_request)
            .transpose()
    }

    pub async fn list_pending(&self) -> AttendResult<Vec<AccessRequest>> {
        sqlx::query_as::<_, RequestRecord>(
            "SELECT request_id, user_id, username, password, status FROM requests WHERE status = 'pending' ORDER BY request_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AttendError::storage("Failed to list requests", e, "list_pending"))?
        .into_iter()
        .map(RequestRecord::into_request)
        .collect()
    }

    /// Materialize the request's credential and mark it approved, atomically
    ///
    /// The credential is written with `duration_minutes`. Approving a request
    /// that is no longer pending writes nothing.
    pub async fn approve(
        &self,
        request_id: i64,
        duration_minutes: u32,
    ) -> AttendResult<RequestDecision> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AttendError::storage("Failed to begin transaction", e, "approve"))?;

        let record = sqlx::query_as::<_, RequestRecord>(SELECT_REQUEST)
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AttendError::storage("Failed to load request", e, "approve"))?;

        let Some(record) = record else {
            return Ok(RequestDecision::NotFound);
        };
        let mut request = record.into_request()?;

        if request.status != RequestStatus::Pending {
            debug!(request_id, status = %request.status, "Request already decided");
            return Ok(RequestDecision::Unchanged(request));
        }

        sqlx::query(UPSERT_USER)
            .bind(request.identity)
            .bind(&request.username)
            .bind(request.secret.expose())
            .bind(i64::from(duration_minutes))
            .execute(&mut *tx)
            .await
            .map_err(|e| AttendError::storage("Failed to save credential", e, "approve"))?;

        sqlx::query("UPDATE requests SET status = ? WHERE request_id = ?")
            .bind(RequestStatus::Approved.as_str())
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AttendError::storage("Failed to mark request approved", e, "approve"))?;

        tx.commit()
            .await
            .map_err(|e| AttendError::storage("Failed to commit approval", e, "approve"))?;

        request.status = RequestStatus::Approved;
        info!(request_id, identity = request.identity, "Access request approved");
        Ok(RequestDecision::Applied(request))
    }

    /// Mark a pending request rejected; decided requests are left alone
    pub async fn reject(&self, request_id: i64) -> AttendResult<RequestDecision> {
        let result =
            sqlx::query("UPDATE requests SET status = ? WHERE request_id = ? AND status = ?")
                .bind(RequestStatus::Rejected.as_str())
                .bind(request_id)
                .bind(RequestStatus::Pending.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| AttendError::storage("Failed to reject request", e, "reject"))?;

        let Some(request) = self.get(request_id).await? else {
            return Ok(RequestDecision::NotFound);
        };

        if result.rows_affected() > 0 {
            info!(request_id, identity = request.identity, "Access request rejected");
            Ok(RequestDecision::Applied(request))
        } else {
            Ok(RequestDecision::Unchanged(request))
        }
    }
}
