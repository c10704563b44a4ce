//! Security event recording.
//!
//! Every security-relevant action emits an event before the HTTP response
//! is produced. Sinks decide what persistence means; the default sink
//! writes structured log records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::OidcError;

/// Types of security events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    AuthorizationRequested,
    InteractionSucceeded,
    InteractionFailed,
    AuthorizationGranted,
    AuthorizationDenied,
    SessionCreated,
    SessionReused,
    SessionMismatch,
    TokenIssued,
    TokenRefreshed,
    TokenRevoked,
    CibaRequested,
    CibaGranted,
    CibaDenied,
}

impl SecurityEventType {
    /// Returns the wire name of this event type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationRequested => "authorization_requested",
            Self::InteractionSucceeded => "interaction_succeeded",
            Self::InteractionFailed => "interaction_failed",
            Self::AuthorizationGranted => "authorization_granted",
            Self::AuthorizationDenied => "authorization_denied",
            Self::SessionCreated => "session_created",
            Self::SessionReused => "session_reused",
            Self::SessionMismatch => "session_mismatch",
            Self::TokenIssued => "token_issued",
            Self::TokenRefreshed => "token_refreshed",
            Self::TokenRevoked => "token_revoked",
            Self::CibaRequested => "ciba_requested",
            Self::CibaGranted => "ciba_granted",
            Self::CibaDenied => "ciba_denied",
        }
    }
}

/// A recorded security event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Event identifier.
    pub id: Uuid,
    /// Event type.
    pub event_type: SecurityEventType,
    /// Owning tenant.
    pub tenant_id: String,
    /// Client involved, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Subject involved, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Transaction or request the event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Free-form detail payload.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
    /// Event time.
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

impl SecurityEvent {
    /// Creates a new event for the given tenant.
    #[must_use]
    pub fn new(event_type: SecurityEventType, tenant_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            tenant_id: tenant_id.into(),
            client_id: None,
            sub: None,
            transaction_id: None,
            detail: serde_json::Value::Null,
            occurred_at: OffsetDateTime::now_utc(),
        }
    }

    /// Sets the client involved.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the subject involved.
    #[must_use]
    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Sets the owning transaction or request identifier.
    #[must_use]
    pub fn with_transaction(mut self, id: impl ToString) -> Self {
        self.transaction_id = Some(id.to_string());
        self
    }

    /// Attaches a detail payload.
    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Destination for security events.
///
/// `record` is awaited before the triggering response is returned, so a
/// persistent sink guarantees the event outlives the response.
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    /// Records one event.
    async fn record(&self, event: SecurityEvent) -> Result<(), OidcError>;
}

/// Sink that emits events as structured log records.
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

#[async_trait]
impl SecurityEventSink for TracingEventSink {
    async fn record(&self, event: SecurityEvent) -> Result<(), OidcError> {
        tracing::info!(
            event_type = event.event_type.as_str(),
            tenant_id = %event.tenant_id,
            client_id = event.client_id.as_deref().unwrap_or("-"),
            sub = event.sub.as_deref().unwrap_or("-"),
            transaction_id = event.transaction_id.as_deref().unwrap_or("-"),
            detail = %event.detail,
            "security event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracing_sink_records() {
        let sink = TracingEventSink;
        let event = SecurityEvent::new(SecurityEventType::AuthorizationRequested, "tenant-1")
            .with_client("client-1")
            .with_detail(serde_json::json!({"scope": "openid"}));
        assert!(sink.record(event).await.is_ok());
    }

    #[test]
    fn test_builder_fields() {
        let event = SecurityEvent::new(SecurityEventType::TokenIssued, "tenant-1")
            .with_client("client-1")
            .with_sub("user-1")
            .with_transaction("txn-1");
        assert_eq!(event.client_id.as_deref(), Some("client-1"));
        assert_eq!(event.sub.as_deref(), Some("user-1"));
        assert_eq!(event.transaction_id.as_deref(), Some("txn-1"));
    }
}
