//! Per-decision context for correlating log lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use uuid::Uuid;

/// Identifies one authorization decision across the log lines it produces.
///
/// A context names what is being authorized (the subject, such as
/// `GET /admin` or `DocumentService::read`) and, once known, for whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique id of this decision.
    pub request_id: Uuid,
    /// Shared by a decision and all decisions nested in it.
    pub correlation_id: Uuid,
    /// Enclosing decision, if nested.
    pub parent_id: Option<Uuid>,
    /// Component that started the decision.
    pub source: String,
    /// What is being authorized.
    pub subject: Option<String>,
    /// Principal name, if known up front.
    pub principal: Option<String>,
    /// When the decision started.
    pub started_at: DateTime<Utc>,
    /// Free-form labels.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RequestContext {
    /// Start a new root context.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            request_id: id,
            correlation_id: id,
            parent_id: None,
            source: source.into(),
            subject: None,
            principal: None,
            started_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// A nested context sharing this one's correlation id, principal and
    /// metadata.
    #[must_use]
    pub fn child(&self, source: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            correlation_id: self.correlation_id,
            parent_id: Some(self.request_id),
            source: source.into(),
            subject: None,
            principal: self.principal.clone(),
            started_at: Utc::now(),
            metadata: self.metadata.clone(),
        }
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }

    /// Set the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the principal name.
    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Add a label.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.started_at)
    }

    /// Elapsed time in microseconds. Decisions are usually well under a
    /// millisecond.
    #[must_use]
    pub fn elapsed_us(&self) -> i64 {
        self.elapsed().num_microseconds().unwrap_or(i64::MAX)
    }

    /// The first eight hex digits of the request id.
    #[must_use]
    pub fn short_id(&self) -> String {
        let mut id = self.request_id.simple().to_string();
        id.truncate(8);
        id
    }

    /// A span carrying this context. The `decision` field starts empty and
    /// is filled by [`RequestGuard::record_decision`].
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "authorization",
            request_id = %self.short_id(),
            correlation_id = %self.correlation_id,
            source = %self.source,
            subject = self.subject.as_deref(),
            principal = self.principal.as_deref(),
            decision = tracing::field::Empty,
        )
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Keeps a context's span entered and logs when the decision completes.
pub struct RequestGuard {
    context: RequestContext,
    span: tracing::span::EnteredSpan,
}

impl RequestGuard {
    /// Enter the context's span.
    #[must_use]
    pub fn new(context: RequestContext) -> Self {
        let span = context.span().entered();
        tracing::debug!("authorization started");
        Self { context, span }
    }

    /// The guarded context.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Record the outcome on the span.
    pub fn record_decision(&self, decision: impl Display) {
        self.span
            .record("decision", tracing::field::display(decision));
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        tracing::debug!(
            elapsed_us = self.context.elapsed_us(),
            "authorization completed"
        );
    }
}
