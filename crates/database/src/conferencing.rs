//! Seam to the external video-conferencing provider.
//!
//! Every call may fail independently of local state; the session service
//! decides how to degrade.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("conferencing provider is not configured")]
    NotConfigured,

    #[error("conferencing provider returned status {0}")]
    Status(u16),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// What to schedule with the provider
#[derive(Debug, Clone, Serialize)]
pub struct MeetingSpec {
    pub topic: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda: Option<String>,
}

/// Changes pushed to an existing meeting
#[derive(Debug, Clone, Default, Serialize)]
pub struct MeetingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda: Option<String>,
}

impl MeetingPatch {
    pub fn is_empty(&self) -> bool {
        self.topic.is_none()
            && self.start_time.is_none()
            && self.duration_minutes.is_none()
            && self.agenda.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub external_id: String,
    pub join_url: String,
    pub start_url: String,
    pub password: Option<String>,
}

/// Outcome of scheduling a meeting: either the provider created it, or a
/// local placeholder stands in for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MeetingRef {
    Real(MeetingDetails),
    Placeholder {
        details: MeetingDetails,
        reason: String,
    },
}

impl MeetingRef {
    pub fn details(&self) -> &MeetingDetails {
        match self {
            Self::Real(details) | Self::Placeholder { details, .. } => details,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

#[async_trait]
pub trait ConferencingProvider: Send + Sync {
    async fn create_meeting(&self, spec: &MeetingSpec) -> Result<MeetingDetails, ProviderError>;

    async fn update_meeting(
        &self,
        external_id: &str,
        patch: &MeetingPatch,
    ) -> Result<(), ProviderError>;

    async fn delete_meeting(&self, external_id: &str) -> Result<(), ProviderError>;
}

/// Used when no provider is configured; every meeting becomes a placeholder
pub struct DisabledProvider;

#[async_trait]
impl ConferencingProvider for DisabledProvider {
    async fn create_meeting(&self, _spec: &MeetingSpec) -> Result<MeetingDetails, ProviderError> {
        Err(ProviderError::NotConfigured)
    }

    async fn update_meeting(
        &self,
        _external_id: &str,
        _patch: &MeetingPatch,
    ) -> Result<(), ProviderError> {
        Err(ProviderError::NotConfigured)
    }

    async fn delete_meeting(&self, _external_id: &str) -> Result<(), ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}

#[derive(Deserialize)]
struct CreatedMeeting {
    id: serde_json::Value,
    join_url: String,
    start_url: String,
    password: Option<String>,
}

/// JSON-over-HTTP meetings API authenticated with a bearer token
pub struct HttpMeetingProvider {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpMeetingProvider {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
        })
    }

    fn meeting_url(&self, external_id: &str) -> String {
        format!("{}/meetings/{external_id}", self.base_url)
    }
}

fn check_status(response: &reqwest::Response) -> Result<(), ProviderError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ProviderError::Status(status.as_u16()))
    }
}

#[async_trait]
impl ConferencingProvider for HttpMeetingProvider {
    async fn create_meeting(&self, spec: &MeetingSpec) -> Result<MeetingDetails, ProviderError> {
        let response = self
            .client
            .post(format!("{}/meetings", self.base_url))
            .bearer_auth(&self.token)
            .json(spec)
            .send()
            .await?;
        check_status(&response)?;

        let created: CreatedMeeting = response.json().await?;
        let external_id = match created.id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        };

        Ok(MeetingDetails {
            external_id,
            join_url: created.join_url,
            start_url: created.start_url,
            password: created.password,
        })
    }

    async fn update_meeting(
        &self,
        external_id: &str,
        patch: &MeetingPatch,
    ) -> Result<(), ProviderError> {
        let response = self
            .client
            .patch(self.meeting_url(external_id))
            .bearer_auth(&self.token)
            .json(patch)
            .send()
            .await?;
        check_status(&response)
    }

    async fn delete_meeting(&self, external_id: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(self.meeting_url(external_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check_status(&response)
    }
}
