use super::common::{PaginationMeta, default_page, default_per_page, deserialize_some};
use chrono::{DateTime, Utc};
use database::{
    entities::{session_attendees, sessions},
    services::{
        Pagination,
        session::{
            JoinedSession, NewSession, ScheduledSession, SessionDetails, SessionFilter,
            SessionPatch,
        },
    },
};
use models::{
    course::Course,
    enrollment::Program,
    session::{MeetingKind, SessionStatus},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub course: Course,
    pub grade: i16,
    #[schema(value_type = String)]
    pub program: Program,
    pub owner_id: Uuid,
    pub external_id: String,
    /// Empty for placeholder meetings
    pub join_url: String,
    /// Only present for the session's owner
    pub start_url: Option<String>,
    pub password: Option<String>,
    /// `provider` or `placeholder`
    #[schema(value_type = String)]
    pub meeting_kind: MeetingKind,
    pub placeholder_reason: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    #[schema(value_type = String)]
    pub status: SessionStatus,
    pub open_enrollment: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<sessions::Model> for SessionResponse {
    fn from(session: sessions::Model) -> Self {
        Self {
            id: session.id,
            title: session.title,
            description: session.description,
            course: session.course,
            grade: session.grade,
            program: session.program,
            owner_id: session.owner_id,
            external_id: session.external_id,
            join_url: session.join_url,
            start_url: Some(session.start_url).filter(|url| !url.is_empty()),
            password: session.password,
            meeting_kind: session.meeting_kind,
            placeholder_reason: session.placeholder_reason,
            scheduled_at: session.scheduled_at,
            duration_minutes: session.duration_minutes,
            status: session.status,
            open_enrollment: session.open_enrollment,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionDetailsResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub material_ids: Vec<Uuid>,
    pub attendee_count: u64,
}

impl From<SessionDetails> for SessionDetailsResponse {
    fn from(details: SessionDetails) -> Self {
        Self {
            session: details.session.into(),
            material_ids: details.material_ids,
            attendee_count: details.attendee_count,
        }
    }
}

impl From<ScheduledSession> for SessionDetailsResponse {
    fn from(scheduled: ScheduledSession) -> Self {
        Self {
            session: scheduled.session.into(),
            material_ids: scheduled.material_ids,
            attendee_count: 0,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedSessionsResponse {
    pub sessions: Vec<SessionResponse>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub course: Course,
    pub grade: i16,
    #[schema(value_type = String)]
    pub program: Program,
    pub scheduled_at: DateTime<Utc>,
    /// Defaults to 60 minutes
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub open_enrollment: bool,
    #[serde(default)]
    pub material_ids: Vec<Uuid>,
}

impl From<CreateSessionRequest> for NewSession {
    fn from(req: CreateSessionRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            course: req.course,
            grade: req.grade,
            program: req.program,
            scheduled_at: req.scheduled_at,
            duration_minutes: req.duration_minutes,
            open_enrollment: req.open_enrollment,
            material_ids: req.material_ids,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSessionRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub status: Option<SessionStatus>,
    pub open_enrollment: Option<bool>,
    /// Replaces the attached materials
    pub material_ids: Option<Vec<Uuid>>,
}

impl From<UpdateSessionRequest> for SessionPatch {
    fn from(req: UpdateSessionRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            scheduled_at: req.scheduled_at,
            duration_minutes: req.duration_minutes,
            status: req.status,
            open_enrollment: req.open_enrollment,
            material_ids: req.material_ids,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SessionQueryParams {
    #[serde(default = "default_page")]
    pub page: u64,

    #[serde(default = "default_per_page")]
    pub per_page: u64,

    #[param(value_type = Option<String>)]
    pub course: Option<Course>,
    #[param(value_type = Option<String>)]
    pub status: Option<SessionStatus>,
    /// Only scheduled sessions that have not started yet
    #[serde(default)]
    pub upcoming: bool,
}

impl SessionQueryParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }

    pub fn into_filter(self) -> SessionFilter {
        SessionFilter {
            course: self.course,
            status: self.status,
            upcoming: self.upcoming,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub session_id: Uuid,
    /// Absent while the session only has a placeholder meeting
    pub join_url: Option<String>,
    pub password: Option<String>,
    pub first_join: bool,
}

impl From<JoinedSession> for JoinResponse {
    fn from(joined: JoinedSession) -> Self {
        Self {
            session_id: joined.session_id,
            join_url: joined.join_url,
            password: joined.password,
            first_join: joined.first_join,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendeeResponse {
    pub student_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

impl From<session_attendees::Model> for AttendeeResponse {
    fn from(attendee: session_attendees::Model) -> Self {
        Self {
            student_id: attendee.student_id,
            joined_at: attendee.joined_at,
        }
    }
}
