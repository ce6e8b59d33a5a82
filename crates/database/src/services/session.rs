//! Video-conference sessions.
//!
//! The conferencing provider is called outside of any transaction. A failed
//! create degrades to a placeholder meeting; failed updates and deletes are
//! logged and the local change goes through anyway.

use crate::{
    access::{AccessTarget, Principal, can_access, ensure_author, ensure_owner, is_owner},
    conferencing::{ConferencingProvider, MeetingDetails, MeetingPatch, MeetingRef, MeetingSpec},
    entities::{materials, session_attendees, session_materials, sessions},
    error::{ServiceError, ServiceResult},
    services::{Page, Pagination, eligibility_condition, optional_text, required_text, validate_grade},
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use models::{
    access::Action,
    course::Course,
    enrollment::{Program, is_eligible},
    session::{MeetingKind, SessionStatus},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, sea_query::OnConflict,
};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewSession {
    pub title: String,
    pub description: Option<String>,
    pub course: Course,
    pub grade: i16,
    pub program: Program,
    pub scheduled_at: DateTime<Utc>,
    /// Defaults to [`SessionService::DEFAULT_DURATION`]
    pub duration_minutes: Option<i32>,
    /// Any student may join, not only eligible ones
    pub open_enrollment: bool,
    pub material_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub status: Option<SessionStatus>,
    pub open_enrollment: Option<bool>,
    pub material_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub course: Option<Course>,
    pub status: Option<SessionStatus>,
    /// Only sessions that have not started yet
    pub upcoming: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledSession {
    pub session: sessions::Model,
    pub meeting: MeetingRef,
    pub material_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetails {
    pub session: sessions::Model,
    pub material_ids: Vec<Uuid>,
    pub attendee_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinedSession {
    pub session_id: Uuid,
    /// None while the session only has a placeholder meeting
    pub join_url: Option<String>,
    pub password: Option<String>,
    /// False when the student had already joined
    pub first_join: bool,
}

pub struct SessionService;

impl SessionService {
    pub const DEFAULT_DURATION: i32 = 60;
    const MAX_DURATION: i32 = 600;

    pub async fn create(
        db: &DatabaseConnection,
        provider: &dyn ConferencingProvider,
        principal: &Principal,
        session: NewSession,
    ) -> ServiceResult<ScheduledSession> {
        ensure_author(principal)?;
        let title = required_text("title", &session.title)?;
        let description = optional_text(session.description);
        validate_grade(session.grade)?;
        let duration = Self::validate_duration(
            session
                .duration_minutes
                .unwrap_or(Self::DEFAULT_DURATION),
        )?;
        let material_ids =
            Self::validate_materials(db, principal.id, &session.material_ids).await?;

        let meeting = Self::schedule_meeting(
            provider,
            &MeetingSpec {
                topic: title.clone(),
                start_time: session.scheduled_at,
                duration_minutes: duration,
                agenda: description.clone(),
            },
        )
        .await;
        let details = meeting.details().clone();

        let (meeting_kind, placeholder_reason) = match &meeting {
            MeetingRef::Real(_) => (MeetingKind::Provider, None),
            MeetingRef::Placeholder { reason, .. } => {
                (MeetingKind::Placeholder, Some(reason.clone()))
            }
        };

        let now = Utc::now();
        let txn = db.begin().await?;
        let created = sessions::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title),
            description: Set(description),
            course: Set(session.course),
            grade: Set(session.grade),
            program: Set(session.program),
            owner_id: Set(principal.id),
            external_id: Set(details.external_id),
            join_url: Set(details.join_url),
            start_url: Set(details.start_url),
            password: Set(details.password),
            meeting_kind: Set(meeting_kind),
            placeholder_reason: Set(placeholder_reason),
            scheduled_at: Set(session.scheduled_at),
            duration_minutes: Set(duration),
            status: Set(SessionStatus::Scheduled),
            open_enrollment: Set(session.open_enrollment),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        Self::replace_materials(&txn, created.id, &material_ids).await?;
        txn.commit().await?;

        info!(
            "Scheduled session {} ({:?} meeting {})",
            created.id, created.meeting_kind, created.external_id
        );
        Ok(ScheduledSession {
            session: created,
            meeting,
            material_ids,
        })
    }

    /// Read-authorized fetch. The host start URL is only returned to the owner.
    pub async fn get(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<SessionDetails> {
        let session = Self::find(db, id).await?;
        if !Self::can_view(principal, &session) {
            return Err(ServiceError::AccessDenied);
        }

        let material_ids = Self::material_ids(db, id).await?;
        let attendee_count = session_attendees::Entity::find()
            .filter(session_attendees::Column::SessionId.eq(id))
            .count(db)
            .await?;

        Ok(SessionDetails {
            session: Self::redacted(principal, session),
            material_ids,
            attendee_count,
        })
    }

    /// Teachers list their own sessions; students list eligible and open ones
    pub async fn list(
        db: &DatabaseConnection,
        principal: &Principal,
        filter: SessionFilter,
        pagination: Pagination,
    ) -> ServiceResult<Page<sessions::Model>> {
        pagination.validate()?;

        let visible = if principal.role.can_author() {
            Condition::all().add(sessions::Column::OwnerId.eq(principal.id))
        } else {
            let mut visible = Condition::any().add(sessions::Column::OpenEnrollment.eq(true));
            if let Some(eligible) =
                eligibility_condition(sessions::Column::Grade, sessions::Column::Program, principal)
            {
                visible = visible.add(eligible);
            }
            visible
        };

        let mut condition = Condition::all().add(visible);
        if let Some(course) = filter.course {
            condition = condition.add(sessions::Column::Course.eq(course));
        }
        if let Some(status) = filter.status {
            condition = condition.add(sessions::Column::Status.eq(status));
        }
        if filter.upcoming {
            condition = condition
                .add(sessions::Column::ScheduledAt.gte(Utc::now()))
                .add(sessions::Column::Status.eq(SessionStatus::Scheduled));
        }

        let query = sessions::Entity::find()
            .filter(condition)
            .order_by_asc(sessions::Column::ScheduledAt);

        let total_items = query.clone().count(db).await?;
        let items = query
            .paginate(db, pagination.per_page)
            .fetch_page(pagination.page - 1)
            .await?
            .into_iter()
            .map(|s| Self::redacted(principal, s))
            .collect();

        Ok(Page::new(items, pagination, total_items))
    }

    pub async fn update(
        db: &DatabaseConnection,
        provider: &dyn ConferencingProvider,
        principal: &Principal,
        id: Uuid,
        patch: SessionPatch,
    ) -> ServiceResult<sessions::Model> {
        let session = Self::find(db, id).await?;
        ensure_owner(principal, session.owner_id)?;

        if session.status.is_terminal() {
            return Err(ServiceError::validation(
                "status",
                format!("session is {:?} and can no longer change", session.status),
            ));
        }
        if let Some(next) = patch.status {
            Self::ensure_transition(session.status, next)?;
        }

        let material_ids = match &patch.material_ids {
            Some(ids) => Some(Self::validate_materials(db, principal.id, ids).await?),
            None => None,
        };

        let mut meeting_patch = MeetingPatch::default();
        let meeting_kind = session.meeting_kind;
        let external_id = session.external_id.clone();
        let mut model: sessions::ActiveModel = session.into();

        if let Some(title) = patch.title {
            let title = required_text("title", &title)?;
            meeting_patch.topic = Some(title.clone());
            model.title = Set(title);
        }
        if let Some(description) = patch.description {
            let description = optional_text(description);
            meeting_patch.agenda = description.clone();
            model.description = Set(description);
        }
        if let Some(scheduled_at) = patch.scheduled_at {
            meeting_patch.start_time = Some(scheduled_at);
            model.scheduled_at = Set(scheduled_at);
        }
        if let Some(duration) = patch.duration_minutes {
            let duration = Self::validate_duration(duration)?;
            meeting_patch.duration_minutes = Some(duration);
            model.duration_minutes = Set(duration);
        }
        if let Some(status) = patch.status {
            model.status = Set(status);
        }
        if let Some(open_enrollment) = patch.open_enrollment {
            model.open_enrollment = Set(open_enrollment);
        }
        model.updated_at = Set(Utc::now());

        let txn = db.begin().await?;
        let updated = model.update(&txn).await?;
        if let Some(material_ids) = material_ids {
            Self::replace_materials(&txn, id, &material_ids).await?;
        }
        txn.commit().await?;

        if meeting_kind == MeetingKind::Provider && !meeting_patch.is_empty() {
            if let Err(e) = provider.update_meeting(&external_id, &meeting_patch).await {
                warn!("Failed to update meeting {external_id} of session {id}: {e}");
            }
        }

        Ok(updated)
    }

    /// Cancels a session. Cancellation is terminal.
    pub async fn cancel(
        db: &DatabaseConnection,
        provider: &dyn ConferencingProvider,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<sessions::Model> {
        let session = Self::find(db, id).await?;
        ensure_owner(principal, session.owner_id)?;
        Self::ensure_transition(session.status, SessionStatus::Cancelled)?;

        let meeting_kind = session.meeting_kind;
        let external_id = session.external_id.clone();

        let mut model: sessions::ActiveModel = session.into();
        model.status = Set(SessionStatus::Cancelled);
        model.updated_at = Set(Utc::now());
        let cancelled = model.update(db).await?;

        if meeting_kind == MeetingKind::Provider {
            Self::release_meeting(provider, id, &external_id).await;
        }

        info!("Cancelled session {id}");
        Ok(cancelled)
    }

    /// Removes a session together with its attendance and material links
    pub async fn delete(
        db: &DatabaseConnection,
        provider: &dyn ConferencingProvider,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<()> {
        let session = Self::find(db, id).await?;
        ensure_owner(principal, session.owner_id)?;

        let txn = db.begin().await?;
        session_attendees::Entity::delete_many()
            .filter(session_attendees::Column::SessionId.eq(id))
            .exec(&txn)
            .await?;
        session_materials::Entity::delete_many()
            .filter(session_materials::Column::SessionId.eq(id))
            .exec(&txn)
            .await?;
        let result = sessions::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("session", id));
        }

        // A cancelled session already released its meeting
        if session.meeting_kind == MeetingKind::Provider && session.status != SessionStatus::Cancelled
        {
            Self::release_meeting(provider, id, &session.external_id).await;
        }

        info!("Deleted session {id}");
        Ok(())
    }

    /// Records a student's attendance, at most once per session
    pub async fn join(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<JoinedSession> {
        let session = Self::find(db, id).await?;

        if !principal.is_student() {
            return Err(ServiceError::AccessDenied);
        }
        let eligible = session.open_enrollment
            || is_eligible(
                session.grade,
                session.program,
                principal.grade,
                principal.program,
            );
        if !eligible {
            return Err(ServiceError::AccessDenied);
        }
        if !session.status.is_joinable() {
            return Err(ServiceError::validation(
                "status",
                format!("session is {:?}", session.status),
            ));
        }

        let attendee = session_attendees::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(id),
            student_id: Set(principal.id),
            joined_at: Set(Utc::now()),
        };
        let inserted = session_attendees::Entity::insert(attendee)
            .on_conflict(
                OnConflict::columns([
                    session_attendees::Column::SessionId,
                    session_attendees::Column::StudentId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        if inserted > 0 {
            info!("Student {} joined session {id}", principal.id);
        }

        let has_meeting = session.meeting_kind == MeetingKind::Provider;
        Ok(JoinedSession {
            session_id: id,
            join_url: has_meeting.then_some(session.join_url),
            password: if has_meeting { session.password } else { None },
            first_join: inserted > 0,
        })
    }

    /// Attendance list, for the session owner
    pub async fn attendees(
        db: &DatabaseConnection,
        principal: &Principal,
        id: Uuid,
    ) -> ServiceResult<Vec<session_attendees::Model>> {
        let session = Self::find(db, id).await?;
        ensure_owner(principal, session.owner_id)?;

        Ok(session_attendees::Entity::find()
            .filter(session_attendees::Column::SessionId.eq(id))
            .order_by_asc(session_attendees::Column::JoinedAt)
            .all(db)
            .await?)
    }

    /// Rebuilds the meeting outcome recorded for a session
    pub fn meeting_ref(session: &sessions::Model) -> MeetingRef {
        let details = MeetingDetails {
            external_id: session.external_id.clone(),
            join_url: session.join_url.clone(),
            start_url: session.start_url.clone(),
            password: session.password.clone(),
        };

        match session.meeting_kind {
            MeetingKind::Provider => MeetingRef::Real(details),
            MeetingKind::Placeholder => MeetingRef::Placeholder {
                details,
                reason: session.placeholder_reason.clone().unwrap_or_default(),
            },
        }
    }

    pub(crate) async fn find(db: &DatabaseConnection, id: Uuid) -> ServiceResult<sessions::Model> {
        sessions::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("session", id))
    }

    fn can_view(principal: &Principal, session: &sessions::Model) -> bool {
        can_access(principal, &AccessTarget::session(session), Action::Read)
            || (principal.is_student() && session.open_enrollment)
    }

    fn redacted(principal: &Principal, mut session: sessions::Model) -> sessions::Model {
        if !is_owner(principal, session.owner_id) {
            session.start_url = String::new();
        }
        session
    }

    async fn schedule_meeting(provider: &dyn ConferencingProvider, spec: &MeetingSpec) -> MeetingRef {
        match provider.create_meeting(spec).await {
            Ok(details) => MeetingRef::Real(details),
            Err(e) => {
                let reason = e.to_string();
                let details = MeetingDetails {
                    external_id: format!("local-{}", Uuid::new_v4()),
                    join_url: String::new(),
                    start_url: String::new(),
                    password: None,
                };
                warn!(
                    "Conferencing provider failed, scheduling placeholder meeting {} for {:?}: {reason}",
                    details.external_id, spec.topic
                );
                MeetingRef::Placeholder { details, reason }
            }
        }
    }

    async fn release_meeting(provider: &dyn ConferencingProvider, id: Uuid, external_id: &str) {
        if let Err(e) = provider.delete_meeting(external_id).await {
            warn!("Failed to delete meeting {external_id} of session {id}: {e}");
        }
    }

    fn ensure_transition(current: SessionStatus, next: SessionStatus) -> ServiceResult<()> {
        if current.can_transition_to(next) {
            Ok(())
        } else {
            Err(ServiceError::validation(
                "status",
                format!("cannot move from {current:?} to {next:?}"),
            ))
        }
    }

    fn validate_duration(minutes: i32) -> ServiceResult<i32> {
        if (1..=Self::MAX_DURATION).contains(&minutes) {
            Ok(minutes)
        } else {
            Err(ServiceError::validation(
                "duration_minutes",
                format!("must be between 1 and {}", Self::MAX_DURATION),
            ))
        }
    }

    /// Deduplicates and checks that every material belongs to the owner
    async fn validate_materials(
        db: &DatabaseConnection,
        owner_id: Uuid,
        ids: &[Uuid],
    ) -> ServiceResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(ids);
        }

        let owned = materials::Entity::find()
            .filter(materials::Column::Id.is_in(ids.clone()))
            .filter(materials::Column::OwnerId.eq(owner_id))
            .count(db)
            .await?;
        if owned != ids.len() as u64 {
            return Err(ServiceError::validation("material_ids", "unknown material"));
        }
        Ok(ids)
    }

    async fn replace_materials<C: ConnectionTrait>(
        db: &C,
        session_id: Uuid,
        material_ids: &[Uuid],
    ) -> ServiceResult<()> {
        session_materials::Entity::delete_many()
            .filter(session_materials::Column::SessionId.eq(session_id))
            .exec(db)
            .await?;

        if material_ids.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let links = material_ids.iter().map(|material_id| session_materials::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session_id),
            material_id: Set(*material_id),
            created_at: Set(now),
        });
        session_materials::Entity::insert_many(links)
            .exec_without_returning(db)
            .await?;
        Ok(())
    }

    async fn material_ids(db: &DatabaseConnection, session_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        Ok(session_materials::Entity::find()
            .select_only()
            .column(session_materials::Column::MaterialId)
            .filter(session_materials::Column::SessionId.eq(session_id))
            .order_by_asc(session_materials::Column::CreatedAt)
            .into_tuple::<Uuid>()
            .all(db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::material::{MaterialService, NewMaterial},
        test_support::{FakeProvider, db, student, teacher},
    };
    use chrono::Duration;
    use models::material::{MaterialType, Priority};
    use rstest::rstest;
    use std::sync::atomic::Ordering;

    fn session(title: &str) -> NewSession {
        NewSession {
            title: title.to_string(),
            description: Some("Bring your lab notebook".to_string()),
            course: Course::Chemistry,
            grade: 11,
            program: Program::Est,
            scheduled_at: Utc::now() + Duration::days(1),
            duration_minutes: None,
            open_enrollment: false,
            material_ids: vec![],
        }
    }

    async fn link(db: &DatabaseConnection, owner: &Principal, title: &str) -> materials::Model {
        MaterialService::create(
            db,
            owner,
            NewMaterial {
                title: title.to_string(),
                description: None,
                material_type: MaterialType::Link,
                course: Course::Chemistry,
                grade: 11,
                program: Program::Est,
                folder_id: None,
                file: None,
                url: Some("https://example.com".to_string()),
                tags: vec![],
                is_public: false,
                due_date: None,
                priority: Priority::Low,
            },
        )
        .await
        .unwrap()
    }

    #[rstest]
    #[tokio::test]
    async fn test_create_with_provider(#[future] db: DatabaseConnection) {
        let db = db.await;
        let provider = FakeProvider::working();
        let owner = Principal::from(&teacher(&db).await);
        let handout = link(&db, &owner, "Handout").await;

        let scheduled = SessionService::create(
            &db,
            &provider,
            &owner,
            NewSession {
                material_ids: vec![handout.id, handout.id],
                ..session("Titration review")
            },
        )
        .await
        .unwrap();

        assert!(!scheduled.meeting.is_placeholder());
        assert_eq!(scheduled.session.meeting_kind, MeetingKind::Provider);
        assert_eq!(scheduled.session.external_id, "meeting-1");
        assert_eq!(scheduled.session.duration_minutes, SessionService::DEFAULT_DURATION);
        assert_eq!(scheduled.session.status, SessionStatus::Scheduled);
        assert_eq!(scheduled.material_ids, vec![handout.id]);
        assert_eq!(SessionService::meeting_ref(&scheduled.session), scheduled.meeting);

        let details = SessionService::get(&db, &owner, scheduled.session.id)
            .await
            .unwrap();
        assert_eq!(details.material_ids, vec![handout.id]);
        assert!(!details.session.start_url.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_provider_failure_falls_back_to_placeholder(#[future] db: DatabaseConnection) {
        let db = db.await;
        let provider = FakeProvider::failing();
        let owner = Principal::from(&teacher(&db).await);
        let pupil = Principal::from(&student(&db, 11, Program::Act).await);

        let scheduled = SessionService::create(&db, &provider, &owner, session("Offline review"))
            .await
            .unwrap();

        match &scheduled.meeting {
            MeetingRef::Placeholder { details, reason } => {
                assert!(details.external_id.starts_with("local-"));
                assert!(details.join_url.is_empty());
                assert!(reason.contains("503"));
            }
            MeetingRef::Real(_) => panic!("expected a placeholder meeting"),
        }
        assert_eq!(scheduled.session.meeting_kind, MeetingKind::Placeholder);
        assert!(scheduled.session.placeholder_reason.is_some());

        // Placeholder meetings are never pushed to the provider
        SessionService::update(
            &db,
            &provider,
            &owner,
            scheduled.session.id,
            SessionPatch {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(provider.updates.load(Ordering::SeqCst), 0);

        let joined = SessionService::join(&db, &pupil, scheduled.session.id)
            .await
            .unwrap();
        assert_eq!(joined.join_url, None);
        assert!(joined.first_join);
    }

    #[rstest]
    #[tokio::test]
    async fn test_join_records_attendance_once(#[future] db: DatabaseConnection) {
        let db = db.await;
        let provider = FakeProvider::working();
        let owner = Principal::from(&teacher(&db).await);
        let pupil = Principal::from(&student(&db, 11, Program::Act).await);

        let scheduled = SessionService::create(&db, &provider, &owner, session("Review"))
            .await
            .unwrap();
        let id = scheduled.session.id;

        let first = SessionService::join(&db, &pupil, id).await.unwrap();
        let second = SessionService::join(&db, &pupil, id).await.unwrap();
        assert!(first.first_join);
        assert!(!second.first_join);
        assert_eq!(first.join_url.as_deref(), Some(scheduled.session.join_url.as_str()));

        let attendees = SessionService::attendees(&db, &owner, id).await.unwrap();
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].student_id, pupil.id);

        let denied = SessionService::attendees(&db, &pupil, id).await;
        assert!(matches!(denied, Err(ServiceError::AccessDenied)));

        // Students see the session but not the host link
        let details = SessionService::get(&db, &pupil, id).await.unwrap();
        assert_eq!(details.attendee_count, 1);
        assert!(details.session.start_url.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_join_requires_eligibility_or_open_enrollment(#[future] db: DatabaseConnection) {
        let db = db.await;
        let provider = FakeProvider::working();
        let owner = Principal::from(&teacher(&db).await);
        let outsider = Principal::from(&student(&db, 9, Program::Act).await);

        let closed = SessionService::create(&db, &provider, &owner, session("Closed"))
            .await
            .unwrap();
        let open = SessionService::create(
            &db,
            &provider,
            &owner,
            NewSession {
                open_enrollment: true,
                ..session("Open")
            },
        )
        .await
        .unwrap();

        let rejected = SessionService::join(&db, &outsider, closed.session.id).await;
        assert!(matches!(rejected, Err(ServiceError::AccessDenied)));
        assert!(SessionService::get(&db, &outsider, closed.session.id).await.is_err());

        assert!(SessionService::join(&db, &outsider, open.session.id).await.is_ok());

        let by_teacher = SessionService::join(&db, &owner, open.session.id).await;
        assert!(matches!(by_teacher, Err(ServiceError::AccessDenied)));

        let listed = SessionService::list(&db, &outsider, SessionFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(listed.total_items, 1);
        assert_eq!(listed.items[0].id, open.session.id);
    }

    #[rstest]
    #[tokio::test]
    async fn test_cancel_is_terminal(#[future] db: DatabaseConnection) {
        let db = db.await;
        let provider = FakeProvider::working();
        let owner = Principal::from(&teacher(&db).await);
        let pupil = Principal::from(&student(&db, 11, Program::Est).await);

        let scheduled = SessionService::create(&db, &provider, &owner, session("Review"))
            .await
            .unwrap();
        let id = scheduled.session.id;

        let started = SessionService::update(
            &db,
            &provider,
            &owner,
            id,
            SessionPatch {
                status: Some(SessionStatus::Started),
                duration_minutes: Some(90),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(started.status, SessionStatus::Started);
        assert_eq!(provider.updates.load(Ordering::SeqCst), 1);

        let backwards = SessionService::update(
            &db,
            &provider,
            &owner,
            id,
            SessionPatch {
                status: Some(SessionStatus::Scheduled),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(backwards, Err(ServiceError::Validation { field: "status", .. })));

        let cancelled = SessionService::cancel(&db, &provider, &owner, id).await.unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert_eq!(provider.deletes.load(Ordering::SeqCst), 1);

        assert!(SessionService::cancel(&db, &provider, &owner, id).await.is_err());
        assert!(SessionService::join(&db, &pupil, id).await.is_err());

        SessionService::delete(&db, &provider, &owner, id).await.unwrap();
        assert_eq!(provider.deletes.load(Ordering::SeqCst), 1);
        assert!(matches!(
            SessionService::get(&db, &owner, id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn test_provider_failures_do_not_block_local_changes(#[future] db: DatabaseConnection) {
        let db = db.await;
        let working = FakeProvider::working();
        let failing = FakeProvider::failing();
        let owner = Principal::from(&teacher(&db).await);

        let scheduled = SessionService::create(&db, &working, &owner, session("Review"))
            .await
            .unwrap();
        let id = scheduled.session.id;

        let moved = SessionService::update(
            &db,
            &failing,
            &owner,
            id,
            SessionPatch {
                duration_minutes: Some(45),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(moved.duration_minutes, 45);
        assert_eq!(failing.updates.load(Ordering::SeqCst), 1);

        SessionService::delete(&db, &failing, &owner, id).await.unwrap();
        assert_eq!(failing.deletes.load(Ordering::SeqCst), 1);
        assert!(SessionService::find(&db, id).await.is_err());
    }

    #[rstest]
    #[tokio::test]
    async fn test_create_validation(#[future] db: DatabaseConnection) {
        let db = db.await;
        let provider = FakeProvider::working();
        let owner = Principal::from(&teacher(&db).await);
        let other = Principal::from(&teacher(&db).await);
        let pupil = Principal::from(&student(&db, 11, Program::Est).await);
        let foreign = link(&db, &other, "Not yours").await;

        let too_long = SessionService::create(
            &db,
            &provider,
            &owner,
            NewSession {
                duration_minutes: Some(601),
                ..session("Marathon")
            },
        )
        .await;
        assert!(matches!(
            too_long,
            Err(ServiceError::Validation { field: "duration_minutes", .. })
        ));

        let foreign_material = SessionService::create(
            &db,
            &provider,
            &owner,
            NewSession {
                material_ids: vec![foreign.id],
                ..session("Borrowed")
            },
        )
        .await;
        assert!(matches!(
            foreign_material,
            Err(ServiceError::Validation { field: "material_ids", .. })
        ));

        let by_student = SessionService::create(&db, &provider, &pupil, session("Mine")).await;
        assert!(matches!(by_student, Err(ServiceError::AccessDenied)));

        assert_eq!(provider.creates.load(Ordering::SeqCst), 0);
    }
}
