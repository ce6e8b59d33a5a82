//! Read-only statistics over materials and sessions. Scoping follows the
//! same rules as the material and session listings.

use crate::{
    access::{Principal, ensure_author},
    entities::{materials, session_attendees, sessions, users},
    error::{ServiceError, ServiceResult},
    services::{
        OwnerScope, eligibility_condition,
        material::{MaterialFilter, MaterialService},
    },
};
use chrono::{DateTime, Utc};
use models::{
    course::Course,
    material::MaterialType,
    session::{MeetingKind, SessionStatus},
};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct MaterialOverview {
    pub total_materials: i64,
    pub total_views: i64,
    pub total_downloads: i64,
    pub by_type: Vec<(MaterialType, i64)>,
    pub by_course: Vec<(Course, i64)>,
    pub most_viewed: Vec<materials::Model>,
    pub most_downloaded: Vec<materials::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOverview {
    pub total_sessions: i64,
    pub by_status: Vec<(SessionStatus, i64)>,
    pub total_attendance: u64,
    pub placeholder_meetings: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub student_id: Uuid,
    pub attended: u64,
    pub eligible: u64,
    /// Percentage, rounded to the nearest integer
    pub rate: u32,
}

pub struct AnalyticsService;

impl AnalyticsService {
    pub const DEFAULT_TOP_N: u64 = 10;

    pub async fn material_overview(
        db: &DatabaseConnection,
        principal: &Principal,
        scope: OwnerScope,
        top_n: Option<u64>,
    ) -> ServiceResult<MaterialOverview> {
        let top_n = top_n.unwrap_or(Self::DEFAULT_TOP_N);
        let filter = MaterialFilter {
            scope,
            ..Default::default()
        };
        let condition = MaterialService::filter_condition(db, principal, &filter).await?;

        let (total_materials, total_views, total_downloads) = materials::Entity::find()
            .select_only()
            .column_as(materials::Column::Id.count(), "total")
            .column_as(materials::Column::ViewCount.sum(), "views")
            .column_as(materials::Column::DownloadCount.sum(), "downloads")
            .filter(condition.clone())
            .into_tuple::<(i64, Option<i64>, Option<i64>)>()
            .one(db)
            .await?
            .unwrap_or_default();

        let by_type = materials::Entity::find()
            .select_only()
            .column(materials::Column::MaterialType)
            .column_as(materials::Column::Id.count(), "count")
            .filter(condition.clone())
            .group_by(materials::Column::MaterialType)
            .order_by_asc(materials::Column::MaterialType)
            .into_tuple::<(MaterialType, i64)>()
            .all(db)
            .await?;

        let by_course = materials::Entity::find()
            .select_only()
            .column(materials::Column::Course)
            .column_as(materials::Column::Id.count(), "count")
            .filter(condition.clone())
            .group_by(materials::Column::Course)
            .order_by_asc(materials::Column::Course)
            .into_tuple::<(Course, i64)>()
            .all(db)
            .await?;

        let most_viewed = materials::Entity::find()
            .filter(condition.clone())
            .order_by_desc(materials::Column::ViewCount)
            .order_by_desc(materials::Column::CreatedAt)
            .limit(top_n)
            .all(db)
            .await?;

        let most_downloaded = materials::Entity::find()
            .filter(condition)
            .order_by_desc(materials::Column::DownloadCount)
            .order_by_desc(materials::Column::CreatedAt)
            .limit(top_n)
            .all(db)
            .await?;

        Ok(MaterialOverview {
            total_materials,
            total_views: total_views.unwrap_or(0),
            total_downloads: total_downloads.unwrap_or(0),
            by_type,
            by_course,
            most_viewed,
            most_downloaded,
        })
    }

    /// Statistics over the caller's own sessions
    pub async fn session_overview(
        db: &DatabaseConnection,
        principal: &Principal,
    ) -> ServiceResult<SessionOverview> {
        ensure_author(principal)?;
        let owned = sessions::Column::OwnerId.eq(principal.id);

        let by_status = sessions::Entity::find()
            .select_only()
            .column(sessions::Column::Status)
            .column_as(sessions::Column::Id.count(), "count")
            .filter(owned.clone())
            .group_by(sessions::Column::Status)
            .order_by_asc(sessions::Column::Status)
            .into_tuple::<(SessionStatus, i64)>()
            .all(db)
            .await?;

        let placeholder_meetings = sessions::Entity::find()
            .filter(owned.clone())
            .filter(sessions::Column::MeetingKind.eq(MeetingKind::Placeholder))
            .count(db)
            .await?;

        let total_attendance = session_attendees::Entity::find()
            .join(JoinType::InnerJoin, session_attendees::Relation::Session.def())
            .filter(owned)
            .count(db)
            .await?;

        Ok(SessionOverview {
            total_sessions: by_status.iter().map(|(_, count)| count).sum(),
            by_status,
            total_attendance,
            placeholder_meetings,
        })
    }

    /// Share of a student's past sessions that they attended.
    ///
    /// Past sessions are those scheduled before `now` and not cancelled. The
    /// denominator counts those the student was eligible for plus any other
    /// they attended, e.g. open-enrollment ones.
    pub async fn attendance_for(
        db: &DatabaseConnection,
        principal: &Principal,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<AttendanceSummary> {
        if principal.id != student_id {
            ensure_author(principal)?;
        }

        let student = users::Entity::find_by_id(student_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", student_id))?;
        let student = Principal::from(&student);
        if !student.is_student() {
            return Err(ServiceError::validation("student_id", "user is not a student"));
        }

        let past = Condition::all()
            .add(sessions::Column::ScheduledAt.lt(now))
            .add(sessions::Column::Status.ne(SessionStatus::Cancelled));

        let attended: HashSet<Uuid> = session_attendees::Entity::find()
            .select_only()
            .column(session_attendees::Column::SessionId)
            .join(JoinType::InnerJoin, session_attendees::Relation::Session.def())
            .filter(session_attendees::Column::StudentId.eq(student_id))
            .filter(past.clone())
            .into_tuple::<Uuid>()
            .all(db)
            .await?
            .into_iter()
            .collect();

        let mut eligible: HashSet<Uuid> = match eligibility_condition(
            sessions::Column::Grade,
            sessions::Column::Program,
            &student,
        ) {
            Some(eligible) => sessions::Entity::find()
                .select_only()
                .column(sessions::Column::Id)
                .filter(past)
                .filter(eligible)
                .into_tuple::<Uuid>()
                .all(db)
                .await?
                .into_iter()
                .collect(),
            None => HashSet::new(),
        };
        eligible.extend(attended.iter().copied());

        let attended = attended.len() as u64;
        let eligible = eligible.len() as u64;
        Ok(AttendanceSummary {
            student_id,
            attended,
            eligible,
            rate: attendance_rate(attended, eligible),
        })
    }
}

/// `attended / eligible` as a rounded percentage; 0 when nothing was eligible
pub fn attendance_rate(attended: u64, eligible: u64) -> u32 {
    if eligible == 0 {
        return 0;
    }
    ((attended as f64 / eligible as f64) * 100.0).round() as u32
}
