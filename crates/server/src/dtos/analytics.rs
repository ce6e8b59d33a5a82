use super::material::MaterialResponse;
use database::services::{
    OwnerScope,
    analytics::{AttendanceSummary, MaterialOverview, SessionOverview},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MaterialOverviewResponse {
    pub total_materials: i64,
    pub total_views: i64,
    pub total_downloads: i64,
    pub by_type: Vec<CountResponse>,
    pub by_course: Vec<CountResponse>,
    pub most_viewed: Vec<MaterialResponse>,
    pub most_downloaded: Vec<MaterialResponse>,
}

fn counts<K: ToString>(pairs: Vec<(K, i64)>) -> Vec<CountResponse> {
    pairs
        .into_iter()
        .map(|(key, count)| CountResponse {
            key: key.to_string(),
            count,
        })
        .collect()
}

impl From<MaterialOverview> for MaterialOverviewResponse {
    fn from(overview: MaterialOverview) -> Self {
        Self {
            total_materials: overview.total_materials,
            total_views: overview.total_views,
            total_downloads: overview.total_downloads,
            by_type: counts(overview.by_type),
            by_course: counts(overview.by_course),
            most_viewed: overview.most_viewed.into_iter().map(Into::into).collect(),
            most_downloaded: overview
                .most_downloaded
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionOverviewResponse {
    pub total_sessions: i64,
    pub by_status: Vec<CountResponse>,
    pub total_attendance: u64,
    pub placeholder_meetings: u64,
}

impl From<SessionOverview> for SessionOverviewResponse {
    fn from(overview: SessionOverview) -> Self {
        Self {
            total_sessions: overview.total_sessions,
            by_status: overview
                .by_status
                .into_iter()
                .map(|(status, count)| CountResponse {
                    key: sea_orm::ActiveEnum::to_value(&status),
                    count,
                })
                .collect(),
            total_attendance: overview.total_attendance,
            placeholder_meetings: overview.placeholder_meetings,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub student_id: Uuid,
    pub attended: u64,
    pub eligible: u64,
    /// Whole percent
    pub rate: u32,
}

impl From<AttendanceSummary> for AttendanceResponse {
    fn from(summary: AttendanceSummary) -> Self {
        Self {
            student_id: summary.student_id,
            attended: summary.attended,
            eligible: summary.eligible,
            rate: summary.rate,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MaterialAnalyticsParams {
    #[param(value_type = Option<String>)]
    pub scope: Option<OwnerScope>,
    /// How many entries the most viewed and most downloaded lists hold
    pub top_n: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceParams {
    /// Defaults to the caller
    pub student_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{course::Course, material::MaterialType};

    #[test]
    fn test_counts_use_display_names() {
        let by_type = counts(vec![(MaterialType::Pdf, 3), (MaterialType::Link, 1)]);
        assert_eq!(by_type[0].key, "pdf");
        assert_eq!(by_type[1].count, 1);

        let by_course = counts(vec![(Course::Biochemistry, 2)]);
        assert_eq!(by_course[0].key, "Biochemistry");
    }
}
