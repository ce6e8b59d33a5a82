use crate::{access::Principal, error::{ServiceError, ServiceResult}};
use models::enrollment::{Program, is_valid_grade};
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};

pub mod analytics;
pub mod folder;
pub mod material;
pub mod session;
pub mod share;
pub mod user;

/// 1-indexed page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
}

impl Pagination {
    const MAX_PER_PAGE: u64 = 100;

    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    fn validate(&self) -> ServiceResult<()> {
        if self.page == 0 {
            return Err(ServiceError::validation("page", "pages start at 1"));
        }
        if self.per_page == 0 || self.per_page > Self::MAX_PER_PAGE {
            return Err(ServiceError::validation(
                "per_page",
                format!("must be between 1 and {}", Self::MAX_PER_PAGE),
            ));
        }
        if self.offset().is_none() {
            return Err(ServiceError::validation("page", "page is out of range"));
        }
        Ok(())
    }

    /// Row offset of the first item, `None` when it does not fit a SQL bigint
    fn offset(&self) -> Option<u64> {
        self.page
            .checked_sub(1)?
            .checked_mul(self.per_page)
            .filter(|offset| i64::try_from(*offset).is_ok())
    }

    /// Slices an already ordered, fully loaded result set
    fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total_items = items.len() as u64;
        let items = items
            .into_iter()
            .skip(
                self.offset()
                    .and_then(|offset| usize::try_from(offset).ok())
                    .unwrap_or(usize::MAX),
            )
            .take(self.per_page as usize)
            .collect();

        Page::new(items, *self, total_items)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    fn new(items: Vec<T>, pagination: Pagination, total_items: u64) -> Self {
        Self {
            items,
            page: pagination.page,
            per_page: pagination.per_page,
            total_items,
            total_pages: total_items.div_ceil(pagination.per_page),
        }
    }
}

/// Outcome of a delete. Blob failures end up in `warnings`; they never stop
/// records from being removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub folders_deleted: u64,
    pub materials_deleted: u64,
    pub warnings: Vec<String>,
}

/// Whose content a listing starts from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerScope {
    /// Content the caller owns
    Mine,
    /// Content the caller may read without owning it
    #[default]
    Eligible,
}

impl OwnerScope {
    /// Teachers start from their own content, students from what they can see
    pub fn default_for(principal: &Principal) -> Self {
        if principal.role.can_author() {
            Self::Mine
        } else {
            Self::Eligible
        }
    }
}

/// Matches rows a student is eligible for by grade or program. Only
/// students have eligibility.
pub(crate) fn eligibility_condition<C: ColumnTrait>(
    grade_column: C,
    program_column: C,
    principal: &Principal,
) -> Option<Condition> {
    if !principal.is_student() {
        return None;
    }

    let mut condition = Condition::any().add(program_column.eq(Program::Both));
    if let Some(grade) = principal.grade {
        condition = condition.add(grade_column.eq(grade));
    }
    if let Some(program) = principal.program {
        condition = condition.add(program_column.eq(program));
    }
    Some(condition)
}

pub(crate) fn validate_grade(grade: i16) -> ServiceResult<()> {
    if is_valid_grade(grade) {
        Ok(())
    } else {
        Err(ServiceError::validation("grade", "must be between 9 and 12"))
    }
}

/// Trims a required display name, rejecting blank input
pub(crate) fn required_text(field: &'static str, value: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(ServiceError::validation(field, "must not be empty"))
    } else {
        Ok(value.to_owned())
    }
}

/// Trims optional free text, treating blank input as absent
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
