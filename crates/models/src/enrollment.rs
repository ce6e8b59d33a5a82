use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    ops::RangeInclusive,
};

/// The role a user acts under for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Role {
    #[sea_orm(string_value = "teacher")]
    Teacher,
    #[sea_orm(string_value = "student")]
    Student,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    /// Teachers and admins are the only roles allowed to own content
    pub fn can_author(self) -> bool {
        matches!(self, Self::Teacher | Self::Admin)
    }
}

/// The exam track a student is preparing for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Program {
    #[sea_orm(string_value = "EST")]
    #[serde(rename = "EST")]
    Est,
    #[sea_orm(string_value = "ACT")]
    #[serde(rename = "ACT")]
    Act,
    #[sea_orm(string_value = "Both")]
    Both,
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Est => write!(f, "EST"),
            Self::Act => write!(f, "ACT"),
            Self::Both => write!(f, "Both"),
        }
    }
}

/// School grades served by the platform
pub const GRADES: RangeInclusive<i16> = 9..=12;

pub fn is_valid_grade(grade: i16) -> bool {
    GRADES.contains(&grade)
}

/// Whether content targeted at `(grade, program)` is visible to a student
/// enrolled in `(student_grade, student_program)`.
///
/// A grade match, a program match, or content aimed at both programs is enough.
pub fn is_eligible(
    grade: i16,
    program: Program,
    student_grade: Option<i16>,
    student_program: Option<Program>,
) -> bool {
    student_grade == Some(grade) || student_program == Some(program) || program == Program::Both
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_bounds() {
        assert!(!is_valid_grade(8));
        assert!(is_valid_grade(9));
        assert!(is_valid_grade(12));
        assert!(!is_valid_grade(13));
    }

    #[test]
    fn test_eligibility() {
        // Grade match alone
        assert!(is_eligible(12, Program::Act, Some(12), Some(Program::Est)));
        // Program match alone
        assert!(is_eligible(10, Program::Est, Some(12), Some(Program::Est)));
        // Content aimed at both programs
        assert!(is_eligible(10, Program::Both, Some(12), Some(Program::Act)));
        // Nothing matches
        assert!(!is_eligible(10, Program::Act, Some(12), Some(Program::Est)));
        // Unenrolled users only see content aimed at both programs
        assert!(!is_eligible(10, Program::Act, None, None));
    }

    #[test]
    fn test_program_serde_names() {
        assert_eq!(serde_json::to_string(&Program::Est).unwrap(), "\"EST\"");
        assert_eq!(
            serde_json::from_str::<Program>("\"Both\"").unwrap(),
            Program::Both
        );
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"teacher\"");
    }
}
