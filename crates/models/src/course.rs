use sea_orm::{DeriveActiveEnum, EnumIter, Iterable};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use strum::EnumProperty;

/// The fixed catalog of courses offered on the platform
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumProperty,
    DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Course {
    #[sea_orm(string_value = "Mathematics")]
    #[strum(props(
        color = "#2563EB",
        icon = "calculator",
        description = "Algebra, geometry, trigonometry and calculus for the EST and ACT math sections"
    ))]
    Mathematics,
    #[sea_orm(string_value = "Physics")]
    #[strum(props(
        color = "#7C3AED",
        icon = "atom",
        description = "Mechanics, electricity, waves and modern physics"
    ))]
    Physics,
    #[sea_orm(string_value = "Chemistry")]
    #[strum(props(
        color = "#059669",
        icon = "flask",
        description = "Atomic structure, bonding, stoichiometry and reactions"
    ))]
    Chemistry,
    #[sea_orm(string_value = "Biology")]
    #[strum(props(
        color = "#16A34A",
        icon = "leaf",
        description = "Cell biology, genetics, physiology and ecology"
    ))]
    Biology,
    #[sea_orm(string_value = "Biochemistry")]
    #[strum(props(
        color = "#DB2777",
        icon = "dna",
        description = "Biomolecules, enzymes and metabolic pathways"
    ))]
    Biochemistry,
    #[sea_orm(string_value = "Geology")]
    #[strum(props(
        color = "#B45309",
        icon = "mountain",
        description = "Earth materials, plate tectonics and geologic time"
    ))]
    Geology,
    #[sea_orm(string_value = "English")]
    #[strum(props(
        color = "#DC2626",
        icon = "book-open",
        description = "Reading comprehension, grammar and essay writing"
    ))]
    English,
    #[sea_orm(string_value = "Science")]
    #[strum(props(
        color = "#0891B2",
        icon = "microscope",
        description = "Data interpretation and scientific reasoning for the ACT science section"
    ))]
    Science,
}

impl Course {
    pub fn all() -> Vec<Course> {
        Course::iter().collect()
    }

    pub fn name(&self) -> String {
        sea_orm::ActiveEnum::to_value(self)
    }

    /// Hex display color used by clients
    pub fn color(&self) -> &'static str {
        self.get_str("color").unwrap_or_default()
    }

    pub fn icon(&self) -> &'static str {
        self.get_str("icon").unwrap_or_default()
    }

    pub fn description(&self) -> &'static str {
        self.get_str("description").unwrap_or_default()
    }
}

impl Display for Course {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_eight_courses() {
        let courses = Course::all();
        assert_eq!(courses.len(), 8);
        assert!(courses.contains(&Course::Biochemistry));
    }

    #[test]
    fn test_course_properties() {
        for course in Course::all() {
            assert!(course.color().starts_with('#'));
            assert!(!course.icon().is_empty());
            assert!(!course.description().is_empty());
        }
        assert_eq!(Course::Biochemistry.to_string(), "Biochemistry");
    }
}
