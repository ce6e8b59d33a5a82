use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

/// Permission level carried by a share grant, ordered from weakest to strongest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Permission {
    #[sea_orm(string_value = "read")]
    Read,
    #[sea_orm(string_value = "write")]
    Write,
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// An operation a principal attempts against a guarded entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Share,
    Delete,
}

impl Action {
    /// The weakest share grant that permits this action
    pub fn required_permission(self) -> Permission {
        match self {
            Self::Read => Permission::Read,
            Self::Write | Self::Delete => Permission::Write,
            Self::Share => Permission::Admin,
        }
    }
}

/// The kind of entity a share grant is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ShareTarget {
    #[sea_orm(string_value = "folder")]
    Folder,
    #[sea_orm(string_value = "material")]
    Material,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_ordering() {
        assert!(Permission::Read < Permission::Write);
        assert!(Permission::Write < Permission::Admin);
    }

    #[test]
    fn test_required_permission() {
        assert_eq!(Action::Read.required_permission(), Permission::Read);
        assert_eq!(Action::Write.required_permission(), Permission::Write);
        assert_eq!(Action::Delete.required_permission(), Permission::Write);
        assert_eq!(Action::Share.required_permission(), Permission::Admin);
    }
}
