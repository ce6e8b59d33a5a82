//! Access control evaluation.
//!
//! Rules are checked in order and the first match wins:
//!
//! 1. teachers and admins may do anything with what they own
//! 2. anyone may read public content
//! 3. a share grant at or above the action's required level allows it
//! 4. students may read content whose grade or program matches theirs, or
//!    which targets both programs, regardless of public flag or grants
//!
//! Rule 4 means an unshared, private material is readable by every eligible
//! student. That is the current behavior of the platform and is kept as is.

use crate::{
    entities::{folders, materials, sessions, users},
    error::{ServiceError, ServiceResult},
};
use models::{
    access::{Action, Permission},
    enrollment::{Program, Role, is_eligible},
};
use serde::Serialize;
use uuid::Uuid;

/// The caller an operation is performed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub grade: Option<i16>,
    pub program: Option<Program>,
}

impl Principal {
    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

impl From<&users::Model> for Principal {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            role: user.role,
            grade: user.grade,
            program: user.program,
        }
    }
}

/// The access-relevant facts about a folder, material or session, together
/// with the principal's share grant on it (if any)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessTarget {
    pub owner_id: Uuid,
    pub is_public: bool,
    pub grade: i16,
    pub program: Program,
    pub grant: Option<Permission>,
}

impl AccessTarget {
    pub fn folder(folder: &folders::Model, grant: Option<Permission>) -> Self {
        Self {
            owner_id: folder.owner_id,
            is_public: folder.is_public,
            grade: folder.grade,
            program: folder.program,
            grant,
        }
    }

    pub fn material(material: &materials::Model, grant: Option<Permission>) -> Self {
        Self {
            owner_id: material.owner_id,
            is_public: material.is_public,
            grade: material.grade,
            program: material.program,
            grant,
        }
    }

    /// Sessions are never public and cannot be shared
    pub fn session(session: &sessions::Model) -> Self {
        Self {
            owner_id: session.owner_id,
            is_public: false,
            grade: session.grade,
            program: session.program,
            grant: None,
        }
    }
}

pub fn is_owner(principal: &Principal, owner_id: Uuid) -> bool {
    principal.role.can_author() && principal.id == owner_id
}

pub fn can_access(principal: &Principal, target: &AccessTarget, action: Action) -> bool {
    if is_owner(principal, target.owner_id) {
        return true;
    }

    if action == Action::Read && target.is_public {
        return true;
    }

    if target
        .grant
        .is_some_and(|granted| granted >= action.required_permission())
    {
        return true;
    }

    principal.is_student()
        && action == Action::Read
        && is_eligible(
            target.grade,
            target.program,
            principal.grade,
            principal.program,
        )
}

pub fn authorize(principal: &Principal, target: &AccessTarget, action: Action) -> ServiceResult<()> {
    if can_access(principal, target, action) {
        Ok(())
    } else {
        Err(ServiceError::AccessDenied)
    }
}

/// Mutations of folders, materials and sessions are reserved to their owner
pub fn ensure_owner(principal: &Principal, owner_id: Uuid) -> ServiceResult<()> {
    if is_owner(principal, owner_id) {
        Ok(())
    } else {
        Err(ServiceError::AccessDenied)
    }
}

/// Only teachers and admins create content
pub fn ensure_author(principal: &Principal) -> ServiceResult<()> {
    if principal.role.can_author() {
        Ok(())
    } else {
        Err(ServiceError::AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [Action; 4] = [Action::Read, Action::Write, Action::Share, Action::Delete];

    fn teacher() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role: Role::Teacher,
            grade: None,
            program: None,
        }
    }

    fn student(grade: i16, program: Program) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role: Role::Student,
            grade: Some(grade),
            program: Some(program),
        }
    }

    fn target(owner_id: Uuid) -> AccessTarget {
        AccessTarget {
            owner_id,
            is_public: false,
            grade: 10,
            program: Program::Act,
            grant: None,
        }
    }

    #[test]
    fn test_owner_passes_every_action() {
        let owner = teacher();
        let target = target(owner.id);
        for action in ALL_ACTIONS {
            assert!(can_access(&owner, &target, action));
        }

        let admin = Principal {
            role: Role::Admin,
            ..teacher()
        };
        let target = AccessTarget {
            owner_id: admin.id,
            ..target
        };
        for action in ALL_ACTIONS {
            assert!(can_access(&admin, &target, action));
        }
    }

    #[test]
    fn test_student_never_owns() {
        // A student id matching the owner id does not grant ownership
        let student = student(12, Program::Est);
        let target = target(student.id);
        assert!(!can_access(&student, &target, Action::Write));
        assert!(!can_access(&student, &target, Action::Delete));
    }

    #[test]
    fn test_public_only_grants_read() {
        let other = teacher();
        let target = AccessTarget {
            is_public: true,
            ..target(Uuid::new_v4())
        };
        assert!(can_access(&other, &target, Action::Read));
        assert!(!can_access(&other, &target, Action::Write));
        assert!(!can_access(&other, &target, Action::Share));
    }

    #[test]
    fn test_grant_levels() {
        let other = teacher();
        let base = target(Uuid::new_v4());

        let read = AccessTarget {
            grant: Some(Permission::Read),
            ..base
        };
        assert!(can_access(&other, &read, Action::Read));
        assert!(!can_access(&other, &read, Action::Write));

        let write = AccessTarget {
            grant: Some(Permission::Write),
            ..base
        };
        assert!(can_access(&other, &write, Action::Write));
        assert!(can_access(&other, &write, Action::Delete));
        assert!(!can_access(&other, &write, Action::Share));

        let admin = AccessTarget {
            grant: Some(Permission::Admin),
            ..base
        };
        for action in ALL_ACTIONS {
            assert!(can_access(&other, &admin, action));
        }
    }

    #[test]
    fn test_eligibility_grants_read_without_share() {
        let base = target(Uuid::new_v4());

        // Grade match
        assert!(can_access(&student(10, Program::Est), &base, Action::Read));
        // Program match
        assert!(can_access(&student(12, Program::Act), &base, Action::Read));
        // Content for both programs
        let both = AccessTarget {
            program: Program::Both,
            ..base
        };
        assert!(can_access(&student(12, Program::Est), &both, Action::Read));
        // No match at all
        assert!(!can_access(&student(12, Program::Est), &base, Action::Read));
        // Eligibility never extends past reading
        assert!(!can_access(&student(10, Program::Act), &base, Action::Write));
    }

    #[test]
    fn test_eligibility_does_not_apply_to_teachers() {
        let other = Principal {
            grade: Some(10),
            program: Some(Program::Act),
            ..teacher()
        };
        assert!(!can_access(&other, &target(Uuid::new_v4()), Action::Read));
    }

    #[test]
    fn test_authorize_and_ensure_owner() {
        let owner = teacher();
        let other = teacher();
        let target = target(owner.id);

        assert!(authorize(&owner, &target, Action::Share).is_ok());
        assert!(matches!(
            authorize(&other, &target, Action::Read),
            Err(ServiceError::AccessDenied)
        ));
        assert!(ensure_owner(&owner, owner.id).is_ok());
        assert!(ensure_owner(&other, owner.id).is_err());
        assert!(ensure_author(&student(9, Program::Est)).is_err());
    }
}
