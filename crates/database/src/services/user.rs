use crate::{
    access::{Principal, ensure_author},
    entities::users,
    error::{ServiceError, ServiceResult},
    services::{required_text, validate_grade},
};
use chrono::Utc;
use log::info;
use models::enrollment::{Program, Role};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub subject: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub grade: Option<i16>,
    pub program: Option<Program>,
}

pub struct UserService;

impl UserService {
    pub async fn create_user(db: &DatabaseConnection, user: NewUser) -> ServiceResult<users::Model> {
        let subject = required_text("subject", &user.subject)?;
        let name = required_text("name", &user.name)?;
        if Self::find_by_subject(db, &subject).await?.is_some() {
            return Err(ServiceError::validation("subject", "already registered"));
        }

        // Only students are enrolled in a grade and program
        let (grade, program) = match user.role {
            Role::Student => {
                let grade = user
                    .grade
                    .ok_or_else(|| ServiceError::validation("grade", "students need a grade"))?;
                validate_grade(grade)?;
                let program = user
                    .program
                    .ok_or_else(|| ServiceError::validation("program", "students need a program"))?;
                (Some(grade), Some(program))
            }
            Role::Teacher | Role::Admin => (None, None),
        };

        let now = Utc::now();
        let model = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            subject: Set(subject),
            name: Set(name),
            email: Set(user.email),
            role: Set(user.role),
            grade: Set(grade),
            program: Set(program),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!("Created {:?} account {}", model.role, model.id);
        Ok(model)
    }

    /// Creates an account on behalf of an admin
    pub async fn register(
        db: &DatabaseConnection,
        principal: &Principal,
        user: NewUser,
    ) -> ServiceResult<users::Model> {
        if principal.role != Role::Admin {
            return Err(ServiceError::AccessDenied);
        }
        Self::create_user(db, user).await
    }

    /// Looks up the account for an identity-provider subject, creating an
    /// admin account when the subject is listed in `admin_subjects`
    pub async fn resolve_subject(
        db: &DatabaseConnection,
        subject: &str,
        admin_subjects: &[String],
    ) -> ServiceResult<Option<users::Model>> {
        if let Some(user) = Self::find_by_subject(db, subject).await? {
            return Ok(Some(user));
        }
        if !admin_subjects.iter().any(|s| s == subject) {
            return Ok(None);
        }

        let admin = Self::create_user(
            db,
            NewUser {
                subject: subject.to_owned(),
                name: subject.to_owned(),
                email: None,
                role: Role::Admin,
                grade: None,
                program: None,
            },
        )
        .await?;
        Ok(Some(admin))
    }

    pub async fn get(db: &DatabaseConnection, id: Uuid) -> ServiceResult<users::Model> {
        users::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", id))
    }

    pub async fn find_by_subject(
        db: &DatabaseConnection,
        subject: &str,
    ) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Subject.eq(subject))
            .one(db)
            .await
    }

    /// Students matching the given enrollment, for teachers and admins
    pub async fn list_students(
        db: &DatabaseConnection,
        principal: &Principal,
        grade: Option<i16>,
        program: Option<Program>,
    ) -> ServiceResult<Vec<users::Model>> {
        ensure_author(principal)?;

        let mut query = users::Entity::find().filter(users::Column::Role.eq(Role::Student));
        if let Some(grade) = grade {
            query = query.filter(users::Column::Grade.eq(grade));
        }
        if let Some(program) = program {
            query = query.filter(users::Column::Program.eq(program));
        }

        Ok(query.order_by_asc(users::Column::Name).all(db).await?)
    }

    /// Changes a student's grade and/or program
    pub async fn update_enrollment(
        db: &DatabaseConnection,
        principal: &Principal,
        student_id: Uuid,
        grade: Option<i16>,
        program: Option<Program>,
    ) -> ServiceResult<users::Model> {
        ensure_author(principal)?;

        let student = Self::get(db, student_id).await?;
        if student.role != Role::Student {
            return Err(ServiceError::validation(
                "student_id",
                "only students have an enrollment",
            ));
        }

        let mut model: users::ActiveModel = student.into();
        if let Some(grade) = grade {
            validate_grade(grade)?;
            model.grade = Set(Some(grade));
        }
        if let Some(program) = program {
            model.program = Set(Some(program));
        }
        model.updated_at = Set(Utc::now());

        let updated = model.update(db).await?;
        info!(
            "Enrollment of {} set to grade {:?}, program {:?} by {}",
            updated.id, updated.grade, updated.program, principal.id
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{db, student, teacher};
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn test_students_require_enrollment(#[future] db: DatabaseConnection) {
        let db = db.await;
        let missing_grade = UserService::create_user(
            &db,
            NewUser {
                subject: "s-1".to_string(),
                name: "Mona".to_string(),
                email: None,
                role: Role::Student,
                grade: None,
                program: Some(Program::Est),
            },
        )
        .await;
        assert!(matches!(
            missing_grade,
            Err(ServiceError::Validation { field: "grade", .. })
        ));

        let bad_grade = UserService::create_user(
            &db,
            NewUser {
                subject: "s-2".to_string(),
                name: "Omar".to_string(),
                email: None,
                role: Role::Student,
                grade: Some(7),
                program: Some(Program::Est),
            },
        )
        .await;
        assert!(matches!(bad_grade, Err(ServiceError::Validation { .. })));
    }

    #[rstest]
    #[tokio::test]
    async fn test_find_by_subject(#[future] db: DatabaseConnection) {
        let db = db.await;
        let created = teacher(&db).await;

        let found = UserService::find_by_subject(&db, &created.subject)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.grade, None);

        assert!(
            UserService::find_by_subject(&db, "nobody")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_enrollment(#[future] db: DatabaseConnection) {
        let db = db.await;
        let teacher = teacher(&db).await;
        let learner = student(&db, 10, Program::Est).await;

        let updated = UserService::update_enrollment(
            &db,
            &Principal::from(&teacher),
            learner.id,
            Some(11),
            None,
        )
        .await
        .unwrap();
        assert_eq!(updated.grade, Some(11));
        assert_eq!(updated.program, Some(Program::Est));

        // Students cannot change enrollments, not even their own
        let denied = UserService::update_enrollment(
            &db,
            &Principal::from(&learner),
            learner.id,
            Some(12),
            None,
        )
        .await;
        assert!(matches!(denied, Err(ServiceError::AccessDenied)));

        // Teachers have no enrollment to change
        let not_student =
            UserService::update_enrollment(&db, &Principal::from(&teacher), teacher.id, Some(9), None)
                .await;
        assert!(matches!(not_student, Err(ServiceError::Validation { .. })));
    }

    #[rstest]
    #[tokio::test]
    async fn test_list_students(#[future] db: DatabaseConnection) {
        let db = db.await;
        let teacher = teacher(&db).await;
        student(&db, 10, Program::Est).await;
        student(&db, 12, Program::Est).await;
        student(&db, 12, Program::Act).await;

        let principal = Principal::from(&teacher);
        let twelfth = UserService::list_students(&db, &principal, Some(12), None)
            .await
            .unwrap();
        assert_eq!(twelfth.len(), 2);

        let est_twelfth =
            UserService::list_students(&db, &principal, Some(12), Some(Program::Est))
                .await
                .unwrap();
        assert_eq!(est_twelfth.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_registration_and_admin_bootstrap(#[future] db: DatabaseConnection) {
        let db = db.await;
        let admins = vec!["root-subject".to_string()];

        let unknown = UserService::resolve_subject(&db, "stranger", &admins)
            .await
            .unwrap();
        assert!(unknown.is_none());

        let admin = UserService::resolve_subject(&db, "root-subject", &admins)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
        let again = UserService::resolve_subject(&db, "root-subject", &admins)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.id, admin.id);

        let new_teacher = NewUser {
            subject: "t-1".to_string(),
            name: "Ada".to_string(),
            email: Some("ada@example.com".to_string()),
            role: Role::Teacher,
            grade: None,
            program: None,
        };
        let created = UserService::register(&db, &Principal::from(&admin), new_teacher.clone())
            .await
            .unwrap();
        assert_eq!(created.role, Role::Teacher);

        let duplicate = UserService::register(&db, &Principal::from(&admin), new_teacher.clone()).await;
        assert!(matches!(
            duplicate,
            Err(ServiceError::Validation { field: "subject", .. })
        ));

        let by_teacher = UserService::register(
            &db,
            &Principal::from(&created),
            NewUser {
                subject: "t-2".to_string(),
                ..new_teacher
            },
        )
        .await;
        assert!(matches!(by_teacher, Err(ServiceError::AccessDenied)));
    }
}
