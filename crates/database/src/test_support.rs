//! Fixtures and fakes shared by the service tests.

use crate::{
    blob::{BlobError, BlobStore},
    conferencing::{ConferencingProvider, MeetingDetails, MeetingPatch, MeetingSpec, ProviderError},
    entities::users,
    services::user::{NewUser, UserService},
};
use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use models::enrollment::{Program, Role};
use rstest::fixture;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::{
    collections::HashMap,
    io,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use uuid::Uuid;

/// A migrated in-memory SQLite database. The pool holds exactly one
/// connection so every query sees the same database.
#[fixture]
pub async fn db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("failed to open in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("failed to apply migrations");
    db
}

pub async fn create_user(
    db: &DatabaseConnection,
    role: Role,
    grade: Option<i16>,
    program: Option<Program>,
) -> users::Model {
    let id = Uuid::new_v4();
    UserService::create_user(
        db,
        NewUser {
            subject: format!("sub-{id}"),
            name: format!("{role:?} {}", &id.to_string()[..8]),
            email: None,
            role,
            grade,
            program,
        },
    )
    .await
    .expect("failed to create user")
}

pub async fn teacher(db: &DatabaseConnection) -> users::Model {
    create_user(db, Role::Teacher, None, None).await
}

pub async fn student(db: &DatabaseConnection, grade: i16, program: Program) -> users::Model {
    create_user(db, Role::Student, Some(grade), Some(program)).await
}

/// In-memory blob store whose first `n` deletions fail
#[derive(Default)]
pub struct FlakyBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    failing_deletes: AtomicUsize,
    delete_attempts: AtomicUsize,
}

impl FlakyBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_deletes(n: usize) -> Self {
        Self {
            failing_deletes: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(path)
    }

    pub fn remove_silently(&self, path: &str) {
        self.blobs.lock().unwrap().remove(path);
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String, BlobError> {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_owned(), bytes.to_vec());
        Ok(path.to_owned())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(path.to_owned()))
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(BlobError::Io(io::Error::other("storage unavailable")));
        }

        self.blobs
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound(path.to_owned()))
    }
}

/// Conferencing provider that either always works or always fails, and
/// counts the calls it receives
#[derive(Default)]
pub struct FakeProvider {
    failing: bool,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl FakeProvider {
    pub fn working() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn result(&self) -> Result<(), ProviderError> {
        if self.failing {
            Err(ProviderError::Status(503))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConferencingProvider for FakeProvider {
    async fn create_meeting(&self, spec: &MeetingSpec) -> Result<MeetingDetails, ProviderError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        self.result()?;

        Ok(MeetingDetails {
            external_id: format!("meeting-{n}"),
            join_url: format!("https://meet.example.com/j/{n}"),
            start_url: format!("https://meet.example.com/s/{n}?topic={}", spec.topic.len()),
            password: Some("secret".to_owned()),
        })
    }

    async fn update_meeting(
        &self,
        _external_id: &str,
        _patch: &MeetingPatch,
    ) -> Result<(), ProviderError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.result()
    }

    async fn delete_meeting(&self, _external_id: &str) -> Result<(), ProviderError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.result()
    }
}
