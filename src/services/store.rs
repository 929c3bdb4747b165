use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::models::job::{Job, TransitionError};

/// In-memory registry of analysis jobs.
///
/// The map itself never leaves this type: readers get clones, writers go
/// through [`JobStore::update`] with a mutator that runs under the write lock.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is validated before it touches a record, so a poisoned
    // lock still guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Job>> {
        self.jobs.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Job store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Job>> {
        self.jobs.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Job store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register a new job. Fails if the id is already taken.
    pub fn create(&self, job: Job) -> Result<(), StoreError> {
        let mut jobs = self.write();
        let id = job.id();
        if jobs.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        jobs.insert(id, job);
        Ok(())
    }

    /// Snapshot of a job. Changing the copy does not affect the store.
    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.read().get(&id).cloned()
    }

    /// Apply a state change to one job.
    ///
    /// The mutator works on a scratch copy; the stored record is replaced only
    /// when it succeeds, so a rejected transition leaves the job untouched.
    pub fn update<T, F>(&self, id: Uuid, mutator: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Job) -> Result<T, TransitionError>,
    {
        let mut jobs = self.write();
        let current = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let mut next = current.clone();
        let value = mutator(&mut next)?;
        *current = next;
        Ok(value)
    }

    /// Number of tracked jobs.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Job {0} already exists")]
    AlreadyExists(Uuid),

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Invalid job transition: {0}")]
    Transition(#[from] TransitionError),
}
