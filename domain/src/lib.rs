//! Domain library for the employee records service.
//!
//! Holds the domain types, the store port (a session-oriented trait), the
//! repository that mediates between callers and the store, and error
//! definitions. Keep adapters and IO concerns out of this crate; the in-memory
//! store under `adapters` is the only backend that lives here.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Numeric identifier of an employee; the unique key in every store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(u32);

impl EmployeeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Display for EmployeeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EmployeeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Stored employee record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub job_title: String,
    /// Whole currency units.
    pub salary: u64,
}

impl Employee {
    pub fn new<N: Into<String>, J: Into<String>>(id: u32, name: N, job_title: J, salary: u64) -> Self {
        Self {
            id: EmployeeId(id),
            name: name.into(),
            job_title: job_title.into(),
            salary,
        }
    }
}

/// Failures reported by a store session.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// A record with the same key already exists.
    #[error("unique constraint violated")]
    UniqueViolation,
    /// A staged save/remove referenced a record the store does not hold.
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Backend(String),
}

/// Session-oriented store handle.
///
/// Writes are staged until `commit`; `rollback` discards whatever is staged.
/// Reads observe the session's own staged writes.
pub trait EmployeeStore: Send + Sync {
    fn query_all(&self) -> Result<Vec<Employee>, StoreError>;
    fn get(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError>;
    /// Stage an insert. May report `UniqueViolation` now or at commit.
    fn add(&self, employee: Employee) -> Result<(), StoreError>;
    /// Stage an overwrite of an existing record.
    fn save(&self, employee: &Employee) -> Result<(), StoreError>;
    /// Stage a delete.
    fn remove(&self, id: EmployeeId) -> Result<(), StoreError>;
    fn commit(&self) -> Result<(), StoreError>;
    /// No-op when nothing is staged.
    fn rollback(&self) -> Result<(), StoreError>;
}

/// Core domain errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("employee id={0} exists already")]
    DuplicateId(EmployeeId),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid employee: {0}")]
    InvalidEmployee(String),
}

pub mod adapters;
pub mod repository;
pub mod validate;
