//! Lightweight input validation helpers. Keep logic minimal and deterministic.

use crate::{CoreError, Employee};

/// Upper bound for name and job title, in characters.
pub const MAX_TEXT_LEN: usize = 100;

/// Largest salary any store can hold (SQLite INTEGER is a signed 64-bit value).
pub const MAX_SALARY: u64 = i64::MAX as u64;

fn validate_text(field: &str, s: &str) -> Result<(), CoreError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidEmployee(format!("{field} is empty")));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(CoreError::InvalidEmployee(format!(
            "{field} exceeds {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_name(s: &str) -> Result<(), CoreError> {
    validate_text("name", s)
}

pub fn validate_job_title(s: &str) -> Result<(), CoreError> {
    validate_text("job_title", s)
}

pub fn validate_salary(salary: u64) -> Result<(), CoreError> {
    if salary > MAX_SALARY {
        return Err(CoreError::InvalidEmployee(format!(
            "salary exceeds {MAX_SALARY}"
        )));
    }
    Ok(())
}

/// Validate every field of a record before it is handed to the store.
pub fn validate_employee(e: &Employee) -> Result<(), CoreError> {
    validate_name(&e.name)?;
    validate_job_title(&e.job_title)?;
    validate_salary(e.salary)
}
