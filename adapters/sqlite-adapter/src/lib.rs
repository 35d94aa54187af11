//! sqlite-adapter — SQLite implementation of the EmployeeStore port.
//!
//! Purpose
//! - Provide a lightweight, file-based store to run the service locally.
//! - Implements the `EmployeeStore` trait from the `domain` crate with real
//!   transactions: the first staged write opens one, `commit`/`rollback` end it.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Primary key violations surface as `StoreError::UniqueViolation`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use domain::{Employee, EmployeeId, EmployeeStore, StoreError};
use rusqlite::{params, Connection};

const EMPLOYEE_SELECT_SQL: &str = "SELECT id, name, job_title, salary FROM employees";

/// SQLite-backed employee store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        Self::from_connection(conn)
    }

    /// Private, memory-only database; contents vanish with the store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        Self::from_connection(conn)
    }

    /// Construct from env var `DB_PATH` (defaults to `./data/employees.db`).
    pub fn from_env() -> Result<Self, StoreError> {
        let path = std::env::var("DB_PATH").unwrap_or_else(|_| "./data/employees.db".to_string());
        // Ensure directory exists
        if let Some(dir) = Path::new(&path).parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        Self::new(path)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            job_title TEXT NOT NULL,
            salary INTEGER NOT NULL
        );
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(format!("sqlite error: {e}"))
}

fn map_write_err(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation
            && matches!(
                err.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            )
        {
            return StoreError::UniqueViolation;
        }
    }
    map_sqerr(e)
}

/// Open a transaction unless one is already in progress on this connection.
fn begin_if_needed(conn: &Connection) -> Result<(), StoreError> {
    if conn.is_autocommit() {
        conn.execute_batch("BEGIN").map_err(map_sqerr)?;
    }
    Ok(())
}

fn row_to_employee(row: &rusqlite::Row) -> Result<Employee, StoreError> {
    let id: i64 = row.get(0).map_err(map_sqerr)?;
    let name: String = row.get(1).map_err(map_sqerr)?;
    let job_title: String = row.get(2).map_err(map_sqerr)?;
    let salary: i64 = row.get(3).map_err(map_sqerr)?;

    let id = u32::try_from(id).map_err(|_| StoreError::Backend(format!("bad id in db: {id}")))?;
    let salary = u64::try_from(salary)
        .map_err(|_| StoreError::Backend(format!("bad salary in db: {salary}")))?;
    Ok(Employee::new(id, name, job_title, salary))
}

fn salary_param(salary: u64) -> Result<i64, StoreError> {
    i64::try_from(salary).map_err(|_| StoreError::Backend(format!("salary out of range: {salary}")))
}

impl EmployeeStore for SqliteStore {
    fn query_all(&self) -> Result<Vec<Employee>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{EMPLOYEE_SELECT_SQL} ORDER BY id"))
            .map_err(map_sqerr)?;
        let mut rows = stmt.query([]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_employee(row)?);
        }
        Ok(out)
    }

    fn get(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{EMPLOYEE_SELECT_SQL} WHERE id = ?1"))
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![id.get()]).map_err(map_sqerr)?;
        if let Some(row) = rows.next().map_err(map_sqerr)? {
            Ok(Some(row_to_employee(row)?))
        } else {
            Ok(None)
        }
    }

    fn add(&self, employee: Employee) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let salary = salary_param(employee.salary)?;
        begin_if_needed(&conn)?;
        conn.execute(
            "INSERT INTO employees(id, name, job_title, salary) VALUES (?1, ?2, ?3, ?4)",
            params![employee.id.get(), employee.name, employee.job_title, salary],
        )
        .map_err(map_write_err)?;
        Ok(())
    }

    fn save(&self, employee: &Employee) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let salary = salary_param(employee.salary)?;
        begin_if_needed(&conn)?;
        let changed = conn
            .execute(
                "UPDATE employees SET name = ?1, job_title = ?2, salary = ?3 WHERE id = ?4",
                params![employee.name, employee.job_title, salary, employee.id.get()],
            )
            .map_err(map_write_err)?;
        if changed == 0 {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn remove(&self, id: EmployeeId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        begin_if_needed(&conn)?;
        let changed = conn
            .execute("DELETE FROM employees WHERE id = ?1", params![id.get()])
            .map_err(map_sqerr)?;
        if changed == 0 {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn commit(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT").map_err(map_write_err)?;
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK").map_err(map_sqerr)?;
        }
        Ok(())
    }
}
