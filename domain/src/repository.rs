use std::sync::{Mutex, MutexGuard};

use tracing::{error, info};

use crate::validate::{validate_employee, validate_salary};
use crate::{CoreError, Employee, EmployeeId, EmployeeStore, StoreError};

/// Access layer between callers and an employee store.
///
/// Every public operation runs as one unit of work: the repository holds an
/// internal lock for the duration of the call, so staged writes of one call
/// are committed or rolled back before the next call touches the session.
/// Absence of a record is never an error here; lookups, salary updates and
/// deletes report it as `None`.
pub struct EmployeeRepository<S: EmployeeStore> {
    store: S,
    unit: Mutex<()>,
}

impl<S: EmployeeStore> EmployeeRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            unit: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    fn begin(&self) -> Result<MutexGuard<'_, ()>, CoreError> {
        self.unit
            .lock()
            .map_err(|_| CoreError::Storage("unit of work lock poisoned".into()))
    }

    /// Roll the session back after a failed write. A rollback failure is
    /// logged; the caller still reports the original error.
    fn rollback_quietly(&self) {
        if let Err(e) = self.store.rollback() {
            error!(err = %e, "rollback failed");
        }
    }

    /// Return every employee in store order.
    pub fn list_all(&self) -> Result<Vec<Employee>, CoreError> {
        let _unit = self.begin()?;
        let employees = self.store.query_all().map_err(storage)?;
        info!(count = employees.len(), "read all employees");
        Ok(employees)
    }

    /// Persist a new employee.
    ///
    /// Fails with `InvalidEmployee` before touching the store when a field is
    /// out of range. Fails with `DuplicateId` when the id is taken and with
    /// `Storage` for any other store failure; the session is rolled back in
    /// both cases.
    pub fn add(&self, employee: Employee) -> Result<(), CoreError> {
        validate_employee(&employee)?;
        let _unit = self.begin()?;
        let id = employee.id;
        let res = self
            .store
            .add(employee)
            .and_then(|()| self.store.commit());
        match res {
            Ok(()) => {
                info!(%id, "employee added");
                Ok(())
            }
            Err(StoreError::UniqueViolation) => {
                self.rollback_quietly();
                error!(%id, "duplicate employee id");
                Err(CoreError::DuplicateId(id))
            }
            Err(e) => {
                self.rollback_quietly();
                error!(%id, err = %e, "database error in creating employee");
                Err(CoreError::Storage(format!("error in creating employee: {e}")))
            }
        }
    }

    /// Look up one employee by id.
    pub fn find_by_id(&self, id: EmployeeId) -> Result<Option<Employee>, CoreError> {
        let _unit = self.begin()?;
        self.lookup(id)
    }

    fn lookup(&self, id: EmployeeId) -> Result<Option<Employee>, CoreError> {
        let found = self.store.get(id).map_err(storage)?;
        info!(%id, found = found.is_some(), "read employee for given id");
        Ok(found)
    }

    /// Overwrite the salary of an existing employee and return the updated
    /// record. An unknown id is a silent no-op returning `None`; an
    /// out-of-range salary is `InvalidEmployee` whether or not the id exists.
    pub fn update_salary(
        &self,
        id: EmployeeId,
        new_salary: u64,
    ) -> Result<Option<Employee>, CoreError> {
        validate_salary(new_salary)?;
        let _unit = self.begin()?;
        let Some(mut employee) = self.lookup(id)? else {
            info!(%id, "employee not found");
            return Ok(None);
        };
        employee.salary = new_salary;
        if let Err(e) = self.store.save(&employee).and_then(|()| self.store.commit()) {
            self.rollback_quietly();
            error!(%id, err = %e, "database error in updating salary");
            return Err(storage(e));
        }
        info!(%id, salary = new_salary, "employee salary updated");
        Ok(Some(employee))
    }

    /// Remove an employee and return the removed record. An unknown id is a
    /// silent no-op returning `None`.
    pub fn delete(&self, id: EmployeeId) -> Result<Option<Employee>, CoreError> {
        let _unit = self.begin()?;
        let Some(employee) = self.lookup(id)? else {
            info!(%id, "employee not found");
            return Ok(None);
        };
        if let Err(e) = self.store.remove(id).and_then(|()| self.store.commit()) {
            self.rollback_quietly();
            error!(%id, err = %e, "database error in deleting employee");
            return Err(storage(e));
        }
        info!(%id, "employee deleted");
        Ok(Some(employee))
    }
}

fn storage(e: StoreError) -> CoreError {
    CoreError::Storage(e.to_string())
}
