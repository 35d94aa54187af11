use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::{Employee, EmployeeId, EmployeeStore, StoreError};

#[derive(Default)]
struct State {
    committed: BTreeMap<EmployeeId, Employee>,
    /// Copy of `committed` with staged writes applied; `None` when clean.
    working: Option<BTreeMap<EmployeeId, Employee>>,
}

impl State {
    fn view(&self) -> &BTreeMap<EmployeeId, Employee> {
        self.working.as_ref().unwrap_or(&self.committed)
    }

    fn staged(&mut self) -> &mut BTreeMap<EmployeeId, Employee> {
        let committed = &self.committed;
        self.working.get_or_insert_with(|| committed.clone())
    }
}

/// Simple in-memory store for tests and local runs. Records are kept ordered
/// by id; staged writes live in a working copy until commit.
pub struct InMemoryStore {
    inner: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State::default()),
        }
    }

    /// Build a store whose committed state already holds `employees`.
    /// Later entries win on duplicate ids.
    pub fn with_employees<I: IntoIterator<Item = Employee>>(employees: I) -> Self {
        let committed = employees.into_iter().map(|e| (e.id, e)).collect();
        Self {
            inner: Mutex::new(State {
                committed,
                working: None,
            }),
        }
    }

    /// Whether writes are staged and not yet committed.
    #[cfg(test)]
    pub(crate) fn has_pending(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.working.is_some())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EmployeeStore for InMemoryStore {
    fn query_all(&self) -> Result<Vec<Employee>, StoreError> {
        let state = self.lock()?;
        Ok(state.view().values().cloned().collect())
    }

    fn get(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError> {
        let state = self.lock()?;
        Ok(state.view().get(&id).cloned())
    }

    fn add(&self, employee: Employee) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let staged = state.staged();
        if staged.contains_key(&employee.id) {
            return Err(StoreError::UniqueViolation);
        }
        staged.insert(employee.id, employee);
        Ok(())
    }

    fn save(&self, employee: &Employee) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let staged = state.staged();
        match staged.get_mut(&employee.id) {
            Some(slot) => {
                *slot = employee.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn remove(&self, id: EmployeeId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        match state.staged().remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if let Some(working) = state.working.take() {
            state.committed = working;
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.working = None;
        Ok(())
    }
}
