//! In-memory contact store
//!
//! Units of work hold the store lock for their whole lifetime and stage their
//! writes on a private copy, which replaces the shared state on commit.

use async_trait::async_trait;
use chrono::Utc;
use common::PersistenceError;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::contact_store::{
    check_new_contact, check_reassignment, ContactStore, ContactUnitOfWork, StoreResult,
};
use super::entities::{Contact, LinkPrecedence, NewContact};

/// Store operations that can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Begin,
    FindMatching,
    Insert,
    Fetch,
    ReassignPrecedence,
    RelinkAll,
    Commit,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOperation::Begin => "begin",
            StoreOperation::FindMatching => "find_matching",
            StoreOperation::Insert => "insert",
            StoreOperation::Fetch => "fetch",
            StoreOperation::ReassignPrecedence => "reassign_precedence",
            StoreOperation::RelinkAll => "relink_all",
            StoreOperation::Commit => "commit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    contacts: Vec<Contact>,
    next_id: i64,
}

impl MemoryState {
    fn position(&self, id: i64) -> StoreResult<usize> {
        self.contacts
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| PersistenceError::NotFound {
                details: format!("contact {id}"),
            })
    }
}

type FailureSet = Arc<RwLock<HashSet<StoreOperation>>>;

fn check_failure(failures: &FailureSet, op: StoreOperation) -> StoreResult<()> {
    let armed = failures.read().map(|set| set.contains(&op)).unwrap_or(false);
    if armed {
        return Err(PersistenceError::query_failed(
            op.to_string(),
            std::io::Error::new(std::io::ErrorKind::Other, "injected store failure"),
        ));
    }
    Ok(())
}

/// Contact store kept entirely in process memory
#[derive(Clone)]
pub struct MemoryContactStore {
    state: Arc<Mutex<MemoryState>>,
    failures: FailureSet,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::with_contacts(Vec::new())
    }

    /// Start from pre-existing records; new ids continue after the largest seeded id
    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        let next_id = contacts.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        Self {
            state: Arc::new(Mutex::new(MemoryState { contacts, next_id })),
            failures: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Make every later call of `op` fail
    pub fn fail_on(&self, op: StoreOperation) {
        if let Ok(mut set) = self.failures.write() {
            set.insert(op);
        }
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        if let Ok(mut set) = self.failures.write() {
            set.clear();
        }
    }

    /// Committed records ordered by id
    pub async fn snapshot(&self) -> Vec<Contact> {
        let state = self.state.lock().await;
        let mut contacts = state.contacts.clone();
        contacts.sort_by_key(|c| c.id);
        contacts
    }
}

impl Default for MemoryContactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn begin(&self) -> StoreResult<Box<dyn ContactUnitOfWork>> {
        check_failure(&self.failures, StoreOperation::Begin)?;
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged,
            failures: self.failures.clone(),
        }))
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.state.lock().await.contacts.len() as u64)
    }

    async fn health_check(&self) -> StoreResult<()> {
        check_failure(&self.failures, StoreOperation::Begin)?;
        debug!("Memory contact store health check passed");
        Ok(())
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    failures: FailureSet,
}

#[async_trait]
impl ContactUnitOfWork for MemoryUnitOfWork {
    async fn find_matching(&mut self, email: &str, phone_number: &str) -> StoreResult<Vec<Contact>> {
        check_failure(&self.failures, StoreOperation::FindMatching)?;
        let mut matches: Vec<Contact> = self
            .staged
            .contacts
            .iter()
            .filter(|c| {
                c.email.as_deref() == Some(email) || c.phone_number.as_deref() == Some(phone_number)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.age_cmp(b));
        Ok(matches)
    }

    async fn insert(&mut self, contact: &NewContact) -> StoreResult<i64> {
        check_failure(&self.failures, StoreOperation::Insert)?;
        check_new_contact(contact)?;
        if let Some(target) = contact.linked_id {
            self.staged.position(target).map_err(|_| PersistenceError::ConstraintViolation {
                constraint: format!("linked_id {target} does not reference a contact"),
            })?;
        }

        let id = self.staged.next_id;
        self.staged.next_id += 1;
        let now = Utc::now();
        self.staged.contacts.push(Contact {
            id,
            phone_number: Some(contact.phone_number.clone()),
            email: Some(contact.email.clone()),
            linked_id: contact.linked_id,
            link_precedence: contact.link_precedence,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        });
        Ok(id)
    }

    async fn fetch(&mut self, id: i64) -> StoreResult<Contact> {
        check_failure(&self.failures, StoreOperation::Fetch)?;
        let index = self.staged.position(id)?;
        Ok(self.staged.contacts[index].clone())
    }

    async fn reassign_precedence(
        &mut self,
        id: i64,
        precedence: LinkPrecedence,
        linked_id: Option<i64>,
    ) -> StoreResult<()> {
        check_failure(&self.failures, StoreOperation::ReassignPrecedence)?;
        check_reassignment(id, precedence, linked_id)?;
        let index = self.staged.position(id)?;

        let contact = &mut self.staged.contacts[index];
        contact.link_precedence = precedence;
        contact.linked_id = linked_id;
        contact.updated_at = Utc::now();
        Ok(())
    }

    async fn relink_all(&mut self, old_linked_id: i64, new_linked_id: i64) -> StoreResult<u64> {
        check_failure(&self.failures, StoreOperation::RelinkAll)?;
        let now = Utc::now();
        let mut touched = 0;
        for contact in self
            .staged
            .contacts
            .iter_mut()
            .filter(|c| c.linked_id == Some(old_linked_id))
        {
            contact.linked_id = Some(new_linked_id);
            contact.updated_at = now;
            touched += 1;
        }
        Ok(touched)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        check_failure(&self.failures, StoreOperation::Commit)?;
        let MemoryUnitOfWork {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
