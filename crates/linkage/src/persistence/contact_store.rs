//! # Contact Store
//!
//! The persistence gateway the resolver is written against. Every read and
//! write of a resolution goes through one [`ContactUnitOfWork`], which either
//! commits as a whole or leaves the store untouched.

use async_trait::async_trait;
use common::{ConnectionStats, PersistenceError};

use super::entities::{Contact, LinkPrecedence, NewContact};

pub type StoreResult<T> = Result<T, PersistenceError>;

/// Handle to the Contact record set
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Open a unit of work; dropping it without `commit` discards its writes
    async fn begin(&self) -> StoreResult<Box<dyn ContactUnitOfWork>>;

    /// Number of stored contacts, soft-deleted ones included
    async fn count(&self) -> StoreResult<u64>;

    /// Check that the backing store answers
    async fn health_check(&self) -> StoreResult<()>;

    /// Pool usage, for stores that sit on a connection pool
    fn connection_stats(&self) -> Option<ConnectionStats> {
        None
    }
}

/// Operations available inside a single unit of work
#[async_trait]
pub trait ContactUnitOfWork: Send {
    /// Every contact whose email equals `email` or whose phone equals `phone_number`,
    /// oldest first (`created_at`, then `id`)
    async fn find_matching(&mut self, email: &str, phone_number: &str) -> StoreResult<Vec<Contact>>;

    /// Store a new contact and return its assigned id
    async fn insert(&mut self, contact: &NewContact) -> StoreResult<i64>;

    /// Point lookup of a contact in canonical form
    async fn fetch(&mut self, id: i64) -> StoreResult<Contact>;

    /// Change a contact's precedence and link target, bumping `updated_at`
    async fn reassign_precedence(
        &mut self,
        id: i64,
        precedence: LinkPrecedence,
        linked_id: Option<i64>,
    ) -> StoreResult<()>;

    /// Point everything linked to `old_linked_id` at `new_linked_id`; returns rows touched
    async fn relink_all(&mut self, old_linked_id: i64, new_linked_id: i64) -> StoreResult<u64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Reject precedence/link combinations the data model forbids
pub(crate) fn check_reassignment(
    id: i64,
    precedence: LinkPrecedence,
    linked_id: Option<i64>,
) -> StoreResult<()> {
    match (precedence, linked_id) {
        (LinkPrecedence::Secondary, Some(target)) if target == id => {
            Err(PersistenceError::ConstraintViolation {
                constraint: format!("contact {id} cannot link to itself"),
            })
        }
        (LinkPrecedence::Secondary, None) => Err(PersistenceError::ConstraintViolation {
            constraint: format!("secondary contact {id} requires a linked_id"),
        }),
        (LinkPrecedence::Primary, Some(_)) => Err(PersistenceError::ConstraintViolation {
            constraint: format!("primary contact {id} cannot carry a linked_id"),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn check_new_contact(contact: &NewContact) -> StoreResult<()> {
    contact
        .check_link()
        .map_err(|e| PersistenceError::ConstraintViolation {
            constraint: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reassignment_rules() {
        assert!(check_reassignment(2, LinkPrecedence::Secondary, Some(1)).is_ok());
        assert!(check_reassignment(2, LinkPrecedence::Primary, None).is_ok());
        assert!(check_reassignment(2, LinkPrecedence::Secondary, Some(2)).is_err());
        assert!(check_reassignment(2, LinkPrecedence::Secondary, None).is_err());
        assert!(check_reassignment(2, LinkPrecedence::Primary, Some(1)).is_err());
    }
}
