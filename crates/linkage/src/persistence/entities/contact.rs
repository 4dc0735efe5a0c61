use chrono::{DateTime, Utc};
use common::ValidationError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Role of a contact inside its cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    /// Value stored in the `linked_precedence` column
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkPrecedence {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(LinkPrecedence::Primary),
            "secondary" => Ok(LinkPrecedence::Secondary),
            other => Err(ValidationError::InvalidEnum {
                enum_name: "linked_precedence".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// A single observed identity fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub linked_id: Option<i64>,
    pub link_precedence: LinkPrecedence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn is_primary(&self) -> bool {
        matches!(self.link_precedence, LinkPrecedence::Primary)
    }

    pub fn is_secondary(&self) -> bool {
        matches!(self.link_precedence, LinkPrecedence::Secondary)
    }

    /// Whether this record carries exactly the observed pair
    pub fn carries(&self, email: &str, phone_number: &str) -> bool {
        self.email.as_deref() == Some(email) && self.phone_number.as_deref() == Some(phone_number)
    }

    /// Age ordering: earlier `created_at` first, smaller `id` on ties
    pub fn age_cmp(&self, other: &Contact) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Turn this record into a secondary of `primary_id`
    pub fn demote_to(&mut self, primary_id: i64) {
        self.link_precedence = LinkPrecedence::Secondary;
        self.linked_id = Some(primary_id);
        self.updated_at = Utc::now();
    }
}

/// Values for a contact that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub phone_number: String,
    pub email: String,
    pub link_precedence: LinkPrecedence,
    pub linked_id: Option<i64>,
}

impl NewContact {
    pub fn primary(email: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            email: email.into(),
            link_precedence: LinkPrecedence::Primary,
            linked_id: None,
        }
    }

    pub fn secondary(
        email: impl Into<String>,
        phone_number: impl Into<String>,
        primary_id: i64,
    ) -> Self {
        Self {
            phone_number: phone_number.into(),
            email: email.into(),
            link_precedence: LinkPrecedence::Secondary,
            linked_id: Some(primary_id),
        }
    }

    /// A link target is present exactly when the contact is secondary
    pub fn check_link(&self) -> Result<(), ValidationError> {
        match (self.link_precedence, self.linked_id) {
            (LinkPrecedence::Primary, None) | (LinkPrecedence::Secondary, Some(_)) => Ok(()),
            (LinkPrecedence::Primary, Some(_)) => Err(ValidationError::ConstraintViolation {
                field: "linked_id".to_string(),
                constraint: "primary contacts cannot link to another contact".to_string(),
            }),
            (LinkPrecedence::Secondary, None) => Err(ValidationError::ConstraintViolation {
                field: "linked_id".to_string(),
                constraint: "secondary contacts must link to a primary".to_string(),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) fn contact_at(
    id: i64,
    email: &str,
    phone_number: &str,
    link_precedence: LinkPrecedence,
    linked_id: Option<i64>,
    created_at: DateTime<Utc>,
) -> Contact {
    Contact {
        id,
        phone_number: Some(phone_number.to_string()),
        email: Some(email.to_string()),
        linked_id,
        link_precedence,
        created_at,
        updated_at: created_at,
        deleted_at: None,
    }
}
