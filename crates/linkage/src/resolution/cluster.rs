//! The working set of contacts a resolution settles on

use std::cmp::Ordering;

use crate::persistence::Contact;

/// What a resolution did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No record matched; a fresh primary was stored
    NewCluster,
    /// The observation was already known; nothing was written
    Unchanged,
    /// A secondary carrying the new fact was linked to the existing primary
    SecondaryInserted { contact_id: i64 },
    /// Two clusters became one under the elder primary
    Merged { junior_id: i64, relinked: u64 },
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::NewCluster => "new_cluster",
            Resolution::Unchanged => "unchanged",
            Resolution::SecondaryInserted { .. } => "secondary_inserted",
            Resolution::Merged { .. } => "merged",
        }
    }
}

/// Outcome of resolving one observation
#[derive(Debug, Clone)]
pub struct ResolvedCluster {
    pub primary_id: i64,
    pub members: Vec<Contact>,
    pub resolution: Resolution,
}

impl ResolvedCluster {
    pub fn is_new_cluster(&self) -> bool {
        matches!(self.resolution, Resolution::NewCluster)
    }

    /// Members other than primaries, in working-set order
    pub fn non_primary_members(&self) -> impl Iterator<Item = &Contact> {
        self.members.iter().filter(|c| !c.is_primary())
    }
}

/// Split two primaries into (elder, junior) by creation time, then id
pub(crate) fn elder_and_junior<'a>(a: &'a Contact, b: &'a Contact) -> (&'a Contact, &'a Contact) {
    match a.age_cmp(b) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    }
}

/// Whether the matched members of `primary_id`'s own cluster already hold
/// both values, on one record or spread over several
pub(crate) fn cluster_knows(
    members: &[Contact],
    primary_id: i64,
    email: &str,
    phone_number: &str,
) -> bool {
    let mut own = members
        .iter()
        .filter(|c| c.id == primary_id || c.linked_id == Some(primary_id));
    let (mut has_email, mut has_phone) = (false, false);
    own.any(|c| {
        has_email |= c.email.as_deref() == Some(email);
        has_phone |= c.phone_number.as_deref() == Some(phone_number);
        has_email && has_phone
    })
}

/// Apply a merge to the in-memory working set the way the store applied it
pub(crate) fn apply_merge(members: &mut [Contact], elder_id: i64, junior_id: i64) {
    for member in members.iter_mut() {
        if member.id == junior_id {
            member.demote_to(elder_id);
        } else if member.linked_id == Some(junior_id) {
            member.linked_id = Some(elder_id);
        }
    }
}
