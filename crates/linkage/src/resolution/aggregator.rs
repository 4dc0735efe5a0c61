//! Projection of a resolved cluster onto the identify response

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::cluster::ResolvedCluster;

/// Body of a successful identify call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub contact: ContactSummary,
}

/// Consolidated view of one identity cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    // Wire name is part of the published contract.
    #[serde(rename = "primaryContatctId")]
    pub primary_contact_id: i64,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<i64>,
}

pub struct ResponseAggregator;

impl ResponseAggregator {
    /// Build the response for `cluster` without touching the store.
    ///
    /// A brand-new cluster reports its own email and phone. Every other
    /// outcome reports only what its non-primary members carry.
    pub fn summarize(cluster: &ResolvedCluster) -> IdentifyResponse {
        let contributing: Vec<_> = if cluster.is_new_cluster() {
            cluster.members.iter().collect()
        } else {
            cluster.non_primary_members().collect()
        };

        let emails: BTreeSet<String> = contributing
            .iter()
            .filter_map(|c| c.email.clone())
            .collect();
        let phone_numbers: BTreeSet<String> = contributing
            .iter()
            .filter_map(|c| c.phone_number.clone())
            .collect();
        let secondary_contact_ids = cluster.non_primary_members().map(|c| c.id).collect();

        IdentifyResponse {
            contact: ContactSummary {
                primary_contact_id: cluster.primary_id,
                emails: emails.into_iter().collect(),
                phone_numbers: phone_numbers.into_iter().collect(),
                secondary_contact_ids,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::entities::contact::contact_at;
    use crate::persistence::LinkPrecedence;
    use crate::resolution::Resolution;
    use chrono::Utc;

    #[test]
    fn test_new_cluster_reports_submitted_values() {
        let t = Utc::now();
        let cluster = ResolvedCluster {
            primary_id: 1,
            members: vec![contact_at(1, "a@x", "1", LinkPrecedence::Primary, None, t)],
            resolution: Resolution::NewCluster,
        };

        let response = ResponseAggregator::summarize(&cluster);
        assert_eq!(response.contact.primary_contact_id, 1);
        assert_eq!(response.contact.emails, vec!["a@x"]);
        assert_eq!(response.contact.phone_numbers, vec!["1"]);
        assert!(response.contact.secondary_contact_ids.is_empty());
    }

    #[test]
    fn test_existing_cluster_omits_primary_values() {
        let t = Utc::now();
        let cluster = ResolvedCluster {
            primary_id: 1,
            members: vec![
                contact_at(1, "a@x", "1", LinkPrecedence::Primary, None, t),
                contact_at(2, "a@x", "2", LinkPrecedence::Secondary, Some(1), t),
                contact_at(3, "b@y", "2", LinkPrecedence::Secondary, Some(1), t),
            ],
            resolution: Resolution::SecondaryInserted { contact_id: 3 },
        };

        let contact = ResponseAggregator::summarize(&cluster).contact;
        let emails: BTreeSet<_> = contact.emails.iter().map(String::as_str).collect();
        assert_eq!(emails, BTreeSet::from(["a@x", "b@y"]));
        assert_eq!(contact.phone_numbers, vec!["2"]);
        let ids: BTreeSet<_> = contact.secondary_contact_ids.into_iter().collect();
        assert_eq!(ids, BTreeSet::from([2, 3]));
    }

    #[test]
    fn test_unchanged_primary_only_cluster_is_empty() {
        let t = Utc::now();
        let cluster = ResolvedCluster {
            primary_id: 4,
            members: vec![contact_at(4, "a@x", "1", LinkPrecedence::Primary, None, t)],
            resolution: Resolution::Unchanged,
        };

        let contact = ResponseAggregator::summarize(&cluster).contact;
        assert_eq!(contact.primary_contact_id, 4);
        assert!(contact.emails.is_empty());
        assert!(contact.phone_numbers.is_empty());
        assert!(contact.secondary_contact_ids.is_empty());
    }

    #[test]
    fn test_wire_format_keeps_published_key() {
        let response = IdentifyResponse {
            contact: ContactSummary {
                primary_contact_id: 11,
                emails: vec!["a@x".to_string()],
                phone_numbers: vec!["1".to_string()],
                secondary_contact_ids: vec![12],
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contact": {
                    "primaryContatctId": 11,
                    "emails": ["a@x"],
                    "phoneNumbers": ["1"],
                    "secondaryContactIds": [12]
                }
            })
        );
    }
}
