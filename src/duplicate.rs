//! Duplicate queue items.
//!
//! Items are appended by the ingestion pipeline whenever an imported record
//! looks like something already on file. They are never mutated in place and
//! are removed exactly once, when an operator resolution completes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::lead::{AgencyProfile, Contact, LeadData, LeadId};

/// Wire tag of the single reason that marks a new contact at a known agency.
pub const POTENTIAL_COLLEAGUE: &str = "Potential Colleague";

/// Identifier of a queued duplicate item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DuplicateId(String);

impl DuplicateId {
    /// Creates a new random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DuplicateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DuplicateId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DuplicateId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Why the ingestion pipeline flagged an item.
///
/// Every reason except [`DuplicateReason::PotentialColleague`] is a conflict.
/// Tags the pipeline may add later are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DuplicateReason {
    /// A new contact person at an agency already on file.
    PotentialColleague,
    /// A contact email already belongs to an existing record.
    EmailExists,
    /// The agency name is already on file.
    AgencyNameExists,
    /// The agency website is already on file.
    WebsiteExists,
    /// The matching record is owned by another user.
    OwnedByAnotherUser,
    /// Any other conflict tag.
    Other(String),
}

impl DuplicateReason {
    /// The partition this reason belongs to.
    #[must_use]
    pub const fn partition(&self) -> Partition {
        match self {
            Self::PotentialColleague => Partition::Colleague,
            _ => Partition::Conflict,
        }
    }

    /// The wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PotentialColleague => POTENTIAL_COLLEAGUE,
            Self::EmailExists => "Email Exists",
            Self::AgencyNameExists => "Agency Name Exists",
            Self::WebsiteExists => "Website Exists",
            Self::OwnedByAnotherUser => "Owned By Another User",
            Self::Other(tag) => tag,
        }
    }
}

impl TryFrom<String> for DuplicateReason {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyDuplicateReason);
        }

        // Exact match only: "potential colleague" is a conflict tag.
        Ok(match value.as_str() {
            POTENTIAL_COLLEAGUE => Self::PotentialColleague,
            "Email Exists" => Self::EmailExists,
            "Agency Name Exists" => Self::AgencyNameExists,
            "Website Exists" => Self::WebsiteExists,
            "Owned By Another User" => Self::OwnedByAnotherUser,
            _ => Self::Other(value),
        })
    }
}

impl TryFrom<&str> for DuplicateReason {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl From<DuplicateReason> for String {
    fn from(value: DuplicateReason) -> Self {
        match value {
            DuplicateReason::Other(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review partition of the duplicate queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Imported record clashes with an existing one.
    #[default]
    Conflict,
    /// Imported record is a new contact for a known agency.
    Colleague,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Colleague => write!(f, "colleague"),
        }
    }
}

/// Partition of a raw reason tag.
///
/// Exactly `"Potential Colleague"` is a colleague; every other non-empty tag
/// is a conflict. Blank tags are rejected.
///
/// # Examples
///
/// ```
/// use leadrecon::{duplicate::partition_of, Partition};
///
/// assert_eq!(partition_of("Potential Colleague").unwrap(), Partition::Colleague);
/// assert_eq!(partition_of("Email Exists").unwrap(), Partition::Conflict);
/// ```
pub fn partition_of(reason: &str) -> Result<Partition, ValidationError> {
    DuplicateReason::try_from(reason).map(|r| r.partition())
}

/// A pending entry of the duplicate queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateItem {
    /// Queue identity.
    pub id: DuplicateId,
    /// Reason tag assigned by the ingestion pipeline.
    pub duplicate_reason: DuplicateReason,
    /// When the pipeline queued the item.
    pub imported_at: DateTime<Utc>,
    /// Existing record the pipeline already matched this item against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_lead_id: Option<LeadId>,
    /// Imported record fields.
    #[serde(flatten)]
    pub record: LeadData,
}

impl DuplicateItem {
    /// Creates an item imported now with a fresh id.
    #[must_use]
    pub fn new(reason: DuplicateReason, record: LeadData) -> Self {
        Self {
            id: DuplicateId::generate(),
            duplicate_reason: reason,
            imported_at: Utc::now(),
            existing_lead_id: None,
            record,
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<DuplicateId>) -> Self {
        self.id = id.into();
        self
    }

    /// Attaches a match hint.
    #[must_use]
    pub fn with_hint(mut self, lead_id: impl Into<LeadId>) -> Self {
        self.existing_lead_id = Some(lead_id.into());
        self
    }

    /// Sets the import timestamp.
    #[must_use]
    pub fn imported_at(mut self, at: DateTime<Utc>) -> Self {
        self.imported_at = at;
        self
    }

    /// The partition this item is reviewed in.
    #[must_use]
    pub const fn partition(&self) -> Partition {
        self.duplicate_reason.partition()
    }

    /// The imported agency profile, if any.
    #[must_use]
    pub fn profile(&self) -> Option<&AgencyProfile> {
        self.record.agency_profile.as_ref()
    }

    /// The imported key contacts (empty when there is no profile).
    #[must_use]
    pub fn imported_contacts(&self) -> &[Contact] {
        self.profile().map(|p| p.key_contacts.as_slice()).unwrap_or_default()
    }

    /// The first imported contact.
    #[must_use]
    pub fn first_contact(&self) -> Option<&Contact> {
        self.imported_contacts().first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exact_colleague_tag_is_colleague() {
        assert_eq!(partition_of("Potential Colleague").unwrap(), Partition::Colleague);
        assert_eq!(partition_of("potential colleague").unwrap(), Partition::Conflict);
        assert_eq!(partition_of("Potential Colleague ").unwrap(), Partition::Conflict);
        assert_eq!(partition_of("Something New").unwrap(), Partition::Conflict);
        assert!(partition_of("  ").is_err());
    }

    #[test]
    fn reason_round_trips_unknown_tags_verbatim() {
        let reason = DuplicateReason::try_from("Phone Exists").unwrap();
        assert_eq!(reason, DuplicateReason::Other("Phone Exists".to_string()));
        assert_eq!(String::from(reason), "Phone Exists");
    }

    #[test]
    fn item_deserializes_from_queue_document() {
        let json = serde_json::json!({
            "id": "dup-1",
            "duplicateReason": "Potential Colleague",
            "importedAt": "2026-01-05T10:00:00Z",
            "existingLeadId": "lead-3",
            "agentName": "Global Ed",
            "country": "Kenya",
            "agencyProfile": {
                "keyContacts": [{"firstName": "Wanjiru", "email": "w@globaled.ke"}]
            }
        });

        let item: DuplicateItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.partition(), Partition::Colleague);
        assert_eq!(item.existing_lead_id, Some(LeadId::from("lead-3")));
        assert_eq!(item.first_contact().and_then(|c| c.email.as_deref()), Some("w@globaled.ke"));
        assert!(item.record.attributes.is_empty());
    }

    #[test]
    fn item_rejects_blank_reason() {
        let json = serde_json::json!({
            "id": "dup-1",
            "duplicateReason": "",
            "importedAt": "2026-01-05T10:00:00Z"
        });
        assert!(serde_json::from_value::<DuplicateItem>(json).is_err());
    }
}
