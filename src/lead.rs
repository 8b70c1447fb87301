//! Existing records (leads) and their agency profiles.
//!
//! A lead is the canonical record owned by the record store. Agent-type leads
//! carry an [`AgencyProfile`] whose first key contact is the primary contact.
//! Matching keys (emails, names, website domains) are normalized here so the
//! resolver and the reconciliation engine agree on what "the same" means.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

static SCHEME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://").expect("valid regex"));
static WWW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^www\.").expect("valid regex"));

/// Identifier of an existing record, assigned by the record store.
///
/// Ids are compared as plain strings; the ingestion pipeline refers to them
/// verbatim in match hints.
///
/// # Examples
///
/// ```
/// use leadrecon::LeadId;
///
/// let id = LeadId::from("lead-42");
/// assert_eq!(id.as_str(), "lead-42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(String);

impl LeadId {
    /// Creates a new random id (used by store backends that assign ids).
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

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LeadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LeadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Discriminator for existing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LeadType {
    /// An agency (recruitment agent). Only these take part in matching.
    #[default]
    Agent,
    /// An individual student lead.
    Student,
}

impl fmt::Display for LeadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => write!(f, "Agent"),
            Self::Student => write!(f, "Student"),
        }
    }
}

/// Named contact fields, used by the merge policy table.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactField {
    Name,
    FirstName,
    LastName,
    Email,
    Role,
    Phone,
    Whatsapp,
    Linkedin,
    Notes,
}

impl ContactField {
    /// Every contact field, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Name,
        Self::FirstName,
        Self::LastName,
        Self::Email,
        Self::Role,
        Self::Phone,
        Self::Whatsapp,
        Self::Linkedin,
        Self::Notes,
    ];

    /// The wire name of the field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Email => "email",
            Self::Role => "role",
            Self::Phone => "phone",
            Self::Whatsapp => "whatsapp",
            Self::Linkedin => "linkedin",
            Self::Notes => "notes",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contact person at an agency.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Contact keys outside the named fields, carried verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Contact {
    /// Creates a contact from first and last name; the display name is derived.
    #[must_use]
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let mut contact = Self {
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            ..Self::default()
        };
        contact.name = Some(contact.display_name());
        contact
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Sets the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Display name: `name` when present, otherwise "first last".
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = non_blank(self.name.as_deref()) {
            return name.to_string();
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .filter_map(non_blank)
            .collect();
        parts.join(" ")
    }

    /// The normalized email used as the contact's identity, if any.
    #[must_use]
    pub fn email_key(&self) -> Option<String> {
        self.email.as_deref().and_then(normalize_email)
    }

    /// Reads a field by name.
    #[must_use]
    pub fn field(&self, field: ContactField) -> Option<&str> {
        match field {
            ContactField::Name => self.name.as_deref(),
            ContactField::FirstName => self.first_name.as_deref(),
            ContactField::LastName => self.last_name.as_deref(),
            ContactField::Email => self.email.as_deref(),
            ContactField::Role => self.role.as_deref(),
            ContactField::Phone => self.phone.as_deref(),
            ContactField::Whatsapp => self.whatsapp.as_deref(),
            ContactField::Linkedin => self.linkedin.as_deref(),
            ContactField::Notes => self.notes.as_deref(),
        }
    }

    /// Writes a field by name.
    pub fn set_field(&mut self, field: ContactField, value: Option<String>) {
        let slot = match field {
            ContactField::Name => &mut self.name,
            ContactField::FirstName => &mut self.first_name,
            ContactField::LastName => &mut self.last_name,
            ContactField::Email => &mut self.email,
            ContactField::Role => &mut self.role,
            ContactField::Phone => &mut self.phone,
            ContactField::Whatsapp => &mut self.whatsapp,
            ContactField::Linkedin => &mut self.linkedin,
            ContactField::Notes => &mut self.notes,
        };
        *slot = value;
    }
}

/// Agency details embedded in agent-type records and duplicate items.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Ordered contacts; index 0 is the primary contact.
    #[serde(default)]
    pub key_contacts: Vec<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_contact: Option<Contact>,
    /// Profile keys outside the named slots, carried verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl AgencyProfile {
    /// Creates a profile with a single primary contact.
    #[must_use]
    pub fn new(name: impl Into<String>, primary: Contact) -> Self {
        Self {
            name: Some(name.into()),
            key_contacts: vec![primary],
            ..Self::default()
        }
    }

    /// Sets the website.
    #[must_use]
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    /// Appends a key contact.
    #[must_use]
    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.key_contacts.push(contact);
        self
    }

    /// Sets the secondary contact.
    #[must_use]
    pub fn with_secondary(mut self, contact: Contact) -> Self {
        self.secondary_contact = Some(contact);
        self
    }

    /// The primary contact (index 0), if any.
    #[must_use]
    pub fn primary_contact(&self) -> Option<&Contact> {
        self.key_contacts.first()
    }

    /// All contacts: key contacts in order, then the secondary contact.
    pub fn all_contacts(&self) -> impl Iterator<Item = &Contact> {
        self.key_contacts.iter().chain(self.secondary_contact.iter())
    }

    /// Lower-cased, non-empty emails across every contact slot.
    #[must_use]
    pub fn email_keys(&self) -> HashSet<String> {
        self.all_contacts().filter_map(Contact::email_key).collect()
    }

    /// Normalized website domain, if the website is set and non-empty.
    #[must_use]
    pub fn domain(&self) -> Option<String> {
        self.website.as_deref().and_then(normalize_domain)
    }
}

/// Record fields shared by existing records and imported duplicates.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadData {
    #[serde(rename = "type", default)]
    pub lead_type: LeadType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_profile: Option<AgencyProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Remaining record attributes carried verbatim.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl LeadData {
    /// Creates agent-type data for the named agency.
    #[must_use]
    pub fn agent(agent_name: impl Into<String>, profile: AgencyProfile) -> Self {
        Self {
            lead_type: LeadType::Agent,
            agent_name: Some(agent_name.into()),
            agency_profile: Some(profile),
            ..Self::default()
        }
    }

    /// Checks the contact-list invariant for agent-type records.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lead_type != LeadType::Agent {
            return Ok(());
        }
        match &self.agency_profile {
            Some(profile) if profile.key_contacts.is_empty() => Err(ValidationError::MissingField {
                field: "agencyProfile.keyContacts".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// A canonical record held by the record store.
///
/// # Examples
///
/// ```
/// use leadrecon::{AgencyProfile, Contact, Lead, LeadData};
///
/// let profile = AgencyProfile::new("Global Ed", Contact::new("Ana", "Ruiz"));
/// let lead = Lead::new("lead-1", LeadData::agent("Global Ed", profile));
/// assert!(lead.is_agent());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Store-assigned identity.
    pub id: LeadId,
    /// Record fields.
    #[serde(flatten)]
    pub data: LeadData,
}

impl Lead {
    /// Creates a record with a known id.
    #[must_use]
    pub fn new(id: impl Into<LeadId>, data: LeadData) -> Self {
        Self { id: id.into(), data }
    }

    /// Returns true for agent-type records.
    #[must_use]
    pub fn is_agent(&self) -> bool {
        self.data.lead_type == LeadType::Agent
    }

    /// The agency profile, if any.
    #[must_use]
    pub fn profile(&self) -> Option<&AgencyProfile> {
        self.data.agency_profile.as_ref()
    }
}

/// Lower-cases and trims an email; blank input yields `None`.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    non_blank(Some(email)).map(str::to_lowercase)
}

/// Lower-cases and trims an agency name; blank input yields `None`.
#[must_use]
pub fn normalize_name(name: &str) -> Option<String> {
    non_blank(Some(name)).map(str::to_lowercase)
}

/// Reduces a website to its bare domain.
///
/// Strips an optional `http(s)://` scheme and a leading `www.`, truncates at
/// the first `/`, and lower-cases the rest.
///
/// # Examples
///
/// ```
/// use leadrecon::lead::normalize_domain;
///
/// assert_eq!(normalize_domain("https://www.acme.com/apply").as_deref(), Some("acme.com"));
/// assert_eq!(normalize_domain("acme.com").as_deref(), Some("acme.com"));
/// assert_eq!(normalize_domain("https://"), None);
/// ```
#[must_use]
pub fn normalize_domain(website: &str) -> Option<String> {
    let trimmed = website.trim();
    let without_scheme = SCHEME_RE.replace(trimmed, "");
    let without_www = WWW_RE.replace(&without_scheme, "");
    let host = without_www.split('/').next().unwrap_or_default();
    non_blank(Some(host)).map(str::to_lowercase)
}

/// Returns the trimmed value when it is non-empty.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
