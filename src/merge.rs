//! Merge semantics for reconciliation actions.
//!
//! Contact merges are driven by an explicit per-field policy table rather than
//! dynamic key copying, so what each action may overwrite can be read off
//! [`CONTACT_MERGE_POLICY`] and [`CONTACT_REPLACE_POLICY`]. Record-level writes
//! are expressed as a [`LeadPatch`]: the store applies only the fields a patch
//! sets and leaves everything else untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duplicate::DuplicateItem;
use crate::lead::{non_blank, AgencyProfile, Contact, ContactField, LeadData, LeadType};

/// Fields that exist only on queue items and must never reach a record.
pub const QUEUE_ONLY_FIELDS: [&str; 4] = ["id", "duplicateReason", "importedAt", "existingLeadId"];

/// Fields stripped from an overwrite payload on top of the queue-only ones.
pub const OVERWRITE_PROTECTED_FIELDS: [&str; 2] = ["source", "createdAt"];

/// How a single contact field reacts to an imported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMergePolicy {
    /// Take the imported value only when it is a non-blank string.
    OverwriteIfNonBlank,
    /// Take the imported value, including its absence.
    AlwaysOverwrite,
    /// Keep the existing value.
    NeverOverwrite,
}

/// A contact merge table: one policy per named field, plus one policy for
/// every key carried in [`Contact::extra`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactMergeRules {
    /// Named fields and their policies. Fields missing here are kept.
    pub fields: &'static [(ContactField, ContactMergePolicy)],
    /// Policy applied to keys outside the named fields.
    pub extra: ContactMergePolicy,
}

/// Rules used by Merge Contact.
pub const CONTACT_MERGE_POLICY: ContactMergeRules = ContactMergeRules {
    fields: &[
        (ContactField::Name, ContactMergePolicy::OverwriteIfNonBlank),
        (ContactField::FirstName, ContactMergePolicy::OverwriteIfNonBlank),
        (ContactField::LastName, ContactMergePolicy::OverwriteIfNonBlank),
        (ContactField::Email, ContactMergePolicy::OverwriteIfNonBlank),
        (ContactField::Role, ContactMergePolicy::OverwriteIfNonBlank),
        (ContactField::Phone, ContactMergePolicy::OverwriteIfNonBlank),
        (ContactField::Whatsapp, ContactMergePolicy::OverwriteIfNonBlank),
        (ContactField::Linkedin, ContactMergePolicy::OverwriteIfNonBlank),
        (ContactField::Notes, ContactMergePolicy::OverwriteIfNonBlank),
    ],
    extra: ContactMergePolicy::OverwriteIfNonBlank,
};

/// Rules used by Replace Contact.
pub const CONTACT_REPLACE_POLICY: ContactMergeRules = ContactMergeRules {
    fields: &[
        (ContactField::Name, ContactMergePolicy::AlwaysOverwrite),
        (ContactField::FirstName, ContactMergePolicy::AlwaysOverwrite),
        (ContactField::LastName, ContactMergePolicy::AlwaysOverwrite),
        (ContactField::Email, ContactMergePolicy::AlwaysOverwrite),
        (ContactField::Role, ContactMergePolicy::AlwaysOverwrite),
        (ContactField::Phone, ContactMergePolicy::AlwaysOverwrite),
        (ContactField::Whatsapp, ContactMergePolicy::AlwaysOverwrite),
        (ContactField::Linkedin, ContactMergePolicy::AlwaysOverwrite),
        (ContactField::Notes, ContactMergePolicy::AlwaysOverwrite),
    ],
    extra: ContactMergePolicy::AlwaysOverwrite,
};

/// A partial update of an existing record.
///
/// `None` fields are left untouched by the store. There is deliberately no
/// `createdAt` slot: a record's creation stamp is never rewritten.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub lead_type: Option<LeadType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_profile: Option<AgencyProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl LeadPatch {
    /// A patch that only swaps the agency profile.
    #[must_use]
    pub fn profile(profile: AgencyProfile, now: DateTime<Utc>) -> Self {
        Self {
            agency_profile: Some(profile),
            updated_at: Some(now),
            ..Self::default()
        }
    }

    /// Wire names of every field this patch writes.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if self.lead_type.is_some() {
            names.push("type");
        }
        if self.agent_name.is_some() {
            names.push("agentName");
        }
        if self.country.is_some() {
            names.push("country");
        }
        if self.agency_profile.is_some() {
            names.push("agencyProfile");
        }
        if self.source.is_some() {
            names.push("source");
        }
        if self.updated_at.is_some() {
            names.push("updatedAt");
        }
        names.extend(self.attributes.keys().map(String::as_str));
        names
    }

    /// Shallow-merges the patch onto record data.
    pub fn apply_to(&self, data: &mut LeadData) {
        if let Some(lead_type) = self.lead_type {
            data.lead_type = lead_type;
        }
        if let Some(agent_name) = &self.agent_name {
            data.agent_name = Some(agent_name.clone());
        }
        if let Some(country) = &self.country {
            data.country = Some(country.clone());
        }
        if let Some(profile) = &self.agency_profile {
            data.agency_profile = Some(profile.clone());
        }
        if let Some(source) = &self.source {
            data.source = Some(source.clone());
        }
        if let Some(updated_at) = self.updated_at {
            data.updated_at = Some(updated_at);
        }
        for (key, value) in &self.attributes {
            data.attributes.insert(key.clone(), value.clone());
        }
    }
}

fn strip_attributes(
    attributes: &BTreeMap<String, serde_json::Value>,
    protected: &[&str],
) -> BTreeMap<String, serde_json::Value> {
    attributes
        .iter()
        .filter(|(key, _)| !protected.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Record data for Create New: the imported fields minus queue-only ones,
/// stamped with a fresh creation time.
#[must_use]
pub fn creation_record(item: &DuplicateItem, now: DateTime<Utc>) -> LeadData {
    let mut data = item.record.clone();
    data.attributes = strip_attributes(&item.record.attributes, &QUEUE_ONLY_FIELDS);
    data.created_at = Some(now);
    data.updated_at = None;
    data
}

/// Patch for Overwrite: imported fields override, queue-only fields and the
/// import's own `source`/`createdAt` never propagate, and the result is
/// tagged with `source_marker`.
#[must_use]
pub fn overwrite_patch(item: &DuplicateItem, source_marker: &str, now: DateTime<Utc>) -> LeadPatch {
    let protected: Vec<&str> = QUEUE_ONLY_FIELDS
        .iter()
        .chain(OVERWRITE_PROTECTED_FIELDS.iter())
        .copied()
        .collect();

    let record = &item.record;
    LeadPatch {
        lead_type: Some(record.lead_type),
        agent_name: record.agent_name.clone(),
        country: record.country.clone(),
        agency_profile: record.agency_profile.clone(),
        source: Some(source_marker.to_string()),
        updated_at: Some(now),
        attributes: strip_attributes(&record.attributes, &protected),
    }
}

/// Applies a merge table to one contact.
///
/// Named fields missing from the table are kept. A blank display name left
/// behind by the merge is re-derived from first and last name.
#[must_use]
pub fn merge_contact(existing: &Contact, imported: &Contact, rules: &ContactMergeRules) -> Contact {
    let mut merged = existing.clone();
    for &(field, rule) in rules.fields {
        match rule {
            ContactMergePolicy::NeverOverwrite => {}
            ContactMergePolicy::AlwaysOverwrite => {
                merged.set_field(field, imported.field(field).map(str::to_string));
            }
            ContactMergePolicy::OverwriteIfNonBlank => {
                if let Some(value) = imported.field(field) {
                    if non_blank(Some(value)).is_some() {
                        merged.set_field(field, Some(value.to_string()));
                    }
                }
            }
        }
    }

    match rules.extra {
        ContactMergePolicy::NeverOverwrite => {}
        ContactMergePolicy::AlwaysOverwrite => merged.extra.clone_from(&imported.extra),
        ContactMergePolicy::OverwriteIfNonBlank => {
            for (key, value) in &imported.extra {
                if !is_blank_value(value) {
                    merged.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    if non_blank(merged.name.as_deref()).is_none() {
        let derived = merged.display_name();
        if !derived.is_empty() {
            merged.name = Some(derived);
        }
    }
    merged
}

fn is_blank_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Replace Contact: the imported contact takes index 0; other contacts keep
/// their positions.
#[must_use]
pub fn replace_primary(profile: &AgencyProfile, imported: &Contact) -> AgencyProfile {
    let mut out = profile.clone();
    match out.key_contacts.first_mut() {
        Some(primary) => *primary = merge_contact(primary, imported, &CONTACT_REPLACE_POLICY),
        None => out.key_contacts.push(imported.clone()),
    }
    out
}

/// Merge Contact: non-blank imported fields overwrite the primary contact.
#[must_use]
pub fn merge_primary(profile: &AgencyProfile, imported: &Contact) -> AgencyProfile {
    let mut out = profile.clone();
    match out.key_contacts.first_mut() {
        Some(primary) => *primary = merge_contact(primary, imported, &CONTACT_MERGE_POLICY),
        None => out.key_contacts.push(merge_contact(&Contact::default(), imported, &CONTACT_MERGE_POLICY)),
    }
    out
}

/// Imported contacts not yet on the profile.
///
/// A contact is novel when its email is absent from every existing slot
/// (key contacts and secondary contact, compared case-insensitively) or when
/// it has no email at all.
#[must_use]
pub fn novel_colleagues(profile: &AgencyProfile, imported: &[Contact]) -> Vec<Contact> {
    let known = profile.email_keys();
    imported
        .iter()
        .filter(|contact| contact.email_key().map_or(true, |email| !known.contains(&email)))
        .cloned()
        .collect()
}

/// Appends contacts to the end of the key contact list.
#[must_use]
pub fn append_colleagues(profile: &AgencyProfile, colleagues: Vec<Contact>) -> AgencyProfile {
    let mut out = profile.clone();
    out.key_contacts.extend(colleagues);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicate::DuplicateReason;
    use serde_json::json;

    fn contact(email: &str) -> Contact {
        Contact::default().with_email(email)
    }

    #[test]
    fn merge_only_takes_non_blank_imported_values() {
        let existing = Contact::new("Ana", "Ruiz").with_email("ana@x.com").with_phone("+1 555");
        let mut imported = Contact::default().with_role("Director");
        imported.phone = Some("   ".to_string());
        imported.email = None;

        let merged = merge_contact(&existing, &imported, &CONTACT_MERGE_POLICY);
        assert_eq!(merged.role.as_deref(), Some("Director"));
        assert_eq!(merged.phone.as_deref(), Some("+1 555"));
        assert_eq!(merged.email.as_deref(), Some("ana@x.com"));
        assert_eq!(merged.name.as_deref(), Some("Ana Ruiz"));
    }

    #[test]
    fn merge_is_idempotent() {
        let existing = Contact::new("Ana", "Ruiz").with_email("ana@x.com");
        let imported = Contact::new("Ana", "Ruiz-Lopez").with_phone("+44 1");

        let once = merge_contact(&existing, &imported, &CONTACT_MERGE_POLICY);
        let twice = merge_contact(&once, &imported, &CONTACT_MERGE_POLICY);
        assert_eq!(once, twice);
    }

    #[test]
    fn never_overwrite_keeps_existing_value() {
        const KEEP_EMAIL: ContactMergeRules = ContactMergeRules {
            fields: &[
                (ContactField::Email, ContactMergePolicy::NeverOverwrite),
                (ContactField::Phone, ContactMergePolicy::OverwriteIfNonBlank),
            ],
            extra: ContactMergePolicy::NeverOverwrite,
        };
        let existing = contact("keep@x.com");
        let imported = contact("new@x.com").with_phone("+1");

        let merged = merge_contact(&existing, &imported, &KEEP_EMAIL);
        assert_eq!(merged.email.as_deref(), Some("keep@x.com"));
        assert_eq!(merged.phone.as_deref(), Some("+1"));
    }

    #[test]
    fn extra_keys_follow_the_table() {
        let mut existing = contact("ana@x.com");
        existing.extra.insert("title".to_string(), json!("CEO"));
        existing.extra.insert("office".to_string(), json!("Accra"));
        let mut imported = contact("ana@x.com");
        imported.extra.insert("title".to_string(), json!("  "));
        imported.extra.insert("office".to_string(), json!("Lagos"));
        imported.extra.insert("skype".to_string(), json!("ana.r"));

        let merged = merge_contact(&existing, &imported, &CONTACT_MERGE_POLICY);
        assert_eq!(merged.extra.get("title"), Some(&json!("CEO")));
        assert_eq!(merged.extra.get("office"), Some(&json!("Lagos")));
        assert_eq!(merged.extra.get("skype"), Some(&json!("ana.r")));

        let replaced = merge_contact(&existing, &imported, &CONTACT_REPLACE_POLICY);
        assert_eq!(replaced.extra, imported.extra);
    }

    #[test]
    fn replace_primary_keeps_other_positions() {
        let profile = AgencyProfile::new("Acme", contact("old@x.com").with_phone("+1"))
            .with_contact(contact("second@x.com"));
        let imported = contact("new@x.com");

        let out = replace_primary(&profile, &imported);
        assert_eq!(out.key_contacts.len(), 2);
        assert_eq!(out.key_contacts[0].email.as_deref(), Some("new@x.com"));
        assert_eq!(out.key_contacts[0].phone, None);
        assert_eq!(out.key_contacts[1].email.as_deref(), Some("second@x.com"));
    }

    #[test]
    fn primary_actions_install_contact_on_empty_list() {
        let mut profile = AgencyProfile::new("Acme", Contact::default());
        profile.key_contacts.clear();
        let imported = contact("new@x.com");

        assert_eq!(replace_primary(&profile, &imported).key_contacts.len(), 1);
        assert_eq!(
            merge_primary(&profile, &imported).key_contacts[0].email.as_deref(),
            Some("new@x.com")
        );
    }

    #[test]
    fn novel_colleagues_filters_known_emails_and_keeps_emailless() {
        let profile = AgencyProfile::new("Acme", contact("a@x.com"))
            .with_secondary(contact("sec@x.com"));
        let imported = vec![
            contact("A@X.com"),
            contact("b@x.com"),
            contact("SEC@x.com"),
            Contact::new("No", "Email"),
        ];

        let novel = novel_colleagues(&profile, &imported);
        assert_eq!(novel.len(), 2);
        assert_eq!(novel[0].email.as_deref(), Some("b@x.com"));
        assert_eq!(novel[1].email, None);
    }

    #[test]
    fn creation_record_strips_queue_fields_and_stamps_time() {
        let mut record = LeadData::agent("Acme", AgencyProfile::new("Acme", contact("a@x.com")));
        record.source = Some("csv".to_string());
        record.attributes.insert("existingLeadId".to_string(), json!("lead-1"));
        record.attributes.insert("ownerId".to_string(), json!("u-1"));
        let item = DuplicateItem::new(DuplicateReason::EmailExists, record);

        let now = Utc::now();
        let data = creation_record(&item, now);
        assert_eq!(data.created_at, Some(now));
        assert_eq!(data.source.as_deref(), Some("csv"));
        assert!(!data.attributes.contains_key("existingLeadId"));
        assert!(data.attributes.contains_key("ownerId"));
    }

    #[test]
    fn overwrite_patch_never_carries_protected_fields() {
        let mut record = LeadData::agent("Acme", AgencyProfile::new("Acme", contact("a@x.com")));
        record.source = Some("csv".to_string());
        record.created_at = Some(Utc::now());
        for key in ["id", "duplicateReason", "importedAt", "existingLeadId", "source", "createdAt"] {
            record.attributes.insert(key.to_string(), json!("leak"));
        }
        record.attributes.insert("ownerId".to_string(), json!("u-1"));
        let item = DuplicateItem::new(DuplicateReason::EmailExists, record).with_hint("lead-1");

        let patch = overwrite_patch(&item, "Duplicate Overwrite", Utc::now());
        assert_eq!(patch.source.as_deref(), Some("Duplicate Overwrite"));
        assert!(patch.attributes.contains_key("ownerId"));

        let wire = serde_json::to_value(&patch).unwrap();
        let wire = wire.as_object().unwrap();
        for key in ["id", "duplicateReason", "importedAt", "existingLeadId", "createdAt"] {
            assert!(!wire.contains_key(key), "{key} leaked into overwrite payload");
        }
        assert_eq!(wire.get("source"), Some(&json!("Duplicate Overwrite")));
    }

    #[test]
    fn patch_apply_leaves_unset_fields_untouched() {
        let mut data = LeadData::agent("Acme", AgencyProfile::new("Acme", contact("a@x.com")));
        data.country = Some("Ghana".to_string());

        let patch = LeadPatch {
            agent_name: Some("Acme Intl".to_string()),
            ..LeadPatch::default()
        };
        patch.apply_to(&mut data);

        assert_eq!(data.agent_name.as_deref(), Some("Acme Intl"));
        assert_eq!(data.country.as_deref(), Some("Ghana"));
        assert_eq!(patch.field_names(), vec!["agentName"]);
    }
}
