//! Match resolution between a duplicate item and the existing records.
//!
//! The resolver owns no state: a match is a pure function of the item and the
//! current record snapshot, recomputed on every read. Rules are checked per
//! candidate in a fixed order (email, name, domain) and the first candidate
//! satisfying any rule wins. An explicit hint from the ingestion pipeline
//! bypasses the heuristics entirely.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::duplicate::DuplicateItem;
use crate::lead::{normalize_name, Lead, LeadId};

/// The rule that paired an item with an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// The item carried an explicit existing-record id.
    Hint,
    /// At least one contact email is shared.
    Email,
    /// Agent names are equal after trimming and lower-casing.
    Name,
    /// Website domains are equal after normalization.
    Domain,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hint => write!(f, "hint"),
            Self::Email => write!(f, "email"),
            Self::Name => write!(f, "name"),
            Self::Domain => write!(f, "domain"),
        }
    }
}

/// An existing record paired with the rule that matched it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate<'a> {
    /// The matched record.
    pub lead: &'a Lead,
    /// Which rule fired.
    pub rule: MatchRule,
}

impl MatchCandidate<'_> {
    /// Id of the matched record.
    #[must_use]
    pub fn lead_id(&self) -> &LeadId {
        &self.lead.id
    }
}

/// Every record matching an item, in iteration order.
///
/// `chosen` is what [`find_match`] returns; `alternatives` are the other
/// records that would also have matched.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSet<'a> {
    /// The first matching record.
    pub chosen: MatchCandidate<'a>,
    /// Further matching records, in iteration order.
    pub alternatives: Vec<MatchCandidate<'a>>,
}

impl MatchSet<'_> {
    /// Returns true when more than one record matched.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        !self.alternatives.is_empty()
    }

    /// Detaches the set from the snapshot it borrows.
    #[must_use]
    pub fn to_report(&self) -> MatchReport {
        MatchReport {
            lead: self.chosen.lead.clone(),
            rule: self.chosen.rule,
            alternatives: self.alternatives.iter().map(|c| c.lead.id.clone()).collect(),
        }
    }
}

/// Owned result of a match pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    /// The matched record as read during the pass.
    pub lead: Lead,
    /// Which rule fired.
    pub rule: MatchRule,
    /// Ids of further records that also matched.
    pub alternatives: Vec<LeadId>,
}

/// Normalized matching keys of a duplicate item, computed once per pass.
#[derive(Debug, Default)]
struct ItemKeys {
    emails: HashSet<String>,
    name: Option<String>,
    domain: Option<String>,
}

impl ItemKeys {
    fn of(item: &DuplicateItem) -> Self {
        let profile = item.profile();
        Self {
            emails: profile.map(|p| p.email_keys()).unwrap_or_default(),
            name: item.record.agent_name.as_deref().and_then(normalize_name),
            domain: profile.and_then(|p| p.domain()),
        }
    }

    fn rule_for(&self, lead: &Lead) -> Option<MatchRule> {
        if !lead.is_agent() {
            return None;
        }

        let profile = lead.profile();

        if !self.emails.is_empty() {
            if let Some(profile) = profile {
                if profile.email_keys().iter().any(|e| self.emails.contains(e)) {
                    return Some(MatchRule::Email);
                }
            }
        }

        if let Some(name) = &self.name {
            let lead_name = lead.data.agent_name.as_deref().and_then(normalize_name);
            if lead_name.as_ref() == Some(name) {
                return Some(MatchRule::Name);
            }
        }

        if let Some(domain) = &self.domain {
            if profile.and_then(|p| p.domain()).as_ref() == Some(domain) {
                return Some(MatchRule::Domain);
            }
        }

        None
    }
}

fn hinted<'a>(hint: &LeadId, existing: &'a [Lead]) -> Option<MatchCandidate<'a>> {
    existing
        .iter()
        .find(|lead| lead.id == *hint)
        .map(|lead| MatchCandidate {
            lead,
            rule: MatchRule::Hint,
        })
}

/// Finds the existing record an item duplicates.
///
/// A hint short-circuits to the record with that id (or to no match when no
/// record has it). Otherwise the first agent-type record in iteration order
/// that shares an email, an agent name, or a website domain with the item is
/// returned.
///
/// # Examples
///
/// ```
/// use leadrecon::{
///     find_match, AgencyProfile, Contact, DuplicateItem, DuplicateReason, Lead, LeadData, MatchRule,
/// };
///
/// let existing = vec![Lead::new(
///     "lead-1",
///     LeadData::agent("Global Ed", AgencyProfile::new("Global Ed", Contact::new("A", "B"))),
/// )];
/// let item = DuplicateItem::new(
///     DuplicateReason::AgencyNameExists,
///     LeadData::agent("global ed ", AgencyProfile::new("x", Contact::new("C", "D"))),
/// );
///
/// let found = find_match(&item, &existing).unwrap();
/// assert_eq!(found.rule, MatchRule::Name);
/// ```
#[must_use]
pub fn find_match<'a>(item: &DuplicateItem, existing: &'a [Lead]) -> Option<MatchCandidate<'a>> {
    if let Some(hint) = &item.existing_lead_id {
        return hinted(hint, existing);
    }

    let keys = ItemKeys::of(item);
    existing
        .iter()
        .find_map(|lead| keys.rule_for(lead).map(|rule| MatchCandidate { lead, rule }))
}

/// Like [`find_match`], but also reports every other record that matches.
#[must_use]
pub fn find_candidates<'a>(item: &DuplicateItem, existing: &'a [Lead]) -> Option<MatchSet<'a>> {
    if let Some(hint) = &item.existing_lead_id {
        return hinted(hint, existing).map(|chosen| MatchSet {
            chosen,
            alternatives: Vec::new(),
        });
    }

    let keys = ItemKeys::of(item);
    let mut matches = existing
        .iter()
        .filter_map(|lead| keys.rule_for(lead).map(|rule| MatchCandidate { lead, rule }));

    let chosen = matches.next()?;
    Some(MatchSet {
        chosen,
        alternatives: matches.collect(),
    })
}
