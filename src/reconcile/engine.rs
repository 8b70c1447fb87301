use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::ReconConfig;
use crate::duplicate::DuplicateItem;
use crate::error::{ExecutionError, ReconError, ReconResult, ValidationError};
use crate::lead::{Contact, Lead, LeadId};
use crate::matcher::{find_candidates, MatchReport};
use crate::merge::{
    append_colleagues, creation_record, merge_primary, novel_colleagues, overwrite_patch, replace_primary,
    LeadPatch,
};
use crate::storage::{DuplicateQueue, LeadStore};

use super::action::{Confirmation, ReconcileAction, Resolution};

/// Applies operator actions to the record store and the duplicate queue.
///
/// Every action writes the record first and removes the queue item only
/// after that write succeeded. A failed write returns the error and leaves
/// the item queued for a retry. Removal is idempotent, so two sessions
/// resolving the same item both complete; the later record write wins.
pub struct Reconciler {
    leads: Arc<dyn LeadStore>,
    queue: Arc<dyn DuplicateQueue>,
    config: ReconConfig,
}

impl Reconciler {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(leads: Arc<dyn LeadStore>, queue: Arc<dyn DuplicateQueue>, config: ReconConfig) -> Self {
        Self { leads, queue, config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    /// Match an item against a fresh read of every record.
    pub fn find_match(&self, item: &DuplicateItem) -> ReconResult<Option<MatchReport>> {
        let records = self.leads.list()?;
        let Some(set) = find_candidates(item, &records) else {
            debug!(item_id = %item.id, "no existing record matches");
            return Ok(None);
        };

        let report = set.to_report();
        debug!(item_id = %item.id, lead_id = %report.lead.id, rule = %report.rule, "matched existing record");
        if self.config.surface_ambiguous_matches && !report.alternatives.is_empty() {
            warn!(
                item_id = %item.id,
                chosen = %report.lead.id,
                alternatives = report.alternatives.len(),
                "several existing records match; using the first"
            );
        }
        Ok(Some(report))
    }

    /// Execute `action` for `item`.
    ///
    /// # Errors
    /// - `ActionNotOffered`: the action is outside the item's partition
    /// - `ConfirmationRequired`: a destructive action was not confirmed
    /// - `NoMatch`: a match-dependent action found no existing record
    /// - `RecordVanished`: the matched record was deleted before the write
    /// - any storage error from the record write or the queue removal
    pub fn execute(
        &self,
        item: &DuplicateItem,
        action: ReconcileAction,
        confirmation: Confirmation,
    ) -> ReconResult<Resolution> {
        let partition = item.partition();
        if !action.is_offered_in(partition) {
            return Err(ValidationError::ActionNotOffered { action, partition }.into());
        }
        if action.requires_confirmation() && confirmation != Confirmation::Confirmed {
            return Err(ValidationError::ConfirmationRequired { action }.into());
        }

        match action {
            ReconcileAction::Discard => self.retire(item, action, None),
            ReconcileAction::CreateNew => self.create_new(item),
            ReconcileAction::Overwrite
            | ReconcileAction::ReplaceContact
            | ReconcileAction::MergeContact
            | ReconcileAction::AddColleague => self.update_matched(item, action),
        }
    }

    fn create_new(&self, item: &DuplicateItem) -> ReconResult<Resolution> {
        let data = creation_record(item, Utc::now());
        data.validate()?;
        let lead_id = self.leads.insert(data)?;
        self.retire(item, ReconcileAction::CreateNew, Some(lead_id))
    }

    fn update_matched(&self, item: &DuplicateItem, action: ReconcileAction) -> ReconResult<Resolution> {
        let matched = self
            .find_match(item)?
            .ok_or_else(|| ExecutionError::NoMatch { item_id: item.id.clone() })?;

        // Merge against the record as it is now, not as it was when matched.
        let target = self
            .leads
            .get(&matched.lead.id)?
            .ok_or_else(|| ExecutionError::RecordVanished { id: matched.lead.id.clone() })?;

        let now = Utc::now();
        let patch = match action {
            ReconcileAction::Overwrite => overwrite_patch(item, &self.config.overwrite_source, now),
            ReconcileAction::ReplaceContact => {
                let profile = target.profile().cloned().unwrap_or_default();
                LeadPatch::profile(replace_primary(&profile, first_contact(item)?), now)
            }
            ReconcileAction::MergeContact => {
                let profile = target.profile().cloned().unwrap_or_default();
                LeadPatch::profile(merge_primary(&profile, first_contact(item)?), now)
            }
            ReconcileAction::AddColleague => {
                let profile = target.profile().cloned().unwrap_or_default();
                let novel = novel_colleagues(&profile, item.imported_contacts());
                if novel.is_empty() {
                    return Ok(self.reject_known_colleagues(item, &target));
                }
                LeadPatch::profile(append_colleagues(&profile, novel), now)
            }
            ReconcileAction::Discard | ReconcileAction::CreateNew => {
                return Err(ReconError::internal(format!("{action} does not update a matched record")));
            }
        };

        let mut merged = target.data.clone();
        patch.apply_to(&mut merged);
        merged.validate()?;

        self.leads.update(&target.id, patch)?;
        self.retire(item, action, Some(target.id))
    }

    fn reject_known_colleagues(&self, item: &DuplicateItem, target: &Lead) -> Resolution {
        let agency = target
            .data
            .agent_name
            .clone()
            .unwrap_or_else(|| target.id.to_string());
        warn!(item_id = %item.id, lead_id = %target.id, "every imported contact is already on file");
        Resolution::Rejected {
            item_id: item.id.clone(),
            action: ReconcileAction::AddColleague,
            notice: format!("All imported contacts already exist on {agency}; nothing to add."),
        }
    }

    fn retire(
        &self,
        item: &DuplicateItem,
        action: ReconcileAction,
        lead_id: Option<LeadId>,
    ) -> ReconResult<Resolution> {
        self.queue.delete(&item.id)?;
        match &lead_id {
            Some(id) => info!(item_id = %item.id, lead_id = %id, action = %action, "duplicate resolved"),
            None => info!(item_id = %item.id, action = %action, "duplicate resolved"),
        }
        Ok(Resolution::Resolved {
            item_id: item.id.clone(),
            action,
            lead_id,
        })
    }
}

fn first_contact(item: &DuplicateItem) -> ReconResult<&Contact> {
    item.first_contact().ok_or_else(|| {
        ValidationError::MissingField {
            field: "agencyProfile.keyContacts".to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicate::DuplicateReason;
    use crate::lead::{AgencyProfile, LeadData};
    use crate::storage::{InMemoryDuplicateQueue, InMemoryLeadStore};

    struct Fixture {
        leads: Arc<InMemoryLeadStore>,
        queue: Arc<InMemoryDuplicateQueue>,
        engine: Reconciler,
    }

    fn fixture() -> Fixture {
        let leads = Arc::new(InMemoryLeadStore::new());
        let queue = Arc::new(InMemoryDuplicateQueue::new());
        let engine = Reconciler::new(leads.clone(), queue.clone(), ReconConfig::default());
        Fixture { leads, queue, engine }
    }

    fn agency(name: &str, emails: &[&str]) -> LeadData {
        let mut contacts = emails.iter().map(|e| Contact::default().with_email(*e));
        let mut profile = AgencyProfile::new(name, contacts.next().unwrap_or_default());
        profile.key_contacts.extend(contacts);
        LeadData::agent(name, profile)
    }

    #[test]
    fn colleague_actions_are_not_offered_for_conflicts() {
        let fx = fixture();
        let item = DuplicateItem::new(DuplicateReason::EmailExists, agency("Acme", &["a@x.com"]));
        fx.queue.enqueue(item.clone()).unwrap();

        let err = fx
            .engine
            .execute(&item, ReconcileAction::AddColleague, Confirmation::Confirmed)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(fx.queue.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn unconfirmed_overwrite_touches_nothing() {
        let fx = fixture();
        fx.leads.seed(Lead::new("lead-1", agency("Acme", &["a@x.com"]))).unwrap();
        let item = DuplicateItem::new(DuplicateReason::EmailExists, agency("Acme 2", &["a@x.com"]));
        fx.queue.enqueue(item.clone()).unwrap();

        let err = fx
            .engine
            .execute(&item, ReconcileAction::Overwrite, Confirmation::Unconfirmed)
            .unwrap_err();
        assert!(matches!(
            err,
            ReconError::Validation(ValidationError::ConfirmationRequired { .. })
        ));
        let lead = fx.leads.get(&LeadId::from("lead-1")).unwrap().unwrap();
        assert_eq!(lead.data.agent_name.as_deref(), Some("Acme"));
        assert_eq!(fx.queue.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn match_dependent_action_without_match_fails() {
        let fx = fixture();
        let item = DuplicateItem::new(DuplicateReason::PotentialColleague, agency("Nobody", &["n@x.com"]));
        fx.queue.enqueue(item.clone()).unwrap();

        let err = fx
            .engine
            .execute(&item, ReconcileAction::MergeContact, Confirmation::Unconfirmed)
            .unwrap_err();
        assert!(err.is_execution());
        assert_eq!(fx.queue.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn create_new_inserts_and_removes_item() {
        let fx = fixture();
        let item = DuplicateItem::new(DuplicateReason::AgencyNameExists, agency("Acme", &["a@x.com"]))
            .with_hint("lead-1");
        fx.queue.enqueue(item.clone()).unwrap();

        let resolution = fx
            .engine
            .execute(&item, ReconcileAction::CreateNew, Confirmation::Unconfirmed)
            .unwrap();
        let Resolution::Resolved { lead_id: Some(id), .. } = resolution else {
            panic!("expected resolved with new id");
        };

        let created = fx.leads.get(&id).unwrap().unwrap();
        assert!(created.data.created_at.is_some());
        assert!(fx.queue.snapshot().unwrap().is_empty());
    }

    #[test]
    fn add_colleague_with_nothing_new_is_rejected() {
        let fx = fixture();
        fx.leads.seed(Lead::new("lead-1", agency("Acme", &["a@x.com"]))).unwrap();
        let item = DuplicateItem::new(DuplicateReason::PotentialColleague, agency("Acme", &["A@x.com"]));
        fx.queue.enqueue(item.clone()).unwrap();

        let resolution = fx
            .engine
            .execute(&item, ReconcileAction::AddColleague, Confirmation::Unconfirmed)
            .unwrap();
        assert!(!resolution.is_resolved());
        assert_eq!(fx.queue.snapshot().unwrap().len(), 1);
        let lead = fx.leads.get(&LeadId::from("lead-1")).unwrap().unwrap();
        assert_eq!(lead.profile().unwrap().key_contacts.len(), 1);
    }

    #[test]
    fn find_match_reports_alternatives() {
        let fx = fixture();
        fx.leads.seed(Lead::new("lead-1", agency("Acme", &["a@x.com"]))).unwrap();
        fx.leads.seed(Lead::new("lead-2", agency("Acme", &["b@x.com"]))).unwrap();
        let item = DuplicateItem::new(DuplicateReason::AgencyNameExists, agency("acme", &["c@x.com"]));

        let report = fx.engine.find_match(&item).unwrap().unwrap();
        assert_eq!(report.lead.id.as_str(), "lead-1");
        assert_eq!(report.alternatives, vec![LeadId::from("lead-2")]);
    }
}
