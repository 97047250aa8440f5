//! The three-step wizard state machine.
//!
//! `WizardState` owns the selections, the composite result, and the list of
//! custom garments. All mutation goes through the transition methods, which
//! either apply completely or return a [`TransitionError`] and leave the state
//! untouched.
//!
//! Composite generation is tracked with [`GenerationTicket`]s. Entering
//! `GenerateResult` without a result hands out exactly one ticket; any
//! selection change, backward navigation out of the result step, or restart
//! makes outstanding tickets stale, and results recorded against a stale
//! ticket are dropped.

use serde::Serialize;

use crate::error::TransitionError;
use crate::types::{GenerationStatus, HistoryEntry, ImageReference, Step};

/// Identifies one composite request and the selections it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    epoch: u64,
    pub person: ImageReference,
    pub garment: ImageReference,
}

impl GenerationTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    step: Step,
    selected_person: Option<ImageReference>,
    selected_garment: Option<ImageReference>,
    result: Option<ImageReference>,
    custom_garments: Vec<ImageReference>,
    status: GenerationStatus,
    #[serde(skip)]
    epoch: u64,
    #[serde(skip)]
    pending: Option<u64>,
    #[serde(skip)]
    started: Option<u64>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self {
            step: Step::SelectPerson,
            selected_person: None,
            selected_garment: None,
            result: None,
            custom_garments: Vec::new(),
            status: GenerationStatus::Idle,
            epoch: 0,
            pending: None,
            started: None,
        }
    }

    // ── Read view ───────────────────────────────────────────────────

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn selected_person(&self) -> Option<&ImageReference> {
        self.selected_person.as_ref()
    }

    pub fn selected_garment(&self) -> Option<&ImageReference> {
        self.selected_garment.as_ref()
    }

    pub fn result(&self) -> Option<&ImageReference> {
        self.result.as_ref()
    }

    /// Uploaded and generated garments, newest first.
    pub fn custom_garments(&self) -> &[ImageReference] {
        &self.custom_garments
    }

    pub fn status(&self) -> &GenerationStatus {
        &self.status
    }

    /// True while a composite request is outstanding for the current pair.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether `ticket` still matches the current selections and request.
    pub fn is_current(&self, ticket: &GenerationTicket) -> bool {
        self.pending == Some(ticket.epoch) && ticket.epoch == self.epoch
    }

    /// Claim `ticket` for execution. Returns true exactly once per current
    /// ticket, so copies of a ticket cannot put a second request in flight.
    pub fn begin(&mut self, ticket: &GenerationTicket) -> bool {
        if !self.is_current(ticket) || self.started == Some(ticket.epoch) {
            return false;
        }
        self.started = Some(ticket.epoch);
        true
    }

    // ── Step 1 ──────────────────────────────────────────────────────

    pub fn choose_person(&mut self, person: ImageReference) -> Result<(), TransitionError> {
        self.require_step(Step::SelectPerson, "choose_person")?;
        if self.selected_person.as_ref() != Some(&person) {
            self.invalidate_result();
        }
        self.selected_person = Some(person);
        Ok(())
    }

    pub fn advance_to_garment(&mut self) -> Result<(), TransitionError> {
        self.require_step(Step::SelectPerson, "advance_to_garment")?;
        if self.selected_person.is_none() {
            return Err(TransitionError::PersonNotSelected);
        }
        self.step = Step::SelectGarment;
        Ok(())
    }

    // ── Step 2 ──────────────────────────────────────────────────────

    pub fn choose_garment(&mut self, garment: ImageReference) -> Result<(), TransitionError> {
        self.require_step(Step::SelectGarment, "choose_garment")?;
        if self.selected_garment.as_ref() != Some(&garment) {
            self.invalidate_result();
        }
        self.selected_garment = Some(garment);
        Ok(())
    }

    /// Prepend an uploaded or generated garment and select it.
    pub fn add_custom_garment(&mut self, garment: ImageReference) -> Result<(), TransitionError> {
        self.require_step(Step::SelectGarment, "add_custom_garment")?;
        self.custom_garments.insert(0, garment.clone());
        self.choose_garment(garment)
    }

    /// Prepend a garment without touching the selection. Used when a garment
    /// generation finishes after the user has left the garment step.
    pub fn remember_custom_garment(&mut self, garment: ImageReference) {
        self.custom_garments.insert(0, garment);
    }

    pub fn back_to_person(&mut self) -> Result<(), TransitionError> {
        self.require_step(Step::SelectGarment, "back_to_person")?;
        self.step = Step::SelectPerson;
        Ok(())
    }

    /// Move to the result step.
    ///
    /// Returns a ticket when a composite must be generated: the step was
    /// entered from `SelectGarment`, there is no result yet, and nothing is
    /// pending. Calling it again while already on the result step is a no-op
    /// that returns `None`.
    pub fn advance_to_result(&mut self) -> Result<Option<GenerationTicket>, TransitionError> {
        if self.step == Step::GenerateResult {
            return Ok(None);
        }
        self.require_step(Step::SelectGarment, "advance_to_result")?;
        if self.selected_person.is_none() {
            return Err(TransitionError::PersonNotSelected);
        }
        if self.selected_garment.is_none() {
            return Err(TransitionError::GarmentNotSelected);
        }

        self.step = Step::GenerateResult;
        if self.result.is_some() || self.pending.is_some() {
            return Ok(None);
        }
        Ok(self.issue_ticket())
    }

    // ── Step 3 ──────────────────────────────────────────────────────

    /// Leave the result step. A pending request is abandoned: its ticket
    /// becomes stale and whatever it returns is discarded.
    pub fn back_to_garment(&mut self) -> Result<(), TransitionError> {
        self.require_step(Step::GenerateResult, "back_to_garment")?;
        if self.pending.is_some() || self.status.is_failed() {
            self.abandon_pending();
        }
        self.step = Step::SelectGarment;
        Ok(())
    }

    /// Apply a finished composite.
    ///
    /// Returns the history entry to append, or `None` when the ticket is stale
    /// and the result was dropped.
    pub fn record_result(
        &mut self,
        ticket: &GenerationTicket,
        result: ImageReference,
    ) -> Result<Option<HistoryEntry>, TransitionError> {
        if !self.is_current(ticket) {
            return Ok(None);
        }
        self.require_step(Step::GenerateResult, "record_result")?;

        let entry = HistoryEntry::new(
            ticket.person.source.clone(),
            ticket.garment.source.clone(),
            result.source.clone(),
        );
        self.result = Some(result);
        self.pending = None;
        self.status = GenerationStatus::Ready;
        Ok(Some(entry))
    }

    /// Mark the current request as failed. Returns false for stale tickets.
    pub fn record_failure(&mut self, ticket: &GenerationTicket, message: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.pending = None;
        self.status = GenerationStatus::Failed {
            message: message.into(),
        };
        true
    }

    /// Issue a new ticket for the same inputs after a failure.
    pub fn retry(&mut self) -> Result<Option<GenerationTicket>, TransitionError> {
        self.require_step(Step::GenerateResult, "retry")?;
        if !self.status.is_failed() {
            return Ok(None);
        }
        Ok(self.issue_ticket())
    }

    // ── Any step ────────────────────────────────────────────────────

    /// Back to the first step with nothing selected. Custom garments stay.
    pub fn restart(&mut self) {
        self.step = Step::SelectPerson;
        self.selected_person = None;
        self.selected_garment = None;
        self.result = None;
        self.abandon_pending();
    }

    // ── Internals ───────────────────────────────────────────────────

    fn require_step(&self, expected: Step, action: &'static str) -> Result<(), TransitionError> {
        if self.step != expected {
            return Err(TransitionError::WrongStep {
                action,
                current: self.step,
            });
        }
        Ok(())
    }

    fn issue_ticket(&mut self) -> Option<GenerationTicket> {
        let person = self.selected_person.clone()?;
        let garment = self.selected_garment.clone()?;
        self.epoch += 1;
        self.pending = Some(self.epoch);
        self.status = GenerationStatus::Pending;
        Some(GenerationTicket {
            epoch: self.epoch,
            person,
            garment,
        })
    }

    fn abandon_pending(&mut self) {
        self.epoch += 1;
        self.pending = None;
        self.status = GenerationStatus::Idle;
    }

    fn invalidate_result(&mut self) {
        self.result = None;
        self.abandon_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn person(id: &str) -> ImageReference {
        ImageReference::preset(id, format!("https://example.com/{}.png", id))
    }

    fn garment(id: &str) -> ImageReference {
        ImageReference::preset(id, format!("https://example.com/{}.png", id))
    }

    fn composite(id: &str) -> ImageReference {
        ImageReference::generated(id, "data:image/png;base64,AAAA")
    }

    fn at_result_step() -> (WizardState, GenerationTicket) {
        let mut state = WizardState::new();
        state.choose_person(person("p1")).unwrap();
        state.advance_to_garment().unwrap();
        state.choose_garment(garment("g1")).unwrap();
        let ticket = state.advance_to_result().unwrap().unwrap();
        (state, ticket)
    }

    #[test]
    fn test_initial_state() {
        let state = WizardState::new();
        assert_eq!(state.step(), Step::SelectPerson);
        assert!(state.selected_person().is_none());
        assert!(state.selected_garment().is_none());
        assert!(state.result().is_none());
        assert_eq!(state.status(), &GenerationStatus::Idle);
    }

    #[test]
    fn test_choose_person_does_not_advance() {
        let mut state = WizardState::new();
        state.choose_person(person("p1")).unwrap();
        assert_eq!(state.step(), Step::SelectPerson);
    }

    #[test]
    fn test_advance_requires_person() {
        let mut state = WizardState::new();
        assert_eq!(
            state.advance_to_garment(),
            Err(TransitionError::PersonNotSelected)
        );
    }

    #[test]
    fn test_advance_to_result_requires_garment() {
        let mut state = WizardState::new();
        state.choose_person(person("p1")).unwrap();
        state.advance_to_garment().unwrap();
        assert_eq!(
            state.advance_to_result(),
            Err(TransitionError::GarmentNotSelected)
        );
        assert_eq!(state.step(), Step::SelectGarment);
    }

    #[test]
    fn test_wrong_step_is_rejected() {
        let mut state = WizardState::new();
        let err = state.choose_garment(garment("g1")).unwrap_err();
        assert!(matches!(err, TransitionError::WrongStep { .. }));
        assert!(state.selected_garment().is_none());
    }

    #[test]
    fn test_advance_to_result_issues_one_ticket() {
        let (mut state, ticket) = at_result_step();
        assert!(state.is_pending());
        assert!(state.status().is_pending());
        assert_eq!(ticket.person.id, "p1");
        assert_eq!(ticket.garment.id, "g1");

        assert_eq!(state.advance_to_result(), Ok(None));
        assert!(state.is_current(&ticket));
    }

    #[test]
    fn test_ticket_can_only_be_started_once() {
        let (mut state, ticket) = at_result_step();
        let copy = ticket.clone();
        assert!(state.begin(&ticket));
        assert!(!state.begin(&copy));
        assert!(state.is_pending());
    }

    #[test]
    fn test_stale_ticket_cannot_start() {
        let (mut state, ticket) = at_result_step();
        state.back_to_garment().unwrap();
        assert!(!state.begin(&ticket));

        let fresh = state.advance_to_result().unwrap().unwrap();
        assert!(state.begin(&fresh));
    }

    #[test]
    fn test_record_result_returns_history_snapshot() {
        let (mut state, ticket) = at_result_step();
        let entry = state
            .record_result(&ticket, composite("r1"))
            .unwrap()
            .unwrap();

        assert_eq!(entry.person_ref, "https://example.com/p1.png");
        assert_eq!(entry.garment_ref, "https://example.com/g1.png");
        assert_eq!(entry.result_ref, "data:image/png;base64,AAAA");
        assert_eq!(state.result().unwrap().id, "r1");
        assert_eq!(state.status(), &GenerationStatus::Ready);
        assert!(!state.is_pending());
    }

    #[test]
    fn test_back_navigation_discards_pending_result() {
        let (mut state, ticket) = at_result_step();
        state.back_to_garment().unwrap();
        assert!(!state.is_pending());
        assert_eq!(state.status(), &GenerationStatus::Idle);

        assert_eq!(state.record_result(&ticket, composite("late")), Ok(None));
        assert!(state.result().is_none());
    }

    #[test]
    fn test_reentering_result_step_with_result_does_not_regenerate() {
        let (mut state, ticket) = at_result_step();
        state.record_result(&ticket, composite("r1")).unwrap();
        state.back_to_garment().unwrap();
        assert!(state.result().is_some());

        assert_eq!(state.advance_to_result(), Ok(None));
        assert_eq!(state.result().unwrap().id, "r1");
    }

    #[test]
    fn test_changing_garment_clears_result() {
        let (mut state, ticket) = at_result_step();
        state.record_result(&ticket, composite("r1")).unwrap();
        state.back_to_garment().unwrap();

        state.choose_garment(garment("g1")).unwrap();
        assert!(state.result().is_some());

        state.choose_garment(garment("g2")).unwrap();
        assert!(state.result().is_none());

        let ticket = state.advance_to_result().unwrap();
        assert!(ticket.is_some());
        assert_eq!(ticket.unwrap().garment.id, "g2");
    }

    #[test]
    fn test_changing_person_clears_result() {
        let (mut state, ticket) = at_result_step();
        state.record_result(&ticket, composite("r1")).unwrap();
        state.back_to_garment().unwrap();
        state.back_to_person().unwrap();

        state.choose_person(person("p2")).unwrap();
        assert!(state.result().is_none());
    }

    #[test]
    fn test_failure_and_retry() {
        let (mut state, ticket) = at_result_step();
        assert!(state.record_failure(&ticket, "HTTP 500"));
        assert!(state.status().is_failed());
        assert!(state.result().is_none());

        let retry = state.retry().unwrap().unwrap();
        assert_ne!(retry.epoch(), ticket.epoch());
        assert_eq!(retry.person, ticket.person);
        assert!(!state.is_current(&ticket));
        assert!(state.is_current(&retry));
    }

    #[test]
    fn test_retry_without_failure_is_noop() {
        let (mut state, _ticket) = at_result_step();
        assert_eq!(state.retry(), Ok(None));
    }

    #[test]
    fn test_stale_failure_is_ignored() {
        let (mut state, ticket) = at_result_step();
        state.restart();
        assert!(!state.record_failure(&ticket, "late error"));
        assert_eq!(state.status(), &GenerationStatus::Idle);
    }

    #[test]
    fn test_add_custom_garment_prepends_and_selects() {
        let mut state = WizardState::new();
        state.choose_person(person("p1")).unwrap();
        state.advance_to_garment().unwrap();

        state.add_custom_garment(garment("c1")).unwrap();
        state.add_custom_garment(garment("c2")).unwrap();

        let ids: Vec<_> = state.custom_garments().iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
        assert_eq!(state.selected_garment().unwrap().id, "c2");
    }

    #[test]
    fn test_restart_keeps_custom_garments() {
        let mut state = WizardState::new();
        state.choose_person(person("p1")).unwrap();
        state.advance_to_garment().unwrap();
        state.add_custom_garment(garment("c1")).unwrap();
        state.advance_to_result().unwrap();

        state.restart();
        assert_eq!(state.step(), Step::SelectPerson);
        assert!(state.selected_person().is_none());
        assert!(state.selected_garment().is_none());
        assert!(state.result().is_none());
        assert_eq!(state.custom_garments().len(), 1);
    }

    #[test]
    fn test_random_walks_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(0x7e57);
        let mut tickets: Vec<GenerationTicket> = Vec::new();

        for _ in 0..200 {
            let mut state = WizardState::new();
            for _ in 0..60 {
                let _ = match rng.random_range(0..11) {
                    0 => state.choose_person(person(&format!("p{}", rng.random_range(0..3)))),
                    1 => state.advance_to_garment(),
                    2 => state.choose_garment(garment(&format!("g{}", rng.random_range(0..3)))),
                    3 => state.add_custom_garment(garment(&format!("c{}", rng.random_range(0..3)))),
                    4 => state.advance_to_result().map(|t| tickets.extend(t)),
                    5 => state.back_to_garment(),
                    6 => state.back_to_person(),
                    7 => {
                        state.restart();
                        Ok(())
                    }
                    8 => match tickets.pop() {
                        Some(t) => state.record_result(&t, composite("r")).map(|_| ()),
                        None => Ok(()),
                    },
                    9 => {
                        if let Some(t) = tickets.pop() {
                            state.record_failure(&t, "boom");
                        }
                        Ok(())
                    }
                    _ => state.retry().map(|t| tickets.extend(t)),
                };

                if state.step() == Step::GenerateResult {
                    assert!(state.selected_person().is_some());
                    assert!(state.selected_garment().is_some());
                }
                if state.is_pending() {
                    assert_eq!(state.step(), Step::GenerateResult);
                    assert!(state.result().is_none());
                }
                if state.result().is_some() {
                    assert!(state.selected_person().is_some());
                    assert!(state.selected_garment().is_some());
                }
            }
            tickets.clear();
        }
    }
}
