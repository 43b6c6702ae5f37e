//! Withdrawal reconciliation: per-item classification, per-item outcomes
//! and the duplicate-submission guard
use crate::error::WorkflowError;
use crate::product::Product;
use crate::request::{ItemKind, RequestItem};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// What the reconciler intends to do with one request item, judged against
/// the live product record at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemPlan {
    Deliver,
    Insufficient { available: u32 },
    Unregistered,
}

/// Classify one item. Ad hoc lines and catalogued lines whose product no
/// longer resolves never affect stock; a resolvable line is deliverable only
/// when the live quantity covers it.
pub fn classify(item: &RequestItem, live: Option<&Product>) -> ItemPlan {
    match (&item.kind, live) {
        (ItemKind::AdHoc, _) => ItemPlan::Unregistered,
        (ItemKind::Catalogued { .. }, None) => ItemPlan::Unregistered,
        (ItemKind::Catalogued { .. }, Some(product)) => {
            if product.quantity >= item.quantity {
                ItemPlan::Deliver
            } else {
                ItemPlan::Insufficient {
                    available: product.quantity,
                }
            }
        }
    }
}

/// A withdrawal may be confirmed when at least one item is deliverable, or
/// when the request consists entirely of unregistered items (received
/// without any stock effect).
pub fn confirmable(plans: &[ItemPlan]) -> bool {
    plans.iter().any(|plan| *plan == ItemPlan::Deliver)
        || plans.iter().all(|plan| *plan == ItemPlan::Unregistered)
}

/// Final, per-item result of a reconciliation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemDisposition {
    Deducted { movement_id: String },
    InsufficientStock { available: u32 },
    Unregistered,
    DeductionFailed { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub name: String,
    pub product_id: Option<String>,
    pub requested: u32,
    pub disposition: ItemDisposition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalOutcome {
    pub request_id: String,
    pub items: Vec<ItemOutcome>,
}

impl WithdrawalOutcome {
    pub fn deducted_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.disposition, ItemDisposition::Deducted { .. }))
            .count()
    }
}

pub const SUBMISSION_COOLDOWN: Duration = Duration::from_secs(3);

/// Suppresses duplicate withdrawal submissions: at most one reconciliation
/// in flight per request, and a cooldown window after every attempt. The
/// source of truth for "already completed" remains the conditional status
/// write; this guard only absorbs rapid resubmission.
pub struct WithdrawalGuard {
    state: Mutex<GuardState>,
    cooldown: Duration,
}

#[derive(Default)]
struct GuardState {
    in_flight: HashSet<String>,
    last_attempt: HashMap<String, Instant>,
}

impl WithdrawalGuard {
    pub fn new() -> Self {
        Self::with_cooldown(SUBMISSION_COOLDOWN)
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(GuardState::default()),
            cooldown,
        }
    }

    /// Claim the request's slot. Fails while another reconciliation holds it
    /// or while the cooldown from the previous attempt is still running.
    pub fn begin(&self, request_id: &str) -> Result<WithdrawalSlot<'_>, WorkflowError> {
        let mut state = self.state.lock().expect("withdrawal guard lock poisoned");

        if state.in_flight.contains(request_id) {
            return Err(WorkflowError::WithdrawalInFlight);
        }
        if let Some(last) = state.last_attempt.get(request_id) {
            if last.elapsed() < self.cooldown {
                return Err(WorkflowError::CooldownActive);
            }
        }

        state.in_flight.insert(request_id.to_string());
        Ok(WithdrawalSlot {
            guard: self,
            request_id: request_id.to_string(),
        })
    }
}

impl Default for WithdrawalGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the in-flight slot and starts the cooldown when dropped
pub struct WithdrawalSlot<'a> {
    guard: &'a WithdrawalGuard,
    request_id: String,
}

impl Drop for WithdrawalSlot<'_> {
    fn drop(&mut self) {
        let mut state = self
            .guard
            .state
            .lock()
            .expect("withdrawal guard lock poisoned");
        state.in_flight.remove(&self.request_id);
        state
            .last_attempt
            .insert(self.request_id.clone(), Instant::now());
    }
}
