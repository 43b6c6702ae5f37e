//! Property-based tests for the request lifecycle state machine
//!
//! This module uses proptest to verify that the transition logic in Request
//! behaves correctly across a wide variety of state/target combinations and
//! operation sequences. The lifecycle logic is critical - bugs here corrupt
//! the entire requisition workflow.
//!
//! These tests focus on invariants that should hold regardless of the
//! specific sequence of operations, helping catch edge cases in the state
//! machine that would be difficult to find with manual test case selection.

use proptest::prelude::*;
use stock_requisition::{
    error::WorkflowError,
    request::{Priority, Request, RequestDraft, RequestKind, RequestStatus},
};

// These property tests cover:
//
// 1. Graph purity - only the three allowed edges ever succeed
// 2. Terminal state stability - rejected and completed never move again
// 3. Receipt coupling - signature/receiver are set exactly when completed
// 4. Draft validation - zero quantities always poison a draft
// 5. Serialization correctness - critical for persistence
//
// What these tests DON'T cover (deliberately):
//
// - Database persistence (requires tempfile, better in integration tests)
// - Permission checks (handled by service layer, not the state machine)
//

fn status_strategy() -> impl Strategy<Value = RequestStatus> {
    prop_oneof![
        Just(RequestStatus::Pending),
        Just(RequestStatus::Approved),
        Just(RequestStatus::Rejected),
        Just(RequestStatus::Completed),
    ]
}

fn kind_strategy() -> impl Strategy<Value = RequestKind> {
    prop_oneof![Just(RequestKind::Purchase), Just(RequestKind::Material)]
}

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Standard),
        Just(Priority::Priority),
        Just(Priority::Urgent),
    ]
}

/// Strategy to generate a complete, valid draft with 1 to 6 ad hoc items
fn draft_strategy() -> impl Strategy<Value = RequestDraft> {
    (
        "[a-z]{3,10}",
        "[a-z]{3,10}",
        kind_strategy(),
        priority_strategy(),
        prop::collection::vec(("[a-z]{3,16}", 1u32..500), 1..=6),
    )
        .prop_map(|(requested_by, department, kind, priority, items)| {
            let mut draft = RequestDraft::new(kind)
                .set_requested_by(&requested_by)
                .set_department(&department)
                .set_priority(priority);
            for (name, quantity) in items {
                draft = draft.add_adhoc_item(&name, quantity, "");
            }
            draft
        })
}

/// Build a request already sitting in the given state, the way the service
/// layer would have put it there
fn request_in(status: RequestStatus) -> Request {
    let mut request = RequestDraft::new(RequestKind::Material)
        .set_requested_by("maria")
        .set_department("maintenance")
        .add_adhoc_item("rags", 1, "")
        .validate_and_finalise()
        .unwrap();

    match status {
        RequestStatus::Pending => {}
        RequestStatus::Approved => {
            request
                .transition(RequestStatus::Approved, "carlos")
                .unwrap();
        }
        RequestStatus::Rejected => {
            request
                .transition(RequestStatus::Rejected, "carlos")
                .unwrap();
        }
        RequestStatus::Completed => {
            request
                .transition(RequestStatus::Approved, "carlos")
                .unwrap();
            request.receiver_signature = Some("sig".to_string());
            request.received_by = Some("maria".to_string());
            request
                .transition(RequestStatus::Completed, "carlos")
                .unwrap();
        }
    }

    request
}

/// One operation the outside world can attempt on a request
#[derive(Debug, Clone)]
enum Op {
    Approve,
    Reject,
    Complete { with_receipt: bool },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Approve),
        Just(Op::Reject),
        any::<bool>().prop_map(|with_receipt| Op::Complete { with_receipt }),
    ]
}

// PROPERTY TESTS
proptest! {
    /// Property: only the three edges of the lifecycle graph ever succeed,
    /// and a failed transition leaves the request byte-for-byte untouched
    #[test]
    fn prop_only_graph_edges_succeed(from in status_strategy(), to in status_strategy()) {
        let mut request = request_in(from);
        // mimic the reconciler supplying the receipt before completing
        if from == RequestStatus::Approved && to == RequestStatus::Completed {
            request.receiver_signature = Some("sig".to_string());
            request.received_by = Some("maria".to_string());
        }

        let before = request.clone();
        let result = request.transition(to, "carlos");

        if from.can_transition(to) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(request.status, to);
        } else {
            prop_assert!(result.is_err());
            prop_assert_eq!(&request, &before, "failed transition must not mutate");
        }
    }

    /// Property: a completed request answers AlreadyCompleted to every
    /// further transition attempt, and stays completed
    #[test]
    fn prop_completed_is_stable(to in status_strategy()) {
        let mut request = request_in(RequestStatus::Completed);

        let err = request.transition(to, "carlos").unwrap_err();

        prop_assert_eq!(
            err.downcast_ref::<WorkflowError>(),
            Some(&WorkflowError::AlreadyCompleted)
        );
        prop_assert_eq!(request.status, RequestStatus::Completed);
    }

    /// Property: a rejected request refuses every transition
    #[test]
    fn prop_rejected_is_terminal(to in status_strategy()) {
        let mut request = request_in(RequestStatus::Rejected);

        prop_assert!(request.transition(to, "carlos").is_err());
        prop_assert_eq!(request.status, RequestStatus::Rejected);
    }

    /// Property: valid drafts finalise pending and round-trip through CBOR
    #[test]
    fn prop_draft_finalises_and_roundtrips(draft in draft_strategy()) {
        let request = draft.validate_and_finalise().unwrap();

        prop_assert_eq!(request.status, RequestStatus::Pending);
        prop_assert!(request.id.starts_with("req_1"));

        let encoded = minicbor::to_vec(&request).unwrap();
        let decoded: Request = minicbor::decode(&encoded).unwrap();
        prop_assert_eq!(&request, &decoded);
    }

    /// Property: one zero-quantity line poisons an otherwise valid draft
    #[test]
    fn prop_zero_quantity_poisons_draft(draft in draft_strategy(), name in "[a-z]{3,8}") {
        let draft = draft.add_adhoc_item(&name, 0, "");
        prop_assert!(draft.validate_and_finalise().is_err());
    }
}

// ADDITIONAL PROPTEST EXAMPLES WITH EXPLICIT CONFIGURATION

/// Property test with custom configuration for more extensive testing
///
/// Configure proptest for deeper exploration:
/// - More test cases (1000 instead of default 256)
/// - Useful for critical invariants that need higher confidence
#[cfg(test)]
mod extensive_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Property: the receipt fields and the completed status travel
        /// together - one is never persisted without the other, no matter
        /// which operations are attempted in which order
        ///
        /// Failed attempts are discarded the way the service layer discards
        /// an unsaved record, so only successful transitions stick.
        #[test]
        fn prop_receipt_iff_completed(ops in prop::collection::vec(op_strategy(), 0..12)) {
            let mut request = request_in(RequestStatus::Pending);

            for op in ops {
                let mut candidate = request.clone();
                let result = match op {
                    Op::Approve => candidate.transition(RequestStatus::Approved, "carlos"),
                    Op::Reject => candidate.transition(RequestStatus::Rejected, "carlos"),
                    Op::Complete { with_receipt } => {
                        if with_receipt {
                            candidate.receiver_signature = Some("sig".to_string());
                            candidate.received_by = Some("maria".to_string());
                        }
                        candidate.transition(RequestStatus::Completed, "carlos")
                    }
                };
                if result.is_ok() {
                    request = candidate;
                }

                let completed = request.status == RequestStatus::Completed;
                let has_receipt =
                    request.receiver_signature.is_some() && request.received_by.is_some();
                prop_assert_eq!(completed, has_receipt);
            }
        }
    }
}
