//! Property-based tests for quotation bidding and winner selection
//!
//! This module uses proptest to verify the single-winner invariant across a
//! wide variety of supplier counts and bid patterns. Winner selection is a
//! multi-slot update - bugs here leave quotations with zero or two winners,
//! which corrupts the procurement trail.

use proptest::prelude::*;
use stock_requisition::{
    error::WorkflowError,
    quotation::{BidStatus, Quotation, QuotationStatus},
};

// These property tests cover:
//
// 1. Single-winner invariant - never more than one selected slot
// 2. Completeness of rejection - deciding rejects every non-winner
// 3. Failure atomicity - a failed decision changes nothing
// 4. Terminal stability - a decided quotation refuses further decisions
// 5. Price arithmetic - totals always track the requested quantity
// 6. Lowest-bid lookup - agrees with a naive minimum over submitted slots
//

const REQUESTED_QUANTITY: u32 = 7;

/// Strategy: a quotation with 1-8 suppliers where each has optionally
/// submitted a bid between 1 and 9999
fn quotation_strategy() -> impl Strategy<Value = Quotation> {
    (1usize..=8).prop_flat_map(|count| {
        prop::collection::vec(proptest::option::of(1u64..10_000), count).prop_map(move |bids| {
            let suppliers: Vec<String> = (0..count).map(|i| format!("sup_{}", i)).collect();
            let mut quotation = Quotation::open(
                "req_prop",
                None,
                "widget",
                REQUESTED_QUANTITY,
                &suppliers,
            )
            .unwrap();

            let slot_ids: Vec<String> = quotation.items.iter().map(|item| item.id.clone()).collect();
            for (slot_id, bid) in slot_ids.iter().zip(&bids) {
                if let Some(price) = bid {
                    quotation.record_bid(slot_id, *price, None, None).unwrap();
                }
            }
            quotation
        })
    })
}

fn selected_count(quotation: &Quotation) -> usize {
    quotation
        .items
        .iter()
        .filter(|item| item.status == BidStatus::Selected)
        .count()
}

// PROPERTY TESTS
proptest! {
    /// Property: whatever slot a decision targets, the quotation never ends
    /// up with more than one selected slot; a successful decision leaves
    /// exactly one winner, everything else rejected, parent completed
    #[test]
    fn prop_at_most_one_selected(quotation in quotation_strategy(), pick in any::<prop::sample::Index>()) {
        let mut quotation = quotation;
        let target = pick.get(&quotation.items).id.clone();
        let target_status = pick.get(&quotation.items).status;

        let result = quotation.decide(&target);

        prop_assert!(selected_count(&quotation) <= 1);

        if result.is_ok() {
            prop_assert_eq!(target_status, BidStatus::Submitted);
            prop_assert_eq!(selected_count(&quotation), 1);
            prop_assert!(
                quotation
                    .items
                    .iter()
                    .filter(|item| item.id != target)
                    .all(|item| item.status == BidStatus::Rejected)
            );
            prop_assert_eq!(quotation.status, QuotationStatus::Completed);
            prop_assert!(quotation.selected_supplier_id.is_some());
            prop_assert!(quotation.selected_price.is_some());
        }
    }

    /// Property: deciding on a slot that never bid fails with
    /// ItemNotSubmitted and leaves the quotation untouched
    #[test]
    fn prop_failed_decision_changes_nothing(quotation in quotation_strategy(), pick in any::<prop::sample::Index>()) {
        let mut quotation = quotation;
        let target = pick.get(&quotation.items).id.clone();
        prop_assume!(pick.get(&quotation.items).status == BidStatus::Pending);

        let before = quotation.clone();
        let result = quotation.decide(&target);

        prop_assert_eq!(result, Err(WorkflowError::ItemNotSubmitted));
        prop_assert_eq!(&quotation, &before);
    }

    /// Property: once decided, a quotation refuses every further decision
    /// and no slot ever changes again
    #[test]
    fn prop_decided_quotation_is_stable(quotation in quotation_strategy(), pick in any::<prop::sample::Index>()) {
        let mut quotation = quotation;
        let submitted: Vec<String> = quotation
            .items
            .iter()
            .filter(|item| item.status == BidStatus::Submitted)
            .map(|item| item.id.clone())
            .collect();
        prop_assume!(!submitted.is_empty());

        quotation.decide(&submitted[0]).unwrap();
        let settled = quotation.clone();

        let second_target = pick.get(&settled.items).id.clone();
        let result = quotation.decide(&second_target);

        prop_assert_eq!(result, Err(WorkflowError::QuotationAlreadyDecided));
        prop_assert_eq!(&quotation, &settled);
    }

    /// Property: every submitted slot's total is its unit price times the
    /// requested quantity; slots that never bid carry no prices at all
    #[test]
    fn prop_totals_track_requested_quantity(quotation in quotation_strategy()) {
        for item in &quotation.items {
            match item.status {
                BidStatus::Submitted => {
                    let unit = item.unit_price.unwrap();
                    prop_assert_eq!(item.total_price, Some(unit * REQUESTED_QUANTITY as u64));
                }
                _ => {
                    prop_assert!(item.unit_price.is_none());
                    prop_assert!(item.total_price.is_none());
                }
            }
        }
    }

    /// Property: lowest_bid agrees with a naive minimum over submitted
    /// slots, and is None exactly when nothing was submitted
    #[test]
    fn prop_lowest_bid_matches_naive_minimum(quotation in quotation_strategy()) {
        let naive_min = quotation
            .items
            .iter()
            .filter(|item| item.status == BidStatus::Submitted)
            .filter_map(|item| item.unit_price)
            .min();

        match quotation.lowest_bid() {
            Some(lowest) => prop_assert_eq!(lowest.unit_price, naive_min),
            None => prop_assert!(naive_min.is_none()),
        }
    }
}

// ADDITIONAL PROPTEST EXAMPLES WITH EXPLICIT CONFIGURATION

/// Property test with custom configuration for more extensive testing
#[cfg(test)]
mod extensive_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Property: CBOR encoding is deterministic and round-trips, in any
        /// bid state. Critical for the conditional writes guarding winner
        /// selection - they compare raw encoded bytes.
        #[test]
        fn prop_encoding_is_deterministic(quotation in quotation_strategy()) {
            let encoded1 = minicbor::to_vec(&quotation).unwrap();
            let encoded2 = minicbor::to_vec(&quotation).unwrap();
            prop_assert_eq!(&encoded1, &encoded2, "encoding must be deterministic");

            let decoded: Quotation = minicbor::decode(&encoded1).unwrap();
            prop_assert_eq!(&quotation, &decoded);
        }
    }
}
