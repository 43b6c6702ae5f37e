//! Supplier quotations fanned out from approved request items
use crate::error::{ValidationError, WorkflowError};
use crate::timestamp::TimeStamp;
use crate::utils::new_uuid_to_bech32;
use chrono::Utc;
use sled::Db;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotationStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    InProgress,
    #[n(2)]
    Completed,
    #[n(3)]
    Cancelled,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Submitted,
    #[n(2)]
    Selected,
    #[n(3)]
    Rejected,
}

/// One invited supplier's slot within a quotation
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct QuotationItem {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub supplier_id: String,
    #[n(2)]
    pub unit_price: Option<u64>,
    #[n(3)]
    pub total_price: Option<u64>, // unit_price * requested_quantity
    #[n(4)]
    pub delivery_days: Option<u32>,
    #[n(5)]
    pub notes: Option<String>,
    #[n(6)]
    pub status: BidStatus,
}

/// Price collection for a single request item. One quotation per item; a
/// request with N items yields N quotations. The aggregate owns its supplier
/// slots, so winner selection is a single-record update.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Quotation {
    #[n(0)]
    pub id: String, // uuid7, bech32 encoded under the "quot_" prefix
    #[n(1)]
    pub request_id: String,
    #[n(2)]
    pub product_id: Option<String>, // None for ad hoc request items
    #[n(3)]
    pub product_name: String,
    #[n(4)]
    pub requested_quantity: u32,
    #[n(5)]
    pub status: QuotationStatus,
    #[n(6)]
    pub items: Vec<QuotationItem>,
    // winner metadata, denormalized for fast lookup once decided
    #[n(7)]
    pub selected_supplier_id: Option<String>,
    #[n(8)]
    pub selected_price: Option<u64>,
    #[n(9)]
    pub selected_delivery_days: Option<u32>,
    #[n(10)]
    pub created_at: TimeStamp<Utc>,
}

impl Quotation {
    /// Open a quotation for one request item, fanning out a pending slot per
    /// invited supplier.
    pub fn open(
        request_id: &str,
        product_id: Option<&str>,
        product_name: &str,
        requested_quantity: u32,
        invited_suppliers: &[String],
    ) -> anyhow::Result<Self> {
        if invited_suppliers.is_empty() {
            return Err(ValidationError::NoSuppliers.into());
        }

        let mut items = Vec::with_capacity(invited_suppliers.len());
        for supplier_id in invited_suppliers {
            items.push(QuotationItem {
                id: new_uuid_to_bech32("qbid_")?,
                supplier_id: supplier_id.clone(),
                unit_price: None,
                total_price: None,
                delivery_days: None,
                notes: None,
                status: BidStatus::Pending,
            });
        }

        Ok(Self {
            id: new_uuid_to_bech32("quot_")?,
            request_id: request_id.to_string(),
            product_id: product_id.map(str::to_string),
            product_name: product_name.to_string(),
            requested_quantity,
            status: QuotationStatus::Pending,
            items,
            selected_supplier_id: None,
            selected_price: None,
            selected_delivery_days: None,
            created_at: TimeStamp::new(),
        })
    }

    pub fn is_decided(&self) -> bool {
        matches!(
            self.status,
            QuotationStatus::Completed | QuotationStatus::Cancelled
        )
    }

    /// Record a supplier's bid: the slot moves pending -> submitted and the
    /// total is computed from the requested quantity.
    pub fn record_bid(
        &mut self,
        item_id: &str,
        unit_price: u64,
        delivery_days: Option<u32>,
        notes: Option<&str>,
    ) -> anyhow::Result<()> {
        if self.is_decided() {
            return Err(WorkflowError::QuotationAlreadyDecided.into());
        }
        if unit_price == 0 {
            return Err(ValidationError::ZeroPrice.into());
        }

        let total = unit_price * self.requested_quantity as u64;
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| WorkflowError::UnknownItem(item_id.to_string()))?;

        if item.status != BidStatus::Pending {
            return Err(anyhow::anyhow!(
                "Supplier {} has already submitted a bid",
                item.supplier_id
            ));
        }

        item.unit_price = Some(unit_price);
        item.total_price = Some(total);
        item.delivery_days = delivery_days;
        item.notes = notes.map(str::to_string);
        item.status = BidStatus::Submitted;

        if self.status == QuotationStatus::Pending {
            self.status = QuotationStatus::InProgress;
        }

        Ok(())
    }

    /// Select the winning bid. The winner must be submitted; every other
    /// slot is rejected and the quotation completes with the winner's terms
    /// copied onto it. On failure nothing changes.
    pub fn decide(&mut self, winning_item_id: &str) -> Result<(), WorkflowError> {
        if self.is_decided() {
            return Err(WorkflowError::QuotationAlreadyDecided);
        }

        let winner_index = self
            .items
            .iter()
            .position(|item| item.id == winning_item_id)
            .ok_or_else(|| WorkflowError::UnknownItem(winning_item_id.to_string()))?;

        if self.items[winner_index].status != BidStatus::Submitted {
            return Err(WorkflowError::ItemNotSubmitted);
        }

        for (index, item) in self.items.iter_mut().enumerate() {
            item.status = if index == winner_index {
                BidStatus::Selected
            } else {
                BidStatus::Rejected
            };
        }

        let winner = &self.items[winner_index];
        self.selected_supplier_id = Some(winner.supplier_id.clone());
        self.selected_price = winner.unit_price;
        self.selected_delivery_days = winner.delivery_days;
        self.status = QuotationStatus::Completed;

        Ok(())
    }

    /// Cancel an undecided quotation. Cancelling twice is a no-op.
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        if self.status == QuotationStatus::Completed {
            return Err(WorkflowError::QuotationAlreadyDecided);
        }
        self.status = QuotationStatus::Cancelled;
        Ok(())
    }

    /// Cheapest submitted bid. Pending and rejected slots are ignored; None
    /// while no bids have come in.
    pub fn lowest_bid(&self) -> Option<&QuotationItem> {
        self.items
            .iter()
            .filter(|item| item.status == BidStatus::Submitted)
            .min_by_key(|item| item.unit_price.unwrap_or(u64::MAX))
    }

    pub fn load_from_db(db: &Db, quotation_id: &str) -> anyhow::Result<Self> {
        let bytes = db
            .get(quotation_id.as_bytes())?
            .ok_or_else(|| anyhow::anyhow!("Quotation {} not found", quotation_id))?;
        Ok(minicbor::decode(bytes.as_ref())?)
    }

    pub fn save_to_db(&self, db: &Db) -> anyhow::Result<()> {
        db.insert(self.id.as_bytes(), minicbor::to_vec(self)?)?;
        Ok(())
    }
}
