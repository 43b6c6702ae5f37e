//! Service layer API for the requisition workflow
use crate::access::{self, Actor, Permission};
use crate::dashboard::{self, DashboardSummary};
use crate::error::{ValidationError, WorkflowError};
use crate::ledger::{ChangeLogEntry, MovementReason, StockMovement};
use crate::product::{self, Product, ProductDraft, ProductStatus};
use crate::quotation::{Quotation, QuotationItem};
use crate::request::{ItemKind, Request, RequestDraft, RequestStatus};
use crate::timestamp::TimeStamp;
use crate::withdrawal::{
    self, ItemDisposition, ItemOutcome, ItemPlan, WithdrawalGuard, WithdrawalOutcome,
};
use sled::Batch;
use std::sync::Arc;

pub struct RequisitionService {
    instance: Arc<sled::Db>,
    guard: WithdrawalGuard,
}

impl RequisitionService {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self {
            instance,
            guard: WithdrawalGuard::new(),
        }
    }

    /// Service with a custom withdrawal guard (tests shorten the cooldown)
    pub fn with_guard(instance: Arc<sled::Db>, guard: WithdrawalGuard) -> Self {
        Self { instance, guard }
    }

    fn check(&self, actor: &Actor, permission: Permission) -> Result<(), WorkflowError> {
        if access::role_allows(actor.role, permission) {
            Ok(())
        } else {
            Err(WorkflowError::PermissionDenied(permission))
        }
    }

    // PRODUCTS

    /// Register a new catalogue product
    pub fn register_product(&self, draft: ProductDraft, actor: &Actor) -> anyhow::Result<Product> {
        self.check(actor, Permission::ManageProducts)?;

        let product = draft.validate_and_finalise()?;
        product.save_to_db(&self.instance)?;

        Ok(product)
    }

    /// Apply a manual edit, recording every changed field in the audit log.
    /// Quantity is not editable here; stock operations own that field.
    pub fn edit_product(
        &self,
        updated: Product,
        actor: &Actor,
        reason: &str,
    ) -> anyhow::Result<Product> {
        self.check(actor, Permission::ManageProducts)?;

        let current = Product::load_from_db(&self.instance, &updated.id)?;
        if updated.quantity != current.quantity {
            return Err(ValidationError::QuantityIsManaged.into());
        }

        let changes = product::diff_fields(&current, &updated);
        if changes.is_empty() {
            return Ok(current);
        }

        // audit entries and the new projection land together or not at all
        let mut batch = Batch::default();
        for (field, old_value, new_value) in &changes {
            let entry = ChangeLogEntry::new(
                &current.id,
                field,
                old_value,
                new_value,
                &actor.name,
                reason,
            );
            let (key, cbor) = entry.build()?;
            batch.insert(key.as_bytes(), cbor);
        }
        batch.insert(updated.id.as_bytes(), minicbor::to_vec(&updated)?);
        self.instance.apply_batch(batch)?;

        Ok(updated)
    }

    /// Explicit stock addition (intake), audit-logged
    pub fn add_stock(
        &self,
        product_id: &str,
        quantity: u32,
        actor: &Actor,
        reason: &str,
    ) -> anyhow::Result<Product> {
        self.check(actor, Permission::ManageProducts)?;
        if quantity == 0 {
            return Err(ValidationError::ZeroQuantity.into());
        }

        let mut product = Product::load_from_db(&self.instance, product_id)?;
        let old_quantity = product.quantity;
        product.quantity = old_quantity
            .checked_add(quantity)
            .ok_or_else(|| anyhow::anyhow!("Stock addition overflows the quantity field"))?;

        let entry = ChangeLogEntry::new(
            product_id,
            "quantity",
            &old_quantity.to_string(),
            &product.quantity.to_string(),
            &actor.name,
            reason,
        );
        let (key, cbor) = entry.build()?;

        let mut batch = Batch::default();
        batch.insert(key.as_bytes(), cbor);
        batch.insert(product.id.as_bytes(), minicbor::to_vec(&product)?);
        self.instance.apply_batch(batch)?;

        Ok(product)
    }

    // REQUESTS

    /// Submit a new request; it enters the lifecycle as pending
    pub fn submit_request(&self, draft: RequestDraft) -> anyhow::Result<Request> {
        let request = draft.validate_and_finalise()?;
        request.save_to_db(&self.instance)?;

        Ok(request)
    }

    pub fn approve_request(&self, request_id: &str, actor: &Actor) -> anyhow::Result<Request> {
        self.check(actor, Permission::ApproveRequests)?;

        let mut request = Request::load_from_db(&self.instance, request_id)?;
        request.transition(RequestStatus::Approved, &actor.name)?;
        request.save_to_db(&self.instance)?;

        Ok(request)
    }

    pub fn reject_request(&self, request_id: &str, actor: &Actor) -> anyhow::Result<Request> {
        self.check(actor, Permission::ApproveRequests)?;

        let mut request = Request::load_from_db(&self.instance, request_id)?;
        request.transition(RequestStatus::Rejected, &actor.name)?;
        request.save_to_db(&self.instance)?;

        Ok(request)
    }

    // QUOTATIONS

    /// Open a quotation round for one item of an approved request, inviting
    /// the given suppliers
    pub fn open_quotation(
        &self,
        request_id: &str,
        item_index: usize,
        invited_suppliers: &[String],
        actor: &Actor,
    ) -> anyhow::Result<Quotation> {
        self.check(actor, Permission::ManageQuotations)?;

        let request = Request::load_from_db(&self.instance, request_id)?;
        if request.status != RequestStatus::Approved {
            return Err(anyhow::anyhow!(
                "Request must be approved before quotation. Current status: {:?}",
                request.status
            ));
        }
        let item = request.items.get(item_index).ok_or_else(|| {
            anyhow::anyhow!("Request {} has no item at index {}", request_id, item_index)
        })?;

        let product_id = match &item.kind {
            ItemKind::Catalogued { product_id } => Some(product_id.as_str()),
            ItemKind::AdHoc => None,
        };
        let quotation = Quotation::open(
            &request.id,
            product_id,
            &item.name,
            item.quantity,
            invited_suppliers,
        )?;
        quotation.save_to_db(&self.instance)?;

        Ok(quotation)
    }

    /// Record a supplier's bid on a quotation slot
    pub fn submit_bid(
        &self,
        quotation_id: &str,
        item_id: &str,
        unit_price: u64,
        delivery_days: Option<u32>,
        notes: Option<&str>,
        actor: &Actor,
    ) -> anyhow::Result<Quotation> {
        self.check(actor, Permission::ManageQuotations)?;

        let mut quotation = Quotation::load_from_db(&self.instance, quotation_id)?;
        quotation.record_bid(item_id, unit_price, delivery_days, notes)?;
        quotation.save_to_db(&self.instance)?;

        Ok(quotation)
    }

    /// Select the winning bid. Sibling rejections and the parent completion
    /// are one conditional write: a concurrent decision loses the swap and
    /// is reported as already decided, never last-writer-wins.
    pub fn select_winner(
        &self,
        quotation_id: &str,
        winning_item_id: &str,
        actor: &Actor,
    ) -> anyhow::Result<Quotation> {
        self.check(actor, Permission::ManageQuotations)?;

        let expected = self
            .instance
            .get(quotation_id.as_bytes())?
            .ok_or_else(|| anyhow::anyhow!("Quotation {} not found", quotation_id))?;
        let mut quotation: Quotation = minicbor::decode(expected.as_ref())?;
        quotation.decide(winning_item_id)?;

        let swap = self.instance.compare_and_swap(
            quotation_id.as_bytes(),
            Some(expected),
            Some(minicbor::to_vec(&quotation)?),
        )?;
        if swap.is_err() {
            let current = Quotation::load_from_db(&self.instance, quotation_id)?;
            if current.is_decided() {
                return Err(WorkflowError::QuotationAlreadyDecided.into());
            }
            return Err(anyhow::anyhow!(
                "Quotation {} changed mid-decision, retry",
                quotation_id
            ));
        }

        Ok(quotation)
    }

    pub fn cancel_quotation(&self, quotation_id: &str, actor: &Actor) -> anyhow::Result<Quotation> {
        self.check(actor, Permission::ManageQuotations)?;

        let mut quotation = Quotation::load_from_db(&self.instance, quotation_id)?;
        quotation.cancel()?;
        quotation.save_to_db(&self.instance)?;

        Ok(quotation)
    }

    /// Cheapest submitted bid for a quotation, if any
    pub fn lowest_bid(&self, quotation_id: &str) -> anyhow::Result<Option<QuotationItem>> {
        let quotation = Quotation::load_from_db(&self.instance, quotation_id)?;
        Ok(quotation.lowest_bid().cloned())
    }

    // WITHDRAWAL

    /// Confirm receipt of an approved request: deduct every deliverable item
    /// from stock, append one ledger entry per deduction, then complete the
    /// request with the captured signature and receiver.
    ///
    /// Deductions are applied per item; one failed item is reported in the
    /// outcome without rolling back the others. Completion itself is a
    /// conditional write against the request bytes read at entry, so a
    /// racing second confirmation fails instead of deducting twice.
    pub fn reconcile_withdrawal(
        &self,
        request_id: &str,
        signature: &str,
        receiver_name: &str,
        actor: &Actor,
    ) -> anyhow::Result<WithdrawalOutcome> {
        self.check(actor, Permission::ConfirmWithdrawals)?;

        let expected = self
            .instance
            .get(request_id.as_bytes())?
            .ok_or_else(|| anyhow::anyhow!("Request {} not found", request_id))?;
        let mut request: Request = minicbor::decode(expected.as_ref())?;

        if request.status == RequestStatus::Completed {
            return Err(WorkflowError::AlreadyCompleted.into());
        }
        if request.status != RequestStatus::Approved {
            return Err(WorkflowError::InvalidTransition {
                from: request.status,
                to: RequestStatus::Completed,
            }
            .into());
        }

        let _slot = self.guard.begin(request_id)?;

        if signature.trim().is_empty() {
            return Err(ValidationError::MissingSignature.into());
        }
        if receiver_name.trim().is_empty() {
            return Err(ValidationError::MissingReceiver.into());
        }
        // the completion transition would refuse an anonymous actor anyway,
        // but that check must fire before any stock is touched
        if actor.name.trim().is_empty() {
            return Err(ValidationError::MissingField("actor").into());
        }

        // first pass: classify every item against live stock
        let mut plans = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let live = match &item.kind {
                ItemKind::Catalogued { product_id } => {
                    Product::find_in_db(&self.instance, product_id)?
                }
                ItemKind::AdHoc => None,
            };
            plans.push(withdrawal::classify(item, live.as_ref()));
        }
        if !withdrawal::confirmable(&plans) {
            return Err(ValidationError::NothingDeliverable.into());
        }

        // second pass: deduct deliverable items one by one
        let mut outcomes = Vec::with_capacity(request.items.len());
        for (item, plan) in request.items.iter().zip(&plans) {
            let disposition = match plan {
                ItemPlan::Unregistered => ItemDisposition::Unregistered,
                ItemPlan::Insufficient { available } => ItemDisposition::InsufficientStock {
                    available: *available,
                },
                ItemPlan::Deliver => match &item.kind {
                    ItemKind::Catalogued { product_id } => {
                        match self.deduct_item(product_id, item.quantity, &request.id, &actor.name)
                        {
                            Ok(disposition) => disposition,
                            Err(err) => ItemDisposition::DeductionFailed {
                                detail: err.to_string(),
                            },
                        }
                    }
                    ItemKind::AdHoc => ItemDisposition::Unregistered,
                },
            };

            outcomes.push(ItemOutcome {
                name: item.name.clone(),
                product_id: match &item.kind {
                    ItemKind::Catalogued { product_id } => Some(product_id.clone()),
                    ItemKind::AdHoc => None,
                },
                requested: item.quantity,
                disposition,
            });
        }

        // finalize: signature, receiver and completion in one conditional
        // write against the bytes read at entry
        request.receiver_signature = Some(signature.to_string());
        request.received_by = Some(receiver_name.to_string());
        request.transition(RequestStatus::Completed, &actor.name)?;

        let swap = self.instance.compare_and_swap(
            request_id.as_bytes(),
            Some(expected),
            Some(minicbor::to_vec(&request)?),
        )?;
        if swap.is_err() {
            return Err(WorkflowError::AlreadyCompleted.into());
        }

        Ok(WithdrawalOutcome {
            request_id: request.id,
            items: outcomes,
        })
    }

    fn deduct_item(
        &self,
        product_id: &str,
        quantity: u32,
        request_id: &str,
        authorized_by: &str,
    ) -> anyhow::Result<ItemDisposition> {
        // re-read immediately before deducting so repeated lines for one
        // product cannot overdraw it
        let mut product = match Product::find_in_db(&self.instance, product_id)? {
            Some(product) => product,
            None => return Ok(ItemDisposition::Unregistered),
        };
        if product.quantity < quantity {
            return Ok(ItemDisposition::InsufficientStock {
                available: product.quantity,
            });
        }

        let movement = StockMovement::new(
            &product,
            quantity,
            MovementReason::Requisition,
            Some(request_id),
            authorized_by,
        )?;
        product.quantity -= quantity;

        // ledger entry and decremented projection land together
        let mut batch = Batch::default();
        batch.insert(movement.id.as_bytes(), minicbor::to_vec(&movement)?);
        batch.insert(product.id.as_bytes(), minicbor::to_vec(&product)?);
        self.instance.apply_batch(batch)?;

        Ok(ItemDisposition::Deducted {
            movement_id: movement.id,
        })
    }

    // READ SIDE

    pub fn product(&self, product_id: &str) -> anyhow::Result<Product> {
        Product::load_from_db(&self.instance, product_id)
    }

    pub fn request(&self, request_id: &str) -> anyhow::Result<Request> {
        Request::load_from_db(&self.instance, request_id)
    }

    pub fn quotation(&self, quotation_id: &str) -> anyhow::Result<Quotation> {
        Quotation::load_from_db(&self.instance, quotation_id)
    }

    pub fn products(&self) -> anyhow::Result<Vec<Product>> {
        self.scan_decode(b"prod_")
    }

    pub fn requests(&self) -> anyhow::Result<Vec<Request>> {
        self.scan_decode(b"req_")
    }

    pub fn movements(&self) -> anyhow::Result<Vec<StockMovement>> {
        StockMovement::scan_all(&self.instance)
    }

    pub fn movements_for_product(&self, product_id: &str) -> anyhow::Result<Vec<StockMovement>> {
        StockMovement::scan_for_product(&self.instance, product_id)
    }

    pub fn change_log_for_product(&self, product_id: &str) -> anyhow::Result<Vec<ChangeLogEntry>> {
        ChangeLogEntry::scan_for_product(&self.instance, product_id)
    }

    pub fn quotations_for_request(&self, request_id: &str) -> anyhow::Result<Vec<Quotation>> {
        let mut quotations: Vec<Quotation> = self.scan_decode(b"quot_")?;
        quotations.retain(|quotation| quotation.request_id == request_id);
        Ok(quotations)
    }

    pub fn low_stock_products(&self) -> anyhow::Result<Vec<Product>> {
        let today = TimeStamp::new();
        Ok(self
            .products()?
            .into_iter()
            .filter(|product| product.status(&today) == ProductStatus::LowStock)
            .collect())
    }

    pub fn expired_products(&self) -> anyhow::Result<Vec<Product>> {
        let today = TimeStamp::new();
        Ok(self
            .products()?
            .into_iter()
            .filter(|product| product.status(&today) == ProductStatus::Expired)
            .collect())
    }

    /// Month-over-month financial rollup of the current inventory and ledger
    pub fn dashboard_summary(&self) -> anyhow::Result<DashboardSummary> {
        let products = self.products()?;
        let movements = self.movements()?;
        Ok(dashboard::monthly_summary(
            &products,
            &movements,
            &TimeStamp::new(),
        ))
    }

    fn scan_decode<T: for<'b> minicbor::Decode<'b, ()>>(
        &self,
        prefix: &[u8],
    ) -> anyhow::Result<Vec<T>> {
        let mut out = Vec::new();
        for entry in self.instance.scan_prefix(prefix) {
            let (_, bytes) = entry?;
            out.push(minicbor::decode(bytes.as_ref())?);
        }
        Ok(out)
    }
}
