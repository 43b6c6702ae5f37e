//! End-to-end walk through the requisition workflow against a throwaway
//! local database: register stock, submit and approve a request, run a
//! quotation round, then confirm the withdrawal.

use std::sync::Arc;
use stock_requisition::access::{Actor, Role};
use stock_requisition::product::{CATEGORY_TECHNICAL, ProductDraft};
use stock_requisition::request::{RequestDraft, RequestKind};
use stock_requisition::service::RequisitionService;

fn main() -> anyhow::Result<()> {
    let db = sled::open("workflow-demo-db")?;

    if !db.is_empty() {
        db.clear()?;
    }

    let service = RequisitionService::new(Arc::new(db));
    let admin = Actor::new("carlos", Role::Admin);
    let operator = Actor::new("joana", Role::Operator);

    let gloves = service.register_product(
        ProductDraft::new()
            .set_code("NIT-001")
            .set_name("Nitrile gloves")
            .set_category(CATEGORY_TECHNICAL)
            .set_unit("box")
            .set_quantity(10)
            .set_min_stock(2)
            .set_unit_price(2_500),
        &admin,
    )?;
    println!("registered {:#?}", gloves);

    let request = service.submit_request(
        RequestDraft::new(RequestKind::Material)
            .set_requested_by("maria")
            .set_department("laboratory")
            .set_reason("weekly restock")
            .add_catalogued_item(&gloves.id, &gloves.name, 5, CATEGORY_TECHNICAL),
    )?;
    let request = service.approve_request(&request.id, &admin)?;
    println!("approved request {}", request.id);

    // optional price round before handing the stock out
    let suppliers = vec!["sup_medical".to_string(), "sup_atacado".to_string()];
    let quotation = service.open_quotation(&request.id, 0, &suppliers, &admin)?;
    let first = quotation.items[0].id.clone();
    let second = quotation.items[1].id.clone();
    service.submit_bid(&quotation.id, &first, 2_400, Some(10), None, &admin)?;
    service.submit_bid(&quotation.id, &second, 2_150, Some(21), None, &admin)?;

    let lowest = service.lowest_bid(&quotation.id)?.expect("two bids are in");
    let quotation = service.select_winner(&quotation.id, &lowest.id, &admin)?;
    println!(
        "winner: {} at {:?}",
        quotation.selected_supplier_id.as_deref().unwrap_or("-"),
        quotation.selected_price
    );

    let outcome =
        service.reconcile_withdrawal(&request.id, "data:image/png;base64,sig", "maria", &operator)?;
    println!("withdrawal outcome {:#?}", outcome);

    println!("remaining stock {:#?}", service.product(&gloves.id)?.quantity);
    println!("dashboard {:#?}", service.dashboard_summary()?);

    Ok(())
}
