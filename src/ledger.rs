//! Append-only records: the stock movement ledger and the product audit log
//!
//! Neither keyspace is ever updated in place. Corrections are new entries;
//! current stock is a projection kept alongside the ledger, not derived by
//! folding it on every read.
use crate::product::Product;
use crate::timestamp::TimeStamp;
use crate::utils::new_uuid_to_bech32;
use chrono::Utc;
use sled::Db;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementReason {
    /// Stock handed out against an approved request
    #[n(0)]
    Requisition,
    #[n(1)]
    Adjustment,
    #[n(2)]
    Expiry,
    #[n(3)]
    Damage,
}

/// One out-movement of stock. Immutable once written; carries name and price
/// snapshots so history stays readable even if the product record changes.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct StockMovement {
    #[n(0)]
    pub id: String, // uuid7, bech32 encoded under the "mov_" prefix
    #[n(1)]
    pub product_id: String,
    #[n(2)]
    pub product_name: String,
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    pub reason: MovementReason,
    #[n(5)]
    pub date: TimeStamp<Utc>,
    #[n(6)]
    pub request_id: Option<String>,
    #[n(7)]
    pub authorized_by: String,
    #[n(8)]
    pub unit_price: u64, // snapshot at time of movement
    #[n(9)]
    pub total_value: u64,
}

impl StockMovement {
    pub fn new(
        product: &Product,
        quantity: u32,
        reason: MovementReason,
        request_id: Option<&str>,
        authorized_by: &str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            id: new_uuid_to_bech32("mov_")?,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            reason,
            date: TimeStamp::new(),
            request_id: request_id.map(str::to_string),
            authorized_by: authorized_by.to_string(),
            unit_price: product.unit_price,
            total_value: quantity as u64 * product.unit_price,
        })
    }

    pub fn scan_all(db: &Db) -> anyhow::Result<Vec<Self>> {
        let mut movements = Vec::new();
        for entry in db.scan_prefix(b"mov_") {
            let (_, bytes) = entry?;
            movements.push(minicbor::decode(bytes.as_ref())?);
        }
        Ok(movements)
    }

    pub fn scan_for_product(db: &Db, product_id: &str) -> anyhow::Result<Vec<Self>> {
        let mut movements = Self::scan_all(db)?;
        movements.retain(|movement| movement.product_id == product_id);
        Ok(movements)
    }
}

/// Field-level audit entry for manual product edits and stock additions.
/// Content-addressed: the key is the hash of the CBOR encoding, so an entry
/// can never be rewritten, only superseded by new entries.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct ChangeLogEntry {
    #[n(0)]
    pub product_id: String,
    #[n(1)]
    pub field: String,
    #[n(2)]
    pub old_value: String,
    #[n(3)]
    pub new_value: String,
    #[n(4)]
    pub changed_by: String,
    #[n(5)]
    pub reason: String,
    #[n(6)]
    pub date: TimeStamp<Utc>,
}

impl ChangeLogEntry {
    pub fn new(
        product_id: &str,
        field: &str,
        old_value: &str,
        new_value: &str,
        changed_by: &str,
        reason: &str,
    ) -> Self {
        Self {
            product_id: product_id.to_string(),
            field: field.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            changed_by: changed_by.to_string(),
            reason: reason.to_string(),
            date: TimeStamp::new(),
        }
    }

    /// Encode to CBOR and derive the write-once storage key from its hash
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let key = format!("plog_{}", sha256::digest(&cbor));

        Ok((key, cbor))
    }

    pub fn scan_for_product(db: &Db, product_id: &str) -> anyhow::Result<Vec<Self>> {
        let mut entries: Vec<Self> = Vec::new();
        for entry in db.scan_prefix(b"plog_") {
            let (_, bytes) = entry?;
            let decoded: Self = minicbor::decode(bytes.as_ref())?;
            if decoded.product_id == product_id {
                entries.push(decoded);
            }
        }
        entries.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(entries)
    }
}
