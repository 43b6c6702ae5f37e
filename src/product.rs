//! Product catalogue entries and the derived stock projection
use crate::error::ValidationError;
use crate::timestamp::TimeStamp;
use crate::utils::new_uuid_to_bech32;
use chrono::Utc;
use sled::Db;

// Category is an open string set. These two values are well-known and used
// by callers as defaults; anything else is accepted as-is.
pub const CATEGORY_GENERAL: &str = "general";
pub const CATEGORY_TECHNICAL: &str = "technical";

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Product {
    #[n(0)]
    pub id: String, // uuid7, bech32 encoded under the "prod_" prefix
    #[n(1)]
    pub code: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub category: String,
    #[n(4)]
    pub unit: String,
    #[n(5)]
    pub location: String,
    #[n(6)]
    pub batch: String,
    #[n(7)]
    pub quantity: u32,
    #[n(8)]
    pub min_stock: u32,
    #[n(9)]
    pub expiration_date: Option<TimeStamp<Utc>>, // None = non-perishable
    #[n(10)]
    pub unit_price: u64, // minor currency units
}

/// Derived health of a product, recomputed on every read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductStatus {
    Active,
    LowStock,
    Expired,
}

impl Product {
    pub fn total_value(&self) -> u64 {
        self.quantity as u64 * self.unit_price
    }

    /// Derive the current status. The expiration check dominates: an expired
    /// product above its minimum stock is still reported expired.
    pub fn status(&self, today: &TimeStamp<Utc>) -> ProductStatus {
        if let Some(expiration) = &self.expiration_date {
            if expiration.is_on_or_before_day(today) {
                return ProductStatus::Expired;
            }
        }
        if self.quantity <= self.min_stock {
            return ProductStatus::LowStock;
        }
        ProductStatus::Active
    }

    pub fn load_from_db(db: &Db, product_id: &str) -> anyhow::Result<Self> {
        Self::find_in_db(db, product_id)?
            .ok_or_else(|| anyhow::anyhow!("Product {} not found", product_id))
    }

    pub fn find_in_db(db: &Db, product_id: &str) -> anyhow::Result<Option<Self>> {
        match db.get(product_id.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    pub fn save_to_db(&self, db: &Db) -> anyhow::Result<()> {
        db.insert(self.id.as_bytes(), minicbor::to_vec(self)?)?;
        Ok(())
    }
}

/// Field-by-field comparison of two versions of a product, yielding
/// (field, old value, new value) triples for the change log. Quantity is
/// deliberately absent: stock operations own that field.
pub fn diff_fields(current: &Product, updated: &Product) -> Vec<(String, String, String)> {
    let mut changes = Vec::new();
    let mut push = |field: &str, old: String, new: String| {
        if old != new {
            changes.push((field.to_string(), old, new));
        }
    };

    push("code", current.code.clone(), updated.code.clone());
    push("name", current.name.clone(), updated.name.clone());
    push("category", current.category.clone(), updated.category.clone());
    push("unit", current.unit.clone(), updated.unit.clone());
    push("location", current.location.clone(), updated.location.clone());
    push("batch", current.batch.clone(), updated.batch.clone());
    push(
        "min_stock",
        current.min_stock.to_string(),
        updated.min_stock.to_string(),
    );
    push(
        "expiration_date",
        format_expiration(&current.expiration_date),
        format_expiration(&updated.expiration_date),
    );
    push(
        "unit_price",
        current.unit_price.to_string(),
        updated.unit_price.to_string(),
    );

    changes
}

fn format_expiration(expiration: &Option<TimeStamp<Utc>>) -> String {
    match expiration {
        Some(ts) => ts.to_datetime_utc().date_naive().to_string(),
        None => "none".to_string(),
    }
}

// Used for registering new products
#[derive(Default)]
pub struct ProductDraft {
    pub code: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub location: String,
    pub batch: String,
    pub quantity: u32,
    pub min_stock: u32,
    pub expiration_date: Option<TimeStamp<Utc>>,
    pub unit_price: u64,
}

impl ProductDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_code(mut self, code: &str) -> Self {
        self.code = code.to_string();
        self
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
    pub fn set_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }
    pub fn set_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }
    pub fn set_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }
    pub fn set_batch(mut self, batch: &str) -> Self {
        self.batch = batch.to_string();
        self
    }
    pub fn set_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
    pub fn set_min_stock(mut self, min_stock: u32) -> Self {
        self.min_stock = min_stock;
        self
    }
    pub fn set_expiration_date(mut self, date: TimeStamp<Utc>) -> Self {
        self.expiration_date = Some(date);
        self
    }
    pub fn set_unit_price(mut self, unit_price: u64) -> Self {
        self.unit_price = unit_price;
        self
    }

    // Checks fields, mints an id and returns the catalogued product
    pub fn validate_and_finalise(self) -> anyhow::Result<Product> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::MissingField("code").into());
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }

        let category = if self.category.trim().is_empty() {
            CATEGORY_GENERAL.to_string()
        } else {
            self.category
        };

        Ok(Product {
            id: new_uuid_to_bech32("prod_")?,
            code: self.code,
            name: self.name,
            category,
            unit: self.unit,
            location: self.location,
            batch: self.batch,
            quantity: self.quantity,
            min_stock: self.min_stock,
            expiration_date: self.expiration_date,
            unit_price: self.unit_price,
        })
    }
}
