//! Material and purchase requests with their lifecycle state machine
use crate::error::{ValidationError, WorkflowError};
use crate::product::CATEGORY_GENERAL;
use crate::timestamp::TimeStamp;
use crate::utils::new_uuid_to_bech32;
use chrono::Utc;
use sled::Db;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Purchase request (SC)
    #[n(0)]
    Purchase,
    /// Material withdrawal request (SM)
    #[n(1)]
    Material,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    #[n(0)]
    Standard,
    #[n(1)]
    Priority,
    #[n(2)]
    Urgent,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Completed,
}

impl RequestStatus {
    pub fn can_transition(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::Approved, RequestStatus::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Completed)
    }
}

/// Whether an item line references the catalogue or names an ad hoc,
/// uncatalogued item. Ad hoc lines never affect stock.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    #[n(0)]
    Catalogued {
        #[n(0)]
        product_id: String,
    },
    #[n(1)]
    AdHoc,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct RequestItem {
    #[n(0)]
    pub kind: ItemKind,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub quantity: u32,
    #[n(3)]
    pub category: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Request {
    #[n(0)]
    pub id: String, // uuid7, bech32 encoded under the "req_" prefix
    #[n(1)]
    pub kind: RequestKind,
    #[n(2)]
    pub items: Vec<RequestItem>,
    #[n(3)]
    pub reason: String,
    #[n(4)]
    pub requested_by: String,
    #[n(5)]
    pub department: String,
    #[n(6)]
    pub priority: Priority,
    #[n(7)]
    pub status: RequestStatus,
    #[n(8)]
    pub approved_by: Option<String>,
    #[n(9)]
    pub approval_date: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub receiver_signature: Option<String>,
    #[n(11)]
    pub received_by: Option<String>,
    #[n(12)]
    pub created_at: TimeStamp<Utc>,
}

impl Request {
    /// Move the request to `target`, enforcing the lifecycle graph:
    /// pending -> approved | rejected, approved -> completed. Rejected and
    /// completed are terminal. On failure the request is left untouched.
    ///
    /// Approval stamps `approved_by` and a server-assigned `approval_date`.
    /// Completion requires that the receiver signature and name have already
    /// been recorded on the request.
    pub fn transition(&mut self, target: RequestStatus, actor: &str) -> anyhow::Result<()> {
        if self.status == RequestStatus::Completed {
            return Err(WorkflowError::AlreadyCompleted.into());
        }
        if !self.status.can_transition(target) {
            return Err(WorkflowError::InvalidTransition {
                from: self.status,
                to: target,
            }
            .into());
        }

        match target {
            RequestStatus::Approved => {
                if actor.trim().is_empty() {
                    return Err(ValidationError::MissingField("actor").into());
                }
                self.approved_by = Some(actor.to_string());
                self.approval_date = Some(TimeStamp::new());
            }
            RequestStatus::Completed => {
                if actor.trim().is_empty() {
                    return Err(ValidationError::MissingField("actor").into());
                }
                if self.receiver_signature.is_none() {
                    return Err(ValidationError::MissingSignature.into());
                }
                if self.received_by.is_none() {
                    return Err(ValidationError::MissingReceiver.into());
                }
            }
            RequestStatus::Rejected | RequestStatus::Pending => {}
        }

        self.status = target;
        Ok(())
    }

    pub fn load_from_db(db: &Db, request_id: &str) -> anyhow::Result<Self> {
        let bytes = db
            .get(request_id.as_bytes())?
            .ok_or_else(|| anyhow::anyhow!("Request {} not found", request_id))?;
        Ok(minicbor::decode(bytes.as_ref())?)
    }

    pub fn save_to_db(&self, db: &Db) -> anyhow::Result<()> {
        db.insert(self.id.as_bytes(), minicbor::to_vec(self)?)?;
        Ok(())
    }
}

// Used for constructing request drafts before submission
#[derive(Debug)]
pub struct RequestDraft {
    pub kind: RequestKind,
    pub items: Vec<RequestItem>,
    pub reason: String,
    pub requested_by: String,
    pub department: String,
    pub priority: Priority,
}

impl RequestDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            reason: String::new(),
            requested_by: String::new(),
            department: String::new(),
            priority: Priority::Standard,
        }
    }
    pub fn set_reason(mut self, reason: &str) -> Self {
        self.reason = reason.to_string();
        self
    }
    pub fn set_requested_by(mut self, requested_by: &str) -> Self {
        self.requested_by = requested_by.to_string();
        self
    }
    pub fn set_department(mut self, department: &str) -> Self {
        self.department = department.to_string();
        self
    }
    pub fn set_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
    pub fn add_catalogued_item(
        mut self,
        product_id: &str,
        name: &str,
        quantity: u32,
        category: &str,
    ) -> Self {
        self.items.push(RequestItem {
            kind: ItemKind::Catalogued {
                product_id: product_id.to_string(),
            },
            name: name.to_string(),
            quantity,
            category: normalize_category(category),
        });
        self
    }
    pub fn add_adhoc_item(mut self, name: &str, quantity: u32, category: &str) -> Self {
        self.items.push(RequestItem {
            kind: ItemKind::AdHoc,
            name: name.to_string(),
            quantity,
            category: normalize_category(category),
        });
        self
    }

    // Checks fields, mints an id and returns the pending request
    pub fn validate_and_finalise(self) -> anyhow::Result<Request> {
        if self.requested_by.trim().is_empty() {
            return Err(ValidationError::MissingField("requested_by").into());
        }
        if self.department.trim().is_empty() {
            return Err(ValidationError::MissingField("department").into());
        }
        if self.items.is_empty() {
            return Err(ValidationError::EmptyItemList.into());
        }
        if self.items.iter().any(|item| item.quantity == 0) {
            return Err(ValidationError::ZeroQuantity.into());
        }

        Ok(Request {
            id: new_uuid_to_bech32("req_")?,
            kind: self.kind,
            items: self.items,
            reason: self.reason,
            requested_by: self.requested_by,
            department: self.department,
            priority: self.priority,
            status: RequestStatus::Pending,
            approved_by: None,
            approval_date: None,
            receiver_signature: None,
            received_by: None,
            created_at: TimeStamp::new(),
        })
    }
}

fn normalize_category(category: &str) -> String {
    if category.trim().is_empty() {
        CATEGORY_GENERAL.to_string()
    } else {
        category.to_string()
    }
}
