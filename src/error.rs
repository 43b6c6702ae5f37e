use crate::access::Permission;
use crate::request::RequestStatus;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("A request must contain at least one item")]
    EmptyItemList,
    #[error("Item quantities must be greater than zero")]
    ZeroQuantity,
    #[error("Required field '{0}' is empty")]
    MissingField(&'static str),
    #[error("Withdrawal confirmation requires a signature")]
    MissingSignature,
    #[error("Withdrawal confirmation requires a receiver name")]
    MissingReceiver,
    #[error("No item is deliverable, nothing to confirm")]
    NothingDeliverable,
    #[error("Bid price must be greater than zero")]
    ZeroPrice,
    #[error("A quotation needs at least one invited supplier")]
    NoSuppliers,
    #[error("Product quantity is managed by stock operations, not edits")]
    QuantityIsManaged,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("Request has already been completed")]
    AlreadyCompleted,
    #[error("Winning bid has not been submitted")]
    ItemNotSubmitted,
    #[error("Quotation has already been decided")]
    QuotationAlreadyDecided,
    #[error("Quotation item {0} does not exist")]
    UnknownItem(String),
    #[error("A withdrawal is already in flight for this request")]
    WithdrawalInFlight,
    #[error("Withdrawal attempted again within the cooldown window")]
    CooldownActive,
    #[error("Actor lacks the {0:?} permission")]
    PermissionDenied(Permission),
}
