//! Delivery and bounce records.

pub mod records;
pub mod repo;

pub use records::{
    BounceRecord, BounceType, DeliveryRecord, NewDelivery, RecipientKind, RecordFilter,
};
pub use repo::{Store, StoreError};
