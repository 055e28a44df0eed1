//! `forgecmms-core`: shared building blocks for the maintenance platform.
//!
//! This crate contains **pure** primitives (no infrastructure concerns):
//! tenant-scoped identifiers and the domain error model.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{AlertId, CompanyId, ComponentId, InventoryItemId, UserId, WorkOrderId};
