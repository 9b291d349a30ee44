//! ORIGIN Types - Canonical domain types for upload governance
//!
//! This crate contains all foundational types for ORIGIN with zero dependencies
//! on other origin crates. It defines the complete type system for:
//!
//! - Identity types (TenantId, UploadId, CertificateId, etc.)
//! - The decision lattice (ALLOW / REVIEW / QUARANTINE / REJECT)
//! - API-key scopes
//! - Upload features and model signals
//! - Task status and pipeline events for the evidence pipeline
//! - The error taxonomy shared by every surface
//!
//! # Architectural Invariants
//!
//! These types support the core ORIGIN guarantees:
//!
//! 1. Every admitted upload is bound to a signed Decision Certificate
//! 2. Ledger events form a gapless, hash-chained sequence per tenant
//! 3. Task-framework status and pipeline events are never conflated
//! 4. Every error carries a stable `error_code` and a correlation id

pub mod correlation;
pub mod decision;
pub mod environment;
pub mod error;
pub mod identity;
pub mod scope;
pub mod signals;
pub mod task;

pub use correlation::*;
pub use decision::*;
pub use environment::*;
pub use error::*;
pub use identity::*;
pub use scope::*;
pub use signals::*;
pub use task::*;

/// Version of the ORIGIN types schema
pub const TYPES_VERSION: &str = "0.1.0";
