//! Domain model for Tessera
//!
//! Core types shared by every Tessera crate: the `Tenant` aggregate with its
//! domains, settings and audit trail, the database lifecycle state machine,
//! the domain events recorded by tenant mutations, the cache key catalogue,
//! and secret masking for connection strings.
//!
//! # Quick Start
//!
//! ```rust
//! use tessera_core::{Tenant, DatabaseStatus};
//!
//! let mut tenant = Tenant::create("Acme Corporation", "acme", false);
//! tenant.add_domain("acme.example.com", true);
//! tenant.update_connection_string("host=db;database=tessera_acme;password=s3cret");
//!
//! assert_eq!(tenant.database_status, DatabaseStatus::Pending);
//! assert!(tenant.primary_domain().is_some());
//!
//! // Every mutation records exactly one event for post-commit dispatch.
//! let events = tenant.take_events();
//! assert_eq!(events.len(), 3);
//! ```

pub mod cache_keys;
pub mod error;
pub mod event;
pub mod masking;
pub mod status;
pub mod tenant;

pub use error::{TenantError, TenantResult};
pub use event::{TenantEvent, TenantEventKind};
pub use masking::{mask_connection_string, mask_text};
pub use status::DatabaseStatus;
pub use tenant::{Tenant, TenantAuditLog, TenantDomain, TenantSetting};
