//! Catalog synchronization from a business's external storefront.
//!
//! One sync run probes the storefront API, pulls the published catalog page
//! by page, normalizes each record into the internal product shape, and
//! commits it in batches keyed on `(business_id, external_id)`. Rows the run
//! did not touch are swept afterwards, so the stored catalog converges on the
//! external state without an empty-catalog window mid-run.
//!
//! Failure policy: credential and connectivity problems abort before any
//! write; a failed commit batch is logged and skipped while the rest of the
//! run continues. Callers detect partial success by comparing `synced_count`
//! against `total_found` in the report.

pub mod client;
pub mod sync;
pub mod transform;

pub use client::{ExternalProduct, StorefrontClient};
pub use sync::{CatalogSync, SyncError, SyncReport};
pub use transform::transform_product;
