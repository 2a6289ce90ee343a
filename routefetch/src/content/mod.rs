//! Content package types.
//!
//! - **ContentSource**: what can be installed (URL, sizes, metadata)
//! - **InstallationRecord**: what was installed, where, and when
//! - **Catalog**: the list of sources loaded from a JSON catalog file

mod catalog;
pub mod info;
mod record;
mod source;

pub use catalog::{Catalog, CatalogError};
pub use record::InstallationRecord;
pub use source::{ContentSource, FetchStrategy};
