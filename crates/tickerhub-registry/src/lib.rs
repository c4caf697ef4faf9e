//! Symbol catalog resolution for tickerhub.
//!
//! Resolves the tradable symbol universe of each exchange through a
//! fallback chain of HTTP sources, fronted by an external TTL cache.
//! The chain always ends in a hardcoded default set, so a connector
//! never starts without symbols.

pub mod catalog;
pub mod error;
pub mod source;
pub mod ttl_cache;

pub use catalog::{CatalogSpec, SymbolCatalog, SymbolCatalogEntry, DEFAULT_CATALOG_TTL};
pub use error::{RegistryError, RegistryResult};
pub use source::{HttpSymbolSource, Listing, ListingFormat, SourceOutcome, SymbolSource};
pub use ttl_cache::{InMemoryTtlCache, TtlCache};
