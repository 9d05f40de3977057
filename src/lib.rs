//! tagindex - bitmap-indexed tag store for evidence items
//!
//! Items are dense integer ids `0..=last_id`. Investigators group them into
//! named tags; each tag is a compressed bitmap, and the store answers
//! membership and union queries and filters ordered search results by them.
//! State persists to a snapshot file; files in the older per-item bit vector
//! layout are migrated when loaded.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tagindex::{DenseDomain, ResultSet, StoreConfig, TagStore};
//!
//! let store = TagStore::new(Arc::new(DenseDomain { last_id: 4 }), &StoreConfig::default())?;
//! let relevant = store.create_tag("Relevant");
//! store.add_members(&[0, 1], relevant)?;
//! let hits = store.filter_by_tags(ResultSet::new(vec![0, 1, 2, 3, 4]), &["Relevant"]);
//! assert_eq!(hits.ids(), &[0, 1]);
//! store.save(true);
//! # Ok::<(), tagindex::StoreError>(())
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod membership;
pub mod metadata;
pub mod persist;
pub mod selection;
pub mod store;
pub mod tag;
pub mod writer;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use filter::{ResultSet, EXCLUDED};
pub use metadata::{Color, KeyBinding};
pub use persist::{LegacySnapshot, Snapshot, StoredSnapshot};
pub use selection::{DenseDomain, ItemDomain, ItemList};
pub use store::TagStore;
pub use tag::{ItemId, TagId};
