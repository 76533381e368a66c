//! An in-memory B+ tree index over unique keys.
//!
//! [`BPlusTree`] maps each key to exactly one value. Records live only in the leaves, which
//! form a doubly-linked chain in key order; internal nodes hold separator copies that route
//! point lookups down to a leaf in O(log n). Ordered dumps and inclusive range scans walk the
//! leaf chain.
//!
//! # Example
//!
//! ```
//! use bplus_index::BPlusTree;
//!
//! let mut index = BPlusTree::new(3)?;
//! for key in [10, 20, 5, 6, 12, 30, 7, 17] {
//!     index.insert(key, key.to_string());
//! }
//!
//! assert_eq!(index.ordered_keys(), [5, 6, 7, 10, 12, 17, 20, 30]);
//! assert_eq!(index.search(&12).map(String::as_str), Some("12"));
//! assert_eq!(index.range(&6, &12).count(), 4);
//!
//! assert!(index.delete(&10));
//! assert_eq!(index.len(), 7);
//! # Ok::<(), bplus_index::Error>(())
//! ```
//!
//! # Implementation
//!
//! Nodes and values are stored in arenas and linked through small integer handles, so parent
//! and sibling back-references never form ownership cycles. Splits and merges propagate upward
//! iteratively. A hash set of live keys answers membership and rejects duplicate inserts before
//! any descent.
//!
//! Structural changes are reported through [`tracing`] at `trace` level under the targets
//! `bplus_index::split`, `bplus_index::merge` and `bplus_index::tree`.

// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]

mod degree;
mod error;
mod raw;

pub mod bplus_tree;

pub use bplus_tree::BPlusTree;
pub use degree::Degree;
pub use error::{Error, Result};
