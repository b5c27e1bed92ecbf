//! Pastry-style overlay routing core
//!
//! This crate holds the in-memory routing state of one overlay node:
//! - A prefix-trie routing table with exact, nearest-key and ranked lookups
//! - A leaf set of the peers closest to the local key by XOR distance
//! - Peer reliability scoring fed back by the networking layer
//! - An overlay façade combining both structures
//!
//! No I/O happens here. Callers sharing an overlay between tasks should go
//! through [`SharedOverlay`], which guards both structures with one lock.
//!
//! ```
//! use pastry_routing::{Overlay, OverlayConfig};
//!
//! let mut overlay = Overlay::new(b"1230", OverlayConfig::with_hash_len(4)).unwrap();
//! overlay.set(b"1234", "A").unwrap();
//! overlay.set(b"1235", "B").unwrap();
//! overlay.set(b"2980", "C").unwrap();
//!
//! assert_eq!(overlay.nearest(b"1233").unwrap(), &"A");
//! assert_eq!(overlay.route(b"2018", 3).unwrap(), vec![&"C", &"B", &"A"]);
//! ```

pub mod config;
pub mod error;
pub mod key;
pub mod leaf_set;
pub mod overlay;
pub mod peer;
pub mod routing_table;
pub mod shared;

pub use config::OverlayConfig;
pub use error::{Result, RoutingError};
pub use key::Key;
pub use leaf_set::LeafSet;
pub use overlay::Overlay;
pub use peer::Peer;
pub use routing_table::{Route, RoutingTable};
pub use shared::SharedOverlay;

/// Default key length in bytes
pub const DEFAULT_HASH_LEN: usize = 16;

/// Default number of peers kept in the leaf set
pub const DEFAULT_LEAF_CAPACITY: usize = 8;

/// Default number of candidates returned by `route`
pub const DEFAULT_ROUTE_LIMIT: usize = 5;

/// Entries merged into the leaf set between prunes
pub const UPDATE_BATCH_SIZE: usize = 500;
