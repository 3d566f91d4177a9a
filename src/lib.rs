//! Reference-counted live subsets over reactive collections
//!
//! A *Collection* is the canonical ordered set of *Models*. It notifies its
//! *Observers* synchronously with a diff message for every write.
//! A *Subset* is a filtered projection of one collection: while at least one
//! *Connection* is held it observes the collection and keeps its membership
//! equal to the models that satisfy its predicate, updating incrementally
//! where it can and rescanning where it must. When the last connection is
//! released it unsubscribes and empties itself.
//!
//! Owners that depend on several subsets compose a *Retainer*, which keeps
//! at most one connection per subset and gives all of them back at once.
//!
//!# Examples
//!
//! ```
//! use livesets::{
//!     buffer::{
//!         collection::{AddOptions, Collection},
//!         model::Record,
//!     },
//!     projection::{
//!         retainer::{Retainer, Retention},
//!         subset::SubsetOptions,
//!     },
//!     view::collection::{CollectionView, CollectionViewExt},
//! };
//!
//! #[derive(Clone)]
//! struct Task {
//!     id: u32,
//!     done: bool,
//! }
//!
//! impl Record for Task {
//!     type Id = u32;
//!
//!     fn id(&self) -> u32 {
//!         self.id
//!     }
//! }
//!
//! let tasks = Collection::with_records((0..4).map(|id| Task { id, done: id % 2 == 0 }));
//! let open = tasks.subset(|task: &Task| !task.done, SubsetOptions::default());
//!
//! let owner = Retention::new();
//! owner.retain(&open);
//! assert_eq!(open.ids(), vec![1, 3]);
//!
//! tasks.add(vec![Task { id: 7, done: false }], AddOptions::default());
//! tasks.modify(&1, |task| task.done = true);
//! assert_eq!(open.ids(), vec![3, 7]);
//!
//! owner.release_all();
//! assert!(open.is_empty());
//! assert_eq!(tasks.len(), 5);
//! ```

pub mod buffer;
pub mod error;
pub mod projection;
pub mod view;

pub use error::{LiveSetError, Result};

#[cfg(test)]
pub(crate) mod fixtures;
