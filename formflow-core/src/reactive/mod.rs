//! Reactive Recomputation
//!
//! This module keeps derived fields and validation errors in step with user
//! edits.
//!
//! # Concepts
//!
//! ## Recompute
//!
//! [`recompute`] walks derived fields in dependency order and evaluates their
//! formulas. A field whose parents are not all set stays unset ("pending");
//! a field whose formula fails becomes the empty string and carries a
//! [`FormulaError`](crate::error::FormulaError).
//!
//! ## Coordinator
//!
//! The [`Coordinator`] maps `(snapshot, edit)` to a new [`Snapshot`]. Each
//! edit recomputes only the fields downstream of the edited one, once, since
//! the graph is acyclic. It then re-validates the edited field and every
//! field whose value changed.
//!
//! ## Sessions
//!
//! A [`FormSession`] owns the latest snapshot and notifies [`Subscriber`]s
//! after every edit. Edits are applied one at a time; there is no background
//! work and no locking.

mod coordinator;
mod recompute;
mod session;
mod subscriber;

pub use coordinator::{Coordinator, Snapshot};
pub use recompute::{recompute, DerivedEvaluator, Recomputation};
pub use session::{FormSession, Submission};
pub use subscriber::{Subscriber, SubscriberId};
