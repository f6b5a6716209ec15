//! Persistence
//!
//! The engine never picks a storage medium. It talks to an explicit store
//! object through two small traits:
//!
//! - [`SchemaStore`]: the saved-forms collection, loaded and saved whole
//! - [`SubmissionLog`]: accepted submissions
//!
//! [`MemoryStore`] keeps both in memory; [`FileStore`] keeps them in a
//! directory as JSON or MessagePack.

mod file;
mod memory;

pub use file::{Codec, FileStore};
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::reactive::Submission;
use crate::schema::FormSchema;

pub type StoreResult<T> = Result<T, StoreError>;

/// The saved-forms collection.
pub trait SchemaStore: Send + Sync {
    /// Every saved form, in save order. An empty store yields an empty list.
    fn load_schemas(&self) -> StoreResult<Vec<FormSchema>>;

    /// Replace the whole collection.
    fn save_schemas(&self, schemas: &[FormSchema]) -> StoreResult<()>;
}

/// Accepted submissions.
pub trait SubmissionLog: Send + Sync {
    fn load_submissions(&self) -> StoreResult<Vec<Submission>>;

    fn save_submissions(&self, submissions: &[Submission]) -> StoreResult<()>;

    fn append_submission(&self, submission: Submission) -> StoreResult<()> {
        let mut submissions = self.load_submissions()?;
        submissions.push(submission);
        self.save_submissions(&submissions)
    }
}
