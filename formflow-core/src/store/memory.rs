use parking_lot::RwLock;

use super::{SchemaStore, StoreResult, SubmissionLog};
use crate::reactive::Submission;
use crate::schema::FormSchema;

/// In-memory store, for tests and embedding hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    schemas: RwLock<Vec<FormSchema>>,
    submissions: RwLock<Vec<Submission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schemas(schemas: Vec<FormSchema>) -> Self {
        Self {
            schemas: RwLock::new(schemas),
            submissions: RwLock::new(Vec::new()),
        }
    }
}

impl SchemaStore for MemoryStore {
    fn load_schemas(&self) -> StoreResult<Vec<FormSchema>> {
        Ok(self.schemas.read().clone())
    }

    fn save_schemas(&self, schemas: &[FormSchema]) -> StoreResult<()> {
        *self.schemas.write() = schemas.to_vec();
        Ok(())
    }
}

impl SubmissionLog for MemoryStore {
    fn load_submissions(&self) -> StoreResult<Vec<Submission>> {
        Ok(self.submissions.read().clone())
    }

    fn save_submissions(&self, submissions: &[Submission]) -> StoreResult<()> {
        *self.submissions.write() = submissions.to_vec();
        Ok(())
    }

    fn append_submission(&self, submission: Submission) -> StoreResult<()> {
        self.submissions.write().push(submission);
        Ok(())
    }
}
