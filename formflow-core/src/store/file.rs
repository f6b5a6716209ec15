use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{SchemaStore, StoreResult, SubmissionLog};
use crate::reactive::Submission;
use crate::schema::FormSchema;

/// On-disk encoding of a [`FileStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Codec {
    /// Pretty-printed JSON, matching the persisted schema layout.
    #[default]
    Json,
    /// MessagePack with named struct fields.
    MessagePack,
}

impl Codec {
    pub fn extension(self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::MessagePack => "msgpack",
        }
    }

    fn encode<T: Serialize + ?Sized>(self, value: &T) -> StoreResult<Vec<u8>> {
        Ok(match self {
            Codec::Json => serde_json::to_vec_pretty(value)?,
            Codec::MessagePack => rmp_serde::to_vec_named(value)?,
        })
    }

    fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> StoreResult<T> {
        Ok(match self {
            Codec::Json => serde_json::from_slice(bytes)?,
            Codec::MessagePack => rmp_serde::from_slice(bytes)?,
        })
    }
}

/// Directory-backed store: `forms.<ext>` and `submissions.<ext>`.
///
/// A missing file reads as an empty collection. Writes go to a temporary
/// file that is renamed over the target.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    codec: Codec,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, codec: Codec) -> Self {
        Self {
            dir: dir.into(),
            codec,
        }
    }

    pub fn json(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, Codec::Json)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn forms_path(&self) -> PathBuf {
        self.path("forms")
    }

    pub fn submissions_path(&self) -> PathBuf {
        self.path("submissions")
    }

    fn path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{}", self.codec.extension()))
    }

    fn read<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<Vec<T>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file missing, treating as empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let items: Vec<T> = self.codec.decode(&bytes)?;
        debug!(path = %path.display(), count = items.len(), "loaded store file");
        Ok(items)
    }

    fn write<T: Serialize>(&self, path: &Path, items: &[T]) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)?;
        let bytes = self.codec.encode(items)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), count = items.len(), "wrote store file");
        Ok(())
    }
}

impl SchemaStore for FileStore {
    fn load_schemas(&self) -> StoreResult<Vec<FormSchema>> {
        self.read(&self.forms_path())
    }

    fn save_schemas(&self, schemas: &[FormSchema]) -> StoreResult<()> {
        self.write(&self.forms_path(), schemas)
    }
}

impl SubmissionLog for FileStore {
    fn load_submissions(&self) -> StoreResult<Vec<Submission>> {
        self.read(&self.submissions_path())
    }

    fn save_submissions(&self, submissions: &[Submission]) -> StoreResult<()> {
        self.write(&self.submissions_path(), submissions)
    }
}
