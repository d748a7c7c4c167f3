//! Extension point for self-describing objects that carry a payload too
//! large to embed in the primary stream: the primary stream keeps only
//! the payload's hash and a locator sufficient to reload it, per the
//! persisted-state layout's external-data directory (spec §6).

use std::fs;
use std::path::Path;

use crate::digest::Digest384;
use crate::error::StreamResult;

/// Sufficient information to reload an externally-serialized payload
/// from its owning directory. A bare relative file name; the directory
/// itself is supplied by the caller at read time, the same way the
/// primary stream's own location is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLocator(pub String);

/// A payload stored outside the primary self-describing stream.
/// Implementors write themselves into `dir` and hand back a locator
/// plus content hash; the primary stream records only those two
/// values, not the payload bytes. Per spec §6, "the cached hash is
/// only to be trusted when the storage medium is physically/digitally
/// secured" — callers that need tamper-evidence must verify the hash
/// themselves after `deserialize_external`, this trait does not do so.
pub trait ExternalSelfSerializable: Sized {
    fn serialize_external(&self, dir: &Path) -> StreamResult<(ExternalLocator, Digest384)>;
    fn deserialize_external(locator: &ExternalLocator, dir: &Path) -> StreamResult<Self>;
}

/// A payload stored verbatim as a single file: the simplest possible
/// [`ExternalSelfSerializable`], useful both as a worked example and as
/// a default for callers with no richer external format of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBlob {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExternalSelfSerializable for ExternalBlob {
    fn serialize_external(&self, dir: &Path) -> StreamResult<(ExternalLocator, Digest384)> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(&self.file_name), &self.bytes)?;
        let hash = Digest384::of_parts([self.bytes.as_slice()]);
        Ok((ExternalLocator(self.file_name.clone()), hash))
    }

    fn deserialize_external(locator: &ExternalLocator, dir: &Path) -> StreamResult<Self> {
        let bytes = fs::read(dir.join(&locator.0))?;
        Ok(ExternalBlob {
            file_name: locator.0.clone(),
            bytes,
        })
    }
}
