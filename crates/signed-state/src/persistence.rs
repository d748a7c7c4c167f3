//! On-disk layout for a tracked signed state (spec §6's "persisted state
//! layout"): a directory holding `state.bin` — round, hash, completion
//! flag, and attached signatures, through the self-describing stream —
//! plus an optional external-data locator when the caller already wrote
//! a large payload into the same directory via
//! [`byte_stream::ExternalSelfSerializable`].

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use byte_stream::{Digest384, ExtendedReader, ExtendedWriter, ExternalLocator, StreamResult};

use crate::address_book::{AddressBook, NodeId};
use crate::signature::Signature;
use crate::state::SignedState;

const STATE_FILE_NAME: &str = "state.bin";

fn write_byte_vec<W: std::io::Write>(
    writer: &mut ExtendedWriter<W>,
    bytes: &[u8],
) -> StreamResult<()> {
    writer.write_i32(bytes.len() as i32)?;
    writer.write_raw_bytes(bytes)
}

fn read_byte_vec<R: std::io::Read>(reader: &mut ExtendedReader<R>) -> StreamResult<Vec<u8>> {
    let len = reader.read_i32()?;
    reader.read_raw_bytes(len as usize)
}

/// Writes a [`SignedState`]'s primary stream into `dir/state.bin`,
/// creating `dir` if needed.
pub struct StateWriter;

impl StateWriter {
    /// `external` is `Some((locator, hash))` when the caller already
    /// serialized a large payload into `dir` through
    /// [`byte_stream::ExternalSelfSerializable::serialize_external`];
    /// only the locator and hash are recorded here, never the payload
    /// bytes themselves.
    pub fn write(
        state: &SignedState,
        external: Option<(&ExternalLocator, Digest384)>,
        dir: &Path,
    ) -> StreamResult<()> {
        fs::create_dir_all(dir)?;

        let mut buf = Vec::new();
        {
            let mut writer = ExtendedWriter::new(&mut buf);
            writer.write_i64(state.round())?;
            writer.write_raw_bytes(state.hash().as_bytes())?;
            writer.write_bool(state.is_complete())?;

            let signatures = state.signatures();
            writer.write_i32(signatures.len() as i32)?;
            for (node_id, signature) in &signatures {
                writer.write_i64(node_id.0 as i64)?;
                write_byte_vec(&mut writer, &signature.signer_key)?;
                write_byte_vec(&mut writer, &signature.bytes)?;
            }

            match external {
                None => writer.write_bool(false)?,
                Some((locator, hash)) => {
                    writer.write_bool(true)?;
                    writer.write_nullable_string(Some(&locator.0))?;
                    writer.write_raw_bytes(hash.as_bytes())?;
                }
            }
        }

        fs::write(dir.join(STATE_FILE_NAME), buf)?;
        Ok(())
    }
}

/// Reads a [`SignedState`] back from `dir/state.bin`, re-verifying and
/// re-attaching every persisted signature against `address_book` (the
/// book itself is never persisted — it's supplied by whatever process
/// already loaded the network's membership).
pub struct StateReader;

impl StateReader {
    pub fn read(
        dir: &Path,
        address_book: Arc<AddressBook>,
    ) -> StreamResult<(Arc<SignedState>, Option<(ExternalLocator, Digest384)>)> {
        let bytes = fs::read(dir.join(STATE_FILE_NAME))?;
        let mut reader = ExtendedReader::new(Cursor::new(bytes));

        let round = reader.read_i64()?;
        let hash_bytes = reader.read_raw_bytes(48)?;
        let mut hash_array = [0u8; 48];
        hash_array.copy_from_slice(&hash_bytes);
        let hash = Digest384::from_bytes(hash_array);
        let was_complete = reader.read_bool()?;

        let state = Arc::new(SignedState::new(round, hash, address_book));

        let signer_count = reader.read_i32()?;
        for _ in 0..signer_count {
            let node_id = NodeId(reader.read_i64()? as u64);
            let signer_key = read_byte_vec(&mut reader)?;
            let bytes = read_byte_vec(&mut reader)?;
            state.attach_signature(node_id, Signature { signer_key, bytes });
        }
        if was_complete {
            state.mark_complete();
        }

        let external = if reader.read_bool()? {
            let locator = reader.read_nullable_string()?.expect("locator string present");
            let hash_bytes = reader.read_raw_bytes(48)?;
            let mut hash_array = [0u8; 48];
            hash_array.copy_from_slice(&hash_bytes);
            Some((ExternalLocator(locator), Digest384::from_bytes(hash_array)))
        } else {
            None
        };

        Ok((state, external))
    }
}
