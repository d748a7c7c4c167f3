//! Cross-process transport for the reconnect protocol: length-prefixed
//! frames over any `tokio::io::{AsyncRead, AsyncWrite}` half, with each
//! frame's payload encoded through `byte-stream`'s synchronous
//! self-describing codec (spec §4.8: the bidirectional stream is a pair
//! of `AsyncRead`/`AsyncWrite` halves — or, for the same-process test
//! harness, a `tokio::io::duplex` pair — wrapped by that codec).
//!
//! [`crate::anticipated`] already gives the teacher/learner state
//! machines their ordering and backpressure guarantees over an
//! in-memory channel; [`pump_teacher_messages`] and [`pump_acks`] carry
//! that same traffic across a real socket by forwarding between a wire
//! half and an anticipated-channel half.

use std::io::Cursor;

use byte_stream::{ExtendedReader, ExtendedWriter};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::anticipated::{AnticipatedReceiver, AnticipatedWriter};
use crate::error::{SyncError, SyncResult};
use crate::message::{AckMessage, TeacherMessage};

/// Writes length-prefixed, self-describing frames onto an
/// `AsyncWrite` half.
pub struct WireWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> WireWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn write_teacher_message(&mut self, message: &TeacherMessage) -> SyncResult<()> {
        self.write_frame(|out| message.write_to(out)).await
    }

    pub async fn write_ack(&mut self, message: &AckMessage) -> SyncResult<()> {
        self.write_frame(|out| message.write_to(out)).await
    }

    async fn write_frame<F>(&mut self, encode: F) -> SyncResult<()>
    where
        F: FnOnce(&mut ExtendedWriter<&mut Vec<u8>>) -> byte_stream::StreamResult<()>,
    {
        let mut payload = Vec::new();
        let mut writer = ExtendedWriter::new(&mut payload);
        encode(&mut writer)?;
        self.inner.write_u32(payload.len() as u32).await?;
        self.inner.write_all(&payload).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

/// Reads length-prefixed, self-describing frames from an `AsyncRead`
/// half, mirroring [`WireWriter`].
pub struct WireReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> WireReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub async fn read_teacher_message(&mut self) -> SyncResult<TeacherMessage> {
        let payload = self.read_frame().await?;
        let mut reader = ExtendedReader::new(Cursor::new(payload));
        Ok(TeacherMessage::read_from(&mut reader)?)
    }

    pub async fn read_ack(&mut self) -> SyncResult<AckMessage> {
        let payload = self.read_frame().await?;
        let mut reader = ExtendedReader::new(Cursor::new(payload));
        Ok(AckMessage::read_from(&mut reader)?)
    }

    /// `Ok(None)` on a clean peer-initiated close (zero bytes read where
    /// a length prefix was expected); any other truncation is an error.
    async fn read_frame(&mut self) -> SyncResult<Vec<u8>> {
        let len = match self.inner.read_u32().await {
            Ok(len) => len,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(SyncError::StreamClosed)
            }
            Err(e) => return Err(SyncError::Io(e)),
        };
        let mut payload = vec![0u8; len as usize];
        self.inner.read_exact(&mut payload).await?;
        Ok(payload)
    }
}

/// Forwards every message read off `wire` into `slots`, until the wire
/// closes. Bridges a real transport into the in-memory ordering
/// [`AnticipatedWriter`] already provides to a same-process learner.
pub async fn pump_teacher_messages<R: AsyncRead + Unpin>(
    mut wire: WireReader<R>,
    mut slots: AnticipatedWriter<TeacherMessage>,
) -> SyncResult<()> {
    loop {
        match wire.read_teacher_message().await {
            Ok(message) => slots.write_next(message).await?,
            Err(SyncError::StreamClosed) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

/// The writer-side counterpart of [`pump_teacher_messages`]: drains
/// `slots` and relays each message onto `wire`.
pub async fn forward_teacher_messages<W: AsyncWrite + Unpin>(
    slots: AnticipatedReceiver<TeacherMessage>,
    mut wire: WireWriter<W>,
) -> SyncResult<()> {
    loop {
        match slots.recv_anticipated().await {
            Ok(message) => wire.write_teacher_message(&message).await?,
            Err(SyncError::StreamClosed) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

/// Forwards acks read off `wire` into `slots`, until the wire closes.
pub async fn pump_acks<R: AsyncRead + Unpin>(
    mut wire: WireReader<R>,
    mut slots: AnticipatedWriter<AckMessage>,
) -> SyncResult<()> {
    loop {
        match wire.read_ack().await {
            Ok(message) => slots.write_next(message).await?,
            Err(SyncError::StreamClosed) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

/// The writer-side counterpart of [`pump_acks`].
pub async fn forward_acks<W: AsyncWrite + Unpin>(
    slots: AnticipatedReceiver<AckMessage>,
    mut wire: WireWriter<W>,
) -> SyncResult<()> {
    loop {
        match slots.recv_anticipated().await {
            Ok(message) => wire.write_ack(&message).await?,
            Err(SyncError::StreamClosed) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anticipated::anticipated_channel;
    use crate::message::NodeQuery;
    use byte_stream::Digest384;

    #[tokio::test]
    async fn teacher_message_round_trips_over_a_duplex_pair() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = WireWriter::new(client);
        let mut reader = WireReader::new(server);

        let message = TeacherMessage::Query(NodeQuery {
            class_id: 7,
            version: 1,
            hash: Digest384::from_bytes([4u8; 48]),
        });
        writer.write_teacher_message(&message).await.unwrap();
        let decoded = reader.read_teacher_message().await.unwrap();
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn closing_the_wire_surfaces_as_stream_closed() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut reader = WireReader::new(server);
        assert!(matches!(
            reader.read_teacher_message().await,
            Err(SyncError::StreamClosed)
        ));
    }

    #[tokio::test]
    async fn pump_and_forward_bridge_a_duplex_pair_into_anticipated_channels() {
        let (client, server) = tokio::io::duplex(4096);

        let (node_reader, node_writer) = anticipated_channel::<TeacherMessage>(4);
        let pump = tokio::spawn(pump_teacher_messages(WireReader::new(server), node_writer));

        let message = TeacherMessage::Query(NodeQuery {
            class_id: 3,
            version: 1,
            hash: Digest384::from_bytes([9u8; 48]),
        });
        let mut wire_writer = WireWriter::new(client);
        wire_writer.write_teacher_message(&message).await.unwrap();

        let received = node_reader.recv_anticipated().await.unwrap();
        assert_eq!(received, message);

        drop(wire_writer);
        pump.await.unwrap().unwrap();
    }
}
