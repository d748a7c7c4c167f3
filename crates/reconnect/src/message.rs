use std::io::{Read, Write};

use byte_stream::{Digest384, ExtendedReader, ExtendedWriter, StreamResult};

/// Header-only probe for one node: enough for the learner to decide
/// have/miss without the teacher committing to a full payload send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeQuery {
    pub class_id: i64,
    pub version: i32,
    pub hash: Digest384,
}

impl NodeQuery {
    pub fn write_to<W: Write>(&self, out: &mut ExtendedWriter<W>) -> StreamResult<()> {
        out.write_i64(self.class_id)?;
        out.write_i32(self.version)?;
        out.write_raw_bytes(self.hash.as_bytes())
    }

    pub fn read_from<R: Read>(input: &mut ExtendedReader<R>) -> StreamResult<Self> {
        let class_id = input.read_i64()?;
        let version = input.read_i32()?;
        let hash = read_hash(input)?;
        Ok(Self {
            class_id,
            version,
            hash,
        })
    }
}

/// The full node payload, sent only once the teacher has decided the
/// node needs to actually cross the wire (§4.8 "READY_TO_SEND").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSend {
    pub class_id: i64,
    pub version: i32,
    pub hash: Digest384,
    pub num_children: u32,
    pub payload: Vec<u8>,
}

impl NodeSend {
    pub fn write_to<W: Write>(&self, out: &mut ExtendedWriter<W>) -> StreamResult<()> {
        out.write_i64(self.class_id)?;
        out.write_i32(self.version)?;
        out.write_raw_bytes(self.hash.as_bytes())?;
        out.write_i32(self.num_children as i32)?;
        out.write_i32(self.payload.len() as i32)?;
        out.write_raw_bytes(&self.payload)
    }

    pub fn read_from<R: Read>(input: &mut ExtendedReader<R>) -> StreamResult<Self> {
        let class_id = input.read_i64()?;
        let version = input.read_i32()?;
        let hash = read_hash(input)?;
        let num_children = input.read_i32()? as u32;
        let payload_len = input.read_i32()? as usize;
        let payload = input.read_raw_bytes(payload_len)?;
        Ok(Self {
            class_id,
            version,
            hash,
            num_children,
            payload,
        })
    }
}

/// One message the teacher writes to the learner over the node channel:
/// always a [`NodeQuery`] first, then a [`NodeSend`] only if the learner
/// acked miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeacherMessage {
    Query(NodeQuery),
    Send(NodeSend),
}

impl TeacherMessage {
    pub fn write_to<W: Write>(&self, out: &mut ExtendedWriter<W>) -> StreamResult<()> {
        match self {
            TeacherMessage::Query(query) => {
                out.write_bool(true)?;
                query.write_to(out)
            }
            TeacherMessage::Send(send) => {
                out.write_bool(false)?;
                send.write_to(out)
            }
        }
    }

    pub fn read_from<R: Read>(input: &mut ExtendedReader<R>) -> StreamResult<Self> {
        if input.read_bool()? {
            Ok(TeacherMessage::Query(NodeQuery::read_from(input)?))
        } else {
            Ok(TeacherMessage::Send(NodeSend::read_from(input)?))
        }
    }
}

/// The learner's reply to one [`NodeQuery`]: whether it already has an
/// identical node at the corresponding path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckMessage {
    pub have: bool,
}

impl AckMessage {
    pub fn write_to<W: Write>(&self, out: &mut ExtendedWriter<W>) -> StreamResult<()> {
        out.write_bool(self.have)
    }

    pub fn read_from<R: Read>(input: &mut ExtendedReader<R>) -> StreamResult<Self> {
        Ok(Self {
            have: input.read_bool()?,
        })
    }
}

fn read_hash<R: Read>(input: &mut ExtendedReader<R>) -> StreamResult<Digest384> {
    let bytes = input.read_raw_bytes(48)?;
    let mut arr = [0u8; 48];
    arr.copy_from_slice(&bytes);
    Ok(Digest384::from_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn node_query_round_trips() {
        let query = NodeQuery {
            class_id: 42,
            version: 1,
            hash: Digest384::from_bytes([7u8; 48]),
        };
        let mut buf = Vec::new();
        query.write_to(&mut ExtendedWriter::new(&mut buf)).unwrap();
        let decoded = NodeQuery::read_from(&mut ExtendedReader::new(Cursor::new(buf))).unwrap();
        assert_eq!(decoded, query);
    }

    #[test]
    fn node_send_round_trips_with_payload() {
        let send = NodeSend {
            class_id: 42,
            version: 1,
            hash: Digest384::from_bytes([9u8; 48]),
            num_children: 2,
            payload: b"leaf-bytes".to_vec(),
        };
        let mut buf = Vec::new();
        send.write_to(&mut ExtendedWriter::new(&mut buf)).unwrap();
        let decoded = NodeSend::read_from(&mut ExtendedReader::new(Cursor::new(buf))).unwrap();
        assert_eq!(decoded, send);
    }

    #[test]
    fn ack_message_round_trips() {
        for have in [true, false] {
            let mut buf = Vec::new();
            AckMessage { have }
                .write_to(&mut ExtendedWriter::new(&mut buf))
                .unwrap();
            let decoded = AckMessage::read_from(&mut ExtendedReader::new(Cursor::new(buf))).unwrap();
            assert_eq!(decoded.have, have);
        }
    }

    #[test]
    fn teacher_message_round_trips_both_variants() {
        let query = TeacherMessage::Query(NodeQuery {
            class_id: 1,
            version: 1,
            hash: Digest384::from_bytes([1u8; 48]),
        });
        let mut buf = Vec::new();
        query.write_to(&mut ExtendedWriter::new(&mut buf)).unwrap();
        let decoded = TeacherMessage::read_from(&mut ExtendedReader::new(Cursor::new(buf))).unwrap();
        assert_eq!(decoded, query);

        let send = TeacherMessage::Send(NodeSend {
            class_id: -1,
            version: 1,
            hash: Digest384::from_bytes([2u8; 48]),
            num_children: 0,
            payload: b"leaf".to_vec(),
        });
        let mut buf = Vec::new();
        send.write_to(&mut ExtendedWriter::new(&mut buf)).unwrap();
        let decoded = TeacherMessage::read_from(&mut ExtendedReader::new(Cursor::new(buf))).unwrap();
        assert_eq!(decoded, send);
    }
}
