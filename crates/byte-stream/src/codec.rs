//! Deterministic, self-describing typed encoding built atop any
//! `Read`/`Write`: primitive widths, nullable collections, NFD-normalized
//! strings, instants, and `(class_id, version, payload)` headers for
//! self-serializable objects, with an optional per-stream debug trailing
//! flag for out-of-band corruption detection.

use crate::error::{StreamError, StreamResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use unicode_normalization::UnicodeNormalization;

/// Sentinel marking a null nullable-collection length.
pub const NULL_LENGTH: i32 = -1;
/// Sentinel marking a null class-id (object entirely absent).
pub const NULL_CLASS_ID: i64 = i64::MIN;
/// Sentinel marking a null version (class-id already known from context).
pub const NULL_VERSION: i32 = i32::MIN;
/// Sentinel marking a null instant.
pub const NULL_EPOCH_SECOND: i64 = i64::MIN;

/// An object that can write and reconstruct itself through the self-describing
/// encoding: `(class_id: i64, version: i32, payload)`.
pub trait SelfDescribe: Sized {
    /// Stable identifier for this type, written ahead of every instance.
    fn class_id() -> i64;

    /// Serialization version of `self`; may vary across instances of the
    /// same type as the on-wire format evolves.
    fn class_version(&self) -> i32;

    fn write_payload<W: Write>(&self, out: &mut ExtendedWriter<W>) -> StreamResult<()>;

    fn read_payload<R: Read>(input: &mut ExtendedReader<R>, version: i32) -> StreamResult<Self>;
}

/// A point in time, encoded as `(epoch_second, nano)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instant {
    pub epoch_second: i64,
    pub nano: i64,
}

/// Writer half of the encoding. `debug` gates the trailing corruption-check
/// flag; streams written in debug mode are not interchangeable with streams
/// written without it (spec §4.1).
pub struct ExtendedWriter<W> {
    inner: W,
    debug: bool,
}

impl<W: Write> ExtendedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            debug: false,
        }
    }

    pub fn with_debug(inner: W, debug: bool) -> Self {
        Self { inner, debug }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_bool(&mut self, value: bool) -> StreamResult<()> {
        self.inner.write_u8(value as u8)?;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> StreamResult<()> {
        self.inner.write_i32::<BigEndian>(value)?;
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> StreamResult<()> {
        self.inner.write_i64::<BigEndian>(value)?;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> StreamResult<()> {
        self.inner.write_f32::<BigEndian>(value)?;
        Ok(())
    }

    pub fn write_f64(&mut self, value: f64) -> StreamResult<()> {
        self.inner.write_f64::<BigEndian>(value)?;
        Ok(())
    }

    pub fn write_raw_bytes(&mut self, bytes: &[u8]) -> StreamResult<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// Length-prefixed, NFD-normalized UTF-8 string. `None` writes the null
    /// length sentinel.
    pub fn write_nullable_string(&mut self, value: Option<&str>) -> StreamResult<()> {
        match value {
            None => self.write_i32(NULL_LENGTH),
            Some(s) => {
                let normalized: String = s.nfd().collect();
                let bytes = normalized.into_bytes();
                self.write_i32(bytes.len() as i32)?;
                self.write_raw_bytes(&bytes)
            }
        }
    }

    pub fn write_nullable_instant(&mut self, value: Option<Instant>) -> StreamResult<()> {
        match value {
            None => self.write_i64(NULL_EPOCH_SECOND),
            Some(instant) => {
                self.write_i64(instant.epoch_second)?;
                self.write_i64(instant.nano)
            }
        }
    }

    /// Writes `(class_id, version, payload)`, or just `class_id = NULL_CLASS_ID`
    /// when `value` is absent.
    pub fn write_self_describing<T: SelfDescribe>(
        &mut self,
        value: Option<&T>,
    ) -> StreamResult<()> {
        match value {
            None => self.write_i64(NULL_CLASS_ID),
            Some(obj) => {
                self.write_i64(T::class_id())?;
                self.write_i32(obj.class_version())?;
                obj.write_payload(self)?;
                if self.debug {
                    self.write_i64(-T::class_id())?;
                }
                Ok(())
            }
        }
    }

    /// Writes just `(version, payload)` for contexts where the class-id has
    /// already been written (homogeneous lists). `None` writes the null
    /// version sentinel.
    pub fn write_self_describing_known_class<T: SelfDescribe>(
        &mut self,
        value: Option<&T>,
    ) -> StreamResult<()> {
        match value {
            None => self.write_i32(NULL_VERSION),
            Some(obj) => {
                self.write_i32(obj.class_version())?;
                obj.write_payload(self)?;
                if self.debug {
                    self.write_i64(-T::class_id())?;
                }
                Ok(())
            }
        }
    }

    /// Writes a list with the homogeneous-class optimization: a single class
    /// header, then `(is_null, payload)` pairs carrying a shared `version`.
    /// `None` writes the null-length sentinel and nothing else.
    pub fn write_homogeneous_list<T: SelfDescribe>(
        &mut self,
        version: i32,
        items: Option<&[Option<T>]>,
    ) -> StreamResult<()> {
        match items {
            None => self.write_i32(NULL_LENGTH),
            Some(items) => {
                self.write_i32(items.len() as i32)?;
                self.write_bool(true)?;
                self.write_i64(T::class_id())?;
                self.write_i32(version)?;
                for item in items {
                    match item {
                        None => self.write_bool(true)?,
                        Some(obj) => {
                            self.write_bool(false)?;
                            obj.write_payload(self)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Writes a list without the homogeneous optimization: each element is
    /// fully self-describing.
    pub fn write_heterogeneous_list<T: SelfDescribe>(
        &mut self,
        items: Option<&[Option<T>]>,
    ) -> StreamResult<()> {
        match items {
            None => self.write_i32(NULL_LENGTH),
            Some(items) => {
                self.write_i32(items.len() as i32)?;
                self.write_bool(false)?;
                for item in items {
                    self.write_self_describing(item.as_ref())?;
                }
                Ok(())
            }
        }
    }
}

/// Reader half of the encoding, mirroring [`ExtendedWriter`].
pub struct ExtendedReader<R> {
    inner: R,
    debug: bool,
}

impl<R: Read> ExtendedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            debug: false,
        }
    }

    pub fn with_debug(inner: R, debug: bool) -> Self {
        Self { inner, debug }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn read_bool(&mut self) -> StreamResult<bool> {
        Ok(self.inner.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> StreamResult<i32> {
        Ok(self.inner.read_i32::<BigEndian>()?)
    }

    pub fn read_i64(&mut self) -> StreamResult<i64> {
        Ok(self.inner.read_i64::<BigEndian>()?)
    }

    pub fn read_f32(&mut self) -> StreamResult<f32> {
        Ok(self.inner.read_f32::<BigEndian>()?)
    }

    pub fn read_f64(&mut self) -> StreamResult<f64> {
        Ok(self.inner.read_f64::<BigEndian>()?)
    }

    pub fn read_raw_bytes(&mut self, len: usize) -> StreamResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_nullable_string(&mut self) -> StreamResult<Option<String>> {
        let len = self.read_i32()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        if len < 0 {
            return Err(StreamError::DanglingLength {
                length: len,
                context: "string",
            });
        }
        let bytes = self.read_raw_bytes(len as usize)?;
        let s = String::from_utf8(bytes).map_err(|_| StreamError::InvalidUtf8 {
            context: "string",
        })?;
        Ok(Some(s))
    }

    pub fn read_nullable_instant(&mut self) -> StreamResult<Option<Instant>> {
        let epoch_second = self.read_i64()?;
        if epoch_second == NULL_EPOCH_SECOND {
            return Ok(None);
        }
        let nano = self.read_i64()?;
        Ok(Some(Instant { epoch_second, nano }))
    }

    fn check_debug_flag(&mut self, class_id: i64) -> StreamResult<()> {
        if self.debug {
            let flag = self.read_i64()?;
            if flag != -class_id {
                return Err(StreamError::DebugFlagMismatch {
                    context: "self-describing payload",
                    expected: -class_id,
                    found: flag,
                });
            }
        }
        Ok(())
    }

    pub fn read_self_describing<T: SelfDescribe>(&mut self) -> StreamResult<Option<T>> {
        let class_id = self.read_i64()?;
        if class_id == NULL_CLASS_ID {
            return Ok(None);
        }
        if class_id != T::class_id() {
            return Err(StreamError::ClassIdMismatch {
                context: "self-describing object",
                expected: T::class_id(),
                found: class_id,
            });
        }
        let version = self.read_i32()?;
        let obj = T::read_payload(self, version)?;
        self.check_debug_flag(class_id)?;
        Ok(Some(obj))
    }

    pub fn read_self_describing_known_class<T: SelfDescribe>(&mut self) -> StreamResult<Option<T>> {
        let version = self.read_i32()?;
        if version == NULL_VERSION {
            return Ok(None);
        }
        let obj = T::read_payload(self, version)?;
        self.check_debug_flag(T::class_id())?;
        Ok(Some(obj))
    }

    /// Reads a list written by either [`ExtendedWriter::write_homogeneous_list`]
    /// or [`ExtendedWriter::write_heterogeneous_list`]; the `all_same` flag on
    /// the wire tells this side which branch to take.
    pub fn read_list<T: SelfDescribe>(&mut self) -> StreamResult<Option<Vec<Option<T>>>> {
        let len = self.read_i32()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        if len < 0 {
            return Err(StreamError::DanglingLength {
                length: len,
                context: "list",
            });
        }
        let len = len as usize;
        let all_same = self.read_bool()?;
        if all_same {
            let class_id = self.read_i64()?;
            if class_id != T::class_id() {
                return Err(StreamError::ClassIdMismatch {
                    context: "homogeneous list",
                    expected: T::class_id(),
                    found: class_id,
                });
            }
            let version = self.read_i32()?;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                let is_null = self.read_bool()?;
                if is_null {
                    items.push(None);
                } else {
                    let obj = T::read_payload(self, version)?;
                    self.check_debug_flag(class_id)?;
                    items.push(Some(obj));
                }
            }
            Ok(Some(items))
        } else {
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(self.read_self_describing::<T>()?);
            }
            Ok(Some(items))
        }
    }
}
