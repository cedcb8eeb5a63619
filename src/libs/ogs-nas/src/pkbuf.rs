//! Packet buffer with reserved headroom
//!
//! ```text
//! |<-- headroom -->|<-- data (len) -->|
//! 0                data               storage.len()
//! ```
//!
//! Payload is appended at the tail; the security layer later prepends its
//! header into the headroom with [`NasBuffer::push`], which never moves the
//! payload.

use bytes::Bytes;

use crate::error::{NasError, NasResult};

/// Headroom reserved in front of every NAS payload: security header type +
/// PD (1), MAC (4), sequence number (1), with slack for S1AP framing.
pub const NAS_HEADROOM: usize = 16;

#[derive(Clone, PartialEq, Eq)]
pub struct NasBuffer {
    storage: Vec<u8>,
    data: usize,
}

impl NasBuffer {
    /// Empty buffer with `headroom` bytes reserved up front.
    pub fn with_headroom(headroom: usize, capacity: usize) -> Self {
        let mut storage = Vec::with_capacity(headroom + capacity);
        storage.resize(headroom, 0);
        Self { storage, data: headroom }
    }

    /// Copy `payload` into a fresh buffer with the standard NAS headroom.
    pub fn copy_from(payload: &[u8]) -> Self {
        let mut buf = Self::with_headroom(NAS_HEADROOM, payload.len());
        buf.put_data(payload);
        buf
    }

    #[inline]
    pub fn headroom(&self) -> usize {
        self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len() - self.data
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn put_u8(&mut self, val: u8) {
        self.storage.push(val);
    }

    #[inline]
    pub fn put_u16(&mut self, val: u16) {
        self.storage.extend_from_slice(&val.to_be_bytes());
    }

    #[inline]
    pub fn put_u32(&mut self, val: u32) {
        self.storage.extend_from_slice(&val.to_be_bytes());
    }

    #[inline]
    pub fn put_data(&mut self, data: &[u8]) {
        self.storage.extend_from_slice(data);
    }

    /// Claim `len` bytes of headroom and return them for writing.
    pub fn push(&mut self, len: usize) -> NasResult<&mut [u8]> {
        if len > self.data {
            return Err(NasError::HeadroomExhausted { needed: len, available: self.data });
        }
        self.data -= len;
        Ok(&mut self.storage[self.data..self.data + len])
    }

    /// Give back `len` bytes from the front of the data region.
    pub fn pull(&mut self, len: usize) -> Option<&[u8]> {
        if len > self.len() {
            return None;
        }
        let old = self.data;
        self.data += len;
        Some(&self.storage[old..self.data])
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.storage[self.data..]
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.data..]
    }

    /// Freeze the data region; the headroom is dropped.
    pub fn freeze(self) -> Bytes {
        let data = self.data;
        Bytes::from(self.storage).slice(data..)
    }
}

impl std::fmt::Debug for NasBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NasBuffer")
            .field("headroom", &self.headroom())
            .field("len", &self.len())
            .finish()
    }
}
