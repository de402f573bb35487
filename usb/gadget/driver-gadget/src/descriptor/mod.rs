//! Standard USB descriptors, as the device serializes them onto the wire.
//!
//! Descriptors are plain field records with a `const fn write` that appends their exact
//! wire bytes to a [`DescriptorWriter`]. Lengths are derived from the fields rather than
//! from a packed struct layout, so a whole descriptor blob can be assembled and checked
//! in a `const` item. Class-specific records follow the same shape in the crates that
//! define them.

pub use self::config::{
    ConfigDescriptor, InterfaceAssociationDescriptor, CONFIG_ATTR_BUS_POWERED,
    CONFIG_ATTR_REMOTE_WAKEUP, CONFIG_ATTR_SELF_POWERED,
};
pub use self::device::DeviceDescriptor;
pub use self::endpoint::{EndpointDescriptor, ENDPOINT_DIR_IN};
pub use self::interface::InterfaceDescriptor;
pub use self::string::{encode_langids, encode_string, string_descriptor_len, LANGID_EN_US};

/// Descriptor types a full-speed device deals with (USB2 Table 9-5, plus the
/// interface association type from the IAD ECN).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum DescriptorKind {
    Device = 1,
    Configuration = 2,
    String = 3,
    Interface = 4,
    Endpoint = 5,
    /// Only returned by high-speed capable devices; a full-speed device stalls it.
    DeviceQualifier = 6,
    OtherSpeedConfiguration = 7,
    InterfacePower = 8,
    InterfaceAssociation = 11,
}

impl DescriptorKind {
    pub fn from_u8(kind: u8) -> Option<Self> {
        Some(match kind {
            1 => Self::Device,
            2 => Self::Configuration,
            3 => Self::String,
            4 => Self::Interface,
            5 => Self::Endpoint,
            6 => Self::DeviceQualifier,
            7 => Self::OtherSpeedConfiguration,
            8 => Self::InterfacePower,
            11 => Self::InterfaceAssociation,
            _ => return None,
        })
    }
}

/// Fixed-capacity byte sink usable in `const` evaluation.
///
/// Every method takes and returns the writer by value so that descriptor encoders can
/// run at compile time. [`DescriptorWriter::finish`] fails the build when the encoded
/// length differs from the capacity the caller computed up front.
pub struct DescriptorWriter<const N: usize> {
    buf: [u8; N],
    pos: usize,
}

impl<const N: usize> DescriptorWriter<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            pos: 0,
        }
    }

    pub const fn position(&self) -> usize {
        self.pos
    }

    pub const fn byte(mut self, byte: u8) -> Self {
        assert!(self.pos < N, "descriptor overflows its buffer");
        self.buf[self.pos] = byte;
        self.pos += 1;
        self
    }

    pub const fn word(self, word: u16) -> Self {
        let bytes = word.to_le_bytes();
        self.byte(bytes[0]).byte(bytes[1])
    }

    pub const fn dword(self, dword: u32) -> Self {
        let bytes = dword.to_le_bytes();
        self.byte(bytes[0])
            .byte(bytes[1])
            .byte(bytes[2])
            .byte(bytes[3])
    }

    pub const fn bytes(mut self, bytes: &[u8]) -> Self {
        let mut i = 0;
        while i < bytes.len() {
            self = self.byte(bytes[i]);
            i += 1;
        }
        self
    }

    pub const fn finish(self) -> [u8; N] {
        assert!(self.pos == N, "descriptor is shorter than its declared length");
        self.buf
    }
}

/// Bounds a descriptor reply by what the host asked for.
///
/// The host's wLength is only an upper bound; the reply never extends past the
/// descriptor itself.
pub fn descriptor_data(descriptor: &'static [u8], requested: u16) -> &'static [u8] {
    let len = descriptor.len().min(usize::from(requested));
    &descriptor[..len]
}

/// Walks a buffer of concatenated descriptors, yielding `(bLength, bDescriptorType, bytes)`.
///
/// Iteration stops at the first record whose bLength is zero or runs past the buffer.
pub struct DescriptorIter<'a> {
    bytes: &'a [u8],
}

impl<'a> DescriptorIter<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl<'a> From<&'a [u8]> for DescriptorIter<'a> {
    fn from(slice: &'a [u8]) -> Self {
        Self::new(slice)
    }
}

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = (u8, u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, rest) = self.bytes.split_first()?;
        let &kind = rest.first()?;
        if len < 2 || len as usize > self.bytes.len() {
            return None;
        }
        let (desc, rest) = self.bytes.split_at(len as usize);
        self.bytes = rest;
        Some((len, kind, desc))
    }
}

pub(crate) mod config;
pub(crate) mod device;
pub(crate) mod endpoint;
pub(crate) mod interface;
pub(crate) mod string;

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODED: [u8; 7] = DescriptorWriter::<7>::new()
        .byte(7)
        .word(0x1234)
        .dword(0xAABB_CCDD)
        .finish();

    #[test]
    fn writer_is_little_endian() {
        assert_eq!(ENCODED, [7, 0x34, 0x12, 0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn clamps_to_request() {
        static DESC: [u8; 4] = [4, 3, 0x09, 0x04];
        assert_eq!(descriptor_data(&DESC, 2), &DESC[..2]);
        assert_eq!(descriptor_data(&DESC, 0xFFFF), &DESC[..]);
        assert!(descriptor_data(&DESC, 0).is_empty());
    }

    #[test]
    fn iter_stops_on_truncated_record() {
        let bytes = [2, 1, 4, 5, 0];
        let records: Vec<_> = DescriptorIter::new(&bytes).collect();
        assert_eq!(records, vec![(2, 1, &bytes[..2])]);
    }
}
