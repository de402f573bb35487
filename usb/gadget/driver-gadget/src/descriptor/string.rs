use super::{DescriptorKind, DescriptorWriter};

pub const LANGID_EN_US: u16 = 0x0409;

/// Wire length of the string descriptor for an ASCII string.
pub const fn string_descriptor_len(s: &str) -> usize {
    2 + 2 * s.len()
}

/// UTF-16LE string descriptor. Only ASCII input is accepted, which keeps the
/// length a function of `s.len()`.
pub const fn encode_string<const N: usize>(s: &str) -> [u8; N] {
    let bytes = s.as_bytes();
    assert!(N == string_descriptor_len(s), "string descriptor length mismatch");
    assert!(N <= u8::MAX as usize, "string descriptor too long");

    let mut w = DescriptorWriter::<N>::new()
        .byte(N as u8)
        .byte(DescriptorKind::String as u8);
    let mut i = 0;
    while i < bytes.len() {
        assert!(bytes[i].is_ascii(), "string descriptors must be ASCII");
        w = w.word(bytes[i] as u16);
        i += 1;
    }
    w.finish()
}

/// String descriptor zero: the list of supported language IDs.
pub const fn encode_langids<const N: usize>(langids: &[u16]) -> [u8; N] {
    assert!(N == 2 + 2 * langids.len(), "language table length mismatch");

    let mut w = DescriptorWriter::<N>::new()
        .byte(N as u8)
        .byte(DescriptorKind::String as u8);
    let mut i = 0;
    while i < langids.len() {
        w = w.word(langids[i]);
        i += 1;
    }
    w.finish()
}

/// Builds a `&'static [u8]` string descriptor at compile time.
#[macro_export]
macro_rules! string_descriptor {
    ($s:expr) => {{
        const S: &str = $s;
        const ARR: [u8; $crate::descriptor::string_descriptor_len(S)] =
            $crate::descriptor::encode_string(S);
        &ARR
    }};
}

/// Builds string descriptor zero from a list of language IDs.
#[macro_export]
macro_rules! langid_descriptor {
    ($($langid:expr),+ $(,)?) => {{
        const IDS: &[u16] = &[$($langid),+];
        const ARR: [u8; 2 + 2 * IDS.len()] = $crate::descriptor::encode_langids(IDS);
        &ARR
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_to_utf16() {
        let desc: &[u8] = crate::string_descriptor!("Maple");
        assert_eq!(desc, &[12, 3, b'M', 0, b'a', 0, b'p', 0, b'l', 0, b'e', 0][..]);
    }

    #[test]
    fn language_table() {
        let desc: &[u8] = crate::langid_descriptor!(LANGID_EN_US);
        assert_eq!(desc, &[4, 3, 0x09, 0x04][..]);
    }
}
