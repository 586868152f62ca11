//! Lowercase hex encoding for digests, serials and fingerprints.

use crate::error::{Error, Result};

/// Length of the hex encoding of `len` bytes.
///
/// Returns `None` for a negative length or when doubling it overflows.
pub fn hex_len(len: isize) -> Option<isize> {
    if len < 0 {
        return None;
    }
    len.checked_mul(2)
}

/// Encode `buf` as lowercase hex, high nibble first.
///
/// The length is validated before anything is allocated, and the output
/// buffer is reserved fallibly so an allocation failure is reported instead
/// of aborting.
pub fn string_to_hex(buf: &[u8]) -> Result<String> {
    let len = isize::try_from(buf.len())
        .ok()
        .and_then(hex_len)
        .ok_or(Error::HexLength)?;

    let mut out = Vec::new();
    out.try_reserve_exact(len as usize)?;
    out.resize(len as usize, 0);
    ::hex::encode_to_slice(buf, &mut out).map_err(|_| Error::HexLength)?;
    String::from_utf8(out).map_err(|_| Error::HexLength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode(hex: &str) -> Vec<u8> {
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(string_to_hex(b"").unwrap(), "");
        assert_eq!(string_to_hex(&[0x00, 0x0f, 0xf0, 0xff]).unwrap(), "000ff0ff");
        assert_eq!(string_to_hex(b"OSSL").unwrap(), "4f53534c");
    }

    #[test]
    fn test_hex_len_rejects_negative_and_overflow() {
        assert_eq!(hex_len(0), Some(0));
        assert_eq!(hex_len(21), Some(42));
        assert_eq!(hex_len(-1), None);
        assert_eq!(hex_len(isize::MAX), None);
        assert_eq!(hex_len(isize::MAX / 2 + 1), None);
        assert_eq!(hex_len(isize::MAX / 2), Some(isize::MAX - 1));
    }

    proptest! {
        #[test]
        fn hex_roundtrip(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let hex = string_to_hex(&data).unwrap();
            prop_assert_eq!(hex.len(), data.len() * 2);
            prop_assert!(hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
            prop_assert_eq!(decode(&hex), data.clone());
            prop_assert_eq!(hex, ::hex::encode(&data));
        }
    }
}
