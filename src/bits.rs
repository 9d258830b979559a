//! LSB-first iteration over bytes, the JTAG serial order.

use std::fmt;

/// Iterator over the bits of a byte slice, least significant bit of each byte first.
#[derive(Clone)]
pub struct BitIter<'a> {
    buf: &'a [u8],
    index: usize,
    len: usize,
}

impl<'a> BitIter<'a> {
    /// Iterates over the first `len` bits of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if `buf` holds fewer than `len` bits.
    pub(crate) fn new(buf: &'a [u8], len: usize) -> Self {
        assert!(
            buf.len() * 8 >= len,
            "{} bits requested from a {}-byte buffer",
            len,
            buf.len()
        );
        Self { buf, index: 0, len }
    }
}

impl Iterator for BitIter<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        if self.index == self.len {
            return None;
        }

        let byte = self.buf[self.index / 8];
        let bit = (byte >> (self.index % 8)) & 1 != 0;
        self.index += 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for BitIter<'_> {}

impl fmt::Debug for BitIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Print the remaining bits as a 0/1 string
        let s: String = self.clone().map(|bit| if bit { '1' } else { '0' }).collect();
        write!(f, "BitIter({})", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iter_lsb_first() {
        let bits: Vec<_> = BitIter::new(&[0b0000_0101, 0b1000_0000], 16).collect();
        assert_eq!(&bits[..3], &[true, false, true]);
        assert!(bits[3..15].iter().all(|b| !b));
        assert!(bits[15]);

        assert_eq!(BitIter::new(&[0xff], 3).len(), 3);
        assert_eq!(BitIter::new(&[], 0).count(), 0);
    }

    #[test]
    #[should_panic]
    fn iter_too_short() {
        BitIter::new(&[0], 9);
    }

    #[test]
    fn debug_shows_bits() {
        assert_eq!(format!("{:?}", BitIter::new(&[0b10], 4)), "BitIter(0100)");
    }
}
