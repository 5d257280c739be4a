//! Growable bit set with a compact little-endian byte form.

use std::fmt;

const WORD_BITS: usize = 64;

/// Bits packed into 64-bit words.
///
/// The byte form is the words in little-endian order with trailing zero
/// bytes dropped, so an empty set is zero bytes long.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let words = bytes
            .chunks(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word[..chunk.len()].copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        Self { words }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self.words.iter().flat_map(|w| w.to_le_bytes()).collect();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        bytes
    }

    pub fn get(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|word| word & (1 << (index % WORD_BITS)) != 0)
    }

    pub fn set(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (index % WORD_BITS);
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(word) = self.words.get_mut(index / WORD_BITS) {
            *word &= !(1 << (index % WORD_BITS));
        }
    }

    /// Index of the highest set bit plus one.
    pub fn len(&self) -> usize {
        self.words
            .iter()
            .rposition(|&w| w != 0)
            .map_or(0, |last| {
                last * WORD_BITS + (WORD_BITS - self.words[last].leading_zeros() as usize)
            })
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Indexes of the set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(move |&i| self.get(i))
    }
}

impl fmt::Display for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: Vec<String> = self.iter().map(|i| i.to_string()).collect();
        write!(f, "{{{}}}", bits.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let mut bits = BitSet::new();
        bits.set(1);
        bits.set(3);
        bits.set(130);
        assert!(bits.get(1));
        assert!(!bits.get(2));
        assert!(bits.get(130));
        assert_eq!(bits.len(), 131);
        bits.clear(130);
        assert_eq!(bits.len(), 4);
        assert_eq!(bits.to_string(), "{1, 3}");
    }

    #[test]
    fn test_empty_set_has_no_bytes() {
        assert!(BitSet::new().to_bytes().is_empty());
        let mut bits = BitSet::new();
        bits.set(130);
        bits.clear(130);
        assert!(bits.is_empty());
        assert!(bits.to_bytes().is_empty());
    }

    #[test]
    fn test_trailing_zero_bytes_are_trimmed() {
        let mut bits = BitSet::new();
        bits.set(0);
        bits.set(16);
        assert_eq!(bits.to_bytes(), vec![0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut bits = BitSet::new();
        for i in [0, 7, 8, 63, 64, 100] {
            bits.set(i);
        }
        let restored = BitSet::from_bytes(&bits.to_bytes());
        assert_eq!(restored.iter().collect::<Vec<_>>(), vec![0, 7, 8, 63, 64, 100]);
    }
}
