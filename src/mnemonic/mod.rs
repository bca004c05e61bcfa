//! # Mnemonic Encoding
//!
//! BIP39 words for a derived secret, so it can be written down and typed back
//! in when the device is unavailable.
//!
//! The entropy is extended with the first byte of its SHA-256 digest and read
//! 11 bits at a time, most significant bit first; each group indexes the
//! English word list. 16, 24 and 32 bytes give 12, 18 and 24 words.
//!
//! ```rust
//! use macer::mnemonic;
//!
//! let words = mnemonic::encode(&[0u8; 16]).unwrap();
//! assert!(words.starts_with("abandon abandon"));
//! assert!(words.ends_with("about"));
//! ```

mod wordlist;

use zeroize::Zeroizing;

use crate::error::{ProtocolError, Result};
use crate::utils::hash::hash256;
use wordlist::WORDS;

/// Entropy sizes accepted by [`encode`], in bytes.
pub const ENTROPY_LENGTHS: [usize; 3] = [16, 24, 32];

const BITS_PER_WORD: usize = 11;

/// Encode `entropy` as space-separated words.
pub fn encode(entropy: &[u8]) -> Result<Zeroizing<String>> {
    if !ENTROPY_LENGTHS.contains(&entropy.len()) {
        return Err(ProtocolError::EntropyLength(entropy.len()));
    }

    let mut extended = Zeroizing::new(Vec::with_capacity(entropy.len() + 1));
    extended.extend_from_slice(entropy);
    extended.push(hash256(entropy)[0]);

    let count = (extended.len() - 1) * 3 / 4;
    let mut words = Zeroizing::new(String::with_capacity(count * 9));
    for index in 0..count {
        if index > 0 {
            words.push(' ');
        }
        words.push_str(WORDS[read_bits(&extended, index * BITS_PER_WORD)]);
    }
    Ok(words)
}

/// Recover the entropy from a phrase produced by [`encode`], verifying its checksum.
pub fn decode(phrase: &str) -> Result<Zeroizing<Vec<u8>>> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    let total_bits = words.len() * BITS_PER_WORD;
    let checksum_bits = total_bits / 33;
    let entropy_len = (total_bits - checksum_bits) / 8;
    if !ENTROPY_LENGTHS.contains(&entropy_len) || total_bits % 33 != 0 {
        return Err(ProtocolError::InvalidMnemonic(format!(
            "expected 12, 18 or 24 words, got {}",
            words.len()
        )));
    }

    let mut bits = Zeroizing::new(vec![0u8; total_bits.div_ceil(8)]);
    for (position, word) in words.iter().enumerate() {
        let index = WORDS.binary_search(word).map_err(|_| {
            ProtocolError::InvalidMnemonic(format!("unknown word at position {}", position + 1))
        })?;
        write_bits(&mut bits, position * BITS_PER_WORD, index);
    }

    let entropy = Zeroizing::new(bits[..entropy_len].to_vec());
    let expected = hash256(&entropy)[0] >> (8 - checksum_bits);
    let found = bits[entropy_len] >> (8 - checksum_bits);
    if expected != found {
        return Err(ProtocolError::InvalidMnemonic("checksum mismatch".to_string()));
    }
    Ok(entropy)
}

/// 11 bits of `data` starting at bit `start`, MSB first.
fn read_bits(data: &[u8], start: usize) -> usize {
    (start..start + BITS_PER_WORD).fold(0, |value, bit| {
        (value << 1) | usize::from((data[bit / 8] >> (7 - bit % 8)) & 1)
    })
}

fn write_bits(data: &mut [u8], start: usize, value: usize) {
    for offset in 0..BITS_PER_WORD {
        if (value >> (BITS_PER_WORD - 1 - offset)) & 1 == 1 {
            let bit = start + offset;
            data[bit / 8] |= 0x80 >> (bit % 8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeated(word: &str, count: usize, last: &str) -> String {
        let mut words = vec![word; count - 1];
        words.push(last);
        words.join(" ")
    }

    #[test]
    fn test_reference_vectors() {
        let cases: [(&[u8], String); 6] = [
            (&[0x00; 16], repeated("abandon", 12, "about")),
            (
                &[0x7f; 16],
                "legal winner thank year wave sausage worth useful legal winner thank yellow"
                    .to_string(),
            ),
            (
                &[0x80; 16],
                "letter advice cage absurd amount doctor acoustic avoid letter advice cage above"
                    .to_string(),
            ),
            (&[0xff; 16], repeated("zoo", 12, "wrong")),
            (&[0x00; 24], repeated("abandon", 18, "agent")),
            (&[0x00; 32], repeated("abandon", 24, "art")),
        ];

        for (entropy, expected) in cases {
            assert_eq!(encode(entropy).unwrap().as_str(), expected);
            assert_eq!(&decode(&expected).unwrap()[..], entropy);
        }
    }

    #[test]
    fn test_word_counts() {
        for (len, count) in [(16, 12), (24, 18), (32, 24)] {
            let words = encode(&vec![0x5a; len]).unwrap();
            assert_eq!(words.split(' ').count(), count);
        }
    }

    #[test]
    fn test_entropy_length() {
        for len in [0, 15, 17, 20, 31, 33, 64] {
            assert!(matches!(
                encode(&vec![0u8; len]),
                Err(ProtocolError::EntropyLength(found)) if found == len
            ));
        }
    }

    #[test]
    fn test_decode_rejects_bad_phrases() {
        let mut words = repeated("abandon", 12, "about");
        assert!(decode(&words.replace("about", "abandon")).is_err());
        assert!(decode("abandon abandon").is_err());
        words = words.replacen("abandon", "notaword", 1);
        assert!(matches!(
            decode(&words),
            Err(ProtocolError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_wordlist_is_sorted() {
        assert!(WORDS.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
