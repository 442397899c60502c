//! Login verification codes.

use rand::seq::SliceRandom;
use rand::Rng;

/// Digits 2-9 and ASCII letters.
const ALPHABET: &[u8] = b"23456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub const CODE_LENGTH: usize = 5;

/// Five distinct characters drawn from a shuffled alphabet.
pub fn generate_code() -> String {
    generate_code_with(&mut rand::thread_rng())
}

pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut alphabet = ALPHABET.to_vec();
    alphabet.shuffle(rng);
    alphabet[3..3 + CODE_LENGTH]
        .iter()
        .map(|&b| char::from(b))
        .collect()
}

/// Compare a submitted code with the issued one. Codes are case sensitive.
pub fn codes_match(submitted: Option<&str>, issued: Option<&str>) -> bool {
    match (submitted.map(str::trim), issued) {
        (Some(submitted), Some(issued)) => !submitted.is_empty() && submitted == issued,
        _ => false,
    }
}
