use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use regex::Regex;

/// The alphabet room codes are drawn from. I, O, 0 and 1 are left out
/// because they are visually ambiguous when codes are read aloud or
/// copied from a screen.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

lazy_static! {
    /// Matches an optional URL scheme at the start of a query, so that
    /// scheme-less input like `www.youtube.com/...` can be normalized.
    pub static ref URL_SCHEME_REGEX: Regex =
        Regex::new(r"^(https?://)?").expect("scheme regex compiles");
}

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// Generates a shareable room code of the given length.
pub fn room_code(length: usize) -> String {
    let mut rng = thread_rng();

    (0..length)
        .map(|_| {
            let index = rng.gen_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[index] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_codes_avoid_ambiguous_characters() {
        for _ in 0..100 {
            let code = room_code(6);

            assert_eq!(code.len(), 6);
            assert!(code
                .chars()
                .all(|c| !"IO01".contains(c) && ROOM_CODE_ALPHABET.contains(&(c as u8))));
        }
    }
}
