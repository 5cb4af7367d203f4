use rand::Rng;

/// Alphabet for verification codes. Uppercase alphanumeric with the
/// ambiguous glyphs (0/O, 1/I) removed so codes stay human-typeable.
pub const SECRET_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Length of a generated verification code.
pub const SECRET_LEN: usize = 6;

/// Generate a short verification code for a new match.
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    (0..SECRET_LEN)
        .map(|_| SECRET_ALPHABET[rng.gen_range(0..SECRET_ALPHABET.len())] as char)
        .collect()
}

/// Whether a submitted code could have come out of [`generate_secret`].
/// Comparison against a stored secret is still exact; this only lets
/// callers reject garbage before a storage round trip.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == SECRET_LEN && code.bytes().all(|b| SECRET_ALPHABET.contains(&b))
}
