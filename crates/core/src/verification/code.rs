use rand::{rngs::OsRng, Rng};
use secrecy::SecretString;

pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Draws `length` decimal digits from the operating system CSPRNG.
///
/// The result is a bearer secret, so it comes back wrapped and only the
/// caller delivering it out-of-band should expose it.
pub fn generate_code(length: usize) -> SecretString {
    let mut rng = OsRng;
    let code: String = (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10_u8)))
        .collect();
    code.into()
}
