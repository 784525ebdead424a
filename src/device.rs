// Device identifiers. The service ties a login to a `device-id` header; a
// fresh one per run looks like a new phone, which is what triggers the SMS
// code on first login.

use rand::seq::IndexedRandom;
use rand::Rng;

const DEVICE_ID_TEMPLATE: &str = "88884260-05O3-8U81-58I1-2WA76F357GR9";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a random device id shaped like the template: digits stay digits,
/// dashes stay put, everything else becomes an uppercase letter.
pub fn generate_device_id() -> String {
    generate_device_id_with(&mut rand::rng())
}

pub fn generate_device_id_with<R: Rng>(rng: &mut R) -> String {
    DEVICE_ID_TEMPLATE
        .chars()
        .map(|c| {
            if c.is_ascii_digit() {
                char::from(b'0' + rng.random_range(0..10u8))
            } else if c == '-' {
                '-'
            } else {
                UPPERCASE.choose(rng).map(|b| char::from(*b)).unwrap_or('A')
            }
        })
        .collect()
}
