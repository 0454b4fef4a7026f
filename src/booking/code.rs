use chrono::NaiveDate;
use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const SUFFIX_LEN: usize = 4;

/// Human-friendly reservation reference, `RSV-YYMMDD-XXXX`.
///
/// The suffix alphabet leaves out 0/O and 1/I so codes read back over the
/// phone without ambiguity.
pub fn reservation_code<R: Rng + ?Sized>(date: NaiveDate, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("RSV-{}-{}", date.format("%y%m%d"), suffix)
}
