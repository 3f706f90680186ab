//! Generation of human-facing references: order codes and delivery OTPs.
use rand::Rng;

use crate::db_types::OrderCode;

const ORDER_CODE_PREFIX: &str = "ORD";
const ORDER_CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_CODE_LEN: usize = 6;

/// A readable, shareable order reference like `ORD-7KQ2MX`. Ambiguous glyphs (0/O, 1/I) are excluded from the
/// charset. Collisions are handled by the unique index at insert time, not here.
pub fn new_order_code() -> OrderCode {
    let mut rng = rand::thread_rng();
    let suffix: String =
        (0..ORDER_CODE_LEN).map(|_| ORDER_CODE_CHARSET[rng.gen_range(0..ORDER_CODE_CHARSET.len())] as char).collect();
    OrderCode(format!("{ORDER_CODE_PREFIX}-{suffix}"))
}

/// A 6-digit delivery OTP, zero-padded.
pub fn new_delivery_otp() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_code_shape() {
        for _ in 0..100 {
            let code = new_order_code();
            let code = code.as_str();
            assert_eq!(code.len(), 10);
            assert!(code.starts_with("ORD-"));
            assert!(code[4..].bytes().all(|b| ORDER_CODE_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn otp_shape() {
        for _ in 0..100 {
            let otp = new_delivery_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}
