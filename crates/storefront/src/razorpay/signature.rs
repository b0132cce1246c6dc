//! Checkout callback signatures.
//!
//! The gateway signs `"{order_id}|{payment_id}"` with HMAC-SHA256 keyed by
//! the account's key secret and sends the lowercase hex digest.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Check a callback signature in constant time.
pub(super) fn verify(secret: &[u8], order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());

    mac.verify_slice(&provided).is_ok()
}

/// Produce the signature the gateway would send for a payment.
#[must_use]
pub fn sign(secret: &[u8], order_id: &str, payment_id: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_secret_key";
    const ORDER: &str = "order_IluGWxBm9U8zJ8";
    const PAYMENT: &str = "pay_IluHXbMbAf2RPh";
    const EXPECTED: &str = "fc6d316c1127c1a3487dae2adfb5deda43b86e08079fbfc4cf5daacfde56145c";

    #[test]
    fn test_known_vector() {
        assert_eq!(sign(SECRET, ORDER, PAYMENT), EXPECTED);
        assert!(verify(SECRET, ORDER, PAYMENT, EXPECTED));
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        assert!(verify(SECRET, ORDER, PAYMENT, &EXPECTED.to_uppercase()));
    }

    #[test]
    fn test_rejects_tampering() {
        assert!(!verify(SECRET, ORDER, "pay_other", EXPECTED));
        assert!(!verify(SECRET, "order_other", PAYMENT, EXPECTED));
        assert!(!verify(b"wrong_secret", ORDER, PAYMENT, EXPECTED));
    }

    #[test]
    fn test_rejects_malformed_signature() {
        assert!(!verify(SECRET, ORDER, PAYMENT, ""));
        assert!(!verify(SECRET, ORDER, PAYMENT, "not-hex"));
        assert!(!verify(SECRET, ORDER, PAYMENT, &EXPECTED[..32]));
    }
}
