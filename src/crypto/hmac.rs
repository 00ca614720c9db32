//! HMAC over Keccak-512
//!
//! Two-sponge construction: `H(key ^ 0x5c || H(key ^ 0x36 || message))`.
//! An initialized context is `Clone`, and cloning is the intended way to
//! start many message streams off one key schedule — the key padding is
//! absorbed exactly once per key, not once per nonce.

use super::keccak::{keccak512, Digest, Keccak512, BLOCK_SIZE};

/// Keyed Keccak-512 MAC context
#[derive(Clone)]
pub struct HmacKeccak512 {
    inner: Keccak512,
    outer: Keccak512,
}

impl HmacKeccak512 {
    /// Initialize from a key of any length
    ///
    /// Keys up to one block are used directly (zero-padded); longer keys are
    /// pre-hashed to a digest first.
    pub fn new(key: &[u8]) -> Self {
        let mut pad = [0u8; BLOCK_SIZE];
        if key.len() <= BLOCK_SIZE {
            pad[..key.len()].copy_from_slice(key);
        } else {
            let digest = keccak512(key);
            pad[..digest.len()].copy_from_slice(&digest);
        }

        let mut inner = Keccak512::new();
        for byte in pad.iter_mut() {
            *byte ^= 0x36;
        }
        inner.update(&pad);

        let mut outer = Keccak512::new();
        for byte in pad.iter_mut() {
            *byte ^= 0x5c ^ 0x36;
        }
        outer.update(&pad);

        Self { inner, outer }
    }

    /// Absorb message bytes into the inner state
    pub fn update(&mut self, message: &[u8]) {
        self.inner.update(message);
    }

    /// Produce the MAC
    pub fn finalize(mut self) -> Digest {
        let inner_digest = self.inner.finalize();
        self.outer.update(&inner_digest);
        self.outer.finalize()
    }
}

/// One-shot MAC
pub fn hmac_keccak512(key: &[u8], message: &[u8]) -> Digest {
    let mut ctx = HmacKeccak512::new(key);
    ctx.update(message);
    ctx.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_manual_construction() {
        let key = b"a short key";
        let message = b"the quick brown fox";

        let mut ipad = [0x36u8; BLOCK_SIZE];
        let mut opad = [0x5cu8; BLOCK_SIZE];
        for (i, byte) in key.iter().enumerate() {
            ipad[i] ^= byte;
            opad[i] ^= byte;
        }

        let mut inner = Keccak512::new();
        inner.update(&ipad);
        inner.update(message);
        let inner_digest = inner.finalize();

        let mut outer = Keccak512::new();
        outer.update(&opad);
        outer.update(&inner_digest);

        assert_eq!(hmac_keccak512(key, message), outer.finalize());
    }

    #[test]
    fn test_fork_equals_fresh_context() {
        let key = b"shared key schedule";
        let base = HmacKeccak512::new(key);

        for message in [&b"stream one"[..], b"stream two", b""] {
            let mut forked = base.clone();
            forked.update(message);
            assert_eq!(forked.finalize(), hmac_keccak512(key, message));
        }
    }

    #[test]
    fn test_long_key_is_prehashed() {
        let key = [0x42u8; 100];
        let hashed = keccak512(&key);
        let message = b"msg";
        assert_eq!(
            hmac_keccak512(&key, message),
            hmac_keccak512(&hashed, message)
        );
    }

    #[test]
    fn test_incremental_update() {
        let key = b"k";
        let mut ctx = HmacKeccak512::new(key);
        ctx.update(b"hello ");
        ctx.update(b"world");
        assert_eq!(ctx.finalize(), hmac_keccak512(key, b"hello world"));
    }
}
