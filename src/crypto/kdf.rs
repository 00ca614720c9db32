//! Single-round PBKDF2 over HMAC-Keccak-512
//!
//! Scrypt-jane fixes the PBKDF2 iteration count at 1, so the inner
//! XOR-folding loop of the general algorithm collapses away entirely: block
//! i of the output is just `HMAC(password, salt || be32(i))`. Do not add
//! iteration folding here; coins depending on this derivation would fork.

use super::hmac::HmacKeccak512;
use super::keccak::DIGEST_SIZE;

/// Derive `out.len()` bytes from password and salt
///
/// Output is truncation-prefix-consistent: deriving fewer bytes yields a
/// prefix of deriving more. The caller is responsible for keeping the
/// requested length under `2^32 * 64` bytes, which every scrypt-jane use
/// site does by construction.
pub fn pbkdf2_keccak512_1(password: &[u8], salt: &[u8], out: &mut [u8]) {
    let hmac_pw = HmacKeccak512::new(password);
    let mut hmac_pw_salt = hmac_pw;
    hmac_pw_salt.update(salt);

    for (i, chunk) in out.chunks_mut(DIGEST_SIZE).enumerate() {
        let counter = (i as u32 + 1).to_be_bytes();
        let mut block = hmac_pw_salt.clone();
        block.update(&counter);
        let digest = block.finalize();
        chunk.copy_from_slice(&digest[..chunk.len()]);
    }
}
