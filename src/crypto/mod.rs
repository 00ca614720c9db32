//! Cryptographic primitives for scrypt-jane
//!
//! Exactly the primitive sequence the coin's proof-of-work needs, nothing
//! more: a Keccak-512 sponge, HMAC built on it, and the single-round PBKDF2
//! derivation both pipeline stages run.

pub mod hmac;
pub mod kdf;
pub mod keccak;

pub use hmac::{hmac_keccak512, HmacKeccak512};
pub use kdf::pbkdf2_keccak512_1;
pub use keccak::{keccak512, Digest, Keccak512, BLOCK_SIZE, DIGEST_SIZE};
