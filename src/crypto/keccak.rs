//! Keccak-512 sponge hash
//!
//! The exact parameterization scrypt-jane uses: Keccak-f[1600] with
//! capacity 1024 and rate 576 (72-byte blocks), 64-byte digest, and the
//! original Keccak domain padding (append 0x01, zero-fill, OR 0x80 into the
//! last rate byte). This is not SHA-3; the NIST padding differs.

use byteorder::{ByteOrder, LittleEndian};

/// Absorption block size in bytes (rate / 8)
pub const BLOCK_SIZE: usize = 72;
/// Digest size in bytes
pub const DIGEST_SIZE: usize = 64;

/// A finalized 64-byte digest
pub type Digest = [u8; DIGEST_SIZE];

const ROUND_CONSTANTS: [u64; 24] = [
    0x0000000000000001,
    0x0000000000008082,
    0x800000000000808a,
    0x8000000080008000,
    0x000000000000808b,
    0x0000000080000001,
    0x8000000080008081,
    0x8000000000008009,
    0x000000000000008a,
    0x0000000000000088,
    0x0000000080008009,
    0x000000008000000a,
    0x000000008000808b,
    0x800000000000008b,
    0x8000000000008089,
    0x8000000000008003,
    0x8000000000008002,
    0x8000000000000080,
    0x000000000000800a,
    0x800000008000000a,
    0x8000000080008081,
    0x8000000000008080,
    0x0000000080000001,
    0x8000000080008008,
];

/// Rotation offsets, in the lane order walked by the pi permutation
const RHO: [u32; 24] = [
    1, 3, 6, 10, 15, 21, 28, 36, 45, 55, 2, 14, 27, 41, 56, 8, 25, 43, 62, 18, 39, 61, 20, 44,
];

/// Lane permutation: destination index for each step of the rho/pi walk
const PI: [usize; 24] = [
    10, 7, 11, 17, 18, 3, 5, 16, 8, 21, 24, 4, 15, 23, 19, 13, 12, 2, 20, 14, 22, 9, 6, 1,
];

/// Keccak-f[1600] permutation over 25 64-bit lanes, 24 rounds
fn keccak_f1600(s: &mut [u64; 25]) {
    for round in 0..24 {
        // theta: column parity
        let mut c = [0u64; 5];
        for x in 0..5 {
            c[x] = s[x] ^ s[x + 5] ^ s[x + 10] ^ s[x + 15] ^ s[x + 20];
        }
        for x in 0..5 {
            let d = c[(x + 4) % 5] ^ c[(x + 1) % 5].rotate_left(1);
            for y in 0..5 {
                s[x + 5 * y] ^= d;
            }
        }

        // rho + pi: rotate and scatter lanes
        let mut last = s[1];
        for (i, &dst) in PI.iter().enumerate() {
            let tmp = s[dst];
            s[dst] = last.rotate_left(RHO[i]);
            last = tmp;
        }

        // chi: row-local nonlinear substitution
        for y in 0..5 {
            let row = [s[5 * y], s[5 * y + 1], s[5 * y + 2], s[5 * y + 3], s[5 * y + 4]];
            for x in 0..5 {
                s[5 * y + x] = row[x] ^ (!row[(x + 1) % 5] & row[(x + 2) % 5]);
            }
        }

        // iota
        s[0] ^= ROUND_CONSTANTS[round];
    }
}

/// Incremental Keccak-512 state
///
/// Invariant: `leftover` is always strictly less than [`BLOCK_SIZE`].
#[derive(Clone)]
pub struct Keccak512 {
    state: [u64; 25],
    buffer: [u8; BLOCK_SIZE],
    leftover: usize,
}

impl Keccak512 {
    /// Create a zeroed state
    pub fn new() -> Self {
        Self {
            state: [0u64; 25],
            buffer: [0u8; BLOCK_SIZE],
            leftover: 0,
        }
    }

    /// XOR one full block into the low lanes and permute
    fn absorb_block(&mut self, block: &[u8]) {
        debug_assert_eq!(block.len(), BLOCK_SIZE);
        for (lane, chunk) in self.state.iter_mut().zip(block.chunks_exact(8)) {
            *lane ^= LittleEndian::read_u64(chunk);
        }
        keccak_f1600(&mut self.state);
    }

    /// Absorb an arbitrary-length slice
    pub fn update(&mut self, mut input: &[u8]) {
        // top up a partially filled buffer first
        if self.leftover > 0 {
            let want = (BLOCK_SIZE - self.leftover).min(input.len());
            self.buffer[self.leftover..self.leftover + want].copy_from_slice(&input[..want]);
            self.leftover += want;
            if self.leftover < BLOCK_SIZE {
                return;
            }
            let block = self.buffer;
            self.absorb_block(&block);
            self.leftover = 0;
            input = &input[want..];
        }

        while input.len() >= BLOCK_SIZE {
            let (block, rest) = input.split_at(BLOCK_SIZE);
            self.absorb_block(block);
            input = rest;
        }

        self.leftover = input.len();
        self.buffer[..input.len()].copy_from_slice(input);
    }

    /// Apply domain padding, run the final permutation and squeeze the digest
    pub fn finalize(mut self) -> Digest {
        self.buffer[self.leftover] = 0x01;
        self.buffer[self.leftover + 1..].fill(0);
        self.buffer[BLOCK_SIZE - 1] |= 0x80;
        let block = self.buffer;
        self.absorb_block(&block);

        let mut digest = [0u8; DIGEST_SIZE];
        for (chunk, lane) in digest.chunks_exact_mut(8).zip(self.state.iter()) {
            LittleEndian::write_u64(chunk, *lane);
        }
        digest
    }
}

impl Default for Keccak512 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot Keccak-512
pub fn keccak512(data: &[u8]) -> Digest {
    let mut state = Keccak512::new();
    state.update(data);
    state.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_message_vector() {
        // Published Keccak-512 vector (pre-NIST padding)
        let expected = "0eab42de4c3ceb9235fc91acffe746b29c29a8c366b7c60e4e67c466f36a4304\
                        c00fa9caf9d87976ba469bcbe06713b435f091ef2769fb160cdab33d3670680e";
        assert_eq!(hex::encode(keccak512(b"")), expected);
    }

    #[test]
    fn test_abc_vector() {
        let expected = "18587dc2ea106b9a1563e32b3312421ca164c7f1f07bc922a9c83d77cea3a1e5\
                        d0c69910739025372dc14ac9642629379540c17e2a65b19d77aa511a9d00bb96";
        assert_eq!(hex::encode(keccak512(b"abc")), expected);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data: Vec<u8> = (0u8..=255).cycle().take(500).collect();

        for split in [0, 1, 71, 72, 73, 144, 499] {
            let mut state = Keccak512::new();
            state.update(&data[..split]);
            state.update(&data[split..]);
            assert_eq!(state.finalize(), keccak512(&data), "split at {}", split);
        }
    }

    #[test]
    fn test_leftover_invariant() {
        let mut state = Keccak512::new();
        for len in [1usize, 71, 72, 100, 143, 144] {
            state.update(&vec![0x5a; len]);
            assert!(state.leftover < BLOCK_SIZE);
        }
    }

    #[test]
    fn test_distinct_inputs_distinct_digests() {
        assert_ne!(keccak512(b"nonce 1"), keccak512(b"nonce 2"));
    }
}
