//! Memory-hard mixing collaborator contracts
//!
//! The mixing function itself (ROMix over 128-byte chunks) is not
//! implemented here; the pipeline only depends on these contracts. Two
//! implementations must agree bit-for-bit: a device-resident one used for
//! bulk search ([`MixDevice`]) and a single-lane CPU routine used to
//! re-verify candidates ([`ReferenceMix`]).

use crate::Result;

/// Bytes per mixing block
pub const BLOCK_BYTES: usize = 64;
/// Bytes per lane chunk: two blocks (r = 1, p = 1)
pub const CHUNK_BYTES: usize = 2 * BLOCK_BYTES;

/// One of the two alternating pipeline buffer slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    /// The other slot
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    /// Stable index for implementations keeping per-slot device state
    pub fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

/// Device-side memory-hard mixer
///
/// Implementations own the device lifecycle: acquire it on construction,
/// release/reset it on `Drop`. A device is driven by exactly one worker
/// thread for the duration of a run; none of these methods need to be
/// thread-safe beyond `Send`.
pub trait MixDevice {
    /// Lanes processed per iteration
    ///
    /// Queried once per scan and fixed for the run. Zero means the device
    /// is unusable and the scan fails before its loop starts.
    fn throughput(&mut self) -> Result<usize>;

    /// Throughput-tuning hint passed along when the cost exponent changes
    ///
    /// An exponent increase of exactly one conventionally doubles the
    /// lookup gap. Purely advisory; correctness never depends on it.
    fn tune_lookup_gap(&mut self, factor: u32) {
        let _ = factor;
    }

    /// Begin mixing `input` ([`CHUNK_BYTES`] per lane) with cost parameter
    /// `n` into the given slot
    ///
    /// Fire-and-forget: returns as soon as the work is queued. The mixed
    /// result is observed via [`collect`](Self::collect) on the same slot.
    fn stage(&mut self, slot: Slot, input: &[u8], n: u32);

    /// Block until the slot's mix completes and copy the result into
    /// `output` (same length as the staged input)
    ///
    /// The one synchronization point per pipeline iteration. An error
    /// signals a device-side fault; the scan exits its loop and leaves
    /// retrying to the caller.
    fn collect(&mut self, slot: Slot, output: &mut [u8]) -> Result<()>;
}

/// Single-lane CPU reference mixer
///
/// Must be bit-identical to the device path for the same chunk and cost
/// parameter; the pipeline trusts no candidate the reference path does not
/// reproduce.
pub trait ReferenceMix {
    /// Mix one chunk in place with cost parameter `n`, using O(n) scratch
    fn mix(&self, chunk: &mut [u8; CHUNK_BYTES], n: u32);
}
