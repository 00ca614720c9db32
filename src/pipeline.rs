//! Double-buffered proof-of-work search pipeline
//!
//! Drives the derive -> mix -> derive sequence across two alternating buffer
//! slots: while the device mixes the batch staged this iteration, the CPU
//! derives and scans the batch staged one iteration earlier. One blocking
//! synchronization point per iteration (collecting the older slot) is the
//! only place the worker waits on the device.
//!
//! Every candidate the device surfaces is re-derived on the CPU reference
//! path before it is promoted; a mismatch is a transient device computation
//! error and the candidate is discarded with a warning.

use crate::crypto::pbkdf2_keccak512_1;
use crate::mix::{MixDevice, ReferenceMix, Slot, CHUNK_BYTES};
use crate::nfactor::{ScheduleParams, MAX_COST_EXPONENT};
use crate::types::{Nonce, Target, Work};
use crate::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Fixed cost exponent for post-fork headers (version >= 7)
pub const POST_FORK_EXPONENT: u8 = 21;

/// Final digest size per lane
const HASH_BYTES: usize = 32;

/// Result of a search invocation
///
/// Unrecoverable initialization failures (unusable device, cost exponent
/// over the ceiling) are reported as `Err` from [`SearchPipeline::scan`]
/// instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// A nonce was found, CPU-verified and written back into the header
    Found {
        nonce: Nonce,
        hash: [u8; HASH_BYTES],
        attempted: u64,
        target_ratio: f64,
    },
    /// The nonce range was exhausted (or a device fault ended the scan);
    /// the next unscanned nonce is left in the header as a resume point
    Exhausted { attempted: u64 },
    /// The cancellation flag was observed at an iteration boundary
    Cancelled { attempted: u64 },
}

impl ScanOutcome {
    /// Nonces assigned during the scan
    pub fn attempted(&self) -> u64 {
        match *self {
            ScanOutcome::Found { attempted, .. }
            | ScanOutcome::Exhausted { attempted }
            | ScanOutcome::Cancelled { attempted } => attempted,
        }
    }
}

/// One of the two in-flight batches
struct SlotBuffer {
    /// One header copy per lane
    headers: Vec<u8>,
    /// One chunk per lane; holds the premix output until the device
    /// overwrites it with the mixed result
    chunks: Vec<u8>,
    /// One final digest per lane
    digests: Vec<[u8; HASH_BYTES]>,
    /// Nonce assigned to lane 0
    base_nonce: Nonce,
    header_size: usize,
    /// Whether this slot has work in flight worth collecting
    staged: bool,
}

impl SlotBuffer {
    fn new(header: &[u8], lanes: usize) -> Self {
        let mut headers = Vec::with_capacity(header.len() * lanes);
        for _ in 0..lanes {
            headers.extend_from_slice(header);
        }
        Self {
            headers,
            chunks: vec![0u8; CHUNK_BYTES * lanes],
            digests: vec![[0u8; HASH_BYTES]; lanes],
            base_nonce: Nonce::new(0),
            header_size: header.len(),
            staged: false,
        }
    }

    fn lanes(&self) -> usize {
        self.digests.len()
    }

    /// Write one contiguous nonce per lane into the header copies
    /// (big-endian, last 4 bytes of each copy)
    fn assign_nonces(&mut self, base: Nonce) {
        self.base_nonce = base;
        let size = self.header_size;
        for lane in 0..self.lanes() {
            let off = lane * size + size - 4;
            BigEndian::write_u32(&mut self.headers[off..off + 4], base.offset(lane as u32).value());
        }
    }

    /// Premix stage: password = salt = header, 128 bytes out per lane
    fn derive_premix(&mut self) {
        let size = self.header_size;
        for lane in 0..self.lanes() {
            let header = &self.headers[lane * size..(lane + 1) * size];
            let chunk = &mut self.chunks[lane * CHUNK_BYTES..(lane + 1) * CHUNK_BYTES];
            pbkdf2_keccak512_1(header, header, chunk);
        }
    }

    /// Postmix stage: password = header, salt = mixed chunk, 32 bytes out
    fn derive_digests(&mut self) {
        let size = self.header_size;
        for (lane, digest) in self.digests.iter_mut().enumerate() {
            let header = &self.headers[lane * size..(lane + 1) * size];
            let chunk = &self.chunks[lane * CHUNK_BYTES..(lane + 1) * CHUNK_BYTES];
            pbkdf2_keccak512_1(header, chunk, digest);
        }
    }
}

/// The two alternating slots plus the active-slot indicator
struct DoubleBuffer {
    slots: [SlotBuffer; 2],
    active: Slot,
}

impl DoubleBuffer {
    fn new(header: &[u8], lanes: usize) -> Self {
        Self {
            slots: [SlotBuffer::new(header, lanes), SlotBuffer::new(header, lanes)],
            active: Slot::A,
        }
    }

    /// Slot being collected and scanned this iteration
    fn cur_slot(&self) -> Slot {
        self.active
    }

    /// Slot being staged this iteration
    fn next_slot(&self) -> Slot {
        self.active.other()
    }

    fn cur(&mut self) -> &mut SlotBuffer {
        &mut self.slots[self.active.index()]
    }

    fn next(&mut self) -> &mut SlotBuffer {
        &mut self.slots[self.active.other().index()]
    }

    fn swap(&mut self) {
        self.active = self.active.other();
    }
}

/// Top-level search orchestrator
///
/// Owns no device state beyond the last-used cost exponent; the device
/// itself is borrowed for the pipeline's lifetime and driven from exactly
/// one thread.
pub struct SearchPipeline<'a, D: MixDevice, R: ReferenceMix> {
    device: &'a mut D,
    reference: &'a R,
    params: ScheduleParams,
    last_exponent: Option<u8>,
}

impl<'a, D: MixDevice, R: ReferenceMix> SearchPipeline<'a, D, R> {
    /// Create a pipeline over a device and its CPU reference mixer
    pub fn new(device: &'a mut D, reference: &'a R, params: ScheduleParams) -> Self {
        Self {
            device,
            reference,
            params,
            last_exponent: None,
        }
    }

    /// Search nonces from the header's current nonce up to `max_nonce`
    ///
    /// On success the winning nonce is written back into `work`; on
    /// exhaustion the next unscanned nonce is, so a follow-up invocation
    /// picks up where this one stopped. Returns `Err` only for
    /// unrecoverable preconditions; device faults mid-scan end the loop
    /// with [`ScanOutcome::Exhausted`] and leave retrying to the caller.
    pub fn scan(
        &mut self,
        work: &mut Work,
        target: &Target,
        max_nonce: u32,
        cancel: &CancellationToken,
    ) -> Result<ScanOutcome> {
        let exponent = if work.is_legacy() {
            self.params.cost_exponent(work.timestamp())
        } else {
            POST_FORK_EXPONENT
        };
        if exponent > MAX_COST_EXPONENT {
            return Err(Error::nfactor(format!(
                "cost exponent {} exceeds ceiling {}",
                exponent, MAX_COST_EXPONENT
            )));
        }
        let n_param = 1u32 << (exponent + 1);
        self.note_exponent(exponent, n_param);

        let lanes = self.device.throughput()?;
        if lanes == 0 {
            return Err(Error::device("device reported zero throughput"));
        }

        let started = Instant::now();
        let start_nonce = work.nonce().value() as u64;
        let mut next_base = start_nonce;
        let htarg = target.htarg();

        let mut buffers = DoubleBuffer::new(work.bytes(), lanes);

        let outcome = 'search: loop {
            if cancel.is_cancelled() {
                break ScanOutcome::Cancelled {
                    attempted: next_base - start_nonce,
                };
            }
            if next_base > max_nonce as u64 {
                // leave the next unscanned nonce in the header so a
                // follow-up invocation resumes where this one stopped
                work.inject_nonce(Nonce::new(next_base as u32));
                break ScanOutcome::Exhausted {
                    attempted: next_base - start_nonce,
                };
            }

            // stage the next batch; the device call returns immediately
            {
                let slot = buffers.next_slot();
                let next = buffers.next();
                next.assign_nonces(Nonce::new(next_base as u32));
                next.derive_premix();
                self.device.stage(slot, &next.chunks, n_param);
                next.staged = true;
            }
            next_base += lanes as u64;

            // collect the batch staged one iteration earlier; nothing to do
            // on the very first iteration
            if buffers.cur().staged {
                let slot = buffers.cur_slot();
                let cur = buffers.cur();
                if let Err(e) = self.device.collect(slot, &mut cur.chunks) {
                    error!(error = %e, "device sync failed, ending scan");
                    work.inject_nonce(Nonce::new(next_base as u32));
                    break ScanOutcome::Exhausted {
                        attempted: next_base - start_nonce,
                    };
                }
                cur.derive_digests();

                for lane in 0..lanes {
                    let digest = &cur.digests[lane];
                    // cheap pre-filter on the most significant word first
                    if LittleEndian::read_u32(&digest[28..]) <= htarg && target.meets(digest) {
                        let nonce = cur.base_nonce.offset(lane as u32);
                        info!(%nonce, "possible solution found, re-deriving on CPU");
                        if let Some(hash) = self.verify_candidate(work, nonce, n_param, digest) {
                            let attempted = next_base - start_nonce;
                            let target_ratio = target.ratio(&hash);
                            info!(
                                %nonce,
                                hash = %hex::encode(hash),
                                target_ratio,
                                "solution verified"
                            );
                            work.inject_nonce(nonce);
                            break 'search ScanOutcome::Found {
                                nonce,
                                hash,
                                attempted,
                                target_ratio,
                            };
                        }
                    }
                }
            }

            buffers.swap();
        };

        let elapsed = started.elapsed();
        let attempted = outcome.attempted();
        info!(
            attempted,
            elapsed_ms = elapsed.as_millis() as u64,
            rate = attempted as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
            "scan finished"
        );
        Ok(outcome)
    }

    /// Independently recompute derive -> mix -> derive for one nonce on the
    /// CPU reference path and compare with the device-produced digest
    fn verify_candidate(
        &self,
        work: &Work,
        nonce: Nonce,
        n_param: u32,
        device_digest: &[u8; HASH_BYTES],
    ) -> Option<[u8; HASH_BYTES]> {
        let mut header = work.bytes().to_vec();
        let off = header.len() - 4;
        header[off..].copy_from_slice(&nonce.to_be_bytes());

        let mut chunk = [0u8; CHUNK_BYTES];
        pbkdf2_keccak512_1(&header, &header, &mut chunk);
        self.reference.mix(&mut chunk, n_param);
        let mut hash = [0u8; HASH_BYTES];
        pbkdf2_keccak512_1(&header, &chunk, &mut hash);

        if hash == *device_digest {
            Some(hash)
        } else {
            warn!(
                %nonce,
                cpu = %hex::encode(hash),
                device = %hex::encode(device_digest),
                "result does not validate on CPU, discarding candidate"
            );
            None
        }
    }

    /// Track exponent changes; an increase of exactly one passes the
    /// lookup-gap doubling hint along to the device
    fn note_exponent(&mut self, exponent: u8, n_param: u32) {
        if self.last_exponent == Some(exponent) {
            return;
        }
        info!(exponent, n = n_param, "N-factor is {} ({})", exponent, n_param);
        if let Some(prev) = self.last_exponent {
            if prev + 1 == exponent {
                self.device.tune_lookup_gap(2);
            }
        }
        self.last_exponent = Some(exponent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak512;
    use assert_matches::assert_matches;

    /// Deterministic stand-in for the memory-hard mix, shared bit-for-bit
    /// by the fake device and the reference path
    fn scramble(chunk: &mut [u8; CHUNK_BYTES], n: u32) {
        let mut seed = Vec::with_capacity(CHUNK_BYTES + 4);
        seed.extend_from_slice(chunk);
        seed.extend_from_slice(&n.to_le_bytes());
        let first = keccak512(&seed);
        let second = keccak512(&first);
        chunk[..64].copy_from_slice(&first);
        chunk[64..].copy_from_slice(&second);
    }

    struct TestMixer;

    impl ReferenceMix for TestMixer {
        fn mix(&self, chunk: &mut [u8; CHUNK_BYTES], n: u32) {
            scramble(chunk, n);
        }
    }

    struct FakeDevice {
        lanes: usize,
        staged: [Option<(Vec<u8>, u32)>; 2],
        fail_collect: bool,
        corrupt_output: bool,
        tuned: Vec<u32>,
    }

    impl FakeDevice {
        fn new(lanes: usize) -> Self {
            Self {
                lanes,
                staged: [None, None],
                fail_collect: false,
                corrupt_output: false,
                tuned: Vec::new(),
            }
        }
    }

    impl MixDevice for FakeDevice {
        fn throughput(&mut self) -> crate::Result<usize> {
            Ok(self.lanes)
        }

        fn tune_lookup_gap(&mut self, factor: u32) {
            self.tuned.push(factor);
        }

        fn stage(&mut self, slot: Slot, input: &[u8], n: u32) {
            self.staged[slot.index()] = Some((input.to_vec(), n));
        }

        fn collect(&mut self, slot: Slot, output: &mut [u8]) -> crate::Result<()> {
            if self.fail_collect {
                return Err(Error::device("injected fault"));
            }
            let (mut data, n) = self.staged[slot.index()]
                .take()
                .ok_or_else(|| Error::invalid_state("collect on a slot that was never staged"))?;
            for lane_chunk in data.chunks_exact_mut(CHUNK_BYTES) {
                let chunk: &mut [u8; CHUNK_BYTES] = lane_chunk.try_into().unwrap();
                scramble(chunk, n);
            }
            if self.corrupt_output {
                for lane_chunk in data.chunks_exact_mut(CHUNK_BYTES) {
                    lane_chunk[0] ^= 0x01;
                }
            }
            output.copy_from_slice(&data);
            Ok(())
        }
    }

    fn legacy_work() -> Work {
        Work::new(vec![0u8; Work::LEGACY_SIZE], 1).unwrap()
    }

    fn easy_target() -> Target {
        let mut words = [u32::MAX; 8];
        words[7] = 0x00ff_ffff;
        Target::new(words)
    }

    fn run_scan(device: &mut FakeDevice, target: &Target, max_nonce: u32) -> (Work, ScanOutcome) {
        let reference = TestMixer;
        let mut work = legacy_work();
        let mut pipeline =
            SearchPipeline::new(device, &reference, ScheduleParams::parse(""));
        let outcome = pipeline
            .scan(&mut work, target, max_nonce, &CancellationToken::new())
            .unwrap();
        (work, outcome)
    }

    #[test]
    fn test_finds_same_nonce_at_any_throughput() {
        let target = easy_target();

        let mut narrow = FakeDevice::new(1);
        let (work_narrow, outcome_narrow) = run_scan(&mut narrow, &target, 100_000);
        let mut wide = FakeDevice::new(64);
        let (work_wide, outcome_wide) = run_scan(&mut wide, &target, 100_000);

        let (nonce_narrow, hash_narrow) = match outcome_narrow {
            ScanOutcome::Found { nonce, hash, .. } => (nonce, hash),
            other => panic!("throughput 1 did not find a solution: {:?}", other),
        };
        let (nonce_wide, hash_wide) = match outcome_wide {
            ScanOutcome::Found { nonce, hash, .. } => (nonce, hash),
            other => panic!("throughput 64 did not find a solution: {:?}", other),
        };

        assert_eq!(nonce_narrow, nonce_wide);
        assert_eq!(hash_narrow, hash_wide);
        assert!(target.meets(&hash_narrow));

        // winning nonce written back into the caller's header
        assert_eq!(work_narrow.nonce(), nonce_narrow);
        assert_eq!(work_wide.nonce(), nonce_wide);
    }

    #[test]
    fn test_cancelled_before_first_iteration() {
        let mut device = FakeDevice::new(4);
        let reference = TestMixer;
        let mut work = legacy_work();
        let mut pipeline =
            SearchPipeline::new(&mut device, &reference, ScheduleParams::parse(""));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = pipeline
            .scan(&mut work, &easy_target(), 100_000, &cancel)
            .unwrap();
        assert_eq!(outcome, ScanOutcome::Cancelled { attempted: 0 });
    }

    #[test]
    fn test_exhausts_on_hard_target() {
        let mut device = FakeDevice::new(16);
        let (_, outcome) = run_scan(&mut device, &Target::min(), 200);
        assert_matches!(outcome, ScanOutcome::Exhausted { attempted } if attempted >= 200);
    }

    #[test]
    fn test_exhausted_leaves_resume_nonce_in_header() {
        let mut device = FakeDevice::new(16);
        let (work, outcome) = run_scan(&mut device, &Target::min(), 200);
        // scan started at nonce 0, so the resume point equals the count
        assert_eq!(work.nonce().value() as u64, outcome.attempted());
    }

    #[test]
    fn test_corrupt_device_output_never_promotes() {
        let mut device = FakeDevice::new(8);
        device.corrupt_output = true;
        // every pre-filter hit must be rejected by CPU re-verification
        let (_, outcome) = run_scan(&mut device, &easy_target(), 4_000);
        assert_matches!(outcome, ScanOutcome::Exhausted { .. });
    }

    #[test]
    fn test_device_fault_exits_with_exhausted() {
        let mut device = FakeDevice::new(4);
        device.fail_collect = true;
        let (_, outcome) = run_scan(&mut device, &easy_target(), 1_000);
        // two batches staged before the first collect attempt
        assert_eq!(outcome, ScanOutcome::Exhausted { attempted: 8 });
    }

    #[test]
    fn test_zero_throughput_is_fatal() {
        let mut device = FakeDevice::new(0);
        let reference = TestMixer;
        let mut work = legacy_work();
        let mut pipeline =
            SearchPipeline::new(&mut device, &reference, ScheduleParams::parse(""));
        let result = pipeline.scan(&mut work, &easy_target(), 100, &CancellationToken::new());
        assert_matches!(result, Err(Error::Device { .. }));
    }

    #[test]
    fn test_exponent_over_ceiling_is_fatal() {
        let mut device = FakeDevice::new(4);
        let reference = TestMixer;
        let mut work = legacy_work();
        let mut pipeline =
            SearchPipeline::new(&mut device, &reference, ScheduleParams::Fixed(31));
        let result = pipeline.scan(&mut work, &easy_target(), 100, &CancellationToken::new());
        assert_matches!(result, Err(Error::Nfactor { .. }));
    }

    #[test]
    fn test_post_fork_header_uses_fixed_exponent() {
        let mut device = FakeDevice::new(2);
        let reference = TestMixer;
        let mut work = Work::new(vec![0u8; Work::EXTENDED_SIZE], 7).unwrap();
        let mut pipeline =
            SearchPipeline::new(&mut device, &reference, ScheduleParams::parse(""));
        let outcome = pipeline
            .scan(&mut work, &Target::min(), 20, &CancellationToken::new())
            .unwrap();
        assert_matches!(outcome, ScanOutcome::Exhausted { .. });
        assert_eq!(pipeline.last_exponent, Some(POST_FORK_EXPONENT));
    }

    #[test]
    fn test_lookup_gap_hint_on_exponent_increment() {
        let mut device = FakeDevice::new(2);
        let reference = TestMixer;
        let params = ScheduleParams::Piecewise {
            reference_timestamp: 1367991200,
            min_exponent: 4,
            max_exponent: 30,
        };

        // ages 4*2^16 and 4*2^17 map to exponents 4 and 5
        let mut header = vec![0u8; Work::LEGACY_SIZE];
        header[68..72].copy_from_slice(&(1367991200u32 + 262_144).to_be_bytes());
        let mut work_before = Work::new(header.clone(), 1).unwrap();
        header[68..72].copy_from_slice(&(1367991200u32 + 524_288).to_be_bytes());
        let mut work_after = Work::new(header, 1).unwrap();

        {
            let mut pipeline = SearchPipeline::new(&mut device, &reference, params);
            let cancel = CancellationToken::new();
            pipeline
                .scan(&mut work_before, &Target::min(), 10, &cancel)
                .unwrap();
            pipeline
                .scan(&mut work_after, &Target::min(), 10, &cancel)
                .unwrap();
        }

        assert_eq!(device.tuned, vec![2]);
    }
}
