//! Consensus timestamps and the total order within a round received.
//!
//! Events that reach consensus together are sorted by consensus timestamp,
//! then by the extended median of their received times, then by generation,
//! and finally by their hash whitened with the XOR of the judges'
//! signatures. Timestamps are then pushed forward so that every transaction
//! in history gets a unique, increasing time.

use {
    solana_hash::Hash,
    solana_signature::{Signature, SIGNATURE_BYTES},
    std::cmp::Ordering,
};

/// XOR of judge signatures, shared by every node that decided the round.
pub type Whitening = [u8; SIGNATURE_BYTES];

/// Earliest consensus timestamp the next event may receive after an event
/// whose last transaction was stamped `last_transaction_nanos`: one
/// increment later, rounded up to a multiple of the increment.
pub fn calc_min_timestamp_for_next_event(last_transaction_nanos: u64, incr_nanos: u64) -> u64 {
    let next = last_transaction_nanos.saturating_add(incr_nanos);
    if incr_nanos == 0 {
        return next;
    }
    next.div_ceil(incr_nanos).saturating_mul(incr_nanos)
}

/// Timestamp of the last transaction of an event stamped `timestamp_nanos`.
/// Each transaction after the first is one increment later.
pub fn last_transaction_time(timestamp_nanos: u64, num_transactions: usize, incr_nanos: u64) -> u64 {
    if num_transactions <= 1 {
        return timestamp_nanos;
    }
    let extra = u64::try_from(num_transactions - 1).unwrap_or(u64::MAX);
    timestamp_nanos.saturating_add(extra.saturating_mul(incr_nanos))
}

/// Median of sorted times; the later middle value for an even count.
pub fn median(sorted: &[u64]) -> Option<u64> {
    sorted.get(sorted.len() / 2).copied()
}

/// Compare two sorted received-time lists at median offsets -1, +1, -2, +2, ...
/// until they differ or one list runs out.
pub fn compare_extended_median(a: &[u64], b: &[u64]) -> Ordering {
    let (mid_a, mid_b) = (a.len() / 2, b.len() / 2);
    let mut offset: isize = -1;
    loop {
        let (Some(x), Some(y)) = (at_offset(a, mid_a, offset), at_offset(b, mid_b, offset)) else {
            return Ordering::Equal;
        };
        match x.cmp(&y) {
            Ordering::Equal => {}
            other => return other,
        }
        offset = if offset < 0 { -offset } else { -offset - 1 };
    }
}

fn at_offset(times: &[u64], mid: usize, offset: isize) -> Option<u64> {
    let position = mid.checked_add_signed(offset)?;
    times.get(position).copied()
}

/// XOR together the signatures of a round's judges.
pub fn whitening<'a>(signatures: impl IntoIterator<Item = &'a Signature>) -> Whitening {
    let mut whitening = [0u8; SIGNATURE_BYTES];
    for signature in signatures {
        for (out, byte) in whitening.iter_mut().zip(signature.as_ref()) {
            *out ^= *byte;
        }
    }
    whitening
}

/// Compare two hashes after XOR-ing each byte with the whitening value.
pub fn compare_whitened(a: &Hash, b: &Hash, whitening: &Whitening) -> Ordering {
    let (a, b) = (a.to_bytes(), b.to_bytes());
    a.iter()
        .zip(b.iter())
        .zip(whitening.iter())
        .map(|((x, y), w)| (x ^ w).cmp(&(y ^ w)))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Fame coin: the low bit of the middle byte of the voter's signature.
pub fn coin(signature: &Signature) -> bool {
    let bytes = signature.as_ref();
    bytes.get(bytes.len() / 2).is_some_and(|byte| byte & 1 == 1)
}

/// Sort key of an event that just reached consensus.
#[derive(Debug, Clone)]
pub struct OrderKey {
    pub consensus_timestamp_nanos: u64,
    /// Received times, sorted ascending.
    pub received_times: Vec<u64>,
    pub generation: u64,
    pub hash: Hash,
}

/// Total order of events received in the same round.
pub fn compare_consensus_order(a: &OrderKey, b: &OrderKey, whitening: &Whitening) -> Ordering {
    a.consensus_timestamp_nanos
        .cmp(&b.consensus_timestamp_nanos)
        .then_with(|| compare_extended_median(&a.received_times, &b.received_times))
        .then_with(|| a.generation.cmp(&b.generation))
        .then_with(|| compare_whitened(&a.hash, &b.hash, whitening))
}
