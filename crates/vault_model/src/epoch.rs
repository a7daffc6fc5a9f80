//! Epoch clock
//!
//! Maps wall-clock seconds onto a monotonic epoch index:
//! `epoch = (timestamp - genesis) / epoch_length`.
//! Timestamps before genesis map to epoch 0.

/// Epoch index
pub type Epoch = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EpochClock {
    /// Timestamp at which epoch 0 begins (seconds)
    pub genesis_timestamp: u64,
    /// Epoch length in seconds (must be non-zero)
    pub epoch_length: u64,
}

impl EpochClock {
    pub const fn new(genesis_timestamp: u64, epoch_length: u64) -> Self {
        Self { genesis_timestamp, epoch_length }
    }

    pub fn is_valid(&self) -> bool {
        self.epoch_length > 0
    }

    /// Epoch containing `timestamp`
    #[inline]
    pub fn epoch_at(&self, timestamp: u64) -> Epoch {
        if self.epoch_length == 0 {
            return 0;
        }
        timestamp.saturating_sub(self.genesis_timestamp) / self.epoch_length
    }

    /// First second of `epoch` (saturates at u64::MAX)
    #[inline]
    pub fn epoch_start(&self, epoch: Epoch) -> u64 {
        epoch
            .saturating_mul(self.epoch_length)
            .saturating_add(self.genesis_timestamp)
    }

    /// First second of the epoch after the one containing `timestamp`
    pub fn next_epoch_start(&self, timestamp: u64) -> u64 {
        self.epoch_start(self.epoch_at(timestamp).saturating_add(1))
    }

    pub fn secs_until_next_epoch(&self, timestamp: u64) -> u64 {
        self.next_epoch_start(timestamp).saturating_sub(timestamp)
    }
}


#[cfg(kani)]
mod proofs {
    use super::*;

    /// Epoch index never decreases as time moves forward
    #[kani::proof]
    fn proof_epoch_monotonic() {
        let genesis: u64 = kani::any();
        let length: u64 = kani::any();
        let t1: u64 = kani::any();
        let t2: u64 = kani::any();
        kani::assume(length > 0);
        kani::assume(t1 <= t2);

        let clock = EpochClock::new(genesis, length);
        assert!(clock.epoch_at(t1) <= clock.epoch_at(t2));
    }
}
