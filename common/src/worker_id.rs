use crate::constants::{WORKER_ID_MODULUS, WORKER_ID_TIME_SCALE};

/// The value `worker_register` hands back to a newly-registered worker.
///
/// Historically this packs two unrelated numbers into one integer for
/// wire compatibility (section 4.3 / section 9): the low digits are the
/// worker's real id, the high digits are the master's start time in
/// milliseconds. Callers should go through [`EncodedWorkerId::worker_id`]
/// and [`EncodedWorkerId::master_start_time_ms`] rather than repeating the
/// modulo/division at each use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedWorkerId(pub i64);

impl EncodedWorkerId {
    pub fn encode(worker_id: i64, master_start_time_ms: i64) -> Self {
        EncodedWorkerId(master_start_time_ms * WORKER_ID_TIME_SCALE + worker_id)
    }

    pub fn worker_id(self) -> i64 {
        self.0 % WORKER_ID_MODULUS
    }

    pub fn master_start_time_ms(self) -> i64 {
        self.0 / WORKER_ID_TIME_SCALE
    }

    pub fn raw(self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_worker_id_and_start_time() {
        let encoded = EncodedWorkerId::encode(42, 1_700_000_000_000);
        assert_eq!(encoded.worker_id(), 42);
        assert_eq!(encoded.master_start_time_ms(), 1_700_000_000_000);
    }
}
