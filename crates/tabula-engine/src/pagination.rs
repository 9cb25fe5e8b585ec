//! Pagination Controller
//!
//! Offset and batch arithmetic for incremental loading. Paging stops at the
//! record cap or on the first short page.

use tabula_core::EngineError;

/// Rows to request for the next page.
///
/// Zero or negative means the cap is reached and paging must stop.
pub fn next_batch_size(offset: usize, records_per_batch: usize, max_records: usize) -> i64 {
    let offset = offset as i64;
    let batch = records_per_batch as i64;
    let max = max_records as i64;
    if offset + batch > max {
        max - offset
    } else {
        batch
    }
}

/// Offset after a page of `fetched` rows and whether to keep paging.
pub fn advance(offset: usize, fetched: usize, requested: usize, max_records: usize) -> (usize, bool) {
    let new_offset = offset + fetched;
    (new_offset, new_offset < max_records && fetched == requested)
}

/// Tracks whether more pages exist and whether one is being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageCursor {
    has_more: bool,
    in_flight: bool,
}

impl PageCursor {
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Start over after a full reload.
    pub fn reset(&mut self, has_more: bool) {
        self.has_more = has_more;
        self.in_flight = false;
    }

    /// Claim the cursor for a page load.
    pub fn begin(&mut self) -> Result<(), EngineError> {
        if self.in_flight {
            return Err(EngineError::LoadInProgress);
        }
        self.in_flight = true;
        Ok(())
    }

    /// Release the cursor after a page landed.
    pub fn complete(&mut self, has_more: bool) {
        self.in_flight = false;
        self.has_more = has_more;
    }

    /// Release the cursor after a failed or discarded load.
    pub fn abort(&mut self) {
        self.in_flight = false;
    }

    /// Stop paging without a load.
    pub fn exhaust(&mut self) {
        self.has_more = false;
        self.in_flight = false;
    }
}
