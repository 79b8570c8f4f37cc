//! Batch planning
//!
//! Splits the tracked entities into contiguous groups small enough for a
//! single `videos.list` call.

use crate::error::{Error, Result};
use crate::models::EntityId;

/// Partition `entity_ids` into ordered batches of at most `max_batch_size`.
///
/// Every input appears exactly once, in its original position; only the last
/// batch may be short.
pub fn plan(entity_ids: &[EntityId], max_batch_size: usize) -> Result<Vec<Vec<EntityId>>> {
    if max_batch_size == 0 {
        return Err(Error::config("max_batch_size must be > 0"));
    }
    Ok(entity_ids
        .chunks(max_batch_size)
        .map(<[EntityId]>::to_vec)
        .collect())
}
