/// Splitting selected keys into request-sized batches and accounting progress.
use serde::Serialize;

pub const DEFAULT_BATCH_SIZE: usize = 60;

/// Keys submitted together in one provider request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationBatch {
    /// One-based position of the batch within its run.
    pub index: usize,
    pub keys: Vec<String>,
}

impl TranslationBatch {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Partitions `keys` into consecutive batches of at most `batch_size`.
///
/// A zero batch size is treated as one so the partition always terminates.
pub fn plan_batches(keys: &[String], batch_size: usize) -> Vec<TranslationBatch> {
    let size = batch_size.max(1);
    keys.chunks(size)
        .enumerate()
        .map(|(position, chunk)| TranslationBatch {
            index: position + 1,
            keys: chunk.to_vec(),
        })
        .collect()
}

/// Front-loaded percentage schedule for a run of `batch_count` batches.
///
/// Half of one batch's share is shown before any request returns, the rest is
/// spread evenly over the batches, and the last batch lands on exactly 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressPlan {
    batch_count: usize,
}

impl ProgressPlan {
    pub fn new(batch_count: usize) -> Self {
        Self { batch_count }
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    pub fn initial(&self) -> f32 {
        if self.batch_count == 0 {
            return 100.0;
        }
        100.0 / (2.0 * self.batch_count as f32)
    }

    pub fn after_batch(&self, completed: usize) -> f32 {
        if self.batch_count == 0 || completed >= self.batch_count {
            return 100.0;
        }
        let initial = self.initial();
        let step = (100.0 - initial) / self.batch_count as f32;
        (initial + completed as f32 * step).min(100.0)
    }
}
