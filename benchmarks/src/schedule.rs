//! Chunk counts swept across trials

use crate::error::{BenchError, Result};

/// Chunk counts to run, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSchedule {
    values: Vec<u64>,
}

impl ChunkSchedule {
    /// Every `n` in `[min_chunks, max_chunks]`, or `2^n` with `exp_chunks`.
    ///
    /// Without both bounds the schedule is a single trial with one chunk.
    pub fn new(min_chunks: Option<u32>, max_chunks: Option<u32>, exp_chunks: bool) -> Result<Self> {
        let (min, max) = match (min_chunks, max_chunks) {
            (Some(min), Some(max)) if min > 0 && max > 0 => (min, max),
            _ => return Ok(Self::single()),
        };

        if min > max {
            return Err(BenchError::InvalidChunkRange { min, max });
        }

        let values = (min..=max)
            .map(|n| {
                if exp_chunks {
                    2u64.checked_pow(n).ok_or(BenchError::ChunkOverflow(n))
                } else {
                    Ok(u64::from(n))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { values })
    }

    pub fn single() -> Self {
        Self { values: vec![1] }
    }

    pub fn values(&self) -> &[u64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_range() {
        let schedule = ChunkSchedule::new(Some(2), Some(4), false).unwrap();
        assert_eq!(schedule.values(), &[2, 3, 4]);
    }

    #[test]
    fn test_exponential_range() {
        let schedule = ChunkSchedule::new(Some(2), Some(4), true).unwrap();
        assert_eq!(schedule.values(), &[4, 8, 16]);
    }

    #[test]
    fn test_missing_bound_runs_once() {
        assert_eq!(ChunkSchedule::new(None, Some(4), false).unwrap().values(), &[1]);
        assert_eq!(ChunkSchedule::new(Some(2), None, true).unwrap().values(), &[1]);
        assert_eq!(ChunkSchedule::new(None, None, false).unwrap(), ChunkSchedule::single());
    }

    #[test]
    fn test_zero_bound_runs_once() {
        assert_eq!(ChunkSchedule::new(Some(0), Some(4), false).unwrap().values(), &[1]);
    }

    #[test]
    fn test_inverted_range_is_an_error() {
        assert!(matches!(
            ChunkSchedule::new(Some(5), Some(2), false),
            Err(BenchError::InvalidChunkRange { min: 5, max: 2 })
        ));
    }

    #[test]
    fn test_exponent_overflow() {
        assert!(matches!(
            ChunkSchedule::new(Some(63), Some(64), true),
            Err(BenchError::ChunkOverflow(64))
        ));
    }
}
