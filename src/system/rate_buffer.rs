use std::collections::VecDeque;

use crate::system::sampler::RateSample;

/// Default number of points kept for the rolling graph
pub const DEFAULT_CAPACITY: usize = 50;

/// Fixed-capacity FIFO of recent rate samples. Pushing past capacity drops
/// the oldest sample.
#[derive(Debug, Clone)]
pub struct RateBuffer {
    samples: VecDeque<RateSample>,
    capacity: usize,
}

impl RateBuffer {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: RateSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Oldest-first copy, detached from further pushes.
    pub fn snapshot(&self) -> Vec<RateSample> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<RateSample> {
        self.samples.back().copied()
    }

    /// Highest rate in either direction, for scaling the graph
    pub fn peak(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.download_kbps.max(s.upload_kbps))
            .fold(0.0, f64::max)
    }
}

impl Default for RateBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rate(n: usize) -> RateSample {
        RateSample { download_kbps: n as f64, upload_kbps: n as f64 / 2.0 }
    }

    #[test]
    fn test_evicts_oldest_past_capacity() {
        let mut buffer = RateBuffer::new(3);
        for n in 0..4 {
            buffer.push(rate(n));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.snapshot(), vec![rate(1), rate(2), rate(3)]);
        assert_eq!(buffer.latest(), Some(rate(3)));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut buffer = RateBuffer::default();
        buffer.push(rate(1));
        let snap = buffer.snapshot();
        buffer.push(rate(2));
        assert_eq!(snap, vec![rate(1)]);
        assert_eq!(buffer.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_clear_and_peak() {
        let mut buffer = RateBuffer::new(5);
        buffer.push(RateSample { download_kbps: 3.0, upload_kbps: 9.5 });
        buffer.push(RateSample { download_kbps: 7.0, upload_kbps: 1.0 });
        assert_eq!(buffer.peak(), 9.5);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut buffer = RateBuffer::new(0);
        buffer.push(rate(1));
        buffer.push(rate(2));
        assert_eq!(buffer.snapshot(), vec![rate(2)]);
    }

    proptest! {
        #[test]
        fn prop_keeps_most_recent_in_order(capacity in 1usize..64, pushes in 0usize..200) {
            let mut buffer = RateBuffer::new(capacity);
            for n in 0..pushes {
                buffer.push(rate(n));
            }
            let expected: Vec<RateSample> = (pushes.saturating_sub(capacity)..pushes).map(rate).collect();
            prop_assert!(buffer.len() <= capacity);
            prop_assert_eq!(buffer.snapshot(), expected);
        }
    }
}
