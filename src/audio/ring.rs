use std::collections::VecDeque;

/// Fixed-size window of the most recent levels, oldest first.
///
/// The buffer is always full: it starts as `capacity` zeros and every push
/// evicts the oldest value.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelRing {
    levels: VecDeque<f32>,
    capacity: usize,
}

impl LevelRing {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            levels: std::iter::repeat(0.0).take(capacity).collect(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, level: f32) {
        self.levels.pop_front();
        self.levels.push_back(level);
    }

    pub fn snapshot(&self) -> Vec<f32> {
        self.levels.iter().copied().collect()
    }

    /// Adapts the buffer to a display of `len` bars: the most recent `len`
    /// levels when enough are held, otherwise zeros on the oldest end.
    pub fn window(&self, len: usize) -> Vec<f32> {
        fit_window(&self.snapshot(), len)
    }

    /// Scales every level by `factor`; returns true once all of them are
    /// below `epsilon`.
    pub fn decay(&mut self, factor: f32, epsilon: f32) -> bool {
        let mut settled = true;
        for level in self.levels.iter_mut() {
            *level *= factor;
            if *level >= epsilon {
                settled = false;
            }
        }
        settled
    }

    pub fn is_silent(&self) -> bool {
        self.levels.iter().all(|level| *level == 0.0)
    }

    pub fn clear(&mut self) {
        self.levels.iter_mut().for_each(|level| *level = 0.0);
    }
}

/// The most recent `len` of `levels` (oldest first), zero-padded on the
/// oldest end when fewer are available.
pub fn fit_window(levels: &[f32], len: usize) -> Vec<f32> {
    if levels.len() >= len {
        levels[levels.len() - len..].to_vec()
    } else {
        let mut out = vec![0.0; len - levels.len()];
        out.extend_from_slice(levels);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_length_is_constant() {
        for capacity in [1usize, 2, 5, 32, 48] {
            for pushes in [0usize, 1, capacity.saturating_sub(1), capacity, capacity + 1, capacity * 3] {
                let mut ring = LevelRing::new(capacity);
                for i in 0..pushes {
                    ring.push(i as f32);
                }
                assert_eq!(ring.snapshot().len(), capacity, "capacity={capacity} pushes={pushes}");
            }
        }
    }

    #[test]
    fn test_zero_capacity_raised() {
        let ring = LevelRing::new(0);
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.snapshot(), vec![0.0]);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut ring = LevelRing::new(3);
        ring.push(0.1);
        assert_eq!(ring.snapshot(), vec![0.0, 0.0, 0.1]);

        ring.push(0.2);
        ring.push(0.3);
        ring.push(0.4);
        assert_eq!(ring.snapshot(), vec![0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_window_slices_most_recent() {
        let mut ring = LevelRing::new(4);
        for level in [0.1, 0.2, 0.3, 0.4] {
            ring.push(level);
        }
        assert_eq!(ring.window(2), vec![0.3, 0.4]);
        assert_eq!(ring.window(4), ring.snapshot());
        assert!(ring.window(0).is_empty());
    }

    #[test]
    fn test_window_left_pads() {
        let mut ring = LevelRing::new(2);
        ring.push(0.5);
        ring.push(0.6);
        assert_eq!(ring.window(5), vec![0.0, 0.0, 0.0, 0.5, 0.6]);
    }

    #[test]
    fn test_fit_window_on_slices() {
        assert_eq!(fit_window(&[0.1, 0.2, 0.3], 2), vec![0.2, 0.3]);
        assert_eq!(fit_window(&[0.1], 3), vec![0.0, 0.0, 0.1]);
        assert!(fit_window(&[], 0).is_empty());
    }

    #[test]
    fn test_decay_until_settled() {
        let mut ring = LevelRing::new(3);
        ring.push(1.0);
        ring.push(0.5);

        let mut steps = 0;
        while !ring.decay(0.9, 0.01) {
            steps += 1;
            assert!(steps < 100);
        }
        assert!(steps > 0);
        assert!(ring.snapshot().iter().all(|level| *level < 0.01));

        ring.clear();
        assert!(ring.is_silent());
    }
}
