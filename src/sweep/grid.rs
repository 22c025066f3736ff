//! Lazy Cartesian-product enumeration of sweep domains
//!
//! The enumerator behaves like nested loops with the first variable in the
//! outermost loop and the last variable in the innermost one. It keeps one
//! index per domain (an odometer) and never materializes the grid.

/// Iterator over all grid points, last axis fastest
#[derive(Debug, Clone)]
pub struct GridEnumerator {
    domains: Vec<Vec<f64>>,
    /// Current odometer position
    indices: Vec<usize>,
    /// Points handed out so far
    yielded: usize,
    total: usize,
    exhausted: bool,
}

impl GridEnumerator {
    /// Create an enumerator over `domains`
    pub fn new(domains: Vec<Vec<f64>>) -> Self {
        let total = domains
            .iter()
            .fold(1usize, |acc, d| acc.saturating_mul(d.len()));
        let exhausted = domains.iter().any(Vec::is_empty);
        Self {
            indices: vec![0; domains.len()],
            domains,
            yielded: 0,
            total,
            exhausted,
        }
    }

    /// Total number of points in the grid
    pub fn len_hint(&self) -> usize {
        self.total
    }

    /// Points not yet handed out
    pub fn remaining(&self) -> usize {
        if self.exhausted {
            0
        } else {
            self.total - self.yielded
        }
    }

    /// Pull up to `n` points.
    ///
    /// Returns a short batch when fewer than `n` points remain and `None`
    /// once the grid is exhausted.
    pub fn next_batch(&mut self, n: usize) -> Option<Vec<Vec<f64>>> {
        let batch: Vec<_> = self.by_ref().take(n.max(1)).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    fn advance(&mut self) {
        for axis in (0..self.indices.len()).rev() {
            self.indices[axis] += 1;
            if self.indices[axis] < self.domains[axis].len() {
                return;
            }
            self.indices[axis] = 0;
        }
        // Every axis wrapped (or there are no axes): the grid is done
        self.exhausted = true;
    }
}

impl Iterator for GridEnumerator {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let point = self
            .indices
            .iter()
            .zip(&self.domains)
            .map(|(&i, domain)| domain[i])
            .collect();
        self.yielded += 1;
        self.advance();
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridEnumerator {}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_last_axis_fastest() {
        let grid = GridEnumerator::new(vec![vec![0.0, 1.0], vec![10.0, 20.0, 30.0]]);
        let points: Vec<_> = grid.collect();
        assert_eq!(
            points,
            vec![
                vec![0.0, 10.0],
                vec![0.0, 20.0],
                vec![0.0, 30.0],
                vec![1.0, 10.0],
                vec![1.0, 20.0],
                vec![1.0, 30.0],
            ]
        );
    }

    #[test]
    fn test_counts_and_cycles() {
        let (a, b, c) = (2, 3, 4);
        let points: Vec<_> = GridEnumerator::new(vec![range(a), range(b), range(c)]).collect();
        assert_eq!(points.len(), a * b * c);

        // Last coordinate changes on every step
        for pair in points.windows(2) {
            assert_ne!(pair[0][2], pair[1][2]);
        }
        // First coordinate changes exactly every b*c points
        for (i, pair) in points.windows(2).enumerate() {
            let changed = pair[0][0] != pair[1][0];
            assert_eq!(changed, (i + 1) % (b * c) == 0);
        }
    }

    #[test]
    fn test_short_final_batch_then_none() {
        let mut grid = GridEnumerator::new(vec![range(7)]);
        assert_eq!(grid.next_batch(3).map(|b| b.len()), Some(3));
        assert_eq!(grid.next_batch(3).map(|b| b.len()), Some(3));
        assert_eq!(grid.next_batch(3), Some(vec![vec![6.0]]));
        assert_eq!(grid.next_batch(3), None);
        assert_eq!(grid.next_batch(3), None);
    }

    #[test]
    fn test_empty_domain_yields_nothing() {
        let mut grid = GridEnumerator::new(vec![range(3), vec![]]);
        assert_eq!(grid.len_hint(), 0);
        assert_eq!(grid.next_batch(5), None);
    }

    #[test]
    fn test_no_domains_yields_one_empty_point() {
        let points: Vec<_> = GridEnumerator::new(vec![]).collect();
        assert_eq!(points, vec![Vec::<f64>::new()]);
    }

    #[test]
    fn test_size_hint_tracks_progress() {
        let mut grid = GridEnumerator::new(vec![range(2), range(2)]);
        assert_eq!(grid.len(), 4);
        grid.next();
        assert_eq!(grid.len(), 3);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_grid_size_is_product(sizes in prop::collection::vec(0usize..5, 0..4)) {
            let domains: Vec<_> = sizes.iter().map(|&n| range(n)).collect();
            let expected: usize = sizes.iter().product();
            let count = GridEnumerator::new(domains).count();
            prop_assert_eq!(count, expected);
        }

        #[test]
        fn test_batches_cover_grid_in_order(
            sizes in prop::collection::vec(1usize..4, 1..4),
            batch in 1usize..7,
        ) {
            let domains: Vec<_> = sizes.iter().map(|&n| range(n)).collect();
            let flat: Vec<_> = GridEnumerator::new(domains.clone()).collect();

            let mut grid = GridEnumerator::new(domains);
            let mut batched = Vec::new();
            while let Some(b) = grid.next_batch(batch) {
                prop_assert!(b.len() <= batch);
                batched.extend(b);
            }
            prop_assert_eq!(batched, flat);
        }
    }
}
