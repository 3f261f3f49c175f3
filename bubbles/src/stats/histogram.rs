//! Fixed-edge histograms over `f64` samples.

use crate::error::{Result, SegmentError};

/// Histogram with explicit bin edges.
///
/// Bins are half-open `[lo, hi)` except the last, which also holds its
/// upper edge. Samples outside the edges are not counted.
#[derive(Debug, Clone)]
pub struct Histogram {
    bin_edges: Vec<f64>,
    counts: Vec<u64>,
    total_count: u64,
}

impl Histogram {
    /// Create a histogram from at least two strictly ascending finite edges.
    pub fn new(bin_edges: Vec<f64>) -> Result<Self> {
        if bin_edges.len() < 2 {
            return Err(SegmentError::invalid("histogram must have at least 2 bin edges"));
        }
        if bin_edges.iter().any(|e| !e.is_finite()) {
            return Err(SegmentError::invalid("histogram bin edges must be finite"));
        }
        if bin_edges.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(SegmentError::invalid("histogram bin edges must be in ascending order"));
        }

        let counts = vec![0; bin_edges.len() - 1];
        Ok(Self {
            bin_edges,
            counts,
            total_count: 0,
        })
    }

    /// Equally spaced bins over `[min, max]`.
    pub fn new_equal_bins(min: f64, max: f64, num_bins: usize) -> Result<Self> {
        if num_bins == 0 {
            return Err(SegmentError::invalid("histogram must have at least 1 bin"));
        }
        let step = (max - min) / num_bins as f64;
        let edges = (0..=num_bins)
            .map(|i| {
                if i == num_bins {
                    max
                } else {
                    min + step * i as f64
                }
            })
            .collect();
        Self::new(edges)
    }

    pub fn add(&mut self, value: f64) {
        if let Some(bin) = self.find_bin(value) {
            self.counts[bin] += 1;
            self.total_count += 1;
        }
    }

    pub fn add_all<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = f64>,
    {
        for value in values {
            self.add(value);
        }
    }

    fn find_bin(&self, value: f64) -> Option<usize> {
        let last = self.counts.len() - 1;
        if value == self.bin_edges[last + 1] {
            return Some(last);
        }
        // First edge strictly greater than the value closes its bin
        let upper = self.bin_edges.partition_point(|&edge| edge <= value);
        if upper == 0 || upper > last + 1 {
            None
        } else {
            Some(upper - 1)
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn bin_edges(&self) -> &[f64] {
        &self.bin_edges
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn widths(&self) -> Vec<f64> {
        self.bin_edges
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    pub fn centers(&self) -> Vec<f64> {
        self.bin_edges
            .windows(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect()
    }

    /// Counts divided by total count and bin width, so that the density
    /// integrates to 1 over the edges. All zeros for an empty histogram.
    pub fn density(&self) -> Vec<f64> {
        if self.total_count == 0 {
            return vec![0.0; self.counts.len()];
        }
        let total = self.total_count as f64;
        self.counts
            .iter()
            .zip(self.widths())
            .map(|(&count, width)| count as f64 / (total * width))
            .collect()
    }
}
