use std::fs;
use std::ops::Range;
use std::path::Path;

use crate::data::idx;

/// In-memory digit dataset with a wrap-around read cursor.
///
/// `next_batch` serves fixed-size minibatches restricted to the first
/// `boundary` examples; everything past the boundary is never touched by
/// the cursor, which makes the tail usable as a fixed validation slice.
/// The epoch counter advances once each time the cursor wraps back to the
/// start of the stream.
#[derive(Debug)]
pub struct DigitSet {
    images: Vec<Vec<f64>>,
    labels: Vec<u8>,
    cursor: usize,
    epochs_completed: usize,
}

impl DigitSet {
    pub fn new(images: Vec<Vec<f64>>, labels: Vec<u8>) -> Result<DigitSet, String> {
        if images.is_empty() {
            return Err("dataset must contain at least one example".to_owned());
        }
        if images.len() != labels.len() {
            return Err(format!(
                "image/label count mismatch: {} images vs {} labels",
                images.len(),
                labels.len()
            ));
        }
        Ok(DigitSet {
            images,
            labels,
            cursor: 0,
            epochs_completed: 0,
        })
    }

    /// Loads the training image/label IDX pair from `dir`
    /// (`train-images-idx3-ubyte` / `train-labels-idx1-ubyte`).
    pub fn from_idx_dir(dir: &Path) -> Result<DigitSet, String> {
        let image_path = dir.join("train-images-idx3-ubyte");
        let label_path = dir.join("train-labels-idx1-ubyte");
        let image_bytes = fs::read(&image_path)
            .map_err(|e| format!("cannot read {}: {}", image_path.display(), e))?;
        let label_bytes = fs::read(&label_path)
            .map_err(|e| format!("cannot read {}: {}", label_path.display(), e))?;
        let (images, labels) = idx::parse_idx_pair(&image_bytes, &label_bytes)?;
        DigitSet::new(images, labels)
    }

    pub fn num_examples(&self) -> usize {
        self.images.len()
    }

    /// Number of completed passes over the `[0, boundary)` stream.
    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    /// Fixed-range view of the stored images, unaffected by the cursor.
    pub fn images(&self, range: Range<usize>) -> &[Vec<f64>] {
        &self.images[range]
    }

    /// Fixed-range view of the stored labels, unaffected by the cursor.
    pub fn labels(&self, range: Range<usize>) -> &[u8] {
        &self.labels[range]
    }

    /// Returns exactly `size` (image, label) pairs read in order from the
    /// cursor, restricted to the first `boundary` examples. When the cursor
    /// reaches the boundary it wraps to position 0 and the epoch counter
    /// increments — once per wrap, even when a single call wraps more than
    /// once.
    pub fn next_batch(&mut self, size: usize, boundary: usize) -> (Vec<Vec<f64>>, Vec<u8>) {
        assert!(size > 0, "batch size must be at least 1");
        assert!(
            boundary > 0 && boundary <= self.images.len(),
            "boundary {} out of range for {} examples",
            boundary,
            self.images.len()
        );
        let mut images = Vec::with_capacity(size);
        let mut labels = Vec::with_capacity(size);
        while images.len() < size {
            if self.cursor >= boundary {
                self.cursor = 0;
                self.epochs_completed += 1;
            }
            let take = (size - images.len()).min(boundary - self.cursor);
            for i in self.cursor..self.cursor + take {
                images.push(self.images[i].clone());
                labels.push(self.labels[i]);
            }
            self.cursor += take;
        }
        (images, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(n: usize) -> DigitSet {
        let images = (0..n).map(|i| vec![i as f64]).collect();
        let labels = (0..n).map(|i| (i % 10) as u8).collect();
        DigitSet::new(images, labels).unwrap()
    }

    #[test]
    fn batches_are_always_full_sized() {
        let mut data = synthetic(10);
        // Boundary 7, batch 5: the second batch must wrap to stay full.
        let (first, _) = data.next_batch(5, 7);
        assert_eq!(first.len(), 5);
        assert_eq!(data.epochs_completed(), 0);
        let (second, _) = data.next_batch(5, 7);
        assert_eq!(second.len(), 5);
        assert_eq!(data.epochs_completed(), 1);
        // 5..7 then wrap to 0..3.
        let got: Vec<f64> = second.iter().map(|v| v[0]).collect();
        assert_eq!(got, vec![5.0, 6.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn oversized_request_wraps_once_per_pass() {
        let mut data = synthetic(4);
        // Batch of 9 over a boundary of 3 covers three full passes.
        let (batch, _) = data.next_batch(9, 3);
        assert_eq!(batch.len(), 9);
        assert_eq!(data.epochs_completed(), 2);
        // One more example exhausts the third pass.
        let (_, labels) = data.next_batch(1, 3);
        assert_eq!(labels.len(), 1);
        assert_eq!(data.epochs_completed(), 3);
    }

    #[test]
    fn epoch_increments_exactly_at_the_wrap() {
        let mut data = synthetic(8);
        for expected in 0..3 {
            // Boundary 8, batch 4: two batches per pass.
            data.next_batch(4, 8);
            assert_eq!(data.epochs_completed(), expected);
            data.next_batch(4, 8);
            assert_eq!(data.epochs_completed(), expected);
        }
        data.next_batch(4, 8);
        assert_eq!(data.epochs_completed(), 3);
    }

    #[test]
    fn tail_slice_is_untouched_by_the_cursor() {
        let mut data = synthetic(10);
        data.next_batch(6, 8);
        data.next_batch(6, 8);
        let tail: Vec<f64> = data.images(8..10).iter().map(|v| v[0]).collect();
        assert_eq!(tail, vec![8.0, 9.0]);
        assert_eq!(data.labels(8..10), &[8, 9]);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(DigitSet::new(vec![vec![0.0]], vec![1, 2]).is_err());
        assert!(DigitSet::new(Vec::new(), Vec::new()).is_err());
    }
}
