//! Random image selection
//!
//! Randomness comes from a [`RandomSource`] so selection can be pinned down in tests.

use crate::image::ImageFormat;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("no images configured")]
    EmptyRange,
    #[error("no images found in the bucket")]
    NoImages,
}

/// Source of random indices.
pub trait RandomSource: Send + Sync + 'static {
    /// Returns an index in `0..upper`. `upper` is never zero.
    fn next_index(&self, upper: usize) -> usize;
}

/// Thread-local RNG from the `rand` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_index(&self, upper: usize) -> usize {
        rand::rng().random_range(0..upper)
    }
}

/// Always yields the same index (modulo `upper`)
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(usize);

impl FixedRandom {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }
}

impl RandomSource for FixedRandom {
    fn next_index(&self, upper: usize) -> usize {
        self.0 % upper
    }
}

/// Yields the given indices in order, wrapping around (each modulo `upper`)
pub struct SequenceRandom {
    indices: Vec<usize>,
    cursor: AtomicUsize,
}

impl SequenceRandom {
    /// # Panics
    /// Panics if `indices` is empty
    #[must_use]
    pub fn new(indices: Vec<usize>) -> Self {
        assert!(!indices.is_empty(), "SequenceRandom needs at least one index");
        Self {
            indices,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl fmt::Debug for SequenceRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceRandom")
            .field("indices", &self.indices)
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}

impl RandomSource for SequenceRandom {
    fn next_index(&self, upper: usize) -> usize {
        let pos = self.cursor.fetch_add(1, Ordering::Relaxed) % self.indices.len();
        self.indices.get(pos).copied().unwrap_or_default() % upper
    }
}

/// Picks an image number in `1..=count`
///
/// # Errors
/// Returns [`SelectError::EmptyRange`] if `count` is zero
pub fn pick_number(random: &dyn RandomSource, count: usize) -> Result<usize, SelectError> {
    if count == 0 {
        return Err(SelectError::EmptyRange);
    }
    Ok(random.next_index(count) + 1)
}

/// Picks one image key out of a bucket listing, ignoring non-image keys
///
/// # Errors
/// Returns [`SelectError::NoImages`] if the listing has no image keys
pub fn pick_key<'a>(random: &dyn RandomSource, keys: &'a [String]) -> Result<&'a str, SelectError> {
    let images: Vec<&str> = keys
        .iter()
        .map(String::as_str)
        .filter(|key| ImageFormat::is_image_key(key))
        .collect();

    if images.is_empty() {
        return Err(SelectError::NoImages);
    }

    let idx = random.next_index(images.len());
    images.get(idx).copied().ok_or(SelectError::NoImages)
}

/// `{n}.jpg`
#[must_use]
pub fn image_key(number: usize) -> String {
    format!("{number}.jpg")
}

/// Attribution text key for an image key: `3.jpg` -> `3.txt`
#[must_use]
pub fn attribution_key(image_key: &str) -> String {
    let stem = match image_key.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => image_key,
    };
    format!("{stem}.txt")
}
