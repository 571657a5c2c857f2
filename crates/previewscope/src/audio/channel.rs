//! Single-slot magnitude hand-off
//!
//! `MagnitudeChannel` carries the latest band-magnitude vector from the render
//! path to display-rate readers. Only the newest complete vector is retained;
//! older vectors are overwritten, never queued. The critical section is a
//! fixed-size copy, so neither side blocks for long and the publish path does
//! not allocate.

use std::sync::{Arc, Mutex};

/// Cloneable handle to the shared magnitude slot
#[derive(Debug, Clone)]
pub struct MagnitudeChannel {
    slot: Arc<Mutex<Vec<f32>>>,
    band_count: usize,
}

impl MagnitudeChannel {
    /// Create a channel holding an all-zero vector of `band_count` bands
    pub fn new(band_count: usize) -> Self {
        Self {
            slot: Arc::new(Mutex::new(vec![0.0; band_count])),
            band_count,
        }
    }

    /// Number of bands in every vector this channel carries
    pub fn band_count(&self) -> usize {
        self.band_count
    }

    /// Publish a new vector from the render path.
    ///
    /// Length-mismatched vectors are ignored; the slot always holds a
    /// complete vector of `band_count` elements.
    pub fn publish(&self, magnitudes: &[f32]) {
        if magnitudes.len() != self.band_count {
            return;
        }
        if let Ok(mut slot) = self.slot.lock() {
            slot.copy_from_slice(magnitudes);
        }
    }

    /// Read the latest vector (allocates on the reader side)
    pub fn read_latest(&self) -> Vec<f32> {
        match self.slot.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => vec![0.0; self.band_count],
        }
    }

    /// Copy the latest vector into a caller-provided buffer.
    ///
    /// Returns false (leaving the buffer untouched) if its length does not
    /// match the band count.
    pub fn read_into(&self, out: &mut [f32]) -> bool {
        if out.len() != self.band_count {
            return false;
        }
        if let Ok(slot) = self.slot.lock() {
            out.copy_from_slice(&slot);
            true
        } else {
            false
        }
    }

    /// Zero the slot (called on stop/reload)
    pub fn reset(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.fill(0.0);
        }
    }
}
