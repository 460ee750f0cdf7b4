//! Progress-callback trait for per-image pipeline events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline processes each image. The CLI uses it to drive an
//! `indicatif` progress bar; library users can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_mcq::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     accepted: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_image_complete(
//!         &self,
//!         _index: usize,
//!         _total: usize,
//!         source: &str,
//!         accepted: usize,
//!         _rejected: usize,
//!     ) {
//!         self.accepted.fetch_add(accepted, Ordering::SeqCst);
//!         eprintln!("{source}: {accepted} question(s)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { accepted: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each image.
///
/// When `concurrency > 1`, image-level methods may be called concurrently
/// and out of order. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first image.
    fn on_run_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called before an image is loaded and sent to the model.
    ///
    /// `index` is 1-based in input order.
    fn on_image_start(&self, index: usize, total: usize, source: &str) {
        let _ = (index, total, source);
    }

    /// Called when an image was extracted and its questions classified.
    fn on_image_complete(
        &self,
        index: usize,
        total: usize,
        source: &str,
        accepted: usize,
        rejected: usize,
    ) {
        let _ = (index, total, source, accepted, rejected);
    }

    /// Called when an image failed (load, encode, extraction or parse).
    fn on_image_error(&self, index: usize, total: usize, source: &str, error: &str) {
        let _ = (index, total, source, error);
    }

    /// Called once after every image has been attempted.
    fn on_run_complete(&self, total_images: usize, succeeded: usize) {
        let _ = (total_images, succeeded);
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        accepted: AtomicUsize,
        errors: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_image_start(&self, _index: usize, _total: usize, _source: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_complete(&self, _i: usize, _t: usize, _s: &str, accepted: usize, _r: usize) {
            self.accepted.fetch_add(accepted, Ordering::SeqCst);
        }

        fn on_image_error(&self, _i: usize, _t: usize, _s: &str, _e: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, _total: usize, succeeded: usize) {
            self.succeeded.store(succeeded, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_image_start(1, 2, "a.png");
        cb.on_image_complete(1, 2, "a.png", 4, 0);
        cb.on_image_error(2, 2, "b.png", "timeout");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_image_start(1, 2, "a.png");
        cb.on_image_complete(1, 2, "a.png", 3, 1);
        cb.on_image_start(2, 2, "b.png");
        cb.on_image_error(2, 2, "b.png", "unparseable reply");
        cb.on_run_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.accepted.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 1);
    }
}
