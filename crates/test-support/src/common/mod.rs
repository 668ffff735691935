//! Recording observers and sample identities used across test suites.

mod observers;

pub use observers::{RecordingObserver, sample_user};
