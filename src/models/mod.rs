pub use mediabatch_core::models::{media, settings};
