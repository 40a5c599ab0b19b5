//! Object-detection backends for the model strategy.

mod stub;
#[cfg(feature = "backend-tract")]
mod tract;

pub use stub::StubBackend;
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
