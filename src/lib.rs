//! Inference Gatekeeper Library
//!
//! Admission control for a gateway fronting a remote video-understanding
//! model API. The controller bounds how many inference calls are in flight
//! at once and how many are started per trailing minute and hour, and makes
//! queued callers give up after a configurable timeout instead of piling up.
//!
//! Orchestration code acquires a permit before contacting the model and
//! holds it for the duration of the call; the permit is an RAII guard, so
//! the slot comes back on success, failure, panic, and cancellation alike.
//!
//! ```
//! use inference_gatekeeper::{Admission, AdmissionConfig, AdmissionController};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let controller = AdmissionController::new(AdmissionConfig::default());
//!
//! match controller.acquire().await {
//!     Admission::Granted(permit) => {
//!         // call the model API here; the slot frees when `permit` drops
//!         permit.release();
//!     }
//!     Admission::Disabled => {
//!         // limiter switched off, proceed untracked
//!     }
//!     Admission::TimedOut => {
//!         // surface "service busy" upstream, do not call the model
//!     }
//! }
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod status;
pub mod window;

pub use config::{AdmissionConfig, ConfigError, GatekeeperConfig, LoggingConfig};
pub use controller::{Admission, AdmissionController, AdmissionPermit};
pub use status::{AdmissionStatus, ConcurrencyStatus, WindowStatus};
pub use window::SlidingWindow;
