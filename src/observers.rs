//! Exporters for [`StatsSnapshot`](crate::stats::StatsSnapshot).
//!
//! - [`json`] - Serialize statistics to JSON
//! - [`prometheus`] - Export statistics in Prometheus exposition format
//!
//! Both observers share the [`ObserverError`] type, so switching between them
//! does not change error handling.
//!
//! # Feature Flags
//!
//! - `json` - Enables the [`json`] module
//! - `prometheus` - Enables the [`prometheus`] module
//! - `full` - Enables both
//!
//! # Example
//!
//! ```rust,ignore
//! use visite::observers::Result;
//! use visite::stats::StatsSnapshot;
//!
//! fn export(snapshot: &StatsSnapshot) -> Result<String> {
//!     #[cfg(feature = "prometheus")]
//!     {
//!         use visite::observers::prometheus::PrometheusObserver;
//!         return PrometheusObserver::new().with_namespace("blog").render(snapshot);
//!     }
//!     #[cfg(not(feature = "prometheus"))]
//!     Ok(format!("{:?}", snapshot))
//! }
//! ```

mod error;

pub use error::{ObserverError, Result};

#[cfg(feature = "prometheus")]
pub use error::PrometheusError;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "prometheus")]
pub mod prometheus;
