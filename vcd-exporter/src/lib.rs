/*!
 * VCD EXPORTER - Multi-tenant VMware Cloud Director exporter for Prometheus
 *
 * ROLE: turns one scrape of `/vcd?target=<section>` into a fresh walk of the
 * organization -> VDC -> vApp -> VM inventory of the configured vCD endpoint,
 * rendered in the Prometheus text format.
 *
 * PIPELINE: config (TargetStore) -> connection (scoped session) -> traversal
 * -> assembler (MetricSample) -> exposition (text) -> http.
 */

pub mod assembler;
pub mod collector;
pub mod config;
pub mod connection;
pub mod error;
pub mod exposition;
pub mod http;
pub mod inventory;
pub mod models;
pub mod traversal;
pub mod vcd;

pub use collector::Collector;
pub use config::{TargetConfig, TargetStore};
pub use error::{CollectError, Level};
pub use inventory::{Connector, Session};
pub use traversal::Collection;
