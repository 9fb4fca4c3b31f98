//! Pipeline données → visualisation du globe de latence.
//!
//! Géométrie, classification, polling, store de vue, moteur de filtres,
//! animation des pulses et tendances historiques. Aucune dépendance HTTP
//! serveur : le kernel expose ce pipeline, il ne le contient pas.

pub mod animation;
pub mod dashboard;
pub mod error;
pub mod filters;
pub mod geo;
pub mod latency;
pub mod models;
pub mod poller;
pub mod reference;
pub mod state;
pub mod store;
pub mod trends;
pub mod upstream;

pub use dashboard::{Dashboard, DashboardConfig, DashboardView};
pub use error::{EdgeError, SourceError, ViewError};
pub use models::{Catalog, Host, LatencyEdge, Provider, Region, TrendSample};
pub use store::ViewStore;
pub use upstream::{HttpSource, LatencySource};
