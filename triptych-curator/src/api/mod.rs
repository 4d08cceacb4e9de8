//! HTTP API handlers for triptych-curator

pub mod arcs;
pub mod bundles;
pub mod health;
pub mod reading;
pub mod sessions;

pub use arcs::arc_routes;
pub use bundles::bundle_routes;
pub use health::health_routes;
pub use reading::reading_routes;
pub use sessions::session_routes;
