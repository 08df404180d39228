// Router module - comparison, selection, validation, and tracking plane
// Gathers quotes across protocol adapters, scores them against the caller's
// priority, and exposes the unified status API over tracking identifiers.

pub mod reliability;
pub mod routes;
pub mod selector;
pub mod tracking;
pub mod validation;

#[allow(clippy::module_inception)]
pub mod router;

pub use reliability::ReliabilityTracker;
pub use router::{create_api_router, BridgeRouter, UnifiedBridgeResult};
pub use routes::{RouteComparison, RouteConstraints, RoutePriority, SelectedRoute};
pub use tracking::TrackingId;
pub use validation::Validator;
