//! Core domain logic for routemap.
//! This crate is the single source of truth for route and point invariants.

pub mod api;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use api::{handle, status_for, ApiBody, ApiRequest, ApiResponse};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_logging_with, logging_status, LogTarget};
pub use model::point::{PointId, Position, PositionValidationError, RoutePoint};
pub use model::route::{
    slugify, Actor, ActorId, BackgroundImage, ImageId, Route, RouteDetail, RouteId,
};
pub use repo::point_repo::{PointRepoError, PointRepository, SqlitePointRepository};
pub use repo::route_repo::{RouteRepoError, RouteRepository, SqliteRouteRepository};
pub use service::access::{AccessGate, AuthorizedRoute};
pub use service::point_service::{PointService, RepackReport};
pub use service::route_service::{ImageUpload, RouteDraft, RouteService};
pub use service::{Resource, ServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
