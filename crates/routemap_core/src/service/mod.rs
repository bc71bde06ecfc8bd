//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce input validation and ownership before any write.
//!
//! # Invariants
//! - Every route-scoped operation goes through [`access::AccessGate`].
//! - Missing and foreign resources surface as the same `NotFound` value.

use crate::model::point::{PointId, PositionValidationError};
use crate::model::route::{ActorId, ImageId, RouteId};
use crate::repo::point_repo::PointRepoError;
use crate::repo::route_repo::RouteRepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod access;
pub mod point_service;
pub mod route_service;

/// Resource addressed by a failed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Actor(ActorId),
    Image(ImageId),
    ImageSlug(String),
    Route(RouteId),
    Point(PointId),
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Actor(id) => write!(f, "actor {id}"),
            Self::Image(id) => write!(f, "background image {id}"),
            Self::ImageSlug(slug) => write!(f, "background image `{slug}`"),
            Self::Route(id) => write!(f, "route {id}"),
            Self::Point(id) => write!(f, "route point {id}"),
        }
    }
}

/// Errors from use-case services.
#[derive(Debug)]
pub enum ServiceError {
    /// Coordinate payload rejected before any write.
    InvalidPosition(PositionValidationError),
    /// Text field is blank after trim.
    BlankField(&'static str),
    /// Resource does not exist in the actor's scope.
    NotFound(Resource),
    /// Username is already registered.
    UsernameTaken(String),
    /// Image still backs at least one route.
    ImageInUse(ImageId),
    /// Route point storage failure.
    PointRepo(PointRepoError),
    /// Actor/image/route storage failure.
    RouteRepo(RouteRepoError),
}

impl ServiceError {
    /// Input was rejected and nothing was written.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidPosition(_) | Self::BlankField(_))
    }

    /// Target is missing or not visible to the actor.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Request conflicts with current state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UsernameTaken(_) | Self::ImageInUse(_))
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPosition(err) => write!(f, "{err}"),
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::NotFound(resource) => write!(f, "{resource} not found"),
            Self::UsernameTaken(name) => write!(f, "username already taken: {name}"),
            Self::ImageInUse(id) => {
                write!(f, "background image is used by existing routes: {id}")
            }
            Self::PointRepo(err) => write!(f, "{err}"),
            Self::RouteRepo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPosition(err) => Some(err),
            Self::PointRepo(err) => Some(err),
            Self::RouteRepo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PositionValidationError> for ServiceError {
    fn from(value: PositionValidationError) -> Self {
        Self::InvalidPosition(value)
    }
}

impl From<PointRepoError> for ServiceError {
    fn from(value: PointRepoError) -> Self {
        match value {
            PointRepoError::RouteNotFound(id) => Self::NotFound(Resource::Route(id)),
            PointRepoError::PointNotFound(id) => Self::NotFound(Resource::Point(id)),
            other => Self::PointRepo(other),
        }
    }
}

impl From<RouteRepoError> for ServiceError {
    fn from(value: RouteRepoError) -> Self {
        match value {
            RouteRepoError::ActorNotFound(id) => Self::NotFound(Resource::Actor(id)),
            RouteRepoError::ImageNotFound(id) => Self::NotFound(Resource::Image(id)),
            RouteRepoError::RouteNotFound(id) => Self::NotFound(Resource::Route(id)),
            RouteRepoError::UsernameTaken(name) => Self::UsernameTaken(name),
            RouteRepoError::ImageInUse(id) => Self::ImageInUse(id),
            other => Self::RouteRepo(other),
        }
    }
}

/// Trims `value`, rejecting blank input.
pub(crate) fn normalize_required(
    field: &'static str,
    value: &str,
) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::BlankField(field));
    }
    Ok(trimmed.to_string())
}

/// Trims optional text, mapping blank input to `None`.
pub(crate) fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}
