//! Ownership gate for route-scoped operations.
//!
//! # Invariants
//! - A route resolves only for its owner.
//! - "Does not exist" and "not yours" produce the same error value.

use crate::model::route::{ActorId, Route, RouteId};
use crate::repo::route_repo::RouteRepository;
use crate::service::{Resource, ServiceError};
use log::debug;

/// Proof that an actor owns a route.
///
/// Only [`AccessGate::authorize`] constructs it, so holding one means the
/// ownership check already ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRoute {
    actor: ActorId,
    route: Route,
}

impl AuthorizedRoute {
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn id(&self) -> RouteId {
        self.route.id
    }

    pub fn into_route(self) -> Route {
        self.route
    }
}

/// Resolves routes on behalf of an actor.
pub trait AccessGate {
    /// Returns the route when `actor` owns it, `NotFound` otherwise.
    fn authorize(&self, actor: ActorId, route_id: RouteId)
        -> Result<AuthorizedRoute, ServiceError>;
}

impl<R: RouteRepository> AccessGate for R {
    fn authorize(
        &self,
        actor: ActorId,
        route_id: RouteId,
    ) -> Result<AuthorizedRoute, ServiceError> {
        match self.find_owned_route(actor, route_id)? {
            Some(route) => Ok(AuthorizedRoute { actor, route }),
            None => {
                debug!("event=route_authorize module=access status=denied route_id={route_id}");
                Err(ServiceError::NotFound(Resource::Route(route_id)))
            }
        }
    }
}
