//! Route point use-case service.
//!
//! # Responsibility
//! - Own every mutation of a route's point set.
//! - Keep `order` dense (`0..n`) across append, remove and repair.
//!
//! # Invariants
//! - Callers never choose `order`; append derives it from current rows.
//! - Remove shifts every later sibling down by exactly one, atomically.
//! - Each mutation runs in one write-locked transaction, so mutations on the
//!   same route observe a total order.

use crate::model::point::{PointId, Position, RoutePoint};
use crate::model::route::{ActorId, RouteId};
use crate::repo::point_repo::{PointRepoResult, PointRepository, PointStore};
use crate::service::access::{AccessGate, AuthorizedRoute};
use crate::service::{Resource, ServiceError};
use log::{info, warn};
use serde::Serialize;
use std::time::Instant;

/// Outcome of a repair pass over one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepackReport {
    /// Points under the route after the pass.
    pub total: usize,
    /// Points whose order value changed.
    pub renumbered: usize,
}

/// Ordered collection manager for route points.
pub struct PointService<P: PointRepository, G: AccessGate> {
    points: P,
    gate: G,
}

impl<P: PointRepository, G: AccessGate> PointService<P, G> {
    /// Creates service from point storage and an ownership gate.
    pub fn new(points: P, gate: G) -> Self {
        Self { points, gate }
    }

    /// Appends one point at the end of the route.
    ///
    /// # Errors
    /// - `InvalidPosition` when a coordinate is outside `[0.0, 1.0]`; nothing
    ///   is written.
    /// - `NotFound` when the route is missing or owned by someone else.
    pub fn append(
        &self,
        actor: ActorId,
        route_id: RouteId,
        position: Position,
    ) -> Result<RoutePoint, ServiceError> {
        let route = self.gate.authorize(actor, route_id)?;
        position.validate()?;

        let started_at = Instant::now();
        let point = self.points.write(|store| {
            ensure_route_present(store, &route)?;
            if !is_dense(store, route.id())? {
                let report = repack_in(store, route.id())?;
                warn!(
                    "event=point_order_repair module=point_service status=ok route_id={} total={} renumbered={}",
                    route.id(),
                    report.total,
                    report.renumbered
                );
            }

            let mut next_order = store.max_order(route.id())?.map_or(0, |max| max + 1);
            while store.order_taken(route.id(), next_order)? {
                next_order += 1;
            }
            store
                .insert_point(route.id(), position, next_order)
                .map_err(ServiceError::from)
        })?;

        info!(
            "event=point_append module=point_service status=ok route_id={} point_id={} order={} duration_ms={}",
            route.id(),
            point.id,
            point.order,
            started_at.elapsed().as_millis()
        );
        Ok(point)
    }

    /// Removes one point and closes the gap it leaves.
    ///
    /// A point that exists under a different route is reported exactly like
    /// a missing one.
    pub fn remove(
        &self,
        actor: ActorId,
        route_id: RouteId,
        point_id: PointId,
    ) -> Result<(), ServiceError> {
        let route = self.gate.authorize(actor, route_id)?;

        let started_at = Instant::now();
        let shifted = self.points.write(|store| {
            let point = store
                .find_point(route.id(), point_id)?
                .ok_or(ServiceError::NotFound(Resource::Point(point_id)))?;
            let removed_order = point.order;

            if !store.delete_point(route.id(), point_id)? {
                return Err(ServiceError::NotFound(Resource::Point(point_id)));
            }

            let later = store.points_after(route.id(), removed_order)?;
            for (offset, sibling) in later.iter().enumerate() {
                store.set_order(route.id(), sibling.id, removed_order + offset as i64)?;
            }
            Ok::<usize, ServiceError>(later.len())
        })?;

        info!(
            "event=point_remove module=point_service status=ok route_id={} point_id={} shifted={} duration_ms={}",
            route.id(),
            point_id,
            shifted,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Lists the route's points in ascending order.
    pub fn list(&self, actor: ActorId, route_id: RouteId) -> Result<Vec<RoutePoint>, ServiceError> {
        let route = self.gate.authorize(actor, route_id)?;
        self.list_authorized(&route)
    }

    /// Lists points for a route whose ownership was already checked.
    pub fn list_authorized(&self, route: &AuthorizedRoute) -> Result<Vec<RoutePoint>, ServiceError> {
        self.points
            .read(|store| store.list_points(route.id()).map_err(ServiceError::from))
    }

    /// Loads one point of the route.
    pub fn get(
        &self,
        actor: ActorId,
        route_id: RouteId,
        point_id: PointId,
    ) -> Result<RoutePoint, ServiceError> {
        let route = self.gate.authorize(actor, route_id)?;
        self.points.read(|store| {
            store
                .find_point(route.id(), point_id)?
                .ok_or(ServiceError::NotFound(Resource::Point(point_id)))
        })
    }

    /// Moves a point to new coordinates. `order` is left untouched.
    pub fn update_position(
        &self,
        actor: ActorId,
        route_id: RouteId,
        point_id: PointId,
        position: Position,
    ) -> Result<RoutePoint, ServiceError> {
        let route = self.gate.authorize(actor, route_id)?;
        position.validate()?;

        let point = self.points.write(|store| {
            if !store.set_position(route.id(), point_id, position)? {
                return Err(ServiceError::NotFound(Resource::Point(point_id)));
            }
            store
                .find_point(route.id(), point_id)?
                .ok_or(ServiceError::NotFound(Resource::Point(point_id)))
        })?;

        info!(
            "event=point_update module=point_service status=ok route_id={} point_id={}",
            route.id(),
            point_id
        );
        Ok(point)
    }

    /// Re-derives a dense order from `(order, created_at, id)`.
    ///
    /// A no-op on routes that are already dense.
    pub fn repack(&self, actor: ActorId, route_id: RouteId) -> Result<RepackReport, ServiceError> {
        let route = self.gate.authorize(actor, route_id)?;
        let report = self.points.write(|store| {
            ensure_route_present(store, &route)?;
            repack_in(store, route.id()).map_err(ServiceError::from)
        })?;

        info!(
            "event=point_repack module=point_service status=ok route_id={} total={} renumbered={}",
            route.id(),
            report.total,
            report.renumbered
        );
        Ok(report)
    }
}

/// Fails when the route row vanished after authorization.
fn ensure_route_present(store: &dyn PointStore, route: &AuthorizedRoute) -> Result<(), ServiceError> {
    if !store.route_exists(route.id())? {
        return Err(ServiceError::NotFound(Resource::Route(route.id())));
    }
    Ok(())
}

fn is_dense(store: &dyn PointStore, route_id: RouteId) -> PointRepoResult<bool> {
    let count = store.count_points(route_id)?;
    let dense = match store.max_order(route_id)? {
        None => count == 0,
        Some(max) => max + 1 == count,
    };
    Ok(dense)
}

fn repack_in(store: &dyn PointStore, route_id: RouteId) -> PointRepoResult<RepackReport> {
    let points = store.list_points_for_repair(route_id)?;
    let stale: Vec<(usize, &RoutePoint)> = points
        .iter()
        .enumerate()
        .filter(|(index, point)| point.order != *index as i64)
        .collect();
    if stale.is_empty() {
        return Ok(RepackReport {
            total: points.len(),
            renumbered: 0,
        });
    }

    // Two phases: park above every current value first, so no intermediate
    // write collides with UNIQUE(route_uuid, point_order).
    let parking_base = store.max_order(route_id)?.map_or(0, |max| max + 1);
    for (index, point) in &stale {
        store.set_order(route_id, point.id, parking_base + *index as i64)?;
    }
    for (index, point) in &stale {
        store.set_order(route_id, point.id, *index as i64)?;
    }

    Ok(RepackReport {
        total: points.len(),
        renumbered: stale.len(),
    })
}
