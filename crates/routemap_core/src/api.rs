//! Request-handling boundary for transport front ends.
//!
//! # Responsibility
//! - Map an authenticated actor plus an HTTP-style verb onto service calls.
//! - Translate service errors into status codes with no side effects
//!   beyond what the service already committed.
//!
//! # Invariants
//! - `handle` never panics; every failure becomes an [`ApiResponse`].
//! - Permission failures are reported as 404, never 403.
//! - 5xx responses are retryable: no partial mutation is ever committed.

use crate::model::point::{PointId, Position, RoutePoint};
use crate::model::route::{Actor, ActorId, BackgroundImage, ImageId, Route, RouteDetail, RouteId};
use crate::repo::point_repo::SqlitePointRepository;
use crate::repo::route_repo::SqliteRouteRepository;
use crate::service::point_service::{PointService, RepackReport};
use crate::service::route_service::{ImageUpload, RouteDraft, RouteService};
use crate::service::ServiceError;
use log::{debug, error};
use rusqlite::Connection;
use serde::Serialize;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_NO_CONTENT: u16 = 204;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_UNAUTHORIZED: u16 = 401;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// One operation requested by a front end.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    RegisterActor { username: String },
    AddImage { upload: ImageUpload },
    ListImages,
    RandomImages { limit: Option<u32> },
    DeleteImage { image_id: ImageId },
    CreateRoute { image_id: ImageId, draft: RouteDraft },
    ListRoutes,
    RoutesOnImage { slug: String },
    GetRoute { route_id: RouteId },
    UpdateRoute { route_id: RouteId, draft: RouteDraft },
    DeleteRoute { route_id: RouteId },
    AppendPoint { route_id: RouteId, x: f64, y: f64 },
    ListPoints { route_id: RouteId },
    GetPoint { route_id: RouteId, point_id: PointId },
    UpdatePoint { route_id: RouteId, point_id: PointId, x: f64, y: f64 },
    RemovePoint { route_id: RouteId, point_id: PointId },
    RepackPoints { route_id: RouteId },
}

impl ApiRequest {
    /// Requests that anonymous callers may issue.
    fn allows_anonymous(&self) -> bool {
        matches!(
            self,
            Self::RegisterActor { .. } | Self::ListImages | Self::RandomImages { .. }
        )
    }

    fn name(&self) -> &'static str {
        match self {
            Self::RegisterActor { .. } => "register_actor",
            Self::AddImage { .. } => "add_image",
            Self::ListImages => "list_images",
            Self::RandomImages { .. } => "random_images",
            Self::DeleteImage { .. } => "delete_image",
            Self::CreateRoute { .. } => "create_route",
            Self::ListRoutes => "list_routes",
            Self::RoutesOnImage { .. } => "routes_on_image",
            Self::GetRoute { .. } => "get_route",
            Self::UpdateRoute { .. } => "update_route",
            Self::DeleteRoute { .. } => "delete_route",
            Self::AppendPoint { .. } => "append_point",
            Self::ListPoints { .. } => "list_points",
            Self::GetPoint { .. } => "get_point",
            Self::UpdatePoint { .. } => "update_point",
            Self::RemovePoint { .. } => "remove_point",
            Self::RepackPoints { .. } => "repack_points",
        }
    }
}

/// Response payload, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ApiBody {
    Empty,
    Actor(Actor),
    Image(BackgroundImage),
    Images(Vec<BackgroundImage>),
    Route(Route),
    Routes(Vec<Route>),
    ImageRoutes {
        image: BackgroundImage,
        routes: Vec<Route>,
    },
    RouteDetail(RouteDetail),
    Point(RoutePoint),
    Points(Vec<RoutePoint>),
    Repack(RepackReport),
    Error { message: String },
}

/// Status code plus body for one handled request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ApiBody,
}

impl ApiResponse {
    fn ok(body: ApiBody) -> Self {
        Self {
            status: STATUS_OK,
            body,
        }
    }

    fn created(body: ApiBody) -> Self {
        Self {
            status: STATUS_CREATED,
            body,
        }
    }

    fn no_content() -> Self {
        Self {
            status: STATUS_NO_CONTENT,
            body: ApiBody::Empty,
        }
    }

    fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiBody::Error {
                message: message.into(),
            },
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Maps a service error to its response status.
pub fn status_for(err: &ServiceError) -> u16 {
    if err.is_validation() {
        STATUS_BAD_REQUEST
    } else if err.is_not_found() {
        STATUS_NOT_FOUND
    } else if err.is_conflict() {
        STATUS_CONFLICT
    } else {
        STATUS_INTERNAL_ERROR
    }
}

/// Handles one request on behalf of `actor` (`None` for anonymous callers).
pub fn handle(conn: &Connection, actor: Option<ActorId>, request: ApiRequest) -> ApiResponse {
    let operation = request.name();
    let actor = match (actor, request.allows_anonymous()) {
        (Some(actor), _) => Some(actor),
        (None, true) => None,
        (None, false) => {
            debug!("event=api_request module=api status=unauthorized op={operation}");
            return ApiResponse::failure(STATUS_UNAUTHORIZED, "authentication required");
        }
    };

    match dispatch(conn, actor, request) {
        Ok(response) => {
            debug!(
                "event=api_request module=api status=ok op={operation} http_status={}",
                response.status
            );
            response
        }
        Err(err) => {
            let status = status_for(&err);
            if status >= STATUS_INTERNAL_ERROR {
                error!(
                    "event=api_request module=api status=error op={operation} http_status={status} error={err}"
                );
            } else {
                debug!(
                    "event=api_request module=api status=rejected op={operation} http_status={status}"
                );
            }
            ApiResponse::failure(status, err.to_string())
        }
    }
}

fn dispatch(
    conn: &Connection,
    actor: Option<ActorId>,
    request: ApiRequest,
) -> Result<ApiResponse, ServiceError> {
    let routes = RouteService::new(SqliteRouteRepository::try_new(conn)?);
    let points = PointService::new(
        SqlitePointRepository::try_new(conn)?,
        SqliteRouteRepository::try_new(conn)?,
    );
    // Anonymous callers only reach the variants admitted by `handle`.
    let actor_id = actor.unwrap_or_default();

    let response = match request {
        ApiRequest::RegisterActor { username } => {
            ApiResponse::created(ApiBody::Actor(routes.register_actor(&username)?))
        }
        ApiRequest::AddImage { upload } => {
            ApiResponse::created(ApiBody::Image(routes.add_background_image(actor, &upload)?))
        }
        ApiRequest::ListImages => ApiResponse::ok(ApiBody::Images(routes.list_images()?)),
        ApiRequest::RandomImages { limit } => {
            ApiResponse::ok(ApiBody::Images(routes.random_images(limit)?))
        }
        ApiRequest::DeleteImage { image_id } => {
            routes.delete_background_image(actor_id, image_id)?;
            ApiResponse::no_content()
        }
        ApiRequest::CreateRoute { image_id, draft } => {
            ApiResponse::created(ApiBody::Route(routes.create_route(actor_id, image_id, &draft)?))
        }
        ApiRequest::ListRoutes => ApiResponse::ok(ApiBody::Routes(routes.list_routes(actor_id)?)),
        ApiRequest::RoutesOnImage { slug } => {
            let (image, owned) = routes.routes_on_image(actor_id, &slug)?;
            ApiResponse::ok(ApiBody::ImageRoutes {
                image,
                routes: owned,
            })
        }
        ApiRequest::GetRoute { route_id } => {
            let authorized = routes.authorize(actor_id, route_id)?;
            let image = routes.get_image(authorized.route().background_image)?;
            let route_points = points.list_authorized(&authorized)?;
            ApiResponse::ok(ApiBody::RouteDetail(RouteDetail {
                route: authorized.into_route(),
                image,
                points: route_points,
            }))
        }
        ApiRequest::UpdateRoute { route_id, draft } => {
            ApiResponse::ok(ApiBody::Route(routes.update_route(actor_id, route_id, &draft)?))
        }
        ApiRequest::DeleteRoute { route_id } => {
            routes.delete_route(actor_id, route_id)?;
            ApiResponse::no_content()
        }
        ApiRequest::AppendPoint { route_id, x, y } => ApiResponse::created(ApiBody::Point(
            points.append(actor_id, route_id, Position { x, y })?,
        )),
        ApiRequest::ListPoints { route_id } => {
            ApiResponse::ok(ApiBody::Points(points.list(actor_id, route_id)?))
        }
        ApiRequest::GetPoint { route_id, point_id } => {
            ApiResponse::ok(ApiBody::Point(points.get(actor_id, route_id, point_id)?))
        }
        ApiRequest::UpdatePoint {
            route_id,
            point_id,
            x,
            y,
        } => ApiResponse::ok(ApiBody::Point(points.update_position(
            actor_id,
            route_id,
            point_id,
            Position { x, y },
        )?)),
        ApiRequest::RemovePoint { route_id, point_id } => {
            points.remove(actor_id, route_id, point_id)?;
            ApiResponse::no_content()
        }
        ApiRequest::RepackPoints { route_id } => {
            ApiResponse::ok(ApiBody::Repack(points.repack(actor_id, route_id)?))
        }
    };
    Ok(response)
}
