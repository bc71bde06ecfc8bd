//! Actor, background image and route use-case service.
//!
//! # Responsibility
//! - Validate and normalize user-facing text before persistence.
//! - Scope every route operation to its owner through the access gate.

use crate::model::route::{
    slugify, Actor, ActorId, BackgroundImage, ImageId, Route, RouteId,
};
use crate::repo::route_repo::{NewBackgroundImage, RouteRepository};
use crate::service::access::{AccessGate, AuthorizedRoute};
use crate::service::{normalize_optional, normalize_required, Resource, ServiceError};
use log::info;

/// Default number of images returned by [`RouteService::random_images`].
pub const RANDOM_IMAGES_DEFAULT: u32 = 9;
/// Upper bound for [`RouteService::random_images`].
pub const RANDOM_IMAGES_MAX: u32 = 50;

/// Upload request for a background image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageUpload {
    pub name: String,
    /// Where the image bytes were stored by the caller.
    pub storage_path: String,
    pub description: Option<String>,
}

/// Route create/update request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDraft {
    pub name: String,
    pub description: Option<String>,
}

/// Use-case service for the parent side of routes.
pub struct RouteService<R: RouteRepository> {
    repo: R,
}

impl<R: RouteRepository> RouteService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers one actor. Usernames are trimmed and must be unique.
    pub fn register_actor(&self, username: &str) -> Result<Actor, ServiceError> {
        let username = normalize_required("username", username)?;
        let actor = self.repo.create_actor(&username)?;
        info!(
            "event=actor_register module=route_service status=ok actor_id={}",
            actor.id
        );
        Ok(actor)
    }

    pub fn get_actor(&self, actor_id: ActorId) -> Result<Actor, ServiceError> {
        self.repo
            .get_actor(actor_id)?
            .ok_or(ServiceError::NotFound(Resource::Actor(actor_id)))
    }

    /// Deletes one actor together with every route they own.
    pub fn delete_actor(&self, actor_id: ActorId) -> Result<(), ServiceError> {
        self.repo.delete_actor(actor_id)?;
        info!("event=actor_delete module=route_service status=ok actor_id={actor_id}");
        Ok(())
    }

    /// Records an uploaded background image with a unique slug.
    pub fn add_background_image(
        &self,
        uploader: Option<ActorId>,
        upload: &ImageUpload,
    ) -> Result<BackgroundImage, ServiceError> {
        let name = normalize_required("name", &upload.name)?;
        let storage_path = normalize_required("storage_path", &upload.storage_path)?;
        let description = normalize_optional(upload.description.as_deref());
        if let Some(actor_id) = uploader {
            self.get_actor(actor_id)?;
        }

        let base_slug = slugify(&name);
        let image = self.repo.create_image(&NewBackgroundImage {
            uploader,
            name: &name,
            base_slug: &base_slug,
            storage_path: &storage_path,
            description: description.as_deref(),
        })?;
        info!(
            "event=image_add module=route_service status=ok image_id={} slug={}",
            image.id, image.slug
        );
        Ok(image)
    }

    pub fn get_image_by_slug(&self, slug: &str) -> Result<BackgroundImage, ServiceError> {
        self.repo
            .get_image_by_slug(slug)?
            .ok_or_else(|| ServiceError::NotFound(Resource::ImageSlug(slug.to_string())))
    }

    /// Lists every background image, newest first.
    pub fn list_images(&self) -> Result<Vec<BackgroundImage>, ServiceError> {
        self.repo.list_images().map_err(Into::into)
    }

    /// Random sample of images. `limit` defaults to 9 and clamps to 50.
    pub fn random_images(&self, limit: Option<u32>) -> Result<Vec<BackgroundImage>, ServiceError> {
        let limit = limit
            .unwrap_or(RANDOM_IMAGES_DEFAULT)
            .min(RANDOM_IMAGES_MAX);
        self.repo.sample_images(limit).map_err(Into::into)
    }

    /// Deletes an image the actor uploaded and no route points at.
    ///
    /// Images uploaded by someone else are reported as missing.
    pub fn delete_background_image(
        &self,
        actor: ActorId,
        image_id: ImageId,
    ) -> Result<(), ServiceError> {
        self.repo.delete_image(actor, image_id)?;
        info!("event=image_delete module=route_service status=ok image_id={image_id}");
        Ok(())
    }

    /// Creates one route owned by `actor` over an existing image.
    pub fn create_route(
        &self,
        actor: ActorId,
        image_id: ImageId,
        draft: &RouteDraft,
    ) -> Result<Route, ServiceError> {
        let name = normalize_required("name", &draft.name)?;
        let description = normalize_optional(draft.description.as_deref());
        let route = self
            .repo
            .create_route(actor, image_id, &name, description.as_deref())?;
        info!(
            "event=route_create module=route_service status=ok route_id={} image_id={}",
            route.id, image_id
        );
        Ok(route)
    }

    /// Resolves one route for its owner.
    pub fn authorize(
        &self,
        actor: ActorId,
        route_id: RouteId,
    ) -> Result<AuthorizedRoute, ServiceError> {
        self.repo.authorize(actor, route_id)
    }

    /// Lists the actor's routes, newest first.
    pub fn list_routes(&self, actor: ActorId) -> Result<Vec<Route>, ServiceError> {
        self.repo.list_routes(actor).map_err(Into::into)
    }

    /// Loads an image by slug with the actor's routes drawn on it.
    pub fn routes_on_image(
        &self,
        actor: ActorId,
        slug: &str,
    ) -> Result<(BackgroundImage, Vec<Route>), ServiceError> {
        let image = self.get_image_by_slug(slug)?;
        let routes = self.repo.list_routes_on_image(actor, image.id)?;
        Ok((image, routes))
    }

    pub fn get_image(&self, image_id: ImageId) -> Result<BackgroundImage, ServiceError> {
        self.repo
            .get_image(image_id)?
            .ok_or(ServiceError::NotFound(Resource::Image(image_id)))
    }

    /// Replaces a route's name and description.
    pub fn update_route(
        &self,
        actor: ActorId,
        route_id: RouteId,
        draft: &RouteDraft,
    ) -> Result<Route, ServiceError> {
        let route = self.authorize(actor, route_id)?;
        let name = normalize_required("name", &draft.name)?;
        let description = normalize_optional(draft.description.as_deref());
        self.repo
            .update_route(route.id(), &name, description.as_deref())?;
        self.authorize(actor, route_id).map(AuthorizedRoute::into_route)
    }

    /// Deletes a route and, by cascade, all of its points.
    pub fn delete_route(&self, actor: ActorId, route_id: RouteId) -> Result<(), ServiceError> {
        let route = self.authorize(actor, route_id)?;
        self.repo.delete_route(route.id())?;
        info!("event=route_delete module=route_service status=ok route_id={route_id}");
        Ok(())
    }
}
