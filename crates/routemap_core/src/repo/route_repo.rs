//! Actor, background image and route repository contracts with SQLite
//! implementation.
//!
//! # Responsibility
//! - Persist the parent side of the route point hierarchy.
//! - Resolve unique image slugs under the write lock.
//!
//! # Invariants
//! - Deleting an actor cascades to their routes (and transitively points);
//!   images they uploaded survive with a `NULL` uploader.
//! - An image referenced by any route cannot be deleted.
//! - Route listings are newest first: `created_at DESC, route_uuid ASC`.

use crate::db::DbError;
use crate::model::route::{
    slug_candidate, Actor, ActorId, BackgroundImage, ImageId, Route, RouteId,
};
use crate::repo::{ensure_schema_ready, parse_uuid, SchemaError, TableRequirement};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ACTOR_SELECT_SQL: &str = "SELECT actor_uuid, username, created_at FROM actors";

const IMAGE_SELECT_SQL: &str = "SELECT
    image_uuid,
    name,
    slug,
    storage_path,
    description,
    uploader_uuid,
    uploaded_at
FROM background_images";

const ROUTE_SELECT_SQL: &str = "SELECT
    route_uuid,
    owner_uuid,
    image_uuid,
    name,
    description,
    created_at
FROM routes";

const REQUIRED_TABLES: &[TableRequirement] = &[
    TableRequirement {
        table: "actors",
        columns: &["actor_uuid", "username", "created_at"],
    },
    TableRequirement {
        table: "background_images",
        columns: &[
            "image_uuid",
            "name",
            "slug",
            "storage_path",
            "description",
            "uploader_uuid",
            "uploaded_at",
        ],
    },
    TableRequirement {
        table: "routes",
        columns: &[
            "route_uuid",
            "owner_uuid",
            "image_uuid",
            "name",
            "description",
            "created_at",
        ],
    },
];

/// Result type used by route repository operations.
pub type RouteRepoResult<T> = Result<T, RouteRepoError>;

/// Errors from actor/image/route repository operations.
#[derive(Debug)]
pub enum RouteRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection is not migrated or lacks required columns.
    Schema(SchemaError),
    ActorNotFound(ActorId),
    ImageNotFound(ImageId),
    RouteNotFound(RouteId),
    /// Another actor already uses this username.
    UsernameTaken(String),
    /// Image is still referenced by at least one route.
    ImageInUse(ImageId),
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for RouteRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::ActorNotFound(id) => write!(f, "actor not found: {id}"),
            Self::ImageNotFound(id) => write!(f, "background image not found: {id}"),
            Self::RouteNotFound(id) => write!(f, "route not found: {id}"),
            Self::UsernameTaken(name) => write!(f, "username already taken: {name}"),
            Self::ImageInUse(id) => {
                write!(f, "background image is used by existing routes: {id}")
            }
            Self::InvalidData(message) => write!(f, "invalid route data: {message}"),
        }
    }
}

impl Error for RouteRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RouteRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<SchemaError> for RouteRepoError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<rusqlite::Error> for RouteRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Input for a new background image record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBackgroundImage<'a> {
    pub uploader: Option<ActorId>,
    pub name: &'a str,
    /// Base slug; `-1`, `-2`, ... is appended until unique.
    pub base_slug: &'a str,
    pub storage_path: &'a str,
    pub description: Option<&'a str>,
}

/// Repository interface for the parent side of routes.
pub trait RouteRepository {
    fn create_actor(&self, username: &str) -> RouteRepoResult<Actor>;
    fn get_actor(&self, actor_id: ActorId) -> RouteRepoResult<Option<Actor>>;
    /// Deletes the actor and, by cascade, their routes.
    fn delete_actor(&self, actor_id: ActorId) -> RouteRepoResult<()>;

    fn create_image(&self, image: &NewBackgroundImage<'_>) -> RouteRepoResult<BackgroundImage>;
    fn get_image(&self, image_id: ImageId) -> RouteRepoResult<Option<BackgroundImage>>;
    fn get_image_by_slug(&self, slug: &str) -> RouteRepoResult<Option<BackgroundImage>>;
    /// Lists images newest first.
    fn list_images(&self) -> RouteRepoResult<Vec<BackgroundImage>>;
    /// Returns up to `limit` images in random order.
    fn sample_images(&self, limit: u32) -> RouteRepoResult<Vec<BackgroundImage>>;
    /// Deletes an image uploaded by `uploader`. Images of other uploaders
    /// report `ImageNotFound`.
    fn delete_image(&self, uploader: ActorId, image_id: ImageId) -> RouteRepoResult<()>;

    fn create_route(
        &self,
        owner: ActorId,
        image_id: ImageId,
        name: &str,
        description: Option<&str>,
    ) -> RouteRepoResult<Route>;
    /// Loads a route only when `owner` owns it.
    fn find_owned_route(&self, owner: ActorId, route_id: RouteId)
        -> RouteRepoResult<Option<Route>>;
    fn list_routes(&self, owner: ActorId) -> RouteRepoResult<Vec<Route>>;
    fn list_routes_on_image(
        &self,
        owner: ActorId,
        image_id: ImageId,
    ) -> RouteRepoResult<Vec<Route>>;
    fn update_route(
        &self,
        route_id: RouteId,
        name: &str,
        description: Option<&str>,
    ) -> RouteRepoResult<()>;
    /// Deletes the route and, by cascade, its points.
    fn delete_route(&self, route_id: RouteId) -> RouteRepoResult<()>;
}

/// SQLite-backed route repository.
pub struct SqliteRouteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRouteRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RouteRepoResult<Self> {
        ensure_schema_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl RouteRepository for SqliteRouteRepository<'_> {
    fn create_actor(&self, username: &str) -> RouteRepoResult<Actor> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let taken: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM actors WHERE username = ?1);",
            [username],
            |row| row.get(0),
        )?;
        if taken == 1 {
            return Err(RouteRepoError::UsernameTaken(username.to_string()));
        }

        let actor_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO actors (actor_uuid, username) VALUES (?1, ?2);",
            params![actor_id.to_string(), username],
        )?;
        let actor = load_actor(&tx, actor_id)?.ok_or(RouteRepoError::ActorNotFound(actor_id))?;
        tx.commit()?;
        Ok(actor)
    }

    fn get_actor(&self, actor_id: ActorId) -> RouteRepoResult<Option<Actor>> {
        load_actor(self.conn, actor_id)
    }

    fn delete_actor(&self, actor_id: ActorId) -> RouteRepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM actors WHERE actor_uuid = ?1;",
            [actor_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RouteRepoError::ActorNotFound(actor_id));
        }
        Ok(())
    }

    fn create_image(&self, image: &NewBackgroundImage<'_>) -> RouteRepoResult<BackgroundImage> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let slug = resolve_unique_slug(&tx, image.base_slug)?;

        let image_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO background_images (
                image_uuid,
                name,
                slug,
                storage_path,
                description,
                uploader_uuid
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                image_id.to_string(),
                image.name,
                slug,
                image.storage_path,
                image.description,
                image.uploader.map(|value| value.to_string()),
            ],
        )?;
        let created =
            load_image_by_id(&tx, image_id)?.ok_or(RouteRepoError::ImageNotFound(image_id))?;
        tx.commit()?;
        Ok(created)
    }

    fn get_image(&self, image_id: ImageId) -> RouteRepoResult<Option<BackgroundImage>> {
        load_image_by_id(self.conn, image_id)
    }

    fn get_image_by_slug(&self, slug: &str) -> RouteRepoResult<Option<BackgroundImage>> {
        let sql = format!("{IMAGE_SELECT_SQL} WHERE slug = ?1;");
        self.conn
            .query_row(&sql, [slug], |row| Ok(parse_image_row(row)))
            .optional()?
            .transpose()
    }

    fn list_images(&self) -> RouteRepoResult<Vec<BackgroundImage>> {
        let sql = format!("{IMAGE_SELECT_SQL} ORDER BY uploaded_at DESC, image_uuid ASC;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut images = Vec::new();
        while let Some(row) = rows.next()? {
            images.push(parse_image_row(row)?);
        }
        Ok(images)
    }

    fn sample_images(&self, limit: u32) -> RouteRepoResult<Vec<BackgroundImage>> {
        let sql = format!("{IMAGE_SELECT_SQL} ORDER BY RANDOM() LIMIT ?1;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([limit])?;
        let mut images = Vec::new();
        while let Some(row) = rows.next()? {
            images.push(parse_image_row(row)?);
        }
        Ok(images)
    }

    fn delete_image(&self, uploader: ActorId, image_id: ImageId) -> RouteRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let owned: i64 = tx.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM background_images
                WHERE image_uuid = ?1
                  AND uploader_uuid = ?2
            );",
            [image_id.to_string(), uploader.to_string()],
            |row| row.get(0),
        )?;
        if owned == 0 {
            return Err(RouteRepoError::ImageNotFound(image_id));
        }

        let in_use: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM routes WHERE image_uuid = ?1);",
            [image_id.to_string()],
            |row| row.get(0),
        )?;
        if in_use == 1 {
            return Err(RouteRepoError::ImageInUse(image_id));
        }

        let changed = tx.execute(
            "DELETE FROM background_images WHERE image_uuid = ?1;",
            [image_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RouteRepoError::ImageNotFound(image_id));
        }
        tx.commit()?;
        Ok(())
    }

    fn create_route(
        &self,
        owner: ActorId,
        image_id: ImageId,
        name: &str,
        description: Option<&str>,
    ) -> RouteRepoResult<Route> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_actor(&tx, owner)?.is_none() {
            return Err(RouteRepoError::ActorNotFound(owner));
        }
        if load_image_by_id(&tx, image_id)?.is_none() {
            return Err(RouteRepoError::ImageNotFound(image_id));
        }

        let route_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO routes (
                route_uuid,
                owner_uuid,
                image_uuid,
                name,
                description
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                route_id.to_string(),
                owner.to_string(),
                image_id.to_string(),
                name,
                description,
            ],
        )?;
        let route = load_owned_route(&tx, owner, route_id)?
            .ok_or(RouteRepoError::RouteNotFound(route_id))?;
        tx.commit()?;
        Ok(route)
    }

    fn find_owned_route(
        &self,
        owner: ActorId,
        route_id: RouteId,
    ) -> RouteRepoResult<Option<Route>> {
        load_owned_route(self.conn, owner, route_id)
    }

    fn list_routes(&self, owner: ActorId) -> RouteRepoResult<Vec<Route>> {
        let sql = format!(
            "{ROUTE_SELECT_SQL}
             WHERE owner_uuid = ?1
             ORDER BY created_at DESC, route_uuid ASC;"
        );
        collect_routes(self.conn, &sql, params![owner.to_string()])
    }

    fn list_routes_on_image(
        &self,
        owner: ActorId,
        image_id: ImageId,
    ) -> RouteRepoResult<Vec<Route>> {
        let sql = format!(
            "{ROUTE_SELECT_SQL}
             WHERE owner_uuid = ?1
               AND image_uuid = ?2
             ORDER BY created_at DESC, route_uuid ASC;"
        );
        collect_routes(
            self.conn,
            &sql,
            params![owner.to_string(), image_id.to_string()],
        )
    }

    fn update_route(
        &self,
        route_id: RouteId,
        name: &str,
        description: Option<&str>,
    ) -> RouteRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE routes
             SET name = ?2,
                 description = ?3
             WHERE route_uuid = ?1;",
            params![route_id.to_string(), name, description],
        )?;
        if changed == 0 {
            return Err(RouteRepoError::RouteNotFound(route_id));
        }
        Ok(())
    }

    fn delete_route(&self, route_id: RouteId) -> RouteRepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM routes WHERE route_uuid = ?1;",
            [route_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RouteRepoError::RouteNotFound(route_id));
        }
        Ok(())
    }
}

fn resolve_unique_slug(conn: &Connection, base_slug: &str) -> RouteRepoResult<String> {
    let mut attempt = 0_u32;
    loop {
        let candidate = slug_candidate(base_slug, attempt);
        let taken: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM background_images WHERE slug = ?1);",
            [candidate.as_str()],
            |row| row.get(0),
        )?;
        if taken == 0 {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

fn load_actor(conn: &Connection, actor_id: ActorId) -> RouteRepoResult<Option<Actor>> {
    let sql = format!("{ACTOR_SELECT_SQL} WHERE actor_uuid = ?1;");
    conn.query_row(&sql, [actor_id.to_string()], |row| Ok(parse_actor_row(row)))
        .optional()?
        .transpose()
}

fn load_image_by_id(
    conn: &Connection,
    image_id: ImageId,
) -> RouteRepoResult<Option<BackgroundImage>> {
    let sql = format!("{IMAGE_SELECT_SQL} WHERE image_uuid = ?1;");
    conn.query_row(&sql, [image_id.to_string()], |row| Ok(parse_image_row(row)))
        .optional()?
        .transpose()
}

fn load_owned_route(
    conn: &Connection,
    owner: ActorId,
    route_id: RouteId,
) -> RouteRepoResult<Option<Route>> {
    let sql = format!("{ROUTE_SELECT_SQL} WHERE route_uuid = ?1 AND owner_uuid = ?2;");
    conn.query_row(
        &sql,
        params![route_id.to_string(), owner.to_string()],
        |row| Ok(parse_route_row(row)),
    )
    .optional()?
    .transpose()
}

fn collect_routes(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> RouteRepoResult<Vec<Route>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut routes = Vec::new();
    while let Some(row) = rows.next()? {
        routes.push(parse_route_row(row)?);
    }
    Ok(routes)
}

fn parse_actor_row(row: &Row<'_>) -> RouteRepoResult<Actor> {
    let actor_uuid_text: String = row.get("actor_uuid")?;
    Ok(Actor {
        id: parse_uuid(&actor_uuid_text, "actors.actor_uuid")
            .map_err(RouteRepoError::InvalidData)?,
        username: row.get("username")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_image_row(row: &Row<'_>) -> RouteRepoResult<BackgroundImage> {
    let image_uuid_text: String = row.get("image_uuid")?;
    let uploader = row
        .get::<_, Option<String>>("uploader_uuid")?
        .map(|value| parse_uuid(&value, "background_images.uploader_uuid"))
        .transpose()
        .map_err(RouteRepoError::InvalidData)?;

    let slug: String = row.get("slug")?;
    if slug.trim().is_empty() {
        return Err(RouteRepoError::InvalidData(format!(
            "blank slug for image {image_uuid_text}"
        )));
    }

    Ok(BackgroundImage {
        id: parse_uuid(&image_uuid_text, "background_images.image_uuid")
            .map_err(RouteRepoError::InvalidData)?,
        name: row.get("name")?,
        slug,
        storage_path: row.get("storage_path")?,
        description: row.get("description")?,
        uploader,
        uploaded_at: row.get("uploaded_at")?,
    })
}

fn parse_route_row(row: &Row<'_>) -> RouteRepoResult<Route> {
    let route_uuid_text: String = row.get("route_uuid")?;
    let owner_uuid_text: String = row.get("owner_uuid")?;
    let image_uuid_text: String = row.get("image_uuid")?;
    Ok(Route {
        id: parse_uuid(&route_uuid_text, "routes.route_uuid")
            .map_err(RouteRepoError::InvalidData)?,
        owner: parse_uuid(&owner_uuid_text, "routes.owner_uuid")
            .map_err(RouteRepoError::InvalidData)?,
        background_image: parse_uuid(&image_uuid_text, "routes.image_uuid")
            .map_err(RouteRepoError::InvalidData)?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}
