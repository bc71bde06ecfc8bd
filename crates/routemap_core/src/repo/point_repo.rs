//! Route point storage contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the row-level primitives (insert/delete/update/query) the
//!   ordered collection manager composes into append/remove/repack.
//! - Run every composed operation inside one transaction boundary.
//!
//! # Invariants
//! - `write` holds the database write lock (`BEGIN IMMEDIATE`) from the first
//!   read to commit, so read-modify-write sequences on one route never
//!   interleave.
//! - A failed `write` closure rolls back; partial renumbering is never
//!   committed.
//! - Point listing is deterministic: `point_order ASC, point_uuid ASC`.
//! - `(route_uuid, point_order)` is unique at the store level.

use crate::db::DbError;
use crate::model::point::{PointId, Position, RoutePoint};
use crate::model::route::RouteId;
use crate::repo::{ensure_schema_ready, parse_uuid, SchemaError, TableRequirement};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const POINT_SELECT_SQL: &str = "SELECT
    point_uuid,
    route_uuid,
    x,
    y,
    point_order,
    created_at
FROM route_points";

const POINT_TABLE: TableRequirement = TableRequirement {
    table: "route_points",
    columns: &[
        "point_uuid",
        "route_uuid",
        "x",
        "y",
        "point_order",
        "created_at",
    ],
};

/// Result type used by route point repository operations.
pub type PointRepoResult<T> = Result<T, PointRepoError>;

/// Errors from route point repository operations.
#[derive(Debug)]
pub enum PointRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection is not migrated or lacks required columns.
    Schema(SchemaError),
    /// Owning route does not exist.
    RouteNotFound(RouteId),
    /// Point does not exist under the route in scope.
    PointNotFound(PointId),
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for PointRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::RouteNotFound(id) => write!(f, "route not found: {id}"),
            Self::PointNotFound(id) => write!(f, "route point not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid route point data: {message}"),
        }
    }
}

impl Error for PointRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::RouteNotFound(_) | Self::PointNotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for PointRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<SchemaError> for PointRepoError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<rusqlite::Error> for PointRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Row-level access to route points inside one open transaction.
///
/// Implementations never renumber on their own; `order` values are written
/// exactly as the caller passes them.
pub trait PointStore {
    /// Returns whether the owning route row exists.
    fn route_exists(&self, route_id: RouteId) -> PointRepoResult<bool>;
    /// Highest order in use, `None` for an empty route.
    fn max_order(&self, route_id: RouteId) -> PointRepoResult<Option<i64>>;
    /// Number of points under the route.
    fn count_points(&self, route_id: RouteId) -> PointRepoResult<i64>;
    /// Returns whether `order` is already used under the route.
    fn order_taken(&self, route_id: RouteId, order: i64) -> PointRepoResult<bool>;
    /// Inserts one point with a fresh id at `order`.
    fn insert_point(
        &self,
        route_id: RouteId,
        position: Position,
        order: i64,
    ) -> PointRepoResult<RoutePoint>;
    /// Loads one point scoped to the route.
    fn find_point(&self, route_id: RouteId, point_id: PointId)
        -> PointRepoResult<Option<RoutePoint>>;
    /// Deletes one point scoped to the route. Returns `false` when absent.
    fn delete_point(&self, route_id: RouteId, point_id: PointId) -> PointRepoResult<bool>;
    /// Points with `point_order > order`, ascending.
    fn points_after(&self, route_id: RouteId, order: i64) -> PointRepoResult<Vec<RoutePoint>>;
    /// Overwrites one point's order.
    fn set_order(&self, route_id: RouteId, point_id: PointId, order: i64) -> PointRepoResult<()>;
    /// Overwrites one point's coordinates. Returns `false` when absent.
    fn set_position(
        &self,
        route_id: RouteId,
        point_id: PointId,
        position: Position,
    ) -> PointRepoResult<bool>;
    /// All points of the route in display order.
    fn list_points(&self, route_id: RouteId) -> PointRepoResult<Vec<RoutePoint>>;
    /// All points ordered by `(order, created_at, id)`, the repair sort key.
    fn list_points_for_repair(&self, route_id: RouteId) -> PointRepoResult<Vec<RoutePoint>>;
}

/// Transaction boundary over a [`PointStore`].
pub trait PointRepository {
    /// Runs `op` against a consistent read snapshot.
    fn read<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: From<PointRepoError>,
        F: FnOnce(&dyn PointStore) -> Result<T, E>;

    /// Runs `op` holding the write lock; commits only when `op` succeeds.
    fn write<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: From<PointRepoError>,
        F: FnOnce(&dyn PointStore) -> Result<T, E>;
}

/// SQLite-backed route point repository.
pub struct SqlitePointRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePointRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> PointRepoResult<Self> {
        ensure_schema_ready(conn, &[POINT_TABLE])?;
        Ok(Self { conn })
    }
}

impl PointRepository for SqlitePointRepository<'_> {
    fn read<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: From<PointRepoError>,
        F: FnOnce(&dyn PointStore) -> Result<T, E>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)
            .map_err(PointRepoError::from)?;
        let store: &dyn PointStore = &SqlitePointStore { conn: &tx };
        let value = op(store)?;
        tx.commit().map_err(PointRepoError::from)?;
        Ok(value)
    }

    fn write<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: From<PointRepoError>,
        F: FnOnce(&dyn PointStore) -> Result<T, E>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(PointRepoError::from)?;
        let store: &dyn PointStore = &SqlitePointStore { conn: &tx };
        // Dropping `tx` on the error path rolls back.
        let value = op(store)?;
        tx.commit().map_err(PointRepoError::from)?;
        Ok(value)
    }
}

/// [`PointStore`] over a borrowed connection or open transaction.
struct SqlitePointStore<'a> {
    conn: &'a Connection,
}

impl PointStore for SqlitePointStore<'_> {
    fn route_exists(&self, route_id: RouteId) -> PointRepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM routes WHERE route_uuid = ?1);",
            [route_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn max_order(&self, route_id: RouteId) -> PointRepoResult<Option<i64>> {
        let max = self.conn.query_row(
            "SELECT MAX(point_order)
             FROM route_points
             WHERE route_uuid = ?1;",
            [route_id.to_string()],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(max)
    }

    fn count_points(&self, route_id: RouteId) -> PointRepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*)
             FROM route_points
             WHERE route_uuid = ?1;",
            [route_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn order_taken(&self, route_id: RouteId, order: i64) -> PointRepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM route_points
                WHERE route_uuid = ?1
                  AND point_order = ?2
            );",
            params![route_id.to_string(), order],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_point(
        &self,
        route_id: RouteId,
        position: Position,
        order: i64,
    ) -> PointRepoResult<RoutePoint> {
        let point_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO route_points (
                point_uuid,
                route_uuid,
                x,
                y,
                point_order
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                point_id.to_string(),
                route_id.to_string(),
                position.x,
                position.y,
                order,
            ],
        )?;
        self.find_point(route_id, point_id)?
            .ok_or(PointRepoError::PointNotFound(point_id))
    }

    fn find_point(
        &self,
        route_id: RouteId,
        point_id: PointId,
    ) -> PointRepoResult<Option<RoutePoint>> {
        let sql = format!("{POINT_SELECT_SQL} WHERE point_uuid = ?1 AND route_uuid = ?2;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![point_id.to_string(), route_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_point_row(row)?));
        }
        Ok(None)
    }

    fn delete_point(&self, route_id: RouteId, point_id: PointId) -> PointRepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM route_points
             WHERE point_uuid = ?1
               AND route_uuid = ?2;",
            params![point_id.to_string(), route_id.to_string()],
        )?;
        Ok(changed == 1)
    }

    fn points_after(&self, route_id: RouteId, order: i64) -> PointRepoResult<Vec<RoutePoint>> {
        let sql = format!(
            "{POINT_SELECT_SQL}
             WHERE route_uuid = ?1
               AND point_order > ?2
             ORDER BY point_order ASC;"
        );
        collect_points(self.conn, &sql, params![route_id.to_string(), order])
    }

    fn set_order(&self, route_id: RouteId, point_id: PointId, order: i64) -> PointRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE route_points
             SET point_order = ?3
             WHERE point_uuid = ?1
               AND route_uuid = ?2;",
            params![point_id.to_string(), route_id.to_string(), order],
        )?;
        if changed == 0 {
            return Err(PointRepoError::PointNotFound(point_id));
        }
        Ok(())
    }

    fn set_position(
        &self,
        route_id: RouteId,
        point_id: PointId,
        position: Position,
    ) -> PointRepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE route_points
             SET x = ?3,
                 y = ?4
             WHERE point_uuid = ?1
               AND route_uuid = ?2;",
            params![
                point_id.to_string(),
                route_id.to_string(),
                position.x,
                position.y
            ],
        )?;
        Ok(changed == 1)
    }

    fn list_points(&self, route_id: RouteId) -> PointRepoResult<Vec<RoutePoint>> {
        let sql = format!(
            "{POINT_SELECT_SQL}
             WHERE route_uuid = ?1
             ORDER BY point_order ASC, point_uuid ASC;"
        );
        collect_points(self.conn, &sql, params![route_id.to_string()])
    }

    fn list_points_for_repair(&self, route_id: RouteId) -> PointRepoResult<Vec<RoutePoint>> {
        let sql = format!(
            "{POINT_SELECT_SQL}
             WHERE route_uuid = ?1
             ORDER BY point_order ASC, created_at ASC, point_uuid ASC;"
        );
        collect_points(self.conn, &sql, params![route_id.to_string()])
    }
}

fn collect_points(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> PointRepoResult<Vec<RoutePoint>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut points = Vec::new();
    while let Some(row) = rows.next()? {
        points.push(parse_point_row(row)?);
    }
    Ok(points)
}

fn parse_point_row(row: &Row<'_>) -> PointRepoResult<RoutePoint> {
    let point_uuid_text: String = row.get("point_uuid")?;
    let id = parse_uuid(&point_uuid_text, "route_points.point_uuid")
        .map_err(PointRepoError::InvalidData)?;
    let route_uuid_text: String = row.get("route_uuid")?;
    let route_id = parse_uuid(&route_uuid_text, "route_points.route_uuid")
        .map_err(PointRepoError::InvalidData)?;

    let position = Position {
        x: row.get("x")?,
        y: row.get("y")?,
    };
    position.validate().map_err(|err| {
        PointRepoError::InvalidData(format!("point {id} has invalid position: {err}"))
    })?;

    let order: i64 = row.get("point_order")?;
    if order < 0 {
        return Err(PointRepoError::InvalidData(format!(
            "negative point_order `{order}` for point {id}"
        )));
    }

    Ok(RoutePoint {
        id,
        route_id,
        position,
        order,
        created_at: row.get("created_at")?,
    })
}
