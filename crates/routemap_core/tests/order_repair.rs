use routemap_core::db::open_db_in_memory;
use routemap_core::{
    ActorId, ImageUpload, PointService, Position, RouteDraft, RouteId, RouteService,
    SqlitePointRepository, SqliteRouteRepository,
};
use rusqlite::{params, Connection};

#[test]
fn repack_closes_gaps_preserving_relative_order() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn);
    insert_raw(&conn, route, "p-a", 0, 100);
    insert_raw(&conn, route, "p-b", 3, 50);
    insert_raw(&conn, route, "p-c", 7, 10);

    let service = points(&conn);
    let report = service.repack(actor, route).unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.renumbered, 2);
    assert_eq!(
        stored_orders(&conn, route),
        vec![
            ("p-a".to_string(), 0),
            ("p-b".to_string(), 1),
            ("p-c".to_string(), 2)
        ]
    );
}

#[test]
fn append_repairs_gapped_route_before_inserting() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn);
    insert_raw(&conn, route, "p-a", 2, 10);
    insert_raw(&conn, route, "p-b", 5, 20);

    let appended = points(&conn)
        .append(actor, route, Position { x: 0.4, y: 0.6 })
        .unwrap();

    assert_eq!(appended.order, 2);
    assert_eq!(
        stored_orders(&conn, route),
        vec![
            ("p-a".to_string(), 0),
            ("p-b".to_string(), 1),
            (String::new(), 2)
        ]
    );
    let listed: Vec<i64> = points(&conn)
        .list(actor, route)
        .unwrap()
        .into_iter()
        .map(|point| point.order)
        .collect();
    assert_eq!(listed, vec![0, 1, 2]);
}

#[test]
fn remove_on_gapped_route_still_yields_dense_suffix() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn);
    let ids = [
        insert_raw(&conn, route, "p-a", 0, 10),
        insert_raw(&conn, route, "p-b", 4, 20),
        insert_raw(&conn, route, "p-c", 9, 30),
    ];

    points(&conn).remove(actor, route, ids[0]).unwrap();

    assert_eq!(
        stored_orders(&conn, route),
        vec![("p-b".to_string(), 0), ("p-c".to_string(), 1)]
    );
}

#[test]
fn corrupt_coordinates_surface_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn);
    conn.execute_batch("PRAGMA ignore_check_constraints = ON;")
        .unwrap();
    conn.execute(
        "INSERT INTO route_points (point_uuid, route_uuid, x, y, point_order, created_at)
         VALUES (?1, ?2, 4.0, 0.5, 0, 1);",
        params![uuid::Uuid::new_v4().to_string(), route.to_string()],
    )
    .unwrap();

    let err = points(&conn).list(actor, route).unwrap_err();

    assert!(!err.is_validation());
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("invalid route point data"));
}

fn points(
    conn: &Connection,
) -> PointService<SqlitePointRepository<'_>, SqliteRouteRepository<'_>> {
    PointService::new(
        SqlitePointRepository::try_new(conn).unwrap(),
        SqliteRouteRepository::try_new(conn).unwrap(),
    )
}

fn seed_route(conn: &Connection) -> (ActorId, RouteId) {
    let routes = RouteService::new(SqliteRouteRepository::try_new(conn).unwrap());
    let actor = routes.register_actor("ada").unwrap();
    let image = routes
        .add_background_image(
            None,
            &ImageUpload {
                name: "Campus".to_string(),
                storage_path: "uploads/campus.png".to_string(),
                description: None,
            },
        )
        .unwrap();
    let route = routes
        .create_route(
            actor.id,
            image.id,
            &RouteDraft {
                name: "Tour".to_string(),
                description: None,
            },
        )
        .unwrap();
    (actor.id, route.id)
}

/// Writes a point row directly, bypassing order assignment.
fn insert_raw(
    conn: &Connection,
    route: RouteId,
    label: &str,
    order: i64,
    created_at: i64,
) -> uuid::Uuid {
    let point_id = uuid::Uuid::new_v4();
    conn.execute(
        "INSERT INTO route_points (point_uuid, route_uuid, x, y, point_order, created_at)
         VALUES (?1, ?2, 0.5, 0.5, ?3, ?4);",
        params![point_id.to_string(), route.to_string(), order, created_at],
    )
    .unwrap();
    conn.execute(
        "CREATE TEMP TABLE IF NOT EXISTS point_labels (point_uuid TEXT PRIMARY KEY, label TEXT);",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO point_labels (point_uuid, label) VALUES (?1, ?2);",
        params![point_id.to_string(), label],
    )
    .unwrap();
    point_id
}

fn stored_orders(conn: &Connection, route: RouteId) -> Vec<(String, i64)> {
    let mut stmt = conn
        .prepare(
            "SELECT COALESCE(l.label, ''), p.point_order
             FROM route_points p
             LEFT JOIN point_labels l ON l.point_uuid = p.point_uuid
             WHERE p.route_uuid = ?1
             ORDER BY p.point_order ASC;",
        )
        .unwrap();
    let rows = stmt
        .query_map([route.to_string()], |row| {
            Ok::<(String, i64), rusqlite::Error>((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    rows.map(Result::unwrap).collect()
}
