use routemap_core::db::open_db_in_memory;
use routemap_core::{
    ActorId, ImageUpload, PointService, Position, PositionValidationError, Resource, RouteDraft,
    RouteId, RouteService, ServiceError, SqlitePointRepository, SqliteRouteRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

type Points<'conn> = PointService<SqlitePointRepository<'conn>, SqliteRouteRepository<'conn>>;

#[test]
fn append_to_empty_route_starts_at_zero() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");

    let point = points(&conn)
        .append(actor, route, Position { x: 0.1, y: 0.9 })
        .unwrap();

    assert_eq!(point.order, 0);
    assert_eq!(point.route_id, route);
    assert_eq!(point.position, Position { x: 0.1, y: 0.9 });
}

#[test]
fn append_assigns_max_plus_one() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");
    let service = points(&conn);

    for expected in 0..5 {
        let point = service
            .append(actor, route, Position { x: 0.5, y: 0.5 })
            .unwrap();
        assert_eq!(point.order, expected);
    }
}

#[test]
fn remove_shifts_later_siblings_down_by_one() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");
    let service = points(&conn);
    let ids = append_n(&service, actor, route, 4);

    service.remove(actor, route, ids[1]).unwrap();

    let listed = service.list(actor, route).unwrap();
    let orders: Vec<(Uuid, i64)> = listed.iter().map(|point| (point.id, point.order)).collect();
    assert_eq!(orders, vec![(ids[0], 0), (ids[2], 1), (ids[3], 2)]);
}

#[test]
fn remove_last_point_leaves_earlier_orders_untouched() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");
    let service = points(&conn);
    let ids = append_n(&service, actor, route, 3);

    service.remove(actor, route, ids[2]).unwrap();
    let next = service
        .append(actor, route, Position { x: 0.0, y: 0.0 })
        .unwrap();

    assert_eq!(orders(&service, actor, route), vec![0, 1, 2]);
    assert_eq!(next.order, 2);
}

#[test]
fn out_of_range_append_is_rejected_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");
    let service = points(&conn);

    let err = service
        .append(actor, route, Position { x: 1.5, y: 0.5 })
        .unwrap_err();

    assert!(err.is_validation());
    assert!(matches!(
        err,
        ServiceError::InvalidPosition(PositionValidationError::OutOfRange { value, .. })
            if value == 1.5
    ));
    assert!(err.to_string().starts_with("x coordinate"));
    assert!(service.list(actor, route).unwrap().is_empty());
}

#[test]
fn non_finite_coordinates_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");
    let service = points(&conn);

    let err = service
        .append(actor, route, Position { x: 0.5, y: f64::NAN })
        .unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().starts_with("y coordinate"));
}

#[test]
fn removing_point_of_another_route_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let (actor, first) = seed_route(&conn, "ada");
    let second = second_route(&conn, actor);
    let service = points(&conn);
    let foreign = service
        .append(actor, second, Position { x: 0.2, y: 0.2 })
        .unwrap();
    service
        .append(actor, first, Position { x: 0.3, y: 0.3 })
        .unwrap();

    let err = service.remove(actor, first, foreign.id).unwrap_err();

    assert!(matches!(
        err,
        ServiceError::NotFound(Resource::Point(id)) if id == foreign.id
    ));
    assert_eq!(orders(&service, actor, second), vec![0]);
    assert_eq!(orders(&service, actor, first), vec![0]);
}

#[test]
fn listing_twice_without_mutation_is_identical() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");
    let service = points(&conn);
    append_n(&service, actor, route, 6);

    let first = service.list(actor, route).unwrap();
    let second = service.list(actor, route).unwrap();

    assert_eq!(first, second);
}

#[test]
fn interleaved_appends_and_removes_stay_dense() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");
    let service = points(&conn);
    let mut live = append_n(&service, actor, route, 8);

    for index in [0_usize, 3, 5, 0] {
        let removed = live.remove(index.min(live.len() - 1));
        service.remove(actor, route, removed).unwrap();
        let added = service
            .append(actor, route, Position { x: 0.7, y: 0.3 })
            .unwrap();
        live.push(added.id);

        let listed = orders(&service, actor, route);
        let expected: Vec<i64> = (0..live.len() as i64).collect();
        assert_eq!(listed, expected);
    }

    let listed_ids: Vec<Uuid> = service
        .list(actor, route)
        .unwrap()
        .into_iter()
        .map(|point| point.id)
        .collect();
    assert_eq!(listed_ids, live);
}

#[test]
fn update_position_moves_point_and_keeps_order() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");
    let service = points(&conn);
    let ids = append_n(&service, actor, route, 3);

    let moved = service
        .update_position(actor, route, ids[1], Position { x: 1.0, y: 0.0 })
        .unwrap();

    assert_eq!(moved.order, 1);
    assert_eq!(moved.position, Position { x: 1.0, y: 0.0 });
    let loaded = service.get(actor, route, ids[1]).unwrap();
    assert_eq!(loaded, moved);

    let err = service
        .update_position(actor, route, ids[1], Position { x: -0.1, y: 0.0 })
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(
        service.get(actor, route, ids[1]).unwrap().position,
        Position { x: 1.0, y: 0.0 }
    );
}

#[test]
fn get_unknown_point_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");

    let err = points(&conn).get(actor, route, Uuid::new_v4()).unwrap_err();

    assert!(err.is_not_found());
}

#[test]
fn repack_on_dense_route_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");
    let service = points(&conn);
    append_n(&service, actor, route, 4);
    let before = service.list(actor, route).unwrap();

    let report = service.repack(actor, route).unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.renumbered, 0);
    assert_eq!(service.list(actor, route).unwrap(), before);
}

#[test]
fn deleting_route_removes_its_points() {
    let conn = open_db_in_memory().unwrap();
    let (actor, route) = seed_route(&conn, "ada");
    append_n(&points(&conn), actor, route, 3);

    routes(&conn).delete_route(actor, route).unwrap();

    let remaining: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM route_points WHERE route_uuid = ?1;",
            [route.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(remaining, 0);
}

fn points(conn: &Connection) -> Points<'_> {
    PointService::new(
        SqlitePointRepository::try_new(conn).unwrap(),
        SqliteRouteRepository::try_new(conn).unwrap(),
    )
}

fn routes(conn: &Connection) -> RouteService<SqliteRouteRepository<'_>> {
    RouteService::new(SqliteRouteRepository::try_new(conn).unwrap())
}

fn seed_route(conn: &Connection, username: &str) -> (ActorId, RouteId) {
    let service = routes(conn);
    let actor = service.register_actor(username).unwrap();
    let image = service
        .add_background_image(
            Some(actor.id),
            &ImageUpload {
                name: "Harbor map".to_string(),
                storage_path: "uploads/harbor.png".to_string(),
                description: None,
            },
        )
        .unwrap();
    let route = service
        .create_route(
            actor.id,
            image.id,
            &RouteDraft {
                name: "Morning walk".to_string(),
                description: None,
            },
        )
        .unwrap();
    (actor.id, route.id)
}

fn second_route(conn: &Connection, actor: ActorId) -> RouteId {
    let service = routes(conn);
    let image = service.list_images().unwrap().remove(0);
    service
        .create_route(
            actor,
            image.id,
            &RouteDraft {
                name: "Evening walk".to_string(),
                description: None,
            },
        )
        .unwrap()
        .id
}

fn append_n(service: &Points<'_>, actor: ActorId, route: RouteId, count: usize) -> Vec<Uuid> {
    (0..count)
        .map(|index| {
            let step = index as f64 / count as f64;
            service
                .append(actor, route, Position { x: step, y: 1.0 - step })
                .unwrap()
                .id
        })
        .collect()
}

fn orders(service: &Points<'_>, actor: ActorId, route: RouteId) -> Vec<i64> {
    service
        .list(actor, route)
        .unwrap()
        .into_iter()
        .map(|point| point.order)
        .collect()
}
