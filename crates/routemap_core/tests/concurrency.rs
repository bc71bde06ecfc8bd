use routemap_core::db::open_db;
use routemap_core::{
    ImageUpload, PointService, Position, RouteDraft, RouteService, SqlitePointRepository,
    SqliteRouteRepository,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

const WRITERS: usize = 6;
const APPENDS_PER_WRITER: usize = 12;

#[test]
fn concurrent_appends_on_one_route_never_share_an_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routemap.db");
    let (actor, route) = seed(&path);

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = PointService::new(
                    SqlitePointRepository::try_new(&conn).unwrap(),
                    SqliteRouteRepository::try_new(&conn).unwrap(),
                );
                barrier.wait();
                (0..APPENDS_PER_WRITER)
                    .map(|step| {
                        let x = writer as f64 / WRITERS as f64;
                        let y = step as f64 / APPENDS_PER_WRITER as f64;
                        service.append(actor, route, Position { x, y }).unwrap().order
                    })
                    .collect::<Vec<i64>>()
            })
        })
        .collect();

    let mut returned = Vec::new();
    for handle in handles {
        returned.extend(handle.join().unwrap());
    }

    let total = WRITERS * APPENDS_PER_WRITER;
    let unique: HashSet<i64> = returned.iter().copied().collect();
    assert_eq!(unique.len(), total);

    let conn = open_db(&path).unwrap();
    let service = PointService::new(
        SqlitePointRepository::try_new(&conn).unwrap(),
        SqliteRouteRepository::try_new(&conn).unwrap(),
    );
    let stored: Vec<i64> = service
        .list(actor, route)
        .unwrap()
        .into_iter()
        .map(|point| point.order)
        .collect();
    assert_eq!(stored, (0..total as i64).collect::<Vec<_>>());
}

#[test]
fn concurrent_removes_and_appends_keep_route_dense() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routemap.db");
    let (actor, route) = seed(&path);

    let seeded: Vec<_> = {
        let conn = open_db(&path).unwrap();
        let service = PointService::new(
            SqlitePointRepository::try_new(&conn).unwrap(),
            SqliteRouteRepository::try_new(&conn).unwrap(),
        );
        (0..20)
            .map(|_| {
                service
                    .append(actor, route, Position { x: 0.5, y: 0.5 })
                    .unwrap()
                    .id
            })
            .collect()
    };

    let barrier = Arc::new(Barrier::new(2));
    let remover = {
        let path = path.clone();
        let barrier = Arc::clone(&barrier);
        let doomed: Vec<_> = seeded.iter().step_by(2).copied().collect();
        thread::spawn(move || {
            let conn = open_db(&path).unwrap();
            let service = PointService::new(
                SqlitePointRepository::try_new(&conn).unwrap(),
                SqliteRouteRepository::try_new(&conn).unwrap(),
            );
            barrier.wait();
            for point in doomed {
                service.remove(actor, route, point).unwrap();
            }
        })
    };
    let appender = {
        let path = path.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let conn = open_db(&path).unwrap();
            let service = PointService::new(
                SqlitePointRepository::try_new(&conn).unwrap(),
                SqliteRouteRepository::try_new(&conn).unwrap(),
            );
            barrier.wait();
            for _ in 0..10 {
                service
                    .append(actor, route, Position { x: 0.1, y: 0.2 })
                    .unwrap();
            }
        })
    };
    remover.join().unwrap();
    appender.join().unwrap();

    let conn = open_db(&path).unwrap();
    let service = PointService::new(
        SqlitePointRepository::try_new(&conn).unwrap(),
        SqliteRouteRepository::try_new(&conn).unwrap(),
    );
    let stored: Vec<i64> = service
        .list(actor, route)
        .unwrap()
        .into_iter()
        .map(|point| point.order)
        .collect();
    assert_eq!(stored, (0..20).collect::<Vec<i64>>());
}

fn seed(path: &Path) -> (uuid::Uuid, uuid::Uuid) {
    let conn = open_db(path).unwrap();
    let routes = RouteService::new(SqliteRouteRepository::try_new(&conn).unwrap());
    let actor = routes.register_actor("ada").unwrap();
    let image = routes
        .add_background_image(
            Some(actor.id),
            &ImageUpload {
                name: "Harbor".to_string(),
                storage_path: "uploads/harbor.png".to_string(),
                description: None,
            },
        )
        .unwrap();
    let route = routes
        .create_route(
            actor.id,
            image.id,
            &RouteDraft {
                name: "Loop".to_string(),
                description: None,
            },
        )
        .unwrap();
    (actor.id, route.id)
}
