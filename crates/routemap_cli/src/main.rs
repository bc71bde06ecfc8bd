//! `routemap` command-line front end.
//!
//! Every subcommand becomes one [`ApiRequest`] handled against a local
//! SQLite database. The JSON-encoded [`ApiResponse`] goes to stdout and any
//! non-2xx status exits with code 1.

use clap::{Parser, Subcommand};
use log::error;
use routemap_core::{
    default_log_level, handle, init_logging, init_logging_with, open_db, ActorId, ApiRequest,
    ApiResponse, ImageId, ImageUpload, LogTarget, PointId, RouteDraft, RouteId,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "routemap", version, about = "Draw ordered routes over background images")]
struct Cli {
    /// SQLite database file; created and migrated on first use.
    #[arg(long, global = true, env = "ROUTEMAP_DB", default_value = "routemap.sqlite3")]
    db: PathBuf,
    /// Acting user id. Omit for anonymous requests.
    #[arg(long, global = true, env = "ROUTEMAP_ACTOR")]
    actor: Option<ActorId>,
    #[arg(long, global = true, env = "ROUTEMAP_LOG_LEVEL")]
    log_level: Option<String>,
    /// Absolute directory for rolling log files; logs go to stderr otherwise.
    #[arg(long, global = true, env = "ROUTEMAP_LOG_DIR")]
    log_dir: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Actor {
        #[command(subcommand)]
        command: ActorCommand,
    },
    Image {
        #[command(subcommand)]
        command: ImageCommand,
    },
    Route {
        #[command(subcommand)]
        command: RouteCommand,
    },
    Point {
        #[command(subcommand)]
        command: PointCommand,
    },
}

#[derive(Subcommand)]
enum ActorCommand {
    /// Register a new user.
    Add { username: String },
}

#[derive(Subcommand)]
enum ImageCommand {
    /// Record an uploaded background image.
    Add {
        name: String,
        #[arg(long)]
        path: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    /// Random sample for the landing page.
    Random {
        #[arg(long)]
        limit: Option<u32>,
    },
    Delete { image: ImageId },
}

#[derive(Subcommand)]
enum RouteCommand {
    Create {
        #[arg(long)]
        image: ImageId,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        /// Only routes drawn on the image with this slug.
        #[arg(long)]
        image_slug: Option<String>,
    },
    Show { route: RouteId },
    Update {
        route: RouteId,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete { route: RouteId },
}

#[derive(Subcommand)]
enum PointCommand {
    Append {
        route: RouteId,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    List { route: RouteId },
    Show { route: RouteId, point: PointId },
    /// Move a point to new coordinates.
    Move {
        route: RouteId,
        point: PointId,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    Remove { route: RouteId, point: PointId },
    /// Rebuild a dense order for the route.
    Repack { route: RouteId },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(message) = start_logging(cli.log_level.as_deref(), cli.log_dir.as_deref()) {
        eprintln!("routemap: {message}");
        return ExitCode::FAILURE;
    }

    let conn = match open_db(&cli.db) {
        Ok(conn) => conn,
        Err(err) => {
            error!("event=cli_open module=cli status=error error={err}");
            eprintln!("routemap: cannot open `{}`: {err}", cli.db.display());
            return ExitCode::FAILURE;
        }
    };

    let response = handle(&conn, cli.actor, into_request(cli.command));
    print_response(&response)
}

fn start_logging(level: Option<&str>, log_dir: Option<&str>) -> Result<(), String> {
    match log_dir {
        Some(dir) => init_logging(level.unwrap_or(default_log_level()), dir),
        None => init_logging_with(level.unwrap_or("warn"), LogTarget::Stderr),
    }
}

fn into_request(command: Commands) -> ApiRequest {
    match command {
        Commands::Actor { command } => match command {
            ActorCommand::Add { username } => ApiRequest::RegisterActor { username },
        },
        Commands::Image { command } => match command {
            ImageCommand::Add {
                name,
                path,
                description,
            } => ApiRequest::AddImage {
                upload: ImageUpload {
                    name,
                    storage_path: path,
                    description,
                },
            },
            ImageCommand::List => ApiRequest::ListImages,
            ImageCommand::Random { limit } => ApiRequest::RandomImages { limit },
            ImageCommand::Delete { image } => ApiRequest::DeleteImage { image_id: image },
        },
        Commands::Route { command } => match command {
            RouteCommand::Create {
                image,
                name,
                description,
            } => ApiRequest::CreateRoute {
                image_id: image,
                draft: RouteDraft { name, description },
            },
            RouteCommand::List { image_slug: None } => ApiRequest::ListRoutes,
            RouteCommand::List {
                image_slug: Some(slug),
            } => ApiRequest::RoutesOnImage { slug },
            RouteCommand::Show { route } => ApiRequest::GetRoute { route_id: route },
            RouteCommand::Update {
                route,
                name,
                description,
            } => ApiRequest::UpdateRoute {
                route_id: route,
                draft: RouteDraft { name, description },
            },
            RouteCommand::Delete { route } => ApiRequest::DeleteRoute { route_id: route },
        },
        Commands::Point { command } => match command {
            PointCommand::Append { route, x, y } => ApiRequest::AppendPoint {
                route_id: route,
                x,
                y,
            },
            PointCommand::List { route } => ApiRequest::ListPoints { route_id: route },
            PointCommand::Show { route, point } => ApiRequest::GetPoint {
                route_id: route,
                point_id: point,
            },
            PointCommand::Move { route, point, x, y } => ApiRequest::UpdatePoint {
                route_id: route,
                point_id: point,
                x,
                y,
            },
            PointCommand::Remove { route, point } => ApiRequest::RemovePoint {
                route_id: route,
                point_id: point,
            },
            PointCommand::Repack { route } => ApiRequest::RepackPoints { route_id: route },
        },
    }
}

fn print_response(response: &ApiResponse) -> ExitCode {
    match serde_json::to_string_pretty(response) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("routemap: failed to encode response: {err}");
            return ExitCode::FAILURE;
        }
    }
    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::{into_request, Cli};
    use clap::{CommandFactory, Parser};
    use routemap_core::ApiRequest;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn route_list_with_slug_targets_image_routes() {
        let cli = Cli::try_parse_from([
            "routemap",
            "--db",
            "/tmp/routes.sqlite3",
            "route",
            "list",
            "--image-slug",
            "harbor-map",
        ])
        .unwrap();
        assert_eq!(
            into_request(cli.command),
            ApiRequest::RoutesOnImage {
                slug: "harbor-map".to_string()
            }
        );
    }

    #[test]
    fn point_move_parses_route_point_and_coordinates() {
        let route = uuid::Uuid::new_v4();
        let point = uuid::Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "routemap",
            "point",
            "move",
            &route.to_string(),
            &point.to_string(),
            "0.25",
            "1",
        ])
        .unwrap();
        assert_eq!(
            into_request(cli.command),
            ApiRequest::UpdatePoint {
                route_id: route,
                point_id: point,
                x: 0.25,
                y: 1.0,
            }
        );
    }

    #[test]
    fn negative_coordinates_reach_the_request() {
        let route = uuid::Uuid::new_v4();
        let point = uuid::Uuid::new_v4();

        let append =
            Cli::try_parse_from(["routemap", "point", "append", &route.to_string(), "-0.5", "0.2"])
                .unwrap();
        assert_eq!(
            into_request(append.command),
            ApiRequest::AppendPoint {
                route_id: route,
                x: -0.5,
                y: 0.2,
            }
        );

        let moved = Cli::try_parse_from([
            "routemap",
            "point",
            "move",
            &route.to_string(),
            &point.to_string(),
            "0.1",
            "-1",
        ])
        .unwrap();
        assert_eq!(
            into_request(moved.command),
            ApiRequest::UpdatePoint {
                route_id: route,
                point_id: point,
                x: 0.1,
                y: -1.0,
            }
        );
    }

    #[test]
    fn malformed_actor_id_is_rejected_at_parse_time() {
        let parsed = Cli::try_parse_from(["routemap", "--actor", "not-a-uuid", "image", "list"]);
        assert!(parsed.is_err());
    }
}
