//! Route, background image and actor domain models.
//!
//! # Responsibility
//! - Define parent-side records that route points hang off.
//! - Derive URL-friendly slugs for background images.
//!
//! # Invariants
//! - A route is owned by exactly one actor.
//! - Image slugs are never blank; uniqueness is resolved by the repository.

use crate::model::point::RoutePoint;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable actor (user) identifier.
pub type ActorId = Uuid;
/// Stable background image identifier.
pub type ImageId = Uuid;
/// Stable route identifier.
pub type RouteId = Uuid;

/// Fallback slug when a name has no slug-safe characters.
pub const DEFAULT_IMAGE_SLUG: &str = "image";

static SLUG_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid slug filter regex"));
static SLUG_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s]+").expect("valid slug separator regex"));

/// Authenticated identity performing operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub username: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

/// Uploaded map/floor plan that routes are drawn on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundImage {
    pub id: ImageId,
    pub name: String,
    pub slug: String,
    /// Opaque location of the image bytes; core never dereferences it.
    pub storage_path: String,
    pub description: Option<String>,
    /// `None` once the uploading actor has been deleted.
    pub uploader: Option<ActorId>,
    /// Epoch ms upload timestamp.
    pub uploaded_at: i64,
}

/// Ordered point sequence over one background image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub owner: ActorId,
    pub background_image: ImageId,
    pub name: String,
    pub description: Option<String>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

/// Route detail with its points in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDetail {
    #[serde(flatten)]
    pub route: Route,
    pub image: BackgroundImage,
    pub points: Vec<RoutePoint>,
}

/// Derives the base slug for `name`.
///
/// Lowercases, drops anything but word characters, whitespace and dashes,
/// then collapses separator runs into one `-`.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let cleaned = SLUG_DISALLOWED.replace_all(&lowered, "");
    let dashed = SLUG_SEPARATORS.replace_all(&cleaned, "-");
    let slug = dashed.trim_matches(|c| c == '-' || c == '_');
    if slug.is_empty() {
        DEFAULT_IMAGE_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Returns the `attempt`-th candidate for `base` (`base`, `base-1`, ...).
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

#[cfg(test)]
mod tests {
    use super::{slug_candidate, slugify, DEFAULT_IMAGE_SLUG};

    #[test]
    fn slugify_collapses_separators_and_strips_symbols() {
        assert_eq!(slugify("  Old Town -- Floor Plan! "), "old-town-floor-plan");
        assert_eq!(slugify("Mapa Świata"), "mapa-świata");
        assert_eq!(slugify("a_b c"), "a_b-c");
    }

    #[test]
    fn slugify_falls_back_when_nothing_survives() {
        assert_eq!(slugify("!!!"), DEFAULT_IMAGE_SLUG);
        assert_eq!(slugify("   "), DEFAULT_IMAGE_SLUG);
    }

    #[test]
    fn slug_candidates_append_counter_after_first_attempt() {
        assert_eq!(slug_candidate("campus", 0), "campus");
        assert_eq!(slug_candidate("campus", 2), "campus-2");
    }
}
