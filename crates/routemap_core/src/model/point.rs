//! Route point domain model.
//!
//! # Responsibility
//! - Define the normalized coordinate type and its validation.
//! - Define the route point read model.
//!
//! # Invariants
//! - Both coordinate components are finite and inside `[0.0, 1.0]`.
//! - `order` values of one route form the dense sequence `0..n`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable route point identifier.
pub type PointId = Uuid;

/// Coordinate axis, used to name the offending component in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
        }
    }
}

/// Position validation failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionValidationError {
    /// Component is NaN or infinite.
    NotFinite { axis: Axis },
    /// Component is outside the closed unit interval.
    OutOfRange { axis: Axis, value: f64 },
}

impl Display for PositionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFinite { axis } => {
                write!(f, "{} coordinate must be a finite number", axis.as_str())
            }
            Self::OutOfRange { axis, value } => write!(
                f,
                "{} coordinate must be between 0.0 and 1.0, got {value}",
                axis.as_str()
            ),
        }
    }
}

impl Error for PositionValidationError {}

/// Coordinate pair relative to the background image size.
///
/// `x` is the fraction of the image width, `y` the fraction of its height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Builds a validated position.
    pub fn new(x: f64, y: f64) -> Result<Self, PositionValidationError> {
        let position = Self { x, y };
        position.validate()?;
        Ok(position)
    }

    /// Checks both components. The first failing axis is reported.
    pub fn validate(&self) -> Result<(), PositionValidationError> {
        check_component(Axis::X, self.x)?;
        check_component(Axis::Y, self.y)
    }
}

fn check_component(axis: Axis, value: f64) -> Result<(), PositionValidationError> {
    if !value.is_finite() {
        return Err(PositionValidationError::NotFinite { axis });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(PositionValidationError::OutOfRange { axis, value });
    }
    Ok(())
}

/// Route point read model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    /// Stable point id, assigned at creation.
    pub id: PointId,
    /// Owning route.
    pub route_id: Uuid,
    #[serde(flatten)]
    pub position: Position,
    /// Dense zero-based index within the owning route.
    pub order: i64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::{Axis, Position, PositionValidationError};

    #[test]
    fn accepts_closed_interval_bounds() {
        assert!(Position::new(0.0, 1.0).is_ok());
        assert!(Position::new(1.0, 0.0).is_ok());
        assert!(Position::new(0.25, 0.75).is_ok());
    }

    #[test]
    fn rejects_out_of_range_x_first() {
        let err = Position::new(1.5, -0.5).unwrap_err();
        assert_eq!(
            err,
            PositionValidationError::OutOfRange {
                axis: Axis::X,
                value: 1.5
            }
        );
        assert!(err.to_string().starts_with("x coordinate"));
    }

    #[test]
    fn rejects_non_finite_components() {
        let err = Position::new(0.5, f64::NAN).unwrap_err();
        assert_eq!(err, PositionValidationError::NotFinite { axis: Axis::Y });
        assert!(Position::new(f64::INFINITY, 0.5).is_err());
    }
}
