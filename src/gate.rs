//! Resolution quality gate.
//!
//! A capture resolution is accepted when its pixel density, evaluated at the
//! physical diagonal of the configured display, reaches a minimum density.

use crate::config::DisplayConfig;
use crate::device::Resolution;
use crate::error::DomainError;
use serde::Serialize;
use tracing::{debug, warn};

/// Lowest acceptable density in pixels per inch
pub const DEFAULT_MIN_DENSITY: f64 = 113.0;

fn diagonal_pixels(width: u32, height: u32) -> f64 {
    let (w, h) = (width as f64, height as f64);
    (w * w + h * h).sqrt()
}

/// Pixels per inch of a `width` x `height` image shown on a display of the given diagonal
pub fn pixel_density(width: u32, height: u32, diagonal_inches: f64) -> Result<f64, DomainError> {
    if !(diagonal_inches > 0.0) || !diagonal_inches.is_finite() {
        return Err(DomainError::NonPositiveDiagonal(diagonal_inches));
    }
    Ok(diagonal_pixels(width, height) / diagonal_inches)
}

/// Physical diagonal of a display with the given native resolution and density
pub fn estimate_diagonal_inches(
    width: u32,
    height: u32,
    assumed_density: f64,
) -> Result<f64, DomainError> {
    if !(assumed_density > 0.0) || !assumed_density.is_finite() {
        return Err(DomainError::NonPositiveDensity(assumed_density));
    }
    Ok(diagonal_pixels(width, height) / assumed_density)
}

pub fn is_acceptable(
    width: u32,
    height: u32,
    diagonal_inches: f64,
    min_density: f64,
) -> Result<bool, DomainError> {
    Ok(pixel_density(width, height, diagonal_inches)? >= min_density)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GateVerdict {
    Accepted { density: f64 },
    Rejected { density: f64, min_density: f64 },
}

impl GateVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateVerdict::Accepted { .. })
    }

    pub fn density(&self) -> f64 {
        match self {
            GateVerdict::Accepted { density } | GateVerdict::Rejected { density, .. } => *density,
        }
    }
}

/// Gate bound to one physical display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionGate {
    diagonal_inches: f64,
    min_density: f64,
}

impl ResolutionGate {
    pub fn new(diagonal_inches: f64, min_density: f64) -> Result<Self, DomainError> {
        if !(diagonal_inches > 0.0) || !diagonal_inches.is_finite() {
            return Err(DomainError::NonPositiveDiagonal(diagonal_inches));
        }
        if !(min_density > 0.0) || !min_density.is_finite() {
            return Err(DomainError::NonPositiveDensity(min_density));
        }
        Ok(Self {
            diagonal_inches,
            min_density,
        })
    }

    /// Derive the display diagonal from its native resolution and density
    pub fn from_display(config: &DisplayConfig) -> Result<Self, DomainError> {
        let (width, height) = config.resolution;
        let diagonal = estimate_diagonal_inches(width, height, config.density_ppi)?;
        let min_density = config.min_density;
        debug!(
            "Resolution gate bound to {:.2}\" display (min density {})",
            diagonal, min_density
        );
        Self::new(diagonal, min_density)
    }

    pub fn diagonal_inches(&self) -> f64 {
        self.diagonal_inches
    }

    pub fn min_density(&self) -> f64 {
        self.min_density
    }

    pub fn evaluate(&self, resolution: Resolution) -> Result<GateVerdict, DomainError> {
        let density = pixel_density(resolution.width, resolution.height, self.diagonal_inches)?;

        if density >= self.min_density {
            debug!("Resolution {} accepted at {:.1} ppi", resolution, density);
            Ok(GateVerdict::Accepted { density })
        } else {
            warn!(
                "Resolution {} rejected: {:.1} ppi is below the {:.1} ppi minimum",
                resolution, density, self.min_density
            );
            Ok(GateVerdict::Rejected {
                density,
                min_density: self.min_density,
            })
        }
    }
}
