//! Extraction configuration and builder
//!
//! This module provides the run parameters of the dual-contouring pipeline.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoronoiError};

/// Largest accepted supersampling factor
///
/// Each factor multiplies the sample count by roughly its cube, so anything
/// beyond this is impractical for a batch run.
pub const MAX_SUPERSAMPLE: u32 = 16;

/// How many isosurface vertices a Voronoi cell may carry
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsovertexMode {
    /// One vertex per active cube, placed at the centroid of its edge crossings
    #[default]
    Single,
    /// One vertex per surface sheet passing through each Voronoi cell
    Multi,
}

impl IsovertexMode {
    /// Get a human-readable name for this mode
    pub fn name(self) -> &'static str {
        match self {
            IsovertexMode::Single => "single",
            IsovertexMode::Multi => "multi",
        }
    }
}

/// How the boundary facets of a Voronoi cell are derived
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellConstruction {
    /// Walk the tetrahedra around each Delaunay edge of the cell's site.
    ///
    /// Produces one polygonal facet per Voronoi face, exactly the result of
    /// intersecting the bisector half-spaces.
    #[default]
    DelaunayStar,
    /// Convex hull of the cell's Voronoi vertices (triangulated facets)
    ConvexHull,
}

/// Strategy for choosing pairwise non-adjacent active cubes
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Separation {
    /// Keep cubes in input order unless a kept neighbour blocks them
    #[default]
    Greedy,
    /// Greedy-colour the adjacency graph and keep the largest colour class
    Coloring,
}

/// Configuration for one extraction run
///
/// The same configuration applied to the same field always produces the
/// identical surface.
///
/// # Example
///
/// ```rust
/// use voronoi_isosurface::*;
///
/// let config = ExtractionConfigBuilder::new()
///     .isovalue(0.5)
///     .unwrap()
///     .mode(IsovertexMode::Multi)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.mode, IsovertexMode::Multi);
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionConfig {
    /// Scalar value the extracted surface interpolates
    pub isovalue: f32,

    /// Single or multi isovertex extraction
    pub mode: IsovertexMode,

    /// Keep only a maximal set of pairwise non-adjacent active cubes
    ///
    /// Thins the triangulation; adjacency is the 26-neighbourhood on the
    /// cube lattice.
    pub separate_active: bool,

    /// How the non-adjacent subset is chosen when `separate_active` is set
    pub separation: Separation,

    /// Uniform supersampling factor applied to the field before active-cube
    /// detection (`None` or `Some(1)` leaves the field untouched)
    pub supersample: Option<u32>,

    /// Voronoi cell facet construction used in multi mode
    pub cell_construction: CellConstruction,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let builder = ExtractionConfigBuilder::new();
        ExtractionConfig {
            isovalue: builder.isovalue,
            mode: builder.mode,
            separate_active: builder.separate_active,
            separation: builder.separation,
            supersample: builder.supersample,
            cell_construction: builder.cell_construction,
        }
    }
}

/// Builder for creating [`ExtractionConfig`] with validation
///
/// # Example
///
/// ```rust
/// use voronoi_isosurface::*;
///
/// let config = ExtractionConfigBuilder::new()
///     .isovalue(120.0)
///     .unwrap()
///     .separate_active(true)
///     .supersample(2)
///     .unwrap()
///     .build()
///     .unwrap();
///
/// assert_eq!(config.supersample, Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct ExtractionConfigBuilder {
    isovalue: f32,
    mode: IsovertexMode,
    separate_active: bool,
    separation: Separation,
    supersample: Option<u32>,
    cell_construction: CellConstruction,
}

impl ExtractionConfigBuilder {
    /// Create a new builder with default values
    ///
    /// Defaults:
    /// - isovalue: 0.0
    /// - mode: Single
    /// - separate_active: false
    /// - separation: Greedy
    /// - supersample: None
    /// - cell_construction: DelaunayStar
    pub fn new() -> Self {
        Self {
            isovalue: 0.0,
            mode: IsovertexMode::default(),
            separate_active: false,
            separation: Separation::default(),
            supersample: None,
            cell_construction: CellConstruction::default(),
        }
    }

    /// Set the isovalue
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the value is NaN or infinite
    pub fn isovalue(mut self, isovalue: f32) -> Result<Self> {
        if !isovalue.is_finite() {
            return Err(VoronoiError::InvalidConfig(format!(
                "isovalue must be finite (got {})",
                isovalue
            )));
        }
        self.isovalue = isovalue;
        Ok(self)
    }

    /// Set the isovertex mode
    pub fn mode(mut self, mode: IsovertexMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable non-adjacent active cube selection
    pub fn separate_active(mut self, separate: bool) -> Self {
        self.separate_active = separate;
        self
    }

    /// Set the separation strategy
    pub fn separation(mut self, separation: Separation) -> Self {
        self.separation = separation;
        self
    }

    /// Set the supersampling factor
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the factor is 0 or above [`MAX_SUPERSAMPLE`]
    pub fn supersample(mut self, factor: u32) -> Result<Self> {
        if factor == 0 || factor > MAX_SUPERSAMPLE {
            return Err(VoronoiError::InvalidConfig(format!(
                "supersample factor must be in 1..={} (got {})",
                MAX_SUPERSAMPLE, factor
            )));
        }
        self.supersample = Some(factor);
        Ok(self)
    }

    /// Set the Voronoi cell construction used in multi mode
    pub fn cell_construction(mut self, construction: CellConstruction) -> Self {
        self.cell_construction = construction;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ExtractionConfig> {
        Ok(ExtractionConfig {
            isovalue: self.isovalue,
            mode: self.mode,
            separate_active: self.separate_active,
            separation: self.separation,
            supersample: self.supersample,
            cell_construction: self.cell_construction,
        })
    }
}

impl Default for ExtractionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
