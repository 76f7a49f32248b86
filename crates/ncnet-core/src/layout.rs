//! Deterministic spatial layout of the cell populations
//!
//! Pyramidal cells sit on a rectangular grid, basket cells on a sparse
//! staggered subset of that grid, and every external input without spatial
//! identity sits at a single origin near the centre of the grid.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::population::CellType;

/// Laminar depth of layer 5 relative to layer 2/3 (um)
pub const LAYER5_DEPTH: f64 = 1307.4;

/// Position of a cell or input in the column
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    /// Grid column
    pub x: f64,
    /// Grid row
    pub y: f64,
    /// Laminar depth
    pub z: f64,
}

impl Position {
    /// Create a new position
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Distance used by every connection kernel
///
/// Only the in-plane components enter the metric. The laminar depth `z` is
/// ignored, so interlaminar projections see the same distance
/// as projections within a layer.
pub fn in_plane_distance(a: &Position, b: &Position) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Extent of the pyramidal grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridSize {
    /// Number of grid columns
    pub x: u32,
    /// Number of grid rows
    pub y: u32,
}

impl Default for GridSize {
    fn default() -> Self {
        Self { x: 10, y: 10 }
    }
}

impl GridSize {
    /// Create a grid size with validation
    pub fn new(x: u32, y: u32) -> Result<Self> {
        if x == 0 {
            return Err(NetError::invalid_parameter("grid.x", x.to_string(), "> 0"));
        }
        if y == 0 {
            return Err(NetError::invalid_parameter("grid.y", y.to_string(), "> 0"));
        }
        Ok(Self { x, y })
    }

    /// Validate grid dimensions
    pub fn validate(&self) -> Result<()> {
        Self::new(self.x, self.y)?;
        Ok(())
    }

    /// Number of cells in one pyramidal population
    pub fn cells(&self) -> usize {
        self.x as usize * self.y as usize
    }
}

/// Positions of all populations for one grid size
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialLayout {
    grid: GridSize,
    l2_pyramidal: Vec<Position>,
    l5_pyramidal: Vec<Position>,
    l2_basket: Vec<Position>,
    l5_basket: Vec<Position>,
    origin: Position,
}

impl SpatialLayout {
    /// Compute the layout for a grid
    pub fn new(grid: GridSize) -> Result<Self> {
        grid.validate()?;

        let l2_pyramidal = pyramidal_grid(grid, 0.0);
        let l5_pyramidal = pyramidal_grid(grid, LAYER5_DEPTH);

        let in_plane = basket_coordinates(grid);
        let l2_basket = in_plane
            .iter()
            .map(|&(x, y)| Position::new(x as f64, y as f64, 0.0))
            .collect();
        let l5_basket = in_plane
            .iter()
            .map(|&(x, y)| Position::new(x as f64, y as f64, LAYER5_DEPTH))
            .collect();

        let origin = Position::new(
            ((grid.x - 1) / 2) as f64,
            ((grid.y - 1) / 2) as f64,
            (LAYER5_DEPTH / 2.0).floor(),
        );

        log::debug!(
            "Layout for {}x{} grid: {} pyramidal, {} basket per layer, origin {}",
            grid.x,
            grid.y,
            grid.cells(),
            in_plane.len(),
            origin
        );

        Ok(Self {
            grid,
            l2_pyramidal,
            l5_pyramidal,
            l2_basket,
            l5_basket,
            origin,
        })
    }

    /// Grid this layout was computed for
    pub fn grid(&self) -> GridSize {
        self.grid
    }

    /// Positions of a cell population, in local index order
    pub fn positions(&self, cell_type: CellType) -> &[Position] {
        match cell_type {
            CellType::L2Basket => &self.l2_basket,
            CellType::L2Pyramidal => &self.l2_pyramidal,
            CellType::L5Basket => &self.l5_basket,
            CellType::L5Pyramidal => &self.l5_pyramidal,
        }
    }

    /// Position of one cell
    pub fn position(&self, cell_type: CellType, index: usize) -> Option<Position> {
        self.positions(cell_type).get(index).copied()
    }

    /// Number of cells in a population
    pub fn count(&self, cell_type: CellType) -> usize {
        self.positions(cell_type).len()
    }

    /// Total number of cells over all populations
    pub fn total_cells(&self) -> usize {
        CellType::ALL.iter().map(|&t| self.count(t)).sum()
    }

    /// Shared position of external inputs
    pub fn origin(&self) -> Position {
        self.origin
    }
}

fn pyramidal_grid(grid: GridSize, z: f64) -> Vec<Position> {
    let mut positions = Vec::with_capacity(grid.cells());
    for x in 0..grid.x {
        for y in 0..grid.y {
            positions.push(Position::new(x as f64, y as f64, z));
        }
    }
    positions
}

fn basket_coordinates(grid: GridSize) -> Vec<(u32, u32)> {
    let mut coords = Vec::new();
    for x in (0..grid.x).step_by(3) {
        for y in (0..grid.y).step_by(2) {
            coords.push((x, y));
        }
    }
    for x in (1..grid.x).step_by(3) {
        for y in (1..grid.y).step_by(2) {
            coords.push((x, y));
        }
    }
    // stable: ties on y keep construction order
    coords.sort_by_key(|&(_, y)| y);
    coords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_grid_rejected() {
        assert!(SpatialLayout::new(GridSize { x: 0, y: 3 }).is_err());
        assert!(GridSize::new(4, 0).unwrap_err().is_configuration());
    }

    #[test]
    fn test_pyramidal_grid_is_x_major() {
        let layout = SpatialLayout::new(GridSize::new(2, 3).unwrap()).unwrap();
        let l2 = layout.positions(CellType::L2Pyramidal);
        assert_eq!(l2.len(), 6);
        assert_eq!(l2[0], Position::new(0.0, 0.0, 0.0));
        assert_eq!(l2[1], Position::new(0.0, 1.0, 0.0));
        assert_eq!(l2[3], Position::new(1.0, 0.0, 0.0));
        let l5 = layout.positions(CellType::L5Pyramidal);
        assert!(l5.iter().all(|p| p.z == LAYER5_DEPTH));
    }

    #[test]
    fn test_basket_layout_3x3() {
        let layout = SpatialLayout::new(GridSize::new(3, 3).unwrap()).unwrap();
        let baskets: Vec<_> = layout
            .positions(CellType::L2Basket)
            .iter()
            .map(|p| (p.x, p.y))
            .collect();
        assert_eq!(baskets, vec![(0.0, 0.0), (1.0, 1.0), (0.0, 2.0)]);

        let deep: Vec<_> = layout
            .positions(CellType::L5Basket)
            .iter()
            .map(|p| (p.x, p.y))
            .collect();
        assert_eq!(baskets, deep);
    }

    #[test]
    fn test_default_grid_counts() {
        let layout = SpatialLayout::new(GridSize::default()).unwrap();
        assert_eq!(layout.count(CellType::L2Pyramidal), 100);
        assert_eq!(layout.count(CellType::L2Basket), 35);
        assert_eq!(layout.count(CellType::L5Basket), 35);
        assert_eq!(layout.total_cells(), 270);
    }

    #[test]
    fn test_origin() {
        let layout = SpatialLayout::new(GridSize::new(10, 10).unwrap()).unwrap();
        assert_eq!(layout.origin(), Position::new(4.0, 4.0, 653.0));
        let layout = SpatialLayout::new(GridSize::new(1, 1).unwrap()).unwrap();
        assert_eq!(layout.origin(), Position::new(0.0, 0.0, 653.0));
    }

    #[test]
    fn test_in_plane_distance_ignores_depth() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, LAYER5_DEPTH);
        assert_eq!(in_plane_distance(&a, &b), 5.0);
    }
}
