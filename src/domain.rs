//! Rectangular channel discretization
//!
//! # Two grid conventions, one type
//!
//! The two engines discretize the same physical channel differently:
//!
//! - The **explicit stencil engine** works on `nx × ny` *cells*, with spacing
//!   `dx = Lx/nx` and cell centers at `(i + 1/2)·dx`.
//! - The **FEM engine** works on `nx × ny` *nodes*, with spacing
//!   `dx = Lx/(nx-1)` and nodes at `i·dx` (endpoints on the boundary).
//!
//! Rather than two domain types, a single immutable [`Domain`] carries its
//! [`GridKind`] and derives spacing and coordinates accordingly. Downstream
//! code (fields, diagnostics) never needs to branch on the convention — it
//! only asks for `x(i)`, `y(j)`, `dx`, `dy`.
//!
//! # Linear node indexing
//!
//! Sparse-matrix engines need a flat index. [`Domain::node_index`] maps
//! `(i, j) → i·ny + j`, which is exactly the column-major layout of the
//! concentration matrix (`ny` rows × `nx` columns), so a nodal vector and a
//! field share memory order with no permutation.

use crate::error::TransportError;

/// Grid discretization convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKind {
    /// Cell-centered grid: `nx × ny` cells, spacing `Lx/nx`.
    CellCentered,
    /// Node-based grid: `nx × ny` nodes, spacing `Lx/(nx-1)`.
    NodeBased,
}

/// Immutable rectangular channel discretization.
///
/// Constructed once from `(nx, ny, Lx, Ly)`; no mutation afterwards.
///
/// # Index conventions
///
/// - `i` — along-channel index (column of the field), `0..nx`
/// - `j` — cross-channel index (row of the field), `0..ny`
///
/// # Example
///
/// ```rust
/// use adr_rs::Domain;
///
/// let cells = Domain::cells(80, 40, 100.0, 20.0).unwrap();
/// assert_eq!(cells.dx(), 1.25);
///
/// let nodes = Domain::nodes(41, 21, 5000.0, 200.0).unwrap();
/// assert_eq!(nodes.dx(), 125.0);
/// assert_eq!(nodes.node_index(1, 0), 21);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    nx: usize,
    ny: usize,
    lx: f64,
    ly: f64,
    dx: f64,
    dy: f64,
    kind: GridKind,
}

impl Domain {
    /// Create a cell-centered domain (explicit stencil engine).
    ///
    /// Fails with [`TransportError::InvalidDomain`] when `nx` or `ny` is
    /// below 2, or when an extent is non-positive or non-finite.
    pub fn cells(nx: usize, ny: usize, lx: f64, ly: f64) -> Result<Self, TransportError> {
        Self::build(nx, ny, lx, ly, GridKind::CellCentered)
    }

    /// Create a node-based domain (FEM engine).
    ///
    /// Same validation as [`Domain::cells`].
    pub fn nodes(nx: usize, ny: usize, lx: f64, ly: f64) -> Result<Self, TransportError> {
        Self::build(nx, ny, lx, ly, GridKind::NodeBased)
    }

    fn build(
        nx: usize,
        ny: usize,
        lx: f64,
        ly: f64,
        kind: GridKind,
    ) -> Result<Self, TransportError> {
        if nx < 2 || ny < 2 {
            return Err(TransportError::InvalidDomain(format!(
                "grid counts must be at least 2 in each direction, got nx={nx}, ny={ny}"
            )));
        }
        if !(lx.is_finite() && ly.is_finite()) || lx <= 0.0 || ly <= 0.0 {
            return Err(TransportError::InvalidDomain(format!(
                "physical extents must be positive and finite, got Lx={lx}, Ly={ly}"
            )));
        }

        let (dx, dy) = match kind {
            GridKind::CellCentered => (lx / nx as f64, ly / ny as f64),
            GridKind::NodeBased => (lx / (nx - 1) as f64, ly / (ny - 1) as f64),
        };

        Ok(Self {
            nx,
            ny,
            lx,
            ly,
            dx,
            dy,
            kind,
        })
    }

    // ==================== Accessors ====================

    /// Along-channel cell/node count.
    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Cross-channel cell/node count.
    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Channel length \[m\].
    #[inline]
    pub fn lx(&self) -> f64 {
        self.lx
    }

    /// Channel width \[m\].
    #[inline]
    pub fn ly(&self) -> f64 {
        self.ly
    }

    /// Along-channel spacing \[m\].
    #[inline]
    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// Cross-channel spacing \[m\].
    #[inline]
    pub fn dy(&self) -> f64 {
        self.dy
    }

    /// Grid convention in force.
    #[inline]
    pub fn kind(&self) -> GridKind {
        self.kind
    }

    /// Total number of cells or nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    /// A domain always has at least 2×2 entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    // ==================== Coordinates ====================

    /// Physical along-channel coordinate of column `i`.
    ///
    /// Cell centers for cell-centered grids, node positions for node-based.
    #[inline]
    pub fn x(&self, i: usize) -> f64 {
        match self.kind {
            GridKind::CellCentered => (i as f64 + 0.5) * self.dx,
            GridKind::NodeBased => i as f64 * self.dx,
        }
    }

    /// Physical cross-channel coordinate of row `j`.
    #[inline]
    pub fn y(&self, j: usize) -> f64 {
        match self.kind {
            GridKind::CellCentered => (j as f64 + 0.5) * self.dy,
            GridKind::NodeBased => j as f64 * self.dy,
        }
    }

    // ==================== Linear indexing ====================

    /// Flat index of `(i, j)` for sparse assembly: `i·ny + j`.
    ///
    /// Matches the column-major storage of [`crate::ConcentrationField`], so
    /// `field.as_slice()[domain.node_index(i, j)]` is the value at column `i`,
    /// row `j`.
    #[inline]
    pub fn node_index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.nx && j < self.ny);
        i * self.ny + j
    }

    /// Node nearest to the physical point `(x, y)` (node-based grids).
    ///
    /// Coordinates outside the channel are clamped to the nearest
    /// boundary node.
    pub fn nearest_node(&self, x: f64, y: f64) -> (usize, usize) {
        let clamp = |v: f64, n: usize| -> usize {
            let idx = (v).round();
            if idx <= 0.0 { 0 } else { (idx as usize).min(n - 1) }
        };
        (clamp(x / self.dx, self.nx), clamp(y / self.dy, self.ny))
    }

    /// True when `(i, j)` lies on any of the four mesh edges.
    #[inline]
    pub fn is_boundary(&self, i: usize, j: usize) -> bool {
        i == 0 || j == 0 || i == self.nx - 1 || j == self.ny - 1
    }
}

// =================================================================================================
// Tests
// =================================================================================================
