use serde::{Deserialize, Serialize};

use crate::model::Mover;

/// Glyph for an impassable cell.
pub const WALL_GLYPH: char = '#';
/// Glyph for an open cell.
pub const FLOOR_GLYPH: char = ' ';
/// Legacy player marker baked into some layouts. Blocks mobs only.
pub const PLAYER_GLYPH: char = '@';

/// 2D integer coordinate. `y` grows downwards, row 0 is the top of the maze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("layout has no rows")]
    Empty,

    #[error("row {row} has width {got}, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("layout is {width}x{height}, declared {declared_width}x{declared_height}")]
    DimensionMismatch {
        width: usize,
        height: usize,
        declared_width: usize,
        declared_height: usize,
    },
}

/// A fixed rectangular maze.
///
/// Geometry never changes after construction: `height` equals the number of
/// rows and every row is exactly `width` glyphs wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    id: String,
    width: usize,
    height: usize,
    cells: Vec<Vec<char>>,
}

impl World {
    /// Build a world from its rows. Width is taken from the first row.
    pub fn new<I, S>(id: impl Into<String>, rows: I) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cells: Vec<Vec<char>> = rows
            .into_iter()
            .map(|row| row.as_ref().chars().collect())
            .collect();

        let width = cells.first().map(Vec::len).ok_or(LayoutError::Empty)?;
        if width == 0 {
            return Err(LayoutError::Empty);
        }
        for (row, line) in cells.iter().enumerate() {
            if line.len() != width {
                return Err(LayoutError::RaggedRow {
                    row,
                    expected: width,
                    got: line.len(),
                });
            }
        }

        Ok(Self {
            id: id.into(),
            width,
            height: cells.len(),
            cells,
        })
    }

    /// Build a world and check it against declared dimensions.
    pub fn with_dimensions<I, S>(
        id: impl Into<String>,
        width: usize,
        height: usize,
        rows: I,
    ) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let world = Self::new(id, rows)?;
        if world.width != width || world.height != height {
            return Err(LayoutError::DimensionMismatch {
                width: world.width,
                height: world.height,
                declared_width: width,
                declared_height: height,
            });
        }
        Ok(world)
    }

    /// Parse a newline-separated layout. `\r` line endings and a single
    /// trailing newline are tolerated.
    pub fn from_text(id: impl Into<String>, text: &str) -> Result<Self, LayoutError> {
        let text = text.strip_suffix('\n').unwrap_or(text);
        let text = text.strip_suffix('\r').unwrap_or(text);
        Self::new(id, text.split('\n').map(|l| l.trim_end_matches('\r')))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Check if a coordinate is within `[0, width) x [0, height)`.
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Glyph at a coordinate, `None` outside the grid.
    pub fn glyph(&self, x: i32, y: i32) -> Option<char> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(self.cells[y as usize][x as usize])
    }

    /// Whether `mover` may stand on `(x, y)`.
    ///
    /// Out-of-bounds and wall cells block everyone; the player glyph
    /// additionally blocks mobs.
    pub fn is_passable(&self, x: i32, y: i32, mover: Mover) -> bool {
        match self.glyph(x, y) {
            None | Some(WALL_GLYPH) => false,
            Some(PLAYER_GLYPH) => mover == Mover::Player,
            Some(_) => true,
        }
    }

    /// All cells `mover` may stand on, row-major.
    pub fn passable_cells(&self, mover: Mover) -> Vec<GridPos> {
        let mut cells = Vec::new();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                if self.is_passable(x, y, mover) {
                    cells.push(GridPos::new(x, y));
                }
            }
        }
        cells
    }

    /// Rows as strings, top to bottom.
    pub fn rows(&self) -> Vec<String> {
        self.cells.iter().map(|row| row.iter().collect()).collect()
    }

    /// Inverse of [`World::from_text`] (without trailing newline).
    pub fn to_text(&self) -> String {
        self.rows().join("\n")
    }
}
