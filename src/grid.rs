use std::{error::Error, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridError {
    /// A direct access used a coordinate outside `[0, width) x [0, height)`.
    OutOfRange {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::OutOfRange {
                x,
                y,
                width,
                height,
            } => write!(f, "cell ({x}, {y}) is outside the {width}x{height} grid"),
        }
    }
}

impl Error for GridError {}

/// One generation of cells, stored row-major.
///
/// The dimensions are fixed at construction. Direct access through
/// [`Grid::get`] and [`Grid::set`] is bounds checked; neighbour counting goes
/// through [`Grid::alive`], which wraps toroidally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Grid {
    /// Creates an all-dead grid. Both dimensions must be positive.
    pub fn new(width: usize, height: usize) -> Grid {
        assert!(width > 0 && height > 0, "grid dimensions must be positive");
        Grid {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    fn index(&self, x: usize, y: usize) -> Result<usize, GridError> {
        if !self.contains(x, y) {
            return Err(GridError::OutOfRange {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y * self.width + x)
    }

    pub fn get(&self, x: usize, y: usize) -> Result<bool, GridError> {
        self.index(x, y).map(|i| self.cells[i])
    }

    pub fn set(&mut self, x: usize, y: usize, alive: bool) -> Result<(), GridError> {
        let i = self.index(x, y)?;
        self.cells[i] = alive;
        Ok(())
    }

    /// Reads a cell with toroidal wrapping: any integer coordinate is folded
    /// back onto the grid, so `alive(-1, 0) == alive(width - 1, 0)`.
    pub fn alive(&self, x: isize, y: isize) -> bool {
        let x = x.rem_euclid(self.width as isize) as usize;
        let y = y.rem_euclid(self.height as isize) as usize;
        self.cells[y * self.width + x]
    }

    /// Number of live cells among the 8 toroidal neighbours of `(x, y)`.
    pub fn live_neighbors(&self, x: isize, y: isize) -> u8 {
        const N: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];

        N.iter()
            .filter(|(dx, dy)| self.alive(x + dx, y + dy))
            .count() as u8
    }

    /// B3/S23: born with exactly 3 neighbours, survives with 2 or 3.
    pub fn next_state(&self, x: isize, y: isize) -> bool {
        match self.live_neighbors(x, y) {
            3 => true,
            2 => self.alive(x, y),
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(false);
    }

    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Iterates `(x, y, alive)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, bool)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, &alive)| (i % self.width, i / self.width, alive))
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [bool] {
        &mut self.cells
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.width) {
            for &alive in row {
                f.write_str(if alive { "*" } else { "." })?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}
