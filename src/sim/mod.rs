use std::time::Duration;

use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::ParallelSliceMut;

use crate::grid::{Grid, GridError};

/// A settled generation, as handed to readers outside the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationFrame {
    /// Number of steps taken since the simulation was created
    pub generation: u64,
    /// Bumped by every step, toggle or clear
    pub revision: u64,
    pub grid: Grid,
}

impl SimulationFrame {
    pub fn new(width: usize, height: usize) -> SimulationFrame {
        SimulationFrame {
            generation: 0,
            revision: 0,
            grid: Grid::new(width, height),
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Default, Clone)]
pub struct SimulationStatistics {
    pub generations: u64,
    pub toggles: u64,
    pub clears: u64,
    pub input_batches: u64,
    pub average_step_exec_time: Duration,
}

/// Double-buffered Game of Life state.
///
/// `current` is the only grid mutations and readers touch. [`Simulation::step`]
/// fills `staging` from `current` and then swaps the two, so a partially
/// computed generation is never reachable through `&self`.
pub struct Simulation {
    current: Grid,
    staging: Grid,
    generation: u64,
    revision: u64,
}

impl Simulation {
    pub fn new(width: usize, height: usize) -> Simulation {
        Simulation {
            current: Grid::new(width, height),
            staging: Grid::new(width, height),
            generation: 0,
            revision: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.current.width()
    }

    pub fn height(&self) -> usize {
        self.current.height()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn grid(&self) -> &Grid {
        &self.current
    }

    pub fn alive(&self, x: isize, y: isize) -> bool {
        self.current.alive(x, y)
    }

    pub fn random_init(&mut self) {
        self.random_init_with(&mut fastrand::Rng::new());
    }

    /// Sets `width * height / 4` uniformly chosen cells alive. Picks may
    /// repeat, so the live count is at most a quarter of the grid.
    pub fn random_init_with(&mut self, rng: &mut fastrand::Rng) {
        let (w, h) = (self.width(), self.height());
        for _ in 0..(w * h / 4) {
            let (x, y) = (rng.usize(..w), rng.usize(..h));
            // Always in range.
            let _ = self.current.set(x, y, true);
        }
        self.revision += 1;
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.revision += 1;
    }

    pub fn toggle(&mut self, x: usize, y: usize) -> Result<(), GridError> {
        let alive = self.current.get(x, y)?;
        self.current.set(x, y, !alive)?;
        self.revision += 1;
        Ok(())
    }

    pub fn set(&mut self, x: usize, y: usize, alive: bool) -> Result<(), GridError> {
        self.current.set(x, y, alive)?;
        self.revision += 1;
        Ok(())
    }

    pub fn step(&mut self) {
        let width = self.width();
        let current = &self.current;
        self.staging
            .cells_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    *cell = current.next_state(x as isize, y as isize);
                }
            });
        std::mem::swap(&mut self.current, &mut self.staging);
        self.generation += 1;
        self.revision += 1;
    }

    /// Human readable dump of the current generation, one row per line.
    pub fn render(&self) -> String {
        self.current.to_string()
    }

    pub fn snapshot(&self) -> SimulationFrame {
        SimulationFrame {
            generation: self.generation,
            revision: self.revision,
            grid: self.current.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim_with(width: usize, height: usize, cells: &[(usize, usize)]) -> Simulation {
        let mut sim = Simulation::new(width, height);
        for &(x, y) in cells {
            sim.set(x, y, true).unwrap();
        }
        sim
    }

    fn live_cells(sim: &Simulation) -> Vec<(usize, usize)> {
        sim.grid()
            .cells()
            .filter(|&(_, _, alive)| alive)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn isolated_cell_dies() {
        let mut sim = sim_with(6, 6, &[(3, 3)]);
        sim.step();
        assert!(live_cells(&sim).is_empty());
        assert_eq!(sim.generation(), 1);
    }

    #[test]
    fn block_is_still_life() {
        let block = [(1, 1), (2, 1), (1, 2), (2, 2)];
        let mut sim = sim_with(6, 6, &block);
        let before = sim.grid().clone();
        sim.step();
        assert_eq!(sim.grid(), &before);
    }

    #[test]
    fn blinker_has_period_two() {
        let mut sim = sim_with(5, 5, &[(1, 0), (1, 1), (1, 2)]);
        sim.step();
        assert_eq!(live_cells(&sim), vec![(0, 1), (1, 1), (2, 1)]);
        sim.step();
        assert_eq!(live_cells(&sim), vec![(1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn blinker_wraps_on_small_torus() {
        // On a 3x3 torus every cell neighbours every other cell.
        let mut sim = sim_with(3, 3, &[(1, 0), (1, 1), (1, 2)]);
        sim.step();
        assert_eq!(sim.grid().live_count(), 9);
        sim.step();
        assert_eq!(sim.grid().live_count(), 0);
    }

    #[test]
    fn blinker_straddling_the_edge_wraps() {
        let mut sim = sim_with(6, 6, &[(0, 5), (0, 0), (0, 1)]);
        sim.step();
        assert!(sim.alive(-1, 0));
        assert!(sim.alive(0, 0));
        assert!(sim.alive(1, 6));
        assert_eq!(sim.grid().live_count(), 3);
        sim.step();
        assert!(sim.alive(0, -1));
        assert!(!sim.alive(-1, 0));
    }

    #[test]
    fn glider_returns_after_four_generations_shifted() {
        let glider = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];
        let mut sim = sim_with(8, 8, &glider);
        for _ in 0..4 {
            sim.step();
        }
        let mut expected: Vec<_> = glider.iter().map(|&(x, y)| (x + 1, y + 1)).collect();
        expected.sort_by_key(|&(x, y)| (y, x));
        assert_eq!(live_cells(&sim), expected);
    }

    #[test]
    fn toggle_changes_exactly_one_cell() {
        let mut sim = sim_with(5, 4, &[(0, 0), (4, 3)]);
        for x in 0..5 {
            for y in 0..4 {
                let before = sim.grid().clone();
                sim.toggle(x, y).unwrap();
                let after = sim.grid();
                for (cx, cy, alive) in after.cells() {
                    let was = before.get(cx, cy).unwrap();
                    assert_eq!(alive != was, (cx, cy) == (x, y));
                }
            }
        }
        assert!(sim.toggle(5, 0).is_err());
    }

    #[test]
    fn clear_is_idempotent() {
        let mut sim = Simulation::new(8, 8);
        sim.random_init_with(&mut fastrand::Rng::with_seed(7));
        sim.clear();
        let once = sim.grid().clone();
        sim.clear();
        assert_eq!(sim.grid(), &once);
        assert_eq!(once.live_count(), 0);
        assert!(!sim.render().contains('*'));
    }

    #[test]
    fn random_init_density_is_approximate() {
        let mut sim = Simulation::new(16, 16);
        sim.random_init_with(&mut fastrand::Rng::with_seed(42));
        let live = sim.grid().live_count();
        assert!(live > 0);
        assert!(live <= 16 * 16 / 4);
    }

    #[test]
    fn snapshot_tracks_revisions() {
        let mut sim = Simulation::new(4, 4);
        sim.toggle(1, 1).unwrap();
        sim.step();
        let frame = sim.snapshot();
        assert_eq!(frame.generation, 1);
        assert_eq!(frame.revision, 2);
        assert_eq!(frame.grid, *sim.grid());
    }

    #[test]
    fn render_has_one_line_per_row() {
        let sim = sim_with(3, 2, &[(1, 1)]);
        assert_eq!(sim.render(), "...\n.*.\n");
    }
}
