use crate::device::{DeviceError, KeyLayout, PadOutput};
use crate::grid::Grid;
use crate::sim::SimulationFrame;
use crate::util::LedColor;

const SEPARATOR: &str = "****************************************";

/// Maps grid frames onto pad lights.
#[derive(Clone, Copy, Debug)]
pub struct FramePainter {
    pub layout: KeyLayout,
    pub alive_color: LedColor,
    pub dead_color: LedColor,
    /// One `write_frame` per publish instead of one write per cell
    pub batched: bool,
}

impl FramePainter {
    fn color(&self, alive: bool) -> LedColor {
        if alive {
            self.alive_color
        } else {
            self.dead_color
        }
    }

    /// Lights one cell. Cells the layout cannot show are skipped.
    pub fn set_cell(
        &self,
        out: &mut dyn PadOutput,
        x: usize,
        y: usize,
        alive: bool,
    ) -> Result<(), DeviceError> {
        match self.layout.key_for_coord(x, y) {
            Some(key) => out.set_key(key, self.color(alive)),
            None => Ok(()),
        }
    }

    pub fn frame_keys(&self, grid: &Grid) -> Vec<(u8, LedColor)> {
        grid.cells()
            .filter_map(|(x, y, alive)| {
                self.layout
                    .key_for_coord(x, y)
                    .map(|key| (key, self.color(alive)))
            })
            .collect()
    }

    /// Writes a whole frame, then flushes the pad.
    pub fn publish(&self, frame: &SimulationFrame, out: &mut dyn PadOutput) -> Result<(), DeviceError> {
        if self.batched {
            out.write_frame(&self.frame_keys(&frame.grid))?;
        } else {
            for (x, y, alive) in frame.grid.cells() {
                self.set_cell(out, x, y, alive)?;
            }
        }
        out.flush()
    }
}

/// The diagnostic dump logged once per tick.
pub fn text_dump(frame: &SimulationFrame) -> String {
    format!("{SEPARATOR} generation {}\n{}", frame.generation, frame.grid)
}
