// Tile-map loading and wall extraction.
//
// Maps are CSV text on a 32-px tile grid. Only collision matters to the sim,
// so the loader reduces the grid to a list of axis-aligned wall rectangles,
// merging runs of wall tiles into single rects:
//
// - `0` starts a horizontal run, `1` continues it, `2` ends it.
// - `3` starts a vertical run in its column, `4` continues it, `5` ends it.
// - `6` is a standalone one-tile block.
// - `-1` is empty; any other token is non-colliding floor decor.
//
// The session handshake carries a map *identifier*, not map data — every
// participant resolves the identifier against the same built-in set, and a
// client treats an unknown identifier as a session-setup error.

use crate::geom::Rect;

/// Side length of one tile in world pixels.
pub const TILE: f32 = 32.0;

/// The built-in arena: a walled 32×18 field with a central barrier, two
/// vertical baffles, and four corner pillars.
const ARENA_CSV: &str = "\
0,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,2
3,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,3
4,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,-1,-1,6,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,6,-1,-1,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,3,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,4,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,4,-1,-1,-1,-1,-1,0,1,1,1,1,1,1,2,-1,-1,-1,-1,-1,3,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,5,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,4,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,4,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,5,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,-1,-1,6,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,6,-1,-1,-1,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,4
4,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,4
5,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,-1,5
0,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,1,2";

/// A loaded map: its identifier, tile dimensions, and merged wall rects.
#[derive(Clone, Debug)]
pub struct MapGrid {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub walls: Vec<Rect>,
}

impl MapGrid {
    /// Resolve a map identifier from the built-in set.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "arena" => Some(Self::from_csv("arena", ARENA_CSV)),
            _ => None,
        }
    }

    /// Parse CSV tile text into a wall list. Unrecognized tokens are
    /// non-colliding decor; malformed runs (a continuation with no start)
    /// are ignored.
    pub fn from_csv(name: &str, csv: &str) -> Self {
        let grid: Vec<Vec<&str>> = csv
            .lines()
            .map(|line| line.split(',').map(str::trim).collect())
            .collect();
        let height = grid.len() as u32;
        let width = grid.first().map_or(0, |row| row.len()) as u32;

        let mut walls = Vec::new();
        // Open vertical runs, keyed by column: (column, start row).
        let mut v_runs: Vec<(usize, usize)> = Vec::new();

        for (row, line) in grid.iter().enumerate() {
            // Start column of the horizontal run currently being collected.
            let mut h_start: Option<usize> = None;
            for (col, token) in line.iter().enumerate() {
                match *token {
                    "0" => h_start = Some(col),
                    "2" => {
                        if let Some(start) = h_start.take() {
                            walls.push(tile_rect(start, row, col - start + 1, 1));
                        }
                    }
                    "3" => v_runs.push((col, row)),
                    "5" => {
                        if let Some(pos) = v_runs.iter().position(|&(c, _)| c == col) {
                            let (_, start) = v_runs.remove(pos);
                            walls.push(tile_rect(col, start, 1, row - start + 1));
                        }
                    }
                    "6" => walls.push(tile_rect(col, row, 1, 1)),
                    _ => {}
                }
            }
        }

        Self {
            name: name.to_owned(),
            width,
            height,
            walls,
        }
    }

    /// World-pixel bounds of the whole map.
    pub fn pixel_size(&self) -> (f32, f32) {
        (self.width as f32 * TILE, self.height as f32 * TILE)
    }
}

fn tile_rect(col: usize, row: usize, w_tiles: usize, h_tiles: usize) -> Rect {
    Rect::new(
        col as f32 * TILE,
        row as f32 * TILE,
        w_tiles as f32 * TILE,
        h_tiles as f32 * TILE,
    )
}
