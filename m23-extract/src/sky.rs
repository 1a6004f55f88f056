//! Sky-background map: partitions a combined image into disjoint tiles and
//! estimates a per-tile background level from the central band of its
//! nonzero, sorted pixel values.

use ndarray::Array2;
use std::collections::HashMap;

/// Side length, in pixels, of a sky-background tile.
pub const TILE_SIZE: usize = 64;

/// Sparse map from tile `(row, col)` index to its estimated background ADU
/// per pixel. Only full tiles are populated; any partial trailing tile is
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct SkyBackgroundMap {
    tiles: HashMap<(usize, usize), f64>,
    tile_size: usize,
}

impl SkyBackgroundMap {
    /// Looks up the background estimate for the tile containing image
    /// position `(row, col)`.
    pub fn at(&self, row: f64, col: f64) -> f64 {
        let tile = (
            (row as usize) / self.tile_size,
            (col as usize) / self.tile_size,
        );
        self.tiles.get(&tile).copied().unwrap_or(0.0)
    }
}

/// Builds the sky-background map for `image` using `tile_size`-sided
/// square tiles.
///
/// For each tile: sort pixel values, drop zeros (the alignment-fill
/// sentinel), then average the central `[45%, 55%]` band of the nonzero
/// sorted sequence.
pub fn build_sky_background_map(image: &Array2<f32>, tile_size: usize) -> SkyBackgroundMap {
    let (rows, cols) = image.dim();
    let n_tile_rows = rows / tile_size;
    let n_tile_cols = cols / tile_size;

    let mut tiles = HashMap::with_capacity(n_tile_rows * n_tile_cols);
    for tr in 0..n_tile_rows {
        for tc in 0..n_tile_cols {
            let region = image.slice(ndarray::s![
                tr * tile_size..(tr + 1) * tile_size,
                tc * tile_size..(tc + 1) * tile_size
            ]);
            let mut values: Vec<f64> = region.iter().map(|v| *v as f64).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let nonzero: Vec<f64> = values.into_iter().filter(|v| *v != 0.0).collect();
            let n = nonzero.len();
            if n == 0 {
                tiles.insert((tr, tc), 0.0);
                continue;
            }
            let lo = (0.45 * n as f64) as usize;
            let hi = ((0.55 * n as f64) as usize + 1).min(n);
            let band = &nonzero[lo..hi.max(lo + 1).min(n)];
            let mean = band.iter().sum::<f64>() / band.len() as f64;
            tiles.insert((tr, tc), mean);
        }
    }

    SkyBackgroundMap { tiles, tile_size }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_tile_background_equals_value() {
        let image = Array2::<f32>::from_elem((128, 128), 42.0);
        let map = build_sky_background_map(&image, 64);
        assert!((map.at(10.0, 10.0) - 42.0).abs() < 1e-9);
        assert!((map.at(100.0, 100.0) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn zeros_are_excluded_from_the_band() {
        let mut image = Array2::<f32>::from_elem((64, 64), 10.0);
        image[[0, 0]] = 0.0;
        image[[0, 1]] = 0.0;
        let map = build_sky_background_map(&image, 64);
        assert!((map.at(30.0, 30.0) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn partial_trailing_tile_is_dropped() {
        let image = Array2::<f32>::from_elem((100, 100), 5.0);
        let map = build_sky_background_map(&image, 64);
        // Only the single full 64x64 tile at (0,0) exists; position (90,90)
        // falls in a dropped partial tile and has no entry.
        assert_eq!(map.at(90.0, 90.0), 0.0);
        assert!((map.at(10.0, 10.0) - 5.0).abs() < 1e-9);
    }
}
