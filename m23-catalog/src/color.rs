//! R-I color table: star number -> measured R-I color, loaded from
//! `reference.color` and consulted by the Inter-Night Normalizer's color
//! segmentation.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ColorTable {
    values: HashMap<u32, f64>,
}

impl ColorTable {
    pub fn get(&self, star_number: u32) -> Option<f64> {
        self.values.get(&star_number).copied()
    }

    pub fn insert(&mut self, star_number: u32, r_i: f64) {
        self.values.insert(star_number, r_i);
    }

    /// Loads a whitespace-separated `<star_number> <r_i>` text file, one
    /// entry per line. Lines that fail to parse are skipped rather than
    /// failing the whole load, since the original color files are
    /// hand-curated and occasionally carry a header or blank line.
    pub fn load(path: &Path) -> Result<ColorTable> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("loading color table from {}", path.display()))?;
        let mut values = HashMap::new();
        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 {
                continue;
            }
            if let (Ok(number), Ok(r_i)) = (fields[0].parse::<u32>(), fields[1].parse::<f64>()) {
                values.insert(number, r_i);
            }
        }
        Ok(ColorTable { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_none_for_missing_star() {
        let table = ColorTable::default();
        assert_eq!(table.get(814), None);
    }

    #[test]
    fn insert_and_get_round_trip() {
        let mut table = ColorTable::default();
        table.insert(814, 2.6137);
        assert_eq!(table.get(814), Some(2.6137));
    }
}
