//! Reference catalog: the fixed, ordered list of stars the Extractor and the
//! two normalizers key all per-star work off of.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// One cataloged star: its reference position, its expected ADU per radius
/// (from the reference logfile), and its known R-I color, if any.
#[derive(Debug, Clone)]
pub struct CatalogStar {
    pub number: u32,
    pub x: f64,
    pub y: f64,
    pub ref_adu: HashMap<u32, f64>,
    pub r_i: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    pub stars: Vec<CatalogStar>,
}

impl ReferenceCatalog {
    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn get(&self, number: u32) -> Option<&CatalogStar> {
        self.stars.iter().find(|s| s.number == number)
    }

    /// Loads the catalog from the reference logfile (same fixed-width shape
    /// as a LogFileCombined, per `reference.logfile`) and radii list, then
    /// attaches colors from an already-loaded [`super::color::ColorTable`].
    pub fn load(
        logfile: &Path,
        radii: &[u32],
        colors: &super::color::ColorTable,
    ) -> Result<ReferenceCatalog> {
        let (_header, rows) = m23_io::textfmt::read_log_file_combined(logfile)
            .with_context(|| format!("loading reference catalog from {}", logfile.display()))?;

        let mut stars = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let number = (i + 1) as u32;
            let mut ref_adu = HashMap::new();
            for (radius, adu) in radii.iter().zip(row.star_adu.iter()) {
                ref_adu.insert(*radius, *adu);
            }
            stars.push(CatalogStar {
                number,
                x: row.x,
                y: row.y,
                ref_adu,
                r_i: colors.get(number),
            });
        }
        Ok(ReferenceCatalog { stars })
    }
}
