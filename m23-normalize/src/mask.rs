//! Per-star exclusion mask: a star is excluded if its
//! centroid has drifted more than 1 px from its catalog position, or if it
//! lies outside the quadrilateral formed by the four catalog stars closest
//! to each image corner, contracted 12 px inward.

use m23_catalog::ReferenceCatalog;

/// The quadrilateral used to geometrically exclude edge stars: the catalog
/// positions of the stars closest to each of the four image corners, in
/// `[top_left, top_right, bottom_right, bottom_left]` order.
#[derive(Debug, Clone, Copy)]
pub struct CornerQuadrilateral {
    pub corners: [(f64, f64); 4],
}

/// Finds, for each of the four image corners, the catalog star whose `(x,
/// y)` position is closest to it.
pub fn find_corner_quadrilateral(catalog: &ReferenceCatalog, rows: usize, cols: usize) -> Option<CornerQuadrilateral> {
    if catalog.is_empty() {
        return None;
    }
    let targets = [
        (0.0, 0.0),                           // top-left
        (cols as f64, 0.0),                   // top-right
        (cols as f64, rows as f64),            // bottom-right
        (0.0, rows as f64),                    // bottom-left
    ];

    let mut corners = [(0.0, 0.0); 4];
    for (slot, &(tx, ty)) in targets.iter().enumerate() {
        let closest = catalog
            .stars
            .iter()
            .min_by(|a, b| {
                let da = (a.x - tx).powi(2) + (a.y - ty).powi(2);
                let db = (b.x - tx).powi(2) + (b.y - ty).powi(2);
                da.partial_cmp(&db).unwrap()
            })?;
        corners[slot] = (closest.x, closest.y);
    }
    Some(CornerQuadrilateral { corners })
}

impl CornerQuadrilateral {
    /// Perpendicular signed distance from `point` to each of the four
    /// polygon edges, oriented so that positive means "toward the
    /// interior". Returns `true` when `point` is at least `margin` px inside
    /// every edge.
    pub fn contains_with_margin(&self, point: (f64, f64), margin: f64) -> bool {
        let centroid = (
            self.corners.iter().map(|c| c.0).sum::<f64>() / 4.0,
            self.corners.iter().map(|c| c.1).sum::<f64>() / 4.0,
        );

        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            let dx = b.0 - a.0;
            let dy = b.1 - a.1;
            let len = (dx * dx + dy * dy).sqrt();
            if len < 1e-9 {
                continue;
            }
            // Normal candidate (dy, -dx); flip so the centroid reads positive.
            let (nx, ny) = (dy, -dx);
            let signed = |p: (f64, f64)| ((p.0 - a.0) * nx + (p.1 - a.1) * ny) / len;
            let sign = if signed(centroid) < 0.0 { -1.0 } else { 1.0 };
            if sign * signed(point) < margin {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use m23_catalog::CatalogStar;
    use std::collections::HashMap;

    fn star(number: u32, x: f64, y: f64) -> CatalogStar {
        CatalogStar { number, x, y, ref_adu: HashMap::new(), r_i: None }
    }

    #[test]
    fn quadrilateral_crop_mask_excludes_near_top_left_edge() {
        let catalog = ReferenceCatalog {
            stars: vec![
                star(1, 10.0, 10.0),
                star(2, 10.0, 1013.0),
                star(3, 1013.0, 10.0),
                star(4, 1013.0, 1013.0),
            ],
        };
        let quad = find_corner_quadrilateral(&catalog, 1024, 1024).unwrap();
        assert!(!quad.contains_with_margin((15.0, 15.0), 12.0));
        assert!(quad.contains_with_margin((30.0, 30.0), 12.0));
    }
}
