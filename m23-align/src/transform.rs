//! Similarity transform (rotation + uniform scale + translation) estimated
//! from matched point pairs by linear least squares.

/// A similarity transform stored as a scaled-rotation matrix `[[a, -b], [b,
/// a]]` plus a translation, rather than decomposed (scale, angle) — this is
/// the natural output of the least-squares fit below and avoids needless
/// trig round-trips when applying the transform to every pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    a: f64,
    b: f64,
    tx: f64,
    ty: f64,
}

impl SimilarityTransform {
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, tx: 0.0, ty: 0.0 }
    }

    pub fn scale(&self) -> f64 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    pub fn rotation_radians(&self) -> f64 {
        self.b.atan2(self.a)
    }

    /// Maps a `(row, col)` point through the transform.
    pub fn apply(&self, row: f64, col: f64) -> (f64, f64) {
        let out_row = self.b * col + self.a * row + self.ty;
        let out_col = self.a * col - self.b * row + self.tx;
        (out_row, out_col)
    }

    /// Returns the inverse transform (a scaled rotation is always
    /// invertible unless degenerate, i.e. `a == b == 0`).
    pub fn invert(&self) -> Option<Self> {
        let denom = self.a * self.a + self.b * self.b;
        if denom <= 0.0 {
            return None;
        }
        let inv_a = self.a / denom;
        let inv_b = -self.b / denom;
        // Solve for the inverse translation by applying the inverse linear
        // part to -translation.
        let inv_tx = -(inv_a * self.tx - inv_b * self.ty);
        let inv_ty = -(inv_b * self.tx + inv_a * self.ty);
        Some(Self { a: inv_a, b: inv_b, tx: inv_tx, ty: inv_ty })
    }

    /// Fits a similarity transform mapping `source` points onto `target`
    /// points by least squares (closed-form, via centered sums; this is the
    /// standard two-unknown linear solution for a scaled rotation, not a
    /// general Procrustes SVD since we only need 2-D uniform scale).
    ///
    /// Returns `None` if fewer than 2 pairs are given or the source points
    /// are degenerate (all coincident).
    pub fn fit(pairs: &[((f64, f64), (f64, f64))]) -> Option<Self> {
        if pairs.len() < 2 {
            return None;
        }
        let n = pairs.len() as f64;
        let (mut mean_sr, mut mean_sc, mut mean_tr, mut mean_tc) = (0.0, 0.0, 0.0, 0.0);
        for &((sr, sc), (tr, tc)) in pairs {
            mean_sr += sr;
            mean_sc += sc;
            mean_tr += tr;
            mean_tc += tc;
        }
        mean_sr /= n;
        mean_sc /= n;
        mean_tr /= n;
        mean_tc /= n;

        let mut numerator_a = 0.0;
        let mut numerator_b = 0.0;
        let mut denom = 0.0;
        for &((sr, sc), (tr, tc)) in pairs {
            let (sr, sc) = (sr - mean_sr, sc - mean_sc);
            let (tr, tc) = (tr - mean_tr, tc - mean_tc);
            numerator_a += sc * tc + sr * tr;
            numerator_b += sr * tc - sc * tr;
            denom += sr * sr + sc * sc;
        }
        if denom <= 1e-9 {
            return None;
        }
        let a = numerator_a / denom;
        let b = numerator_b / denom;
        let tx = mean_tc - (a * mean_sc - b * mean_sr);
        let ty = mean_tr - (b * mean_sc + a * mean_sr);
        Some(Self { a, b, tx, ty })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips() {
        let t = SimilarityTransform::identity();
        assert_eq!(t.apply(3.0, 4.0), (3.0, 4.0));
    }

    #[test]
    fn fits_pure_translation() {
        let pairs = vec![
            ((0.0, 0.0), (1.0, 2.0)),
            ((1.0, 0.0), (2.0, 2.0)),
            ((0.0, 1.0), (1.0, 3.0)),
        ];
        let t = SimilarityTransform::fit(&pairs).unwrap();
        let (r, c) = t.apply(5.0, 5.0);
        assert!((r - 6.0).abs() < 1e-6);
        assert!((c - 7.0).abs() < 1e-6);
    }

    #[test]
    fn fit_then_invert_round_trips() {
        let pairs = vec![
            ((0.0, 0.0), (10.0, 5.0)),
            ((10.0, 0.0), (10.0, 15.0)),
            ((0.0, 10.0), (0.0, 5.0)),
        ];
        let t = SimilarityTransform::fit(&pairs).unwrap();
        let inv = t.invert().unwrap();
        let (r, c) = t.apply(3.0, 7.0);
        let (r2, c2) = inv.apply(r, c);
        assert!((r2 - 3.0).abs() < 1e-6);
        assert!((c2 - 7.0).abs() < 1e-6);
    }

    #[test]
    fn too_few_pairs_returns_none() {
        assert!(SimilarityTransform::fit(&[((0.0, 0.0), (1.0, 1.0))]).is_none());
    }
}
