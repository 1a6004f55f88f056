//! Memoized integer circle masks keyed by radius. A process-wide table
//! computes each radius's mask once; subsequent lookups are read-only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// The offsets `(dr, dc)` of pixels inside the disk of radius `r`: a cell is
/// included iff `ceil(sqrt(dr^2 + dc^2)) <= r`.
pub type CircleMask = Arc<Vec<(i32, i32)>>;

fn cache() -> &'static Mutex<HashMap<u32, CircleMask>> {
    static CACHE: OnceLock<Mutex<HashMap<u32, CircleMask>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn compute_circle_mask(radius: u32) -> Vec<(i32, i32)> {
    let r = radius as i32;
    let mut offsets = Vec::new();
    for dr in -r..=r {
        for dc in -r..=r {
            let dist = ((dr * dr + dc * dc) as f64).sqrt();
            if dist.ceil() as i32 <= r {
                offsets.push((dr, dc));
            }
        }
    }
    offsets
}

/// Returns the (cached) circle mask for `radius`.
pub fn circle_mask(radius: u32) -> CircleMask {
    let mut cache = cache().lock().unwrap();
    cache
        .entry(radius)
        .or_insert_with(|| Arc::new(compute_circle_mask(radius)))
        .clone()
}

/// Number of pixels in the disk of radius `r`: `|{(i,j) : ceil(sqrt(i^2+j^2)) <= r}|`.
/// Independent of star or image position.
pub fn disk_pixel_count(radius: u32) -> usize {
    circle_mask(radius).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_one_disk_is_a_plus_shape() {
        let count = disk_pixel_count(1);
        assert_eq!(count, 5);
    }

    #[test]
    fn mask_is_cached_across_calls() {
        let a = circle_mask(5);
        let b = circle_mask(5);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn disk_pixel_count_independent_of_caller() {
        assert_eq!(disk_pixel_count(3), disk_pixel_count(3));
    }
}
