//! Nearest-time ("as-of") joins.
//!
//! Both key sequences must be finite and strictly increasing; anything else
//! is rejected with [`FphotError::UnsortedKey`] rather than guessed at.
//! Equidistant matches resolve to the earlier right-hand key.
use crate::error::{FphotError, Result};

/// Fail unless `keys` is finite and strictly increasing.
pub fn check_strictly_increasing(keys: &[f64], table: &str, key: &'static str) -> Result<()> {
    for (i, &k) in keys.iter().enumerate() {
        let ok = k.is_finite() && (i == 0 || k > keys[i - 1]);
        if !ok {
            return Err(FphotError::UnsortedKey {
                table: table.to_string(),
                key,
                row: i,
            });
        }
    }
    Ok(())
}

/// Index of the key in sorted `right` closest to `target`.
pub fn nearest_index(right: &[f64], target: f64) -> Option<usize> {
    if right.is_empty() {
        return None;
    }
    // First index with right[i] > target.
    let fwd = right.partition_point(|&k| k <= target);
    if fwd == 0 {
        return Some(0);
    }
    let back = fwd - 1;
    if fwd == right.len() {
        return Some(back);
    }
    if target - right[back] <= right[fwd] - target {
        Some(back)
    } else {
        Some(fwd)
    }
}

/// For every left key, the index of the nearest right key.
///
/// `None` entries only when `right` is empty.
pub fn merge_nearest(
    left: &[f64],
    left_name: &str,
    right: &[f64],
    right_name: &str,
    key: &'static str,
) -> Result<Vec<Option<usize>>> {
    check_strictly_increasing(left, left_name, key)?;
    check_strictly_increasing(right, right_name, key)?;
    Ok(left.iter().map(|&t| nearest_index(right, t)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_picks_closest() {
        let r = [0.0, 1.0, 2.0];
        assert_eq!(nearest_index(&r, 0.9), Some(1));
        assert_eq!(nearest_index(&r, -5.0), Some(0));
        assert_eq!(nearest_index(&r, 7.0), Some(2));
        assert_eq!(nearest_index(&r, 1.0), Some(1));
        assert_eq!(nearest_index(&[], 1.0), None);
    }

    #[test]
    fn ties_go_backward() {
        assert_eq!(nearest_index(&[0.0, 1.0], 0.5), Some(0));
    }

    #[test]
    fn unsorted_rejected() {
        let e = merge_nearest(&[1.0, 0.5], "src", &[0.0, 1.0], "master", "ts").unwrap_err();
        assert!(matches!(e, FphotError::UnsortedKey { row: 1, .. }));
        assert!(merge_nearest(&[1.0], "src", &[0.0, 0.0], "master", "ts").is_err());
        assert!(merge_nearest(&[f64::NAN], "src", &[0.0], "master", "ts").is_err());
    }
}
