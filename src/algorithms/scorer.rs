use ndarray::{ArrayView1, ArrayView2};

/// Affinity of one user against every item row, as inner products.
pub fn score_items(user: ArrayView1<f32>, items: ArrayView2<f32>) -> Vec<f32> {
    items.rows().into_iter().map(|row| row.dot(&user)).collect()
}

/// Top-k item indices by descending score. `k` is clamped to the number of
/// items; equal scores break ties by ascending index so results are
/// reproducible across runs. NaN scores rank below everything.
pub fn top_k_ranked(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let k = k.min(scores.len());
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();

    // One total order: finite before NaN, then descending score, then
    // ascending index.
    ranked.sort_by(|a, b| {
        a.1.is_nan()
            .cmp(&b.1.is_nan())
            .then_with(|| b.1.total_cmp(&a.1))
            .then_with(|| a.0.cmp(&b.0))
    });

    ranked.truncate(k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_score_items_inner_product() {
        let user = arr1(&[1.0, 0.0, 0.0, 0.0]);
        let items = arr2(&[[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]]);
        let scores = score_items(user.view(), items.view());
        assert_eq!(scores, vec![1.0, 0.0]);
    }

    #[test]
    fn test_top_k_orders_descending() {
        let ranked = top_k_ranked(&[0.1, 0.5, 0.3, 0.9, 0.2], 3);
        assert_eq!(
            ranked.iter().map(|&(i, _)| i).collect::<Vec<_>>(),
            vec![3, 1, 2]
        );
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_top_k_clamps_to_len() {
        let ranked = top_k_ranked(&[0.4, 0.2], 10);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_ties_break_by_ascending_index() {
        let ranked = top_k_ranked(&[0.5, 0.7, 0.5, 0.7], 4);
        assert_eq!(
            ranked.iter().map(|&(i, _)| i).collect::<Vec<_>>(),
            vec![1, 3, 0, 2]
        );
    }

    #[test]
    fn test_nan_ranks_last() {
        let ranked = top_k_ranked(&[f32::NAN, 0.2, 0.8], 3);
        assert_eq!(ranked[0].0, 2);
        assert_eq!(ranked[1].0, 1);
        assert_eq!(ranked[2].0, 0);
    }

    #[test]
    fn test_empty_scores() {
        assert!(top_k_ranked(&[], 5).is_empty());
    }

    #[test]
    fn test_many_mixed_nan_and_finite_scores() {
        let scores: Vec<f32> = (0..2000)
            .map(|i| {
                if i % 3 == 0 {
                    f32::NAN
                } else {
                    ((i * 31) % 997) as f32 / 997.0
                }
            })
            .collect();

        let ranked = top_k_ranked(&scores, scores.len());
        assert_eq!(ranked.len(), scores.len());

        // Finite scores come first in descending order, all NaNs after.
        let first_nan = ranked
            .iter()
            .position(|&(_, s)| s.is_nan())
            .expect("input contains NaN scores");
        assert!(ranked[..first_nan]
            .windows(2)
            .all(|w| w[0].1 >= w[1].1));
        assert!(ranked[first_nan..].iter().all(|&(_, s)| s.is_nan()));
    }
}
