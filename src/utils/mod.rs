pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max_score = scores.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_scores: Vec<f32> = scores.iter().map(|&x| (x - max_score).exp()).collect();
    let sum_exp: f32 = exp_scores.iter().sum();

    if sum_exp > 0.0 {
        exp_scores.iter().map(|&x| x / sum_exp).collect()
    } else {
        vec![1.0 / scores.len() as f32; scores.len()]
    }
}

/// Identifiers issued by the external system of record are 24 hex
/// characters; anything else is a placeholder or test identifier.
pub fn is_external_id(id: &str) -> bool {
    id.len() == 24 && id.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        for scores in [
            vec![0.1, 0.5, 0.3],
            vec![100.0, -100.0, 0.0],
            vec![1.0, 1.0, 1.0, 1.0],
        ] {
            let weights = softmax(&scores);
            let total: f32 = weights.iter().sum();
            assert!((total - 1.0).abs() < 1e-6);
            assert!(weights.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn test_softmax_ordering() {
        let weights = softmax(&[0.0, 2.0, 1.0]);
        assert!(weights[1] > weights[2]);
        assert!(weights[2] > weights[0]);
    }

    #[test]
    fn test_is_external_id() {
        assert!(is_external_id("696c03da336a401d3822467d"));
        assert!(!is_external_id("user_42"));
        assert!(!is_external_id("696c03da336a401d3822467dff"));
        assert!(!is_external_id("zzzc03da336a401d3822467d"));
    }
}
