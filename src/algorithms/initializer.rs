use ndarray::Array2;
use rand::Rng;

pub fn xavier_uniform(size: usize) -> Vec<f32> {
    let limit = (6.0 / size as f32).sqrt();
    let mut rng = rand::thread_rng();
    (0..size)
        .map(|_| rng.gen_range(-limit..limit))
        .collect()
}

/// Fresh embedding table for `count` entities of dimension `dim`,
/// xavier-initialized row by row.
pub fn embedding_table(count: usize, dim: usize) -> Array2<f32> {
    let mut flat = Vec::with_capacity(count * dim);
    for _ in 0..count {
        flat.extend(xavier_uniform(dim));
    }
    Array2::from_shape_vec((count, dim), flat)
        .expect("generated rows match declared table shape")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xavier_uniform_bounds() {
        let weights = xavier_uniform(100);
        assert_eq!(weights.len(), 100);
        let limit = (6.0 / 100.0_f32).sqrt();
        for &w in &weights {
            assert!(w >= -limit && w <= limit);
        }
    }

    #[test]
    fn test_embedding_table_shape() {
        let table = embedding_table(5, 8);
        assert_eq!(table.shape(), &[5, 8]);
    }
}
