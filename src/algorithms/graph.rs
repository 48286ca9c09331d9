use crate::error::{RecError, RecResult};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Sparse propagation graph over the combined user+item index space,
/// stored in compressed sparse row form. Square by construction:
/// `size == num_users + num_items` for the model that owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseGraph {
    pub size: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub values: Vec<f32>,
}

impl SparseGraph {
    pub fn from_csr(
        size: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        values: Vec<f32>,
    ) -> RecResult<Self> {
        let graph = Self {
            size,
            indptr,
            indices,
            values,
        };
        graph.validate()?;
        Ok(graph)
    }

    pub fn from_triplets(size: usize, triplets: &[(usize, usize, f32)]) -> RecResult<Self> {
        let mut sorted = triplets.to_vec();
        sorted.sort_by_key(|&(row, col, _)| (row, col));

        let mut indptr = vec![0usize; size + 1];
        let mut indices = Vec::with_capacity(sorted.len());
        let mut values = Vec::with_capacity(sorted.len());

        for &(row, col, value) in &sorted {
            if row >= size || col >= size {
                return Err(RecError::shape_mismatch(
                    "graph triplet",
                    format!("row/col < {}", size),
                    format!("({}, {})", row, col),
                ));
            }
            indptr[row + 1] += 1;
            indices.push(col);
            values.push(value);
        }
        for row in 0..size {
            indptr[row + 1] += indptr[row];
        }

        Self::from_csr(size, indptr, indices, values)
    }

    fn validate(&self) -> RecResult<()> {
        if self.indptr.len() != self.size + 1 {
            return Err(RecError::shape_mismatch(
                "graph indptr",
                self.size + 1,
                self.indptr.len(),
            ));
        }
        if self.indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(RecError::shape_mismatch(
                "graph indptr",
                "monotonically non-decreasing offsets",
                "decreasing offset",
            ));
        }
        let nnz = *self.indptr.last().unwrap_or(&0);
        if self.indices.len() != nnz || self.values.len() != nnz {
            return Err(RecError::shape_mismatch(
                "graph nnz",
                nnz,
                format!("{} indices / {} values", self.indices.len(), self.values.len()),
            ));
        }
        if let Some(&bad) = self.indices.iter().find(|&&col| col >= self.size) {
            return Err(RecError::shape_mismatch(
                "graph column index",
                format!("< {}", self.size),
                bad,
            ));
        }
        if self.values.iter().any(|v| !v.is_finite()) {
            return Err(RecError::shape_mismatch(
                "graph values",
                "finite floats",
                "NaN or infinity",
            ));
        }
        Ok(())
    }

    pub fn nnz(&self) -> usize {
        *self.indptr.last().unwrap_or(&0)
    }

    /// One propagation hop: sparse-dense multiply against a `(size, d)`
    /// embedding table, producing the next layer's table.
    pub fn multiply(&self, dense: &Array2<f32>) -> Array2<f32> {
        debug_assert_eq!(dense.nrows(), self.size);
        let dim = dense.ncols();

        let rows: Vec<Vec<f32>> = (0..self.size)
            .into_par_iter()
            .map(|row| {
                let mut acc = vec![0.0f32; dim];
                for k in self.indptr[row]..self.indptr[row + 1] {
                    let col = self.indices[k];
                    let weight = self.values[k];
                    let src = dense.row(col);
                    for (a, &x) in acc.iter_mut().zip(src.iter()) {
                        *a += weight * x;
                    }
                }
                acc
            })
            .collect();

        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((self.size, dim), flat)
            .expect("row-major spmm output matches declared shape")
    }
}
