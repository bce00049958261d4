// Minimal triplet-to-CSC assembly for handing matrices to OSQP.

use std::borrow::Cow;

use prelude::float;

pub struct TripletMat {
    nrows: usize,
    ncols: usize,
    entries: Vec<(usize, usize, float)>,
}

impl TripletMat {
    pub fn new(nrows: usize, ncols: usize) -> TripletMat {
        TripletMat {
            nrows,
            ncols,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, row: usize, col: usize, value: float) {
        debug_assert!(row < self.nrows && col < self.ncols);
        if value != 0.0 {
            self.entries.push((row, col, value));
        }
    }

    /// Column-compressed form. Duplicate entries are summed.
    pub fn build_csc(mut self) -> osqp::CscMatrix<'static> {
        self.entries
            .sort_unstable_by_key(|&(row, col, _)| (col, row));

        let mut indptr = Vec::with_capacity(self.ncols + 1);
        let mut indices = Vec::with_capacity(self.entries.len());
        let mut data: Vec<float> = Vec::with_capacity(self.entries.len());

        indptr.push(0);
        let mut col = 0;
        let mut col_start = 0;
        for &(r, c, v) in &self.entries {
            while col < c {
                indptr.push(indices.len());
                col_start = indices.len();
                col += 1;
            }
            if indices.len() > col_start && *indices.last().unwrap() == r {
                *data.last_mut().unwrap() += v;
            } else {
                indices.push(r);
                data.push(v);
            }
        }
        while col < self.ncols {
            indptr.push(indices.len());
            col += 1;
        }

        osqp::CscMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr: Cow::Owned(indptr),
            indices: Cow::Owned(indices),
            data: Cow::Owned(data),
        }
    }
}
