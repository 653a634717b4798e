// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Golden model of the correlation offload.
//!
//! The request payload is the kernel followed by every kernel-sized window of
//! the matrix, scanned row-major with a step of one. The expected reply is
//! the valid-mode 2D cross-correlation of the matrix with the kernel, each
//! cell truncated to 8 bits.

use std::fmt;
use std::ops::RangeInclusive;

use itertools::iproduct;
use rand::Rng;
use rgtb_engine::types::SimError;

pub const KERNEL_DIM: usize = 3;
pub const MATRIX_DIM: usize = 12;

/// Kernel cells are drawn from `0..KERNEL_LIMIT`.
pub const KERNEL_LIMIT: u8 = 6;

/// Default range of matrix cells. A single value gives a constant matrix.
pub const DEFAULT_MATRIX_RANGE: RangeInclusive<u8> = 230..=230;

/// A row-major matrix of bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteMatrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl ByteMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<u8>) -> Result<Self, SimError> {
        if data.len() != rows * cols {
            return Err(SimError(format!(
                "{rows}x{cols} matrix needs {} bytes, got {}",
                rows * cols,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let data = iproduct!(0..rows, 0..cols).map(|(r, c)| f(r, c)).collect();
        Self { rows, cols, data }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.cols + col]
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The `rows` x `cols` sub-matrix with its top-left cell at `(row, col)`,
    /// row-major.
    pub fn window(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> impl Iterator<Item = u8> + '_ {
        iproduct!(row..row + rows, col..col + cols).map(|(r, c)| self.get(r, c))
    }

    /// Top-left positions of every window of the given size.
    fn window_origins(&self, rows: usize, cols: usize) -> impl Iterator<Item = (usize, usize)> {
        iproduct!(0..=self.rows - rows, 0..=self.cols - cols)
    }
}

impl fmt::Display for ByteMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.data.chunks(self.cols) {
            writeln!(f, "{row:?}")?;
        }
        Ok(())
    }
}

/// Valid-mode 2D cross-correlation with each cell truncated modulo 256.
pub fn valid_correlate2d(
    matrix: &ByteMatrix,
    kernel: &ByteMatrix,
) -> Result<ByteMatrix, SimError> {
    let fits_rows = (1..=matrix.rows).contains(&kernel.rows);
    let fits_cols = (1..=matrix.cols).contains(&kernel.cols);
    if !fits_rows || !fits_cols {
        return Err(SimError(format!(
            "{}x{} kernel does not fit in {}x{} matrix",
            kernel.rows, kernel.cols, matrix.rows, matrix.cols
        )));
    }
    let data = matrix
        .window_origins(kernel.rows, kernel.cols)
        .map(|(r, c)| {
            let window = matrix.window(r, c, kernel.rows, kernel.cols);
            dot_mod256(window, kernel.as_bytes())
        })
        .collect();
    ByteMatrix::new(
        matrix.rows - kernel.rows + 1,
        matrix.cols - kernel.cols + 1,
        data,
    )
}

fn dot_mod256(window: impl Iterator<Item = u8>, kernel: &[u8]) -> u8 {
    window
        .zip(kernel)
        .fold(0u32, |acc, (a, b)| acc + u32::from(a) * u32::from(*b)) as u8
}

/// Interpret a request payload (kernel then windows) and compute the reply
/// bytes: each window dotted with the kernel, modulo 256.
pub fn correlate_windows(stream: &[u8], kernel_len: usize) -> Result<Vec<u8>, SimError> {
    if kernel_len == 0 || stream.len() < kernel_len || stream.len() % kernel_len != 0 {
        return Err(SimError(format!(
            "payload of {} bytes is not a whole number of {kernel_len} byte windows",
            stream.len()
        )));
    }
    let (kernel, windows) = stream.split_at(kernel_len);
    Ok(windows
        .chunks(kernel_len)
        .map(|window| dot_mod256(window.iter().copied(), kernel))
        .collect())
}

/// The kernel and matrix for one test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestVectors {
    pub kernel: ByteMatrix,
    pub matrix: ByteMatrix,
}

impl TestVectors {
    /// Draw a 3x3 kernel with cells in `0..6` and a 12x12 matrix with cells
    /// in `matrix_range`.
    ///
    /// # Panics
    ///
    /// If `matrix_range` is empty.
    pub fn generate(rng: &mut impl Rng, matrix_range: RangeInclusive<u8>) -> Self {
        let kernel = ByteMatrix::from_fn(KERNEL_DIM, KERNEL_DIM, |_, _| {
            rng.gen_range(0..KERNEL_LIMIT)
        });
        let matrix = ByteMatrix::from_fn(MATRIX_DIM, MATRIX_DIM, |_, _| {
            rng.gen_range(matrix_range.clone())
        });
        Self { kernel, matrix }
    }

    /// The request payload: kernel bytes followed by every window.
    #[must_use]
    pub fn payload_stream(&self) -> Vec<u8> {
        let (rows, cols) = (self.kernel.rows, self.kernel.cols);
        let mut stream = self.kernel.as_bytes().to_vec();
        for (r, c) in self.matrix.window_origins(rows, cols) {
            stream.extend(self.matrix.window(r, c, rows, cols));
        }
        stream
    }

    /// The reply payload expected from a correct device.
    pub fn expected_result(&self) -> Result<ByteMatrix, SimError> {
        valid_correlate2d(&self.matrix, &self.kernel)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn small_correlation() {
        let matrix = ByteMatrix::from_fn(3, 4, |r, c| (r * 4 + c) as u8);
        let kernel = ByteMatrix::new(2, 2, vec![1, 0, 0, 1]).unwrap();
        let result = valid_correlate2d(&matrix, &kernel).unwrap();
        assert_eq!((result.rows(), result.cols()), (2, 3));
        // Each cell is m[r][c] + m[r+1][c+1]
        assert_eq!(result.as_bytes(), &[5, 7, 9, 13, 15, 17]);
    }

    #[test]
    fn truncated_modulo_256() {
        let matrix = ByteMatrix::from_fn(3, 3, |_, _| 230);
        let kernel = ByteMatrix::from_fn(3, 3, |_, _| 5);
        let result = valid_correlate2d(&matrix, &kernel).unwrap();
        assert_eq!(result.as_bytes(), &[((230 * 5 * 9) % 256) as u8]);
    }

    #[test]
    fn kernel_too_big() {
        let matrix = ByteMatrix::from_fn(2, 2, |_, _| 0);
        let kernel = ByteMatrix::from_fn(3, 3, |_, _| 0);
        assert!(valid_correlate2d(&matrix, &kernel).is_err());
    }

    #[test]
    fn canonical_sizes() {
        let mut rng = StdRng::seed_from_u64(1);
        let vectors = TestVectors::generate(&mut rng, DEFAULT_MATRIX_RANGE);
        assert!(vectors.kernel.as_bytes().iter().all(|v| *v < KERNEL_LIMIT));
        assert!(vectors.matrix.as_bytes().iter().all(|v| *v == 230));

        let stream = vectors.payload_stream();
        assert_eq!(stream.len(), 909);
        assert_eq!(&stream[..9], vectors.kernel.as_bytes());

        let expected = vectors.expected_result().unwrap();
        assert_eq!((expected.rows(), expected.cols()), (10, 10));
        assert_eq!(
            correlate_windows(&stream, 9).unwrap(),
            expected.as_bytes().to_vec()
        );
    }

    #[test]
    fn top_of_range_drawn() {
        let mut rng = StdRng::seed_from_u64(2);
        let vectors = TestVectors::generate(&mut rng, 255..=255);
        assert!(vectors.matrix.as_bytes().iter().all(|v| *v == 255));

        let vectors = TestVectors::generate(&mut rng, 254..=255);
        assert!(vectors.matrix.as_bytes().contains(&255));
    }

    #[test]
    fn window_order_is_row_major() {
        let vectors = TestVectors {
            kernel: ByteMatrix::from_fn(3, 3, |_, _| 1),
            matrix: ByteMatrix::from_fn(4, 4, |r, c| (r * 4 + c) as u8),
        };
        let stream = vectors.payload_stream();
        assert_eq!(stream.len(), 9 + 4 * 9);
        assert_eq!(&stream[9..18], &[0, 1, 2, 4, 5, 6, 8, 9, 10]);
        assert_eq!(&stream[18..27], &[1, 2, 3, 5, 6, 7, 9, 10, 11]);
        assert_eq!(&stream[27..36], &[4, 5, 6, 8, 9, 10, 12, 13, 14]);
    }

    #[test]
    fn ragged_stream_rejected() {
        assert!(correlate_windows(&[1; 10], 9).is_err());
        assert!(correlate_windows(&[1; 5], 9).is_err());
        assert_eq!(correlate_windows(&[1; 9], 9).unwrap(), Vec::<u8>::new());
    }
}
