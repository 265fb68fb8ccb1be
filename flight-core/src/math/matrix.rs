use nalgebra::{SMatrix, SVector};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixError {
    /// Largest remaining pivot magnitude was exactly zero.
    Singular,
}

/// Gauss-Jordan inverse with partial pivoting.
///
/// Each column picks the row with the largest magnitude pivot at or below the
/// diagonal. Only an exactly zero pivot is rejected, so badly conditioned
/// matrices still invert (with whatever precision f32 gives them).
pub fn invert<const N: usize>(a: &SMatrix<f32, N, N>) -> Result<SMatrix<f32, N, N>, MatrixError> {
    let mut work = *a;
    let mut inverse = SMatrix::<f32, N, N>::identity();

    for col in 0..N {
        let mut pivot_row = col;
        let mut pivot_magnitude = 0.0f32;
        for row in col..N {
            let magnitude = libm::fabsf(work[(row, col)]);
            if magnitude > pivot_magnitude {
                pivot_magnitude = magnitude;
                pivot_row = row;
            }
        }
        if pivot_magnitude == 0.0 {
            return Err(MatrixError::Singular);
        }

        if pivot_row != col {
            work.swap_rows(pivot_row, col);
            inverse.swap_rows(pivot_row, col);
        }

        let pivot = work[(col, col)];
        for c in 0..N {
            work[(col, c)] /= pivot;
            inverse[(col, c)] /= pivot;
        }

        for row in 0..N {
            if row == col {
                continue;
            }
            let factor = work[(row, col)];
            if factor == 0.0 {
                continue;
            }
            for c in 0..N {
                let work_pivot = work[(col, c)];
                let inverse_pivot = inverse[(col, c)];
                work[(row, c)] -= factor * work_pivot;
                inverse[(row, c)] -= factor * inverse_pivot;
            }
        }
    }

    Ok(inverse)
}

/// Counts the NaNs in `buf`. Bit `i` of the mask is set when `buf[i]` is NaN;
/// only the first 32 elements can be represented in the mask.
pub fn scan_nan(buf: &[f32]) -> (usize, u32) {
    let mut count = 0;
    let mut mask = 0u32;
    for (i, value) in buf.iter().enumerate() {
        if value.is_nan() {
            count += 1;
            if i < 32 {
                mask |= 1 << i;
            }
        }
    }
    (count, mask)
}

/// Overwrites `m` with a diagonal matrix.
pub fn fill_diagonal<const N: usize>(m: &mut SMatrix<f32, N, N>, diagonal: &SVector<f32, N>) {
    m.fill(0.0);
    for i in 0..N {
        m[(i, i)] = diagonal[i];
    }
}

/// Indices of the first `M` entries below `len` whose bit is clear in
/// `nan_mask`, i.e. the rows that survive a NaN scan.
///
/// Unfilled slots (when fewer than `M` entries are valid) stay at zero; callers
/// pick `M` from the scan's count so that does not happen.
pub fn valid_indices<const M: usize>(nan_mask: u32, len: usize) -> [usize; M] {
    let mut indices = [0usize; M];
    let mut n = 0;
    for i in 0..len {
        if n == M {
            break;
        }
        if nan_mask & (1 << i) == 0 {
            indices[n] = i;
            n += 1;
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2, Matrix3, SMatrix, SVector, Vector3};

    use super::*;

    #[test]
    fn transpose_twice_is_identity() {
        let a = SMatrix::<f32, 3, 5>::from_fn(|r, c| (r * 5 + c) as f32 - 4.5);
        assert_eq!(a.transpose().transpose(), a);
    }

    #[test]
    fn multiply_by_identity() {
        let a = SMatrix::<f32, 4, 3>::from_fn(|r, c| (r as f32) * 0.3 - (c as f32) * 1.7);
        assert_eq!(a * SMatrix::<f32, 3, 3>::identity(), a);
    }

    #[test]
    fn invert_round_trip() {
        let a = Matrix3::new(4.0, -2.0, 1.0, -2.0, 4.0, -2.0, 1.0, -2.0, 4.0);
        let inverse = invert(&a).unwrap();
        assert_relative_eq!(a * inverse, Matrix3::identity(), epsilon = 1e-5);
    }

    #[test]
    fn invert_needs_pivoting() {
        // zero on the leading diagonal, only invertible with a row swap
        let a = Matrix3::new(0.0, 1.0, 2.0, 1.0, 0.0, 3.0, 4.0, -3.0, 8.0);
        let inverse = invert(&a).unwrap();
        assert_relative_eq!(a * inverse, Matrix3::identity(), epsilon = 1e-4);
        assert_relative_eq!(inverse * a, Matrix3::identity(), epsilon = 1e-4);
    }

    #[test]
    fn invert_7x7() {
        let a = SMatrix::<f32, 7, 7>::from_fn(|r, c| {
            if r == c {
                10.0 + r as f32
            } else {
                1.0 / (1.0 + (r + c) as f32)
            }
        });
        let inverse = invert(&a).unwrap();
        assert_relative_eq!(a * inverse, SMatrix::<f32, 7, 7>::identity(), epsilon = 1e-5);
    }

    #[test]
    fn invert_zero_column_is_singular() {
        let a = Matrix3::new(1.0, 0.0, 2.0, 3.0, 0.0, 4.0, 5.0, 0.0, 6.0);
        assert_eq!(invert(&a), Err(MatrixError::Singular));
        assert_eq!(invert(&Matrix2::<f32>::zeros()), Err(MatrixError::Singular));
    }

    #[test]
    fn invert_nan_is_singular() {
        let a = Matrix2::new(f32::NAN, 0.0, 0.0, f32::NAN);
        assert_eq!(invert(&a), Err(MatrixError::Singular));
    }

    #[test]
    fn scan_nan_mask() {
        assert_eq!(scan_nan(&[1.0, 2.0, 3.0]), (0, 0));
        assert_eq!(scan_nan(&[f32::NAN, 2.0, f32::NAN]), (2, 0b101));
        assert_eq!(scan_nan(&[f32::INFINITY, f32::NAN]), (1, 0b10));
        assert_eq!(scan_nan(&[]), (0, 0));
    }

    #[test]
    fn valid_indices_skip_nan_rows() {
        assert_eq!(valid_indices::<2>(0b010, 3), [0, 2]);
        assert_eq!(valid_indices::<1>(0b011, 3), [2]);
        assert_eq!(valid_indices::<3>(0, 3), [0, 1, 2]);
    }

    #[test]
    fn fill_diagonal_state_sized() {
        let mut m = SMatrix::<f32, 7, 7>::from_element(-1.0);
        let diagonal = SVector::<f32, 7>::from_fn(|i, _| i as f32 + 0.5);
        fill_diagonal(&mut m, &diagonal);
        assert_eq!(m, SMatrix::<f32, 7, 7>::from_diagonal(&diagonal));
    }

    #[test]
    fn fill_diagonal_clears_off_diagonal() {
        let mut m = Matrix3::from_element(7.0);
        fill_diagonal(&mut m, &Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(m, Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0)));
    }
}
