/// Cholesky-based inverse for small symmetric positive-definite matrices
///
/// A = L·Lᵀ is factored with the row/column forward recursion, reading only the
/// lower triangle of A. The first pivot that is not strictly positive aborts the
/// factorization, which doubles as the positive-definiteness test.
///
/// On success A⁻¹ = (L⁻¹)ᵀ·L⁻¹ is assembled with both triangles written, so the
/// result is exactly symmetric. Sized for the 7×7 innovation covariance but
/// generic over the dimension.
use nalgebra::SMatrix;

use crate::error::CholeskyError;

/// Lower-triangular Cholesky factor of `a`
pub fn cholesky_lower<const N: usize>(
    a: &SMatrix<f32, N, N>,
) -> Result<SMatrix<f32, N, N>, CholeskyError> {
    let mut l = SMatrix::<f32, N, N>::zeros();

    for i in 0..N {
        for j in 0..=i {
            let mut sum = a[(i, j)];
            for k in 0..j {
                sum -= l[(i, k)] * l[(j, k)];
            }

            if i == j {
                // NaN fails this comparison too
                if !(sum > 0.0) {
                    return Err(CholeskyError::NotPositiveDefinite { pivot: i });
                }
                l[(i, j)] = sum.sqrt();
            } else {
                l[(i, j)] = sum / l[(j, j)];
            }
        }
    }

    Ok(l)
}

/// Invert a symmetric positive-definite matrix
pub fn invert_spd<const N: usize>(
    a: &SMatrix<f32, N, N>,
) -> Result<SMatrix<f32, N, N>, CholeskyError> {
    let l = cholesky_lower(a)?;

    // Forward substitution, column by column
    let mut l_inv = SMatrix::<f32, N, N>::zeros();
    for i in 0..N {
        l_inv[(i, i)] = 1.0 / l[(i, i)];
        for j in (i + 1)..N {
            let mut sum = 0.0;
            for k in i..j {
                sum -= l[(j, k)] * l_inv[(k, i)];
            }
            l_inv[(j, i)] = sum / l[(j, j)];
        }
    }

    // A⁻¹ = (L⁻¹)ᵀ · L⁻¹
    let mut a_inv = SMatrix::<f32, N, N>::zeros();
    for i in 0..N {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in i..N {
                sum += l_inv[(k, i)] * l_inv[(k, j)];
            }
            a_inv[(i, j)] = sum;
            a_inv[(j, i)] = sum;
        }
    }

    Ok(a_inv)
}
