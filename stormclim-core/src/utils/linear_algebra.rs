//! Linear algebra utilities.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Factor a symmetric positive semi-definite matrix `C` into `L` with `L Lᵀ = C`.
///
/// A Cholesky factorisation is attempted first. Rank deficient or slightly
/// indefinite matrices (common for rank correlation estimated from few
/// samples) fall back to a symmetric eigendecomposition with negative
/// eigenvalues clamped to zero, so `L = V sqrt(max(Λ, 0))`.
///
/// # Example
/// ```
/// use nalgebra::DMatrix;
/// use stormclim_core::utils::linear_algebra::psd_factor;
///
/// // Perfectly correlated pair: singular, Cholesky fails
/// let c = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
/// let l = psd_factor(&c);
/// let back = &l * l.transpose();
/// assert!((back - c).abs().max() < 1e-12);
/// ```
pub fn psd_factor(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    assert!(matrix.is_square(), "Matrix must be square");

    if let Some(chol) = matrix.clone().cholesky() {
        return chol.l();
    }

    let eigen = SymmetricEigen::new(matrix.clone());
    let roots = DVector::from_iterator(
        eigen.eigenvalues.len(),
        eigen.eigenvalues.iter().map(|v| v.max(0.0).sqrt()),
    );
    eigen.eigenvectors * DMatrix::from_diagonal(&roots)
}
