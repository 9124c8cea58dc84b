use nalgebra::DMatrix;
use ndarray::{Array, Array2, ArrayView1};
use num_traits::Float;

use crate::{Error, Result};

/// Generate the Vandermonde matrix of `degree` for observations `x`
///
/// The Vandermonde matrix is a (n x degree + 1) matrix. Each row of the matrix is a geometric
/// progression for an individual observation `x` from power `0` to `degree` inclusive.
///
/// # Errors
/// `Error::Configuration` if `degree` does not fit in an `i32`.
///
/// # Examples
///
/// ```
/// use chamber_analysis::math::vandermonde;
/// use ndarray::arr2;
///
/// let observations: Vec<f64> = vec![2., 3.];
/// let vander = vandermonde(&observations, 2).unwrap();
///
/// let expected = arr2(&[[1., 2., 4.], [1., 3., 9.]]);
/// assert_eq!(vander, expected);
/// ```
pub fn vandermonde<T: Float>(x: &[T], degree: usize) -> Result<Array2<T>> {
    let degree_i32 = i32::try_from(degree)
        .map_err(|_| Error::configuration(format!("{degree} doesn't fit in `i32`")))?;
    let vals = x
        .iter()
        .flat_map(|xi| (0..=degree_i32).map(move |i| xi.powi(i)));

    Array::from_iter(vals)
        .into_shape((x.len(), degree + 1))
        .map_err(|e| Error::configuration(e.to_string()))
}

/// Moore-Penrose pseudo-inverse of a full-column-rank design matrix.
///
/// Row `k` of the result holds the weights which, applied to a column of observations, give the
/// least-squares estimate of coefficient `k`.
pub(crate) fn pseudo_inverse(design: &Array2<f64>) -> Result<Array2<f64>> {
    let (rows, cols) = design.dim();
    let matrix = DMatrix::from_fn(rows, cols, |ii, jj| design[[ii, jj]]);
    let inverse = matrix
        .pseudo_inverse(f64::EPSILON)
        .map_err(|e| Error::numeric(e.to_string()))?;

    Ok(Array2::from_shape_fn((cols, rows), |(ii, jj)| {
        inverse[(ii, jj)]
    }))
}

/// Evaluate a polynomial with coefficients ordered lowest power first, using Horner's scheme.
pub fn polyval(coefficients: ArrayView1<f64>, x: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, coefficient| acc.mul_add(x, *coefficient))
}
