use itertools::iproduct;
use ndarray::{Array2, ArrayView1, Axis, LinalgScalar};
use ndarray_linalg::{EigValsh, UPLO};

use crate::EstimationError;

/// The rank one matrix `u vᵀ`
///
/// In a measurement update `u` is the gain column `K` and `v` the observation row `H`, and
/// `I - K H` is the factor that shrinks the covariance.
///
/// # Examples
///
/// ```
/// use resistance_estimation::math::outer_product;
/// use ndarray::{arr1, arr2};
///
/// let gain = arr1(&[0.5, 0.25]);
/// let observation = arr1(&[0.2, 1.]);
/// let correction = outer_product(gain.view(), observation.view());
///
/// assert_eq!(correction, arr2(&[[0.1, 0.5], [0.05, 0.25]]));
/// ```
pub fn outer_product<T: LinalgScalar>(u: ArrayView1<T>, v: ArrayView1<T>) -> Array2<T> {
    let u = u.insert_axis(Axis(1));
    let v = v.insert_axis(Axis(0));
    u.dot(&v)
}

/// Generate the observation matrix for the inputs `x` of a straight line model
///
/// Each row is the observation row `[x_k, 1]` of a single measurement, so the (n x 2) result maps
/// a parameter vector `(slope, intercept)` onto the n predicted observations.
///
/// # Examples
///
/// ```
/// use resistance_estimation::math::observation_matrix;
/// use ndarray::arr2;
///
/// let inputs: Vec<f64> = vec![2., 3.];
/// let observation = observation_matrix(&inputs);
///
/// let expected = arr2(&[[2., 1.], [3., 1.]]);
/// assert_eq!(observation, expected);
/// ```
pub fn observation_matrix<T: LinalgScalar>(x: &[T]) -> Array2<T> {
    Array2::from_shape_fn((x.len(), 2), |(ii, jj)| if jj == 0 { x[ii] } else { T::one() })
}

/// The largest absolute difference between mirrored elements of a square matrix
///
/// Zero for an exactly symmetric matrix.
pub fn asymmetry(matrix: &Array2<f64>) -> f64 {
    let (rows, cols) = matrix.dim();
    iproduct!(0..rows, 0..cols)
        .filter(|(ii, jj)| ii < jj)
        .map(|(ii, jj)| (matrix[[ii, jj]] - matrix[[jj, ii]]).abs())
        .fold(0.0, f64::max)
}

/// The smallest eigenvalue of a symmetric matrix
///
/// Only the lower triangle of `matrix` is read, so callers should confirm symmetry first.
///
/// # Errors
/// Returns an error if the eigenvalue decomposition fails to converge.
pub fn min_eigenvalue(matrix: &Array2<f64>) -> Result<f64, EstimationError> {
    let eigenvalues = matrix.eigvalsh(UPLO::Lower)?;
    Ok(eigenvalues.into_iter().fold(f64::INFINITY, f64::min))
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use ndarray::{arr1, arr2, Array, Array2};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::{rand::Rng, RandomExt};
    use rand_isaac::isaac64::Isaac64Rng;

    use super::{asymmetry, min_eigenvalue, observation_matrix, outer_product};

    #[test]
    fn gain_correction_acts_through_the_predicted_observation() {
        // (K H) x must equal K (H x) for every parameter vector x
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let gain = Array::random_using(2, Uniform::new(-1., 1.), &mut rng);
        let observation = arr1(&[rng.gen_range(0.0..2.0), 1.0]);
        let correction = outer_product(gain.view(), observation.view());

        assert_eq!(correction.dim(), (2, 2));
        for _ in 0..10 {
            let x = Array::random_using(2, Uniform::new(-10., 10.), &mut rng);
            let expected = &gain * observation.dot(&x);
            for (expected, actual) in expected.iter().zip(correction.dot(&x).iter()) {
                approx::assert_relative_eq!(expected, actual, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn correction_has_rank_one() {
        let gain = arr1(&[0.3, -0.7]);
        let observation = arr1(&[0.6, 1.0]);
        let correction = outer_product(gain.view(), observation.view());

        let determinant =
            correction[[0, 0]] * correction[[1, 1]] - correction[[0, 1]] * correction[[1, 0]];
        approx::assert_abs_diff_eq!(determinant, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn observation_matrices_are_generated_correctly() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let num_data_points = 10;

        let data_points = (0..num_data_points)
            .map(|_| rng.gen())
            .collect::<Vec<f64>>();

        let observation = observation_matrix(&data_points);

        assert_eq!(observation.dim(), (num_data_points, 2));
        for (ii, data_point) in data_points.iter().enumerate() {
            approx::assert_relative_eq!(observation[[ii, 0]], *data_point);
            approx::assert_relative_eq!(observation[[ii, 1]], 1.0);
        }
    }

    #[test]
    fn symmetric_matrices_have_no_asymmetry() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let dim = 6;
        let a: Array2<f64> = Array::random_using((dim, dim), Uniform::new(-1., 1.), &mut rng);
        let symmetric = &a + &a.t();

        approx::assert_relative_eq!(asymmetry(&symmetric), 0.0);
    }

    #[test]
    fn asymmetry_reports_the_largest_mirrored_difference() {
        let matrix = arr2(&[[1., 2., 0.], [2.5, 1., 4.], [0., 1., 1.]]);
        approx::assert_relative_eq!(asymmetry(&matrix), 3.0);
    }

    #[test]
    fn smallest_eigenvalue_of_a_diagonal_matrix_is_its_smallest_entry() -> crate::Result<()> {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let entries = (0..5).map(|_| rng.gen_range(0.1..10.0)).collect::<Vec<f64>>();
        let matrix = Array2::from_diag(&Array::from(entries.clone()));

        let expected = entries
            .iter()
            .copied()
            .sorted_by(|a, b| a.partial_cmp(b).unwrap())
            .next()
            .unwrap();
        approx::assert_relative_eq!(min_eigenvalue(&matrix)?, expected, max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn indefinite_matrices_have_a_negative_eigenvalue() -> crate::Result<()> {
        let matrix = arr2(&[[1., 2.], [2., 1.]]);
        approx::assert_relative_eq!(min_eigenvalue(&matrix)?, -1.0, epsilon = 1e-12);
        Ok(())
    }
}
