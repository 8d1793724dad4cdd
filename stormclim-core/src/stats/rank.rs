//! Rank statistics.

use nalgebra::DMatrix;

/// Ranks starting at 1, with tied values sharing their average rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Positions i..=j hold equal values
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Pearson correlation; `None` for fewer than two pairs or a constant input.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a[..n].iter().zip(b[..n].iter()) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some((cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0))
}

/// Spearman rank correlation of two variables over pairwise complete
/// observations (both values finite).
pub fn spearman(a: &[f64], b: &[f64]) -> Option<f64> {
    let (xa, xb): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();
    pearson(&average_ranks(&xa), &average_ranks(&xb))
}

/// Spearman correlation matrix between rows (variables) of `rows`, columns
/// being observations.
///
/// Undefined entries are replaced by 0 and the diagonal is 1. The second
/// value counts the off-diagonal pairs that were undefined.
pub fn spearman_matrix(rows: &[Vec<f64>]) -> (DMatrix<f64>, usize) {
    let n = rows.len();
    let mut matrix = DMatrix::identity(n, n);
    let mut undefined = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            let rho = match spearman(&rows[i], &rows[j]) {
                Some(rho) => rho,
                None => {
                    undefined += 1;
                    0.0
                }
            };
            matrix[(i, j)] = rho;
            matrix[(j, i)] = rho;
        }
    }
    (matrix, undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 30.0, 20.0]), vec![1.0, 3.0, 2.0]);
        assert_eq!(average_ranks(&[1.0, 2.0, 2.0, 3.0]), vec![1.0, 2.5, 2.5, 4.0]);
        assert!(average_ranks(&[]).is_empty());
    }

    #[test]
    fn monotone_relations() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [1.0, 8.0, 27.0, 64.0, 125.0];
        let c = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert_abs_diff_eq!(spearman(&a, &b).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spearman(&a, &c).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn known_value() {
        // scipy.stats.spearmanr([1, 2, 3, 4, 5], [5, 6, 7, 8, 7]) = 0.8207826816681233
        let rho = spearman(&[1.0, 2.0, 3.0, 4.0, 5.0], &[5.0, 6.0, 7.0, 8.0, 7.0]).unwrap();
        assert_abs_diff_eq!(rho, 0.8207826816681233, epsilon = 1e-12);
    }

    #[test]
    fn undefined_cases() {
        assert!(spearman(&[1.0], &[2.0]).is_none());
        assert!(spearman(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        // NaN pairs are dropped, leaving a single pair
        assert!(spearman(&[1.0, f64::NAN, 3.0], &[1.0, 2.0, f64::NAN]).is_none());
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let rows = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![2.0, 1.0, 4.0, 3.0],
            vec![7.0, 7.0, 7.0, 7.0],
        ];
        let (m, undefined) = spearman_matrix(&rows);
        assert_eq!(undefined, 2);
        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(2, 2)], 1.0);
        assert_eq!(m[(0, 2)], 0.0);
        assert_eq!(m[(0, 1)], m[(1, 0)]);
        assert_abs_diff_eq!(m[(0, 1)], 0.6, epsilon = 1e-12);
    }
}
