//! Derivative-free minimisation.

/// Result of a Nelder-Mead minimisation.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Relative tolerance on the simplex extent used alongside the objective tolerance.
const X_TOLERANCE: f64 = 1e-6;

/// Minimise `f` with the Nelder-Mead simplex method.
///
/// The initial simplex is `x0` plus one vertex per coordinate displaced by
/// `steps[i]`. The objective may return `f64::INFINITY` to mark infeasible
/// points, as long as `f(x0)` is finite.
///
/// Convergence requires both the spread of objective values across the
/// simplex to be below `tolerance * (1 + |f_best|)` and every vertex to lie
/// within a relative distance of 1e-6 of the best one.
///
/// # Example
/// ```
/// use stormclim_core::utils::optimize::nelder_mead;
///
/// let min = nelder_mead(
///     |x| (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2),
///     &[0.0, 0.0],
///     &[0.5, 0.5],
///     1000,
///     1e-12,
/// );
/// assert!(min.converged);
/// assert!((min.point[0] - 1.0).abs() < 1e-4);
/// assert!((min.point[1] + 2.0).abs() < 1e-4);
/// ```
pub fn nelder_mead<F>(
    f: F,
    x0: &[f64],
    steps: &[f64],
    max_iterations: usize,
    tolerance: f64,
) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    assert_eq!(x0.len(), steps.len(), "steps must match the dimension of x0");
    let n = x0.len();

    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for i in 0..n {
        let mut vertex = x0.to_vec();
        vertex[i] += steps[i];
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|x| eval(x)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        // Order vertices best to worst
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[n];
        let spread = worst - best;
        let extent = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(simplex[0].iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        let scale = 1.0 + simplex[0].iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if spread.is_finite()
            && spread <= tolerance * (1.0 + best.abs())
            && extent <= X_TOLERANCE * scale
        {
            converged = true;
            break;
        }
        iterations += 1;

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let along = |t: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(simplex[n].iter())
                .map(|(c, w)| c + t * (w - c))
                .collect()
        };

        let reflected = along(-1.0);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = along(-2.0);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }
        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < values[n] {
            let c = along(-0.5);
            let fc = eval(&c);
            (c, fc)
        } else {
            let c = along(0.5);
            let fc = eval(&c);
            (c, fc)
        };
        if f_contracted < values[n].min(f_reflected) {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        // Shrink towards the best vertex
        let best_vertex = simplex[0].clone();
        for i in 1..=n {
            simplex[i] = best_vertex
                .iter()
                .zip(simplex[i].iter())
                .map(|(b, v)| b + 0.5 * (v - b))
                .collect();
            values[i] = eval(&simplex[i]);
        }
    }

    let (best_index, _) = values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .unwrap_or((0, &values[0]));

    Minimum {
        point: simplex[best_index].clone(),
        value: values[best_index],
        iterations,
        converged,
    }
}
