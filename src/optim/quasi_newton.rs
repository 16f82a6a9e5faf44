//! Batch minimize-to-convergence strategies
//!
//! These methods run against one fixed minibatch until convergence instead
//! of iterating step by step: quasi-Newton (BFGS, L-BFGS-B), line-search
//! conjugate-gradient variants (CG, Newton-CG), and the derivative-free
//! simplex and direction-set methods (Nelder-Mead, Powell).

use ndarray::{Array1, Array2};
use std::collections::VecDeque;

/// The objective a batch method minimizes: scalar value and gradient over a
/// flat parameter vector, both evaluated against the run's fixed minibatch.
pub trait BatchObjective {
    fn value(&mut self, x: &Array1<f32>) -> f32;
    fn gradient(&mut self, x: &Array1<f32>) -> Array1<f32>;
}

/// The batch methods the harness dispatches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuasiNewtonMethod {
    Bfgs,
    LBfgsB,
    NelderMead,
    Powell,
    Cg,
    NewtonCg,
}

impl QuasiNewtonMethod {
    /// Resolve one of the fixed batch-method names. Any other name belongs
    /// to the gradient-based family (or is unknown).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BFGS" => Some(QuasiNewtonMethod::Bfgs),
            "L-BFGS-B" => Some(QuasiNewtonMethod::LBfgsB),
            "Nelder-Mead" => Some(QuasiNewtonMethod::NelderMead),
            "Powell" => Some(QuasiNewtonMethod::Powell),
            "CG" => Some(QuasiNewtonMethod::Cg),
            "Newton-CG" => Some(QuasiNewtonMethod::NewtonCg),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QuasiNewtonMethod::Bfgs => "BFGS",
            QuasiNewtonMethod::LBfgsB => "L-BFGS-B",
            QuasiNewtonMethod::NelderMead => "Nelder-Mead",
            QuasiNewtonMethod::Powell => "Powell",
            QuasiNewtonMethod::Cg => "CG",
            QuasiNewtonMethod::NewtonCg => "Newton-CG",
        }
    }

    /// Whether the method consumes gradients.
    pub fn uses_gradient(&self) -> bool {
        !matches!(
            self,
            QuasiNewtonMethod::NelderMead | QuasiNewtonMethod::Powell
        )
    }
}

/// Convergence thresholds shared by all batch methods.
#[derive(Clone, Copy, Debug)]
pub struct StopCriteria {
    /// Infinity-norm gradient threshold.
    pub gtol: f32,
    /// Relative objective-change threshold.
    pub ftol: f32,
    /// Iteration cap.
    pub max_iters: usize,
}

impl Default for StopCriteria {
    fn default() -> Self {
        Self {
            gtol: 1e-5,
            ftol: 1e-9,
            max_iters: 1000,
        }
    }
}

/// Result of one minimize-to-convergence run.
#[derive(Clone, Debug)]
pub struct Solution {
    pub x: Array1<f32>,
    pub value: f32,
    pub iterations: usize,
    pub converged: bool,
}

/// Run `method` to convergence from `x0`.
pub fn minimize(
    method: QuasiNewtonMethod,
    objective: &mut dyn BatchObjective,
    x0: Array1<f32>,
    criteria: &StopCriteria,
) -> Solution {
    match method {
        QuasiNewtonMethod::Bfgs => bfgs(objective, x0, criteria),
        QuasiNewtonMethod::LBfgsB => lbfgs(objective, x0, criteria),
        QuasiNewtonMethod::Cg => conjugate_gradient(objective, x0, criteria),
        QuasiNewtonMethod::NewtonCg => newton_cg(objective, x0, criteria),
        QuasiNewtonMethod::NelderMead => nelder_mead(objective, x0, criteria),
        QuasiNewtonMethod::Powell => powell(objective, x0, criteria),
    }
}

fn dot(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm_inf(g: &Array1<f32>) -> f32 {
    g.iter().fold(0.0f32, |m, v| m.max(v.abs()))
}

fn small_change(f_old: f32, f_new: f32, ftol: f32) -> bool {
    (f_old - f_new).abs() <= ftol * (1.0 + f_old.abs())
}

/// Backtracking Armijo line search along `dir` from `x`. Returns the step
/// length, the new point, and its value; a zero step means no decrease was
/// found.
fn armijo(
    objective: &mut dyn BatchObjective,
    x: &Array1<f32>,
    f0: f32,
    slope: f32,
    dir: &Array1<f32>,
    t0: f32,
) -> (f32, Array1<f32>, f32) {
    const C1: f32 = 1e-4;
    let mut t = t0;
    while t > 1e-12 {
        let x_new = x + &(dir * t);
        let f_new = objective.value(&x_new);
        if f_new <= f0 + C1 * t * slope {
            return (t, x_new, f_new);
        }
        t *= 0.5;
    }
    (0.0, x.clone(), f0)
}

// =============================================================================
// BFGS
// =============================================================================

fn bfgs(objective: &mut dyn BatchObjective, x0: Array1<f32>, criteria: &StopCriteria) -> Solution {
    let n = x0.len();
    let mut x = x0;
    let mut f = objective.value(&x);
    let mut g = objective.gradient(&x);
    let mut h: Array2<f32> = Array2::eye(n);

    for iter in 0..criteria.max_iters {
        if norm_inf(&g) < criteria.gtol {
            return Solution {
                x,
                value: f,
                iterations: iter,
                converged: true,
            };
        }

        let mut dir = -h.dot(&g);
        let mut slope = dot(&dir, &g);
        if slope >= 0.0 {
            // Curvature estimate lost descent; restart from steepest descent.
            h = Array2::eye(n);
            dir = -g.clone();
            slope = dot(&dir, &g);
        }

        let (t, x_new, f_new) = armijo(objective, &x, f, slope, &dir, 1.0);
        if t == 0.0 {
            return Solution {
                x,
                value: f,
                iterations: iter,
                converged: false,
            };
        }

        let g_new = objective.gradient(&x_new);
        let s = &x_new - &x;
        let y = &g_new - &g;
        let sy = dot(&s, &y);
        if sy > 1e-10 {
            // H ← (I - ρ s yᵀ) H (I - ρ y sᵀ) + ρ s sᵀ
            let rho = 1.0 / sy;
            let hy = h.dot(&y);
            let yhy = dot(&y, &hy);
            for i in 0..n {
                for j in 0..n {
                    h[[i, j]] += rho * rho * (sy + yhy) * s[i] * s[j]
                        - rho * (hy[i] * s[j] + s[i] * hy[j]);
                }
            }
        }

        let done = small_change(f, f_new, criteria.ftol);
        x = x_new;
        f = f_new;
        g = g_new;
        if done {
            return Solution {
                x,
                value: f,
                iterations: iter + 1,
                converged: true,
            };
        }
    }

    Solution {
        x,
        value: f,
        iterations: criteria.max_iters,
        converged: false,
    }
}

// =============================================================================
// L-BFGS (bounds of the `-B` variant are not used by the harness)
// =============================================================================

fn lbfgs(objective: &mut dyn BatchObjective, x0: Array1<f32>, criteria: &StopCriteria) -> Solution {
    const MEMORY: usize = 10;
    let mut x = x0;
    let mut f = objective.value(&x);
    let mut g = objective.gradient(&x);
    let mut history: VecDeque<(Array1<f32>, Array1<f32>, f32)> = VecDeque::new();

    for iter in 0..criteria.max_iters {
        if norm_inf(&g) < criteria.gtol {
            return Solution {
                x,
                value: f,
                iterations: iter,
                converged: true,
            };
        }

        // Two-loop recursion
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(history.len());
        for (s, y, rho) in history.iter().rev() {
            let alpha = rho * dot(s, &q);
            q -= &(y * alpha);
            alphas.push(alpha);
        }
        if let Some((s, y, _)) = history.back() {
            let gamma = dot(s, y) / dot(y, y).max(1e-12);
            q *= gamma;
        }
        for ((s, y, rho), alpha) in history.iter().zip(alphas.into_iter().rev()) {
            let beta = rho * dot(y, &q);
            q += &(s * (alpha - beta));
        }
        let mut dir = -q;

        let mut slope = dot(&dir, &g);
        if slope >= 0.0 {
            history.clear();
            dir = -g.clone();
            slope = dot(&dir, &g);
        }

        let (t, x_new, f_new) = armijo(objective, &x, f, slope, &dir, 1.0);
        if t == 0.0 {
            return Solution {
                x,
                value: f,
                iterations: iter,
                converged: false,
            };
        }

        let g_new = objective.gradient(&x_new);
        let s = &x_new - &x;
        let y = &g_new - &g;
        let sy = dot(&s, &y);
        if sy > 1e-10 {
            if history.len() == MEMORY {
                history.pop_front();
            }
            history.push_back((s, y, 1.0 / sy));
        }

        let done = small_change(f, f_new, criteria.ftol);
        x = x_new;
        f = f_new;
        g = g_new;
        if done {
            return Solution {
                x,
                value: f,
                iterations: iter + 1,
                converged: true,
            };
        }
    }

    Solution {
        x,
        value: f,
        iterations: criteria.max_iters,
        converged: false,
    }
}

// =============================================================================
// Nonlinear conjugate gradient (Polak-Ribière, restarted)
// =============================================================================

fn conjugate_gradient(
    objective: &mut dyn BatchObjective,
    x0: Array1<f32>,
    criteria: &StopCriteria,
) -> Solution {
    let mut x = x0;
    let mut f = objective.value(&x);
    let mut g = objective.gradient(&x);
    let mut dir = -g.clone();

    for iter in 0..criteria.max_iters {
        if norm_inf(&g) < criteria.gtol {
            return Solution {
                x,
                value: f,
                iterations: iter,
                converged: true,
            };
        }

        let mut slope = dot(&dir, &g);
        if slope >= 0.0 {
            dir = -g.clone();
            slope = dot(&dir, &g);
        }

        let (t, x_new, f_new) = armijo(objective, &x, f, slope, &dir, 1.0);
        if t == 0.0 {
            return Solution {
                x,
                value: f,
                iterations: iter,
                converged: false,
            };
        }

        let g_new = objective.gradient(&x_new);
        // β⁺ = max(0, gₖ₊₁ᵀ(gₖ₊₁ - gₖ) / gₖᵀgₖ)
        let beta = (dot(&g_new, &(&g_new - &g)) / dot(&g, &g).max(1e-12)).max(0.0);
        dir = -&g_new + &(&dir * beta);

        let done = small_change(f, f_new, criteria.ftol);
        x = x_new;
        f = f_new;
        g = g_new;
        if done {
            return Solution {
                x,
                value: f,
                iterations: iter + 1,
                converged: true,
            };
        }
    }

    Solution {
        x,
        value: f,
        iterations: criteria.max_iters,
        converged: false,
    }
}

// =============================================================================
// Newton-CG: Newton steps with a truncated-CG inner solve over
// finite-difference Hessian-vector products
// =============================================================================

fn newton_cg(
    objective: &mut dyn BatchObjective,
    x0: Array1<f32>,
    criteria: &StopCriteria,
) -> Solution {
    let n = x0.len();
    let mut x = x0;
    let mut f = objective.value(&x);
    let mut g = objective.gradient(&x);

    for iter in 0..criteria.max_iters {
        let gnorm = norm_inf(&g);
        if gnorm < criteria.gtol {
            return Solution {
                x,
                value: f,
                iterations: iter,
                converged: true,
            };
        }

        // Truncated CG on H p = -g
        let tol = gnorm.sqrt().min(0.5) * gnorm;
        let mut p: Array1<f32> = Array1::zeros(n);
        let mut r = -g.clone();
        let mut d = r.clone();
        let mut rr = dot(&r, &r);
        for _ in 0..n.max(1) {
            if rr.sqrt() < tol {
                break;
            }
            let hd = hessian_vec(objective, &x, &g, &d);
            let dhd = dot(&d, &hd);
            if dhd <= 1e-12 {
                // Negative curvature; fall back to what we have (or steepest
                // descent on the first inner iteration).
                if dot(&p, &p) == 0.0 {
                    p = r.clone();
                }
                break;
            }
            let alpha = rr / dhd;
            p += &(&d * alpha);
            r -= &(&hd * alpha);
            let rr_new = dot(&r, &r);
            d = &r + &(&d * (rr_new / rr.max(1e-12)));
            rr = rr_new;
        }
        if dot(&p, &p) == 0.0 {
            p = -g.clone();
        }

        let mut slope = dot(&p, &g);
        if slope >= 0.0 {
            p = -g.clone();
            slope = dot(&p, &g);
        }

        let (t, x_new, f_new) = armijo(objective, &x, f, slope, &p, 1.0);
        if t == 0.0 {
            return Solution {
                x,
                value: f,
                iterations: iter,
                converged: false,
            };
        }

        let done = small_change(f, f_new, criteria.ftol);
        x = x_new;
        f = f_new;
        g = objective.gradient(&x);
        if done {
            return Solution {
                x,
                value: f,
                iterations: iter + 1,
                converged: true,
            };
        }
    }

    Solution {
        x,
        value: f,
        iterations: criteria.max_iters,
        converged: false,
    }
}

/// Forward-difference Hessian-vector product.
fn hessian_vec(
    objective: &mut dyn BatchObjective,
    x: &Array1<f32>,
    g: &Array1<f32>,
    v: &Array1<f32>,
) -> Array1<f32> {
    let vnorm = dot(v, v).sqrt().max(1e-12);
    let h = 1e-3 * (1.0 + dot(x, x).sqrt()) / vnorm;
    let g_shift = objective.gradient(&(x + &(v * h)));
    (&g_shift - g) / h
}

// =============================================================================
// Nelder-Mead simplex
// =============================================================================

fn nelder_mead(
    objective: &mut dyn BatchObjective,
    x0: Array1<f32>,
    criteria: &StopCriteria,
) -> Solution {
    let n = x0.len();
    let mut simplex: Vec<(Array1<f32>, f32)> = Vec::with_capacity(n + 1);
    let f0 = objective.value(&x0);
    simplex.push((x0.clone(), f0));
    for i in 0..n {
        let mut v = x0.clone();
        v[i] += if v[i] != 0.0 { 0.05 * v[i] } else { 2.5e-4 };
        let fv = objective.value(&v);
        simplex.push((v, fv));
    }

    let mut iterations = 0;
    for iter in 0..criteria.max_iters {
        iterations = iter;
        simplex.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let f_best = simplex[0].1;
        let f_worst = simplex[n].1;
        if (f_worst - f_best).abs() <= criteria.ftol * (1.0 + f_best.abs()) {
            return Solution {
                x: simplex[0].0.clone(),
                value: f_best,
                iterations,
                converged: true,
            };
        }

        // Centroid of all but the worst vertex
        let mut centroid: Array1<f32> = Array1::zeros(n);
        for (v, _) in simplex.iter().take(n) {
            centroid += v;
        }
        centroid /= n as f32;

        let worst = simplex[n].0.clone();
        let reflected = &centroid + &(&centroid - &worst);
        let f_ref = objective.value(&reflected);

        if f_ref < simplex[0].1 {
            // Try expanding past the reflection
            let expanded = &centroid + &((&centroid - &worst) * 2.0);
            let f_exp = objective.value(&expanded);
            simplex[n] = if f_exp < f_ref {
                (expanded, f_exp)
            } else {
                (reflected, f_ref)
            };
        } else if f_ref < simplex[n - 1].1 {
            simplex[n] = (reflected, f_ref);
        } else {
            let contracted = if f_ref < f_worst {
                &centroid + &((&centroid - &worst) * 0.5)
            } else {
                &centroid - &((&centroid - &worst) * 0.5)
            };
            let f_con = objective.value(&contracted);
            if f_con < f_worst.min(f_ref) {
                simplex[n] = (contracted, f_con);
            } else {
                // Shrink toward the best vertex
                let best = simplex[0].0.clone();
                for entry in simplex.iter_mut().skip(1) {
                    entry.0 = &best + &((&entry.0 - &best) * 0.5);
                    entry.1 = objective.value(&entry.0);
                }
            }
        }
    }

    simplex.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    Solution {
        x: simplex[0].0.clone(),
        value: simplex[0].1,
        iterations,
        converged: false,
    }
}

// =============================================================================
// Powell's direction-set method
// =============================================================================

fn powell(
    objective: &mut dyn BatchObjective,
    x0: Array1<f32>,
    criteria: &StopCriteria,
) -> Solution {
    let n = x0.len();
    let mut directions: Vec<Array1<f32>> = (0..n)
        .map(|i| {
            let mut e = Array1::zeros(n);
            e[i] = 1.0;
            e
        })
        .collect();

    let mut x = x0;
    let mut f = objective.value(&x);

    for iter in 0..criteria.max_iters {
        let x_start = x.clone();
        let f_start = f;
        let mut biggest_drop = 0.0;
        let mut biggest_idx = 0;

        for (i, u) in directions.iter().enumerate() {
            let f_before = f;
            let (x_min, f_min) = line_minimize(objective, &x, u, f);
            x = x_min;
            f = f_min;
            if f_before - f > biggest_drop {
                biggest_drop = f_before - f;
                biggest_idx = i;
            }
        }

        if small_change(f_start, f, criteria.ftol) {
            return Solution {
                x,
                value: f,
                iterations: iter + 1,
                converged: true,
            };
        }

        // Replace the direction of largest decrease with the sweep direction
        // when the extrapolated point keeps improving.
        let extrapolated = &x * 2.0 - &x_start;
        let f_extra = objective.value(&extrapolated);
        if f_extra < f_start {
            let new_dir = &x - &x_start;
            if dot(&new_dir, &new_dir) > 1e-20 {
                directions[biggest_idx] = new_dir.clone();
                let (x_min, f_min) = line_minimize(objective, &x, &new_dir, f);
                x = x_min;
                f = f_min;
            }
        }
    }

    Solution {
        x,
        value: f,
        iterations: criteria.max_iters,
        converged: false,
    }
}

/// Bracket a minimum along `dir` from `x`, then golden-section it down.
fn line_minimize(
    objective: &mut dyn BatchObjective,
    x: &Array1<f32>,
    dir: &Array1<f32>,
    f0: f32,
) -> (Array1<f32>, f32) {
    let mut phi = |t: f32| objective.value(&(x + &(dir * t)));

    // Pick a downhill orientation and expand until the value turns back up.
    let mut step = 1.0;
    let mut sign = 1.0;
    let mut f_fwd = phi(step);
    if f_fwd >= f0 {
        let f_bwd = phi(-step);
        if f_bwd >= f0 {
            // Narrow bracket around 0
            let (mut a, mut b) = (-step, step);
            for _ in 0..60 {
                let (t1, t2) = golden_points(a, b);
                if phi(t1) < phi(t2) {
                    b = t2;
                } else {
                    a = t1;
                }
            }
            let t = 0.5 * (a + b);
            let ft = phi(t);
            return if ft < f0 {
                (x + &(dir * t), ft)
            } else {
                (x.clone(), f0)
            };
        }
        sign = -1.0;
        f_fwd = f_bwd;
    }
    let mut t_prev = 0.0;
    let mut t_cur = sign * step;
    let mut f_cur = f_fwd;
    for _ in 0..50 {
        step *= 2.0;
        let t_next = sign * step;
        let f_next = phi(t_next);
        if f_next >= f_cur {
            // Bracket is (t_prev, t_next)
            let (mut a, mut b) = if t_prev < t_next {
                (t_prev, t_next)
            } else {
                (t_next, t_prev)
            };
            for _ in 0..60 {
                let (t1, t2) = golden_points(a, b);
                if phi(t1) < phi(t2) {
                    b = t2;
                } else {
                    a = t1;
                }
            }
            let t = 0.5 * (a + b);
            let ft = phi(t);
            return if ft < f_cur {
                (x + &(dir * t), ft)
            } else {
                (x + &(dir * t_cur), f_cur)
            };
        }
        t_prev = t_cur;
        t_cur = t_next;
        f_cur = f_next;
    }
    (x + &(dir * t_cur), f_cur)
}

fn golden_points(a: f32, b: f32) -> (f32, f32) {
    const INV_PHI: f32 = 0.618_034;
    let span = b - a;
    (b - INV_PHI * span, a + INV_PHI * span)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// f(x) = Σ (xᵢ - cᵢ)², minimized at c.
    struct Quadratic {
        center: Array1<f32>,
    }

    impl Quadratic {
        fn new(center: Array1<f32>) -> Self {
            Self { center }
        }
    }

    impl BatchObjective for Quadratic {
        fn value(&mut self, x: &Array1<f32>) -> f32 {
            x.iter()
                .zip(self.center.iter())
                .map(|(xi, ci)| (xi - ci) * (xi - ci))
                .sum()
        }

        fn gradient(&mut self, x: &Array1<f32>) -> Array1<f32> {
            x.iter()
                .zip(self.center.iter())
                .map(|(xi, ci)| 2.0 * (xi - ci))
                .collect()
        }
    }

    /// The banana function, the classic line-search stress test.
    struct Rosenbrock;

    impl BatchObjective for Rosenbrock {
        fn value(&mut self, x: &Array1<f32>) -> f32 {
            let (a, b) = (x[0], x[1]);
            (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2)
        }

        fn gradient(&mut self, x: &Array1<f32>) -> Array1<f32> {
            let (a, b) = (x[0], x[1]);
            array![
                -2.0 * (1.0 - a) - 400.0 * a * (b - a * a),
                200.0 * (b - a * a)
            ]
        }
    }

    fn assert_solves_quadratic(method: QuasiNewtonMethod, tol: f32) {
        let center = array![1.0, -2.0, 0.5];
        let mut obj = Quadratic::new(center.clone());
        let sol = minimize(
            method,
            &mut obj,
            array![4.0, 4.0, 4.0],
            &StopCriteria::default(),
        );
        for (xi, ci) in sol.x.iter().zip(center.iter()) {
            assert!(
                (xi - ci).abs() < tol,
                "{}: {} not within {} of {}",
                method.name(),
                xi,
                tol,
                ci
            );
        }
    }

    #[test]
    fn bfgs_solves_quadratic() {
        assert_solves_quadratic(QuasiNewtonMethod::Bfgs, 1e-3);
    }

    #[test]
    fn lbfgs_solves_quadratic() {
        assert_solves_quadratic(QuasiNewtonMethod::LBfgsB, 1e-3);
    }

    #[test]
    fn cg_solves_quadratic() {
        assert_solves_quadratic(QuasiNewtonMethod::Cg, 1e-2);
    }

    #[test]
    fn newton_cg_solves_quadratic() {
        assert_solves_quadratic(QuasiNewtonMethod::NewtonCg, 1e-2);
    }

    #[test]
    fn nelder_mead_solves_quadratic() {
        assert_solves_quadratic(QuasiNewtonMethod::NelderMead, 1e-2);
    }

    #[test]
    fn powell_solves_quadratic() {
        assert_solves_quadratic(QuasiNewtonMethod::Powell, 1e-2);
    }

    #[test]
    fn bfgs_makes_progress_on_rosenbrock() {
        let mut obj = Rosenbrock;
        let start = array![-1.2, 1.0];
        let f_start = obj.value(&start);
        let sol = minimize(
            QuasiNewtonMethod::Bfgs,
            &mut obj,
            start,
            &StopCriteria {
                max_iters: 2000,
                ..StopCriteria::default()
            },
        );
        assert!(sol.value < f_start * 1e-3);
    }

    #[test]
    fn method_names_round_trip() {
        for name in ["BFGS", "L-BFGS-B", "Nelder-Mead", "Powell", "CG", "Newton-CG"] {
            let m = QuasiNewtonMethod::from_name(name).unwrap();
            assert_eq!(m.name(), name);
        }
        assert!(QuasiNewtonMethod::from_name("adam").is_none());
        assert!(QuasiNewtonMethod::from_name("bfgs").is_none());
    }

    #[test]
    fn derivative_free_methods_report_so() {
        assert!(!QuasiNewtonMethod::NelderMead.uses_gradient());
        assert!(!QuasiNewtonMethod::Powell.uses_gradient());
        assert!(QuasiNewtonMethod::Bfgs.uses_gradient());
    }
}
