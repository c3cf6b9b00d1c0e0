use crate::objective::Objective;
use aplace_common::geom::point::Point;

/// Nonlinear conjugate-gradient optimizer with a constant step size.
///
/// The very first step after `initialize()` is plain steepest descent; later
/// steps use the Polak-Ribiere coefficient with the squared L1 norm of the
/// gradient as the denominator, which damps beta harder than the usual
/// Euclidean form. A zero gradient makes the denominator zero; beta falls
/// back to 0 (steepest descent) rather than dividing by it.
pub struct ConjugateGradient {
    step_size: f64,
    step: usize,
    grad: Vec<Point<f64>>,
    grad_prev: Vec<Point<f64>>,
    dir: Vec<Point<f64>>,
    dir_prev: Vec<Point<f64>>,
}

impl ConjugateGradient {
    pub fn new(step_size: f64, num_modules: usize) -> Self {
        Self {
            step_size,
            step: 0,
            grad: vec![Point::default(); num_modules],
            grad_prev: vec![Point::default(); num_modules],
            dir: vec![Point::default(); num_modules],
            dir_prev: vec![Point::default(); num_modules],
        }
    }

    /// Resets the step counter and drops the cached previous gradient and
    /// direction; the next `step()` starts from steepest descent again.
    pub fn initialize(&mut self) {
        self.step = 0;
        self.grad_prev.fill(Point::default());
        self.dir_prev.fill(Point::default());
    }

    pub fn steps_taken(&self) -> usize {
        self.step
    }

    /// One forward/backward/update cycle. Returns the objective value at the
    /// pre-update positions. Fixed-module pinning is the caller's job.
    pub fn step<F: Objective>(&mut self, objective: &mut F, positions: &mut [Point<f64>]) -> f64 {
        let value = objective.gradient(positions, &mut self.grad);

        if self.step == 0 {
            for (d, &g) in self.dir.iter_mut().zip(&self.grad) {
                *d = -g;
            }
        } else {
            let mut numerator = 0.0;
            let mut denominator = 0.0;
            for (g, gp) in self.grad.iter().zip(&self.grad_prev) {
                numerator += g.dot(&(*g - *gp));
                denominator += g.norm_l1();
            }
            let beta = if denominator > 0.0 {
                numerator / (denominator * denominator)
            } else {
                0.0
            };
            for ((d, &g), &dp) in self.dir.iter_mut().zip(&self.grad).zip(&self.dir_prev) {
                *d = -g + dp * beta;
            }
        }

        for (p, &d) in positions.iter_mut().zip(&self.dir) {
            *p += d * self.step_size;
        }

        self.grad_prev.copy_from_slice(&self.grad);
        self.dir_prev.copy_from_slice(&self.dir);
        self.step += 1;
        value
    }
}
