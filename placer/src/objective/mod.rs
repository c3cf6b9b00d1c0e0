pub mod composite;
pub mod density;
pub mod wirelength;

use aplace_common::geom::point::Point;

/// Scalar cost over module centers with an analytic gradient.
///
/// `gradient` always runs its own forward pass over `positions` and returns
/// the cost, so value and gradient can never be computed from different
/// inputs. Implementations may reuse internal scratch buffers between calls;
/// they are single-owner and not shareable across threads mid-run.
pub trait Objective {
    fn evaluate(&mut self, positions: &[Point<f64>]) -> f64;

    /// Overwrites `grad` with the gradient at `positions` and returns the
    /// cost at `positions`.
    fn gradient(&mut self, positions: &[Point<f64>], grad: &mut [Point<f64>]) -> f64;
}
