use super::Objective;
use aplace_common::db::core::PlacementDB;
use aplace_common::geom::point::Point;

/// Log-sum-exp surrogate for total half-perimeter wirelength.
///
/// Per net and axis, the non-smooth max over pin coordinates is replaced by
/// `true_max + gamma * ln(sum exp((v - true_max)/gamma))` and min by the
/// mirrored form. Subtracting the true bound keeps every exponent <= 0, so
/// the exponentials cannot overflow no matter how small gamma gets. As
/// gamma -> 0 the value converges to exact HPWL.
pub struct SmoothedWirelength<'a> {
    db: &'a PlacementDB,
    gamma: f64,
    // Per-pin exponential terms, shared between the value and the gradient
    // accumulation within a single pass.
    exp_pos: Vec<Point<f64>>,
    exp_neg: Vec<Point<f64>>,
}

impl<'a> SmoothedWirelength<'a> {
    pub fn new(db: &'a PlacementDB, gamma: f64) -> Self {
        debug_assert!(gamma > 0.0);
        let num_pins = db.pin_offsets.len();
        Self {
            db,
            gamma,
            exp_pos: vec![Point::default(); num_pins],
            exp_neg: vec![Point::default(); num_pins],
        }
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    fn run(&mut self, positions: &[Point<f64>], mut grad: Option<&mut [Point<f64>]>) -> f64 {
        let inv_gamma = 1.0 / self.gamma;
        if let Some(g) = grad.as_deref_mut() {
            for v in g.iter_mut() {
                *v = Point::default();
            }
        }

        let mut total = 0.0;
        for net in &self.db.nets {
            if net.pins.len() < 2 {
                continue;
            }

            let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
            let mut min = Point::new(f64::INFINITY, f64::INFINITY);
            for &pin in &net.pins {
                let m = self.db.pin_to_module[pin.index()];
                let pos = self.db.pin_position(pin, &positions[m.index()]);
                max.x = max.x.max(pos.x);
                min.x = min.x.min(pos.x);
                max.y = max.y.max(pos.y);
                min.y = min.y.min(pos.y);
            }

            let mut sum_pos = Point::new(0.0, 0.0);
            let mut sum_neg = Point::new(0.0, 0.0);
            for &pin in &net.pins {
                let m = self.db.pin_to_module[pin.index()];
                let pos = self.db.pin_position(pin, &positions[m.index()]);
                let ep = Point::new(
                    ((pos.x - max.x) * inv_gamma).exp(),
                    ((pos.y - max.y) * inv_gamma).exp(),
                );
                let en = Point::new(
                    ((min.x - pos.x) * inv_gamma).exp(),
                    ((min.y - pos.y) * inv_gamma).exp(),
                );
                self.exp_pos[pin.index()] = ep;
                self.exp_neg[pin.index()] = en;
                sum_pos += ep;
                sum_neg += en;
            }

            let smooth_max_x = max.x + self.gamma * sum_pos.x.ln();
            let smooth_min_x = min.x - self.gamma * sum_neg.x.ln();
            let smooth_max_y = max.y + self.gamma * sum_pos.y.ln();
            let smooth_min_y = min.y - self.gamma * sum_neg.y.ln();
            total += net.weight
                * ((smooth_max_x - smooth_min_x) + (smooth_max_y - smooth_min_y));

            if let Some(g) = grad.as_deref_mut() {
                for &pin in &net.pins {
                    let m = self.db.pin_to_module[pin.index()];
                    let ep = self.exp_pos[pin.index()];
                    let en = self.exp_neg[pin.index()];
                    g[m.index()].x += net.weight * (ep.x / sum_pos.x - en.x / sum_neg.x);
                    g[m.index()].y += net.weight * (ep.y / sum_pos.y - en.y / sum_neg.y);
                }
            }
        }
        total
    }
}

impl Objective for SmoothedWirelength<'_> {
    fn evaluate(&mut self, positions: &[Point<f64>]) -> f64 {
        self.run(positions, None)
    }

    fn gradient(&mut self, positions: &[Point<f64>], grad: &mut [Point<f64>]) -> f64 {
        self.run(positions, Some(grad))
    }
}
