use super::density::SpatialDensity;
use super::wirelength::SmoothedWirelength;
use super::Objective;
use aplace_common::db::core::PlacementDB;
use aplace_common::geom::point::Point;
use aplace_common::util::config::GlobalPlacementConfig;

/// `wirelength + lambda * density`, with the penalty weight scheduled over
/// the run. Lambda is unset until the first gradient evaluation, where it is
/// seeded as the damped ratio of the two sub-gradients' summed norms so both
/// forces start out comparable. The driver advances the schedule through
/// `end_iteration`; nothing is mutated implicitly inside the gradient pass.
pub struct CompositeObjective<'a> {
    wirelength: SmoothedWirelength<'a>,
    density: SpatialDensity<'a>,
    lambda: Option<f64>,
    damping: f64,
    growth: f64,
    freeze_overflow: f64,
    wl_grad: Vec<Point<f64>>,
    density_grad: Vec<Point<f64>>,
}

impl<'a> CompositeObjective<'a> {
    pub fn new(db: &'a PlacementDB, cfg: &GlobalPlacementConfig) -> Self {
        let extent = db.region.width().max(db.region.height());
        let gamma = extent * cfg.gamma_scale;
        let num_modules = db.num_modules();
        Self {
            wirelength: SmoothedWirelength::new(db, gamma),
            density: SpatialDensity::new(db, cfg.bins_per_edge, cfg.density_multiplier),
            lambda: None,
            damping: cfg.lambda_damping,
            growth: cfg.lambda_growth,
            freeze_overflow: cfg.lambda_freeze_overflow,
            wl_grad: vec![Point::default(); num_modules],
            density_grad: vec![Point::default(); num_modules],
        }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda.unwrap_or(0.0)
    }

    pub fn gamma(&self) -> f64 {
        self.wirelength.gamma()
    }

    pub fn overflow_ratio(&self) -> f64 {
        self.density.overflow_ratio()
    }

    pub fn bin_size(&self) -> (f64, f64) {
        self.density.bin_size()
    }

    /// Advances the penalty schedule; called by the driver once per step.
    /// Lambda ramps while the layout is still overflowing and freezes once
    /// the overflow ratio reaches the spread-enough level.
    pub fn end_iteration(&mut self) {
        if let Some(lambda) = self.lambda.as_mut() {
            if self.density.overflow_ratio() > self.freeze_overflow {
                *lambda *= self.growth;
            }
        }
    }
}

impl Objective for CompositeObjective<'_> {
    fn evaluate(&mut self, positions: &[Point<f64>]) -> f64 {
        self.wirelength.evaluate(positions) + self.lambda() * self.density.evaluate(positions)
    }

    fn gradient(&mut self, positions: &[Point<f64>], grad: &mut [Point<f64>]) -> f64 {
        let wl_cost = self.wirelength.gradient(positions, &mut self.wl_grad);
        let density_cost = self.density.gradient(positions, &mut self.density_grad);

        let lambda = match self.lambda {
            Some(l) => l,
            None => {
                let wl_norm: f64 = self.wl_grad.iter().map(|g| g.norm()).sum();
                let density_norm: f64 = self.density_grad.iter().map(|g| g.norm()).sum();
                let l = if density_norm > f64::EPSILON {
                    self.damping * wl_norm / density_norm
                } else {
                    0.0
                };
                log::debug!("seeded penalty weight lambda = {:.3e}", l);
                self.lambda = Some(l);
                l
            }
        };

        for ((g, &w), &d) in grad.iter_mut().zip(&self.wl_grad).zip(&self.density_grad) {
            *g = w + d * lambda;
        }
        wl_cost + lambda * density_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aplace_common::geom::rect::Rect;

    fn test_db() -> PlacementDB {
        let region = Rect::new(Point::new(0.0, 0.0), Point::new(1000.0, 1000.0));
        let mut db = PlacementDB::new(region);
        let a = db.add_module("a".into(), 100.0, 100.0, false);
        let b = db.add_module("b".into(), 100.0, 100.0, false);
        let n = db.add_net("n".into());
        db.add_pin(a, n, Point::new(0.0, 0.0));
        db.add_pin(b, n, Point::new(0.0, 0.0));
        db
    }

    fn test_positions() -> Vec<Point<f64>> {
        vec![Point::new(480.0, 500.0), Point::new(520.0, 500.0)]
    }

    #[test]
    fn lambda_is_seeded_as_damped_gradient_norm_ratio() {
        let db = test_db();
        let cfg = GlobalPlacementConfig::default();
        let mut objective = CompositeObjective::new(&db, &cfg);
        assert_eq!(objective.lambda(), 0.0);

        let positions = test_positions();
        let mut grad = vec![Point::default(); 2];
        objective.gradient(&positions, &mut grad);

        let mut wl = SmoothedWirelength::new(&db, objective.gamma());
        let mut density = SpatialDensity::new(&db, cfg.bins_per_edge, cfg.density_multiplier);
        let mut wl_grad = vec![Point::default(); 2];
        let mut density_grad = vec![Point::default(); 2];
        wl.gradient(&positions, &mut wl_grad);
        density.gradient(&positions, &mut density_grad);
        let expected = cfg.lambda_damping * wl_grad.iter().map(|g| g.norm()).sum::<f64>()
            / density_grad.iter().map(|g| g.norm()).sum::<f64>();

        assert!((objective.lambda() - expected).abs() < 1e-12 * expected.max(1.0));
        assert!(objective.lambda() > 0.0);
    }

    #[test]
    fn lambda_grows_while_overflowing_and_freezes_once_spread() {
        let db = test_db();
        let mut cfg = GlobalPlacementConfig::default();
        cfg.lambda_freeze_overflow = 0.0; // everything counts as overflowing
        let mut objective = CompositeObjective::new(&db, &cfg);

        let positions = test_positions();
        let mut grad = vec![Point::default(); 2];
        objective.gradient(&positions, &mut grad);
        let seeded = objective.lambda();
        objective.end_iteration();
        assert!((objective.lambda() - seeded * cfg.lambda_growth).abs() < 1e-12 * seeded);

        let mut frozen_cfg = GlobalPlacementConfig::default();
        frozen_cfg.lambda_freeze_overflow = f64::INFINITY; // always spread enough
        let mut frozen = CompositeObjective::new(&db, &frozen_cfg);
        frozen.gradient(&positions, &mut grad);
        let seeded = frozen.lambda();
        frozen.end_iteration();
        frozen.end_iteration();
        assert_eq!(frozen.lambda(), seeded);
    }

    #[test]
    fn combined_gradient_is_wirelength_plus_lambda_density() {
        let db = test_db();
        let cfg = GlobalPlacementConfig::default();
        let mut objective = CompositeObjective::new(&db, &cfg);

        let positions = test_positions();
        let mut grad = vec![Point::default(); 2];
        objective.gradient(&positions, &mut grad);
        let lambda = objective.lambda();

        let mut wl = SmoothedWirelength::new(&db, objective.gamma());
        let mut density = SpatialDensity::new(&db, cfg.bins_per_edge, cfg.density_multiplier);
        let mut wl_grad = vec![Point::default(); 2];
        let mut density_grad = vec![Point::default(); 2];
        wl.gradient(&positions, &mut wl_grad);
        density.gradient(&positions, &mut density_grad);

        for i in 0..2 {
            let expected = wl_grad[i] + density_grad[i] * lambda;
            assert!((grad[i].x - expected.x).abs() < 1e-12);
            assert!((grad[i].y - expected.y).abs() < 1e-12);
        }
    }
}
