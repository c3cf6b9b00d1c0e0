use crate::error::PlaceError;
use crate::objective::composite::CompositeObjective;
use crate::solver::conjugate::ConjugateGradient;
use aplace_common::db::core::PlacementDB;
use aplace_common::db::indices::ModuleId;
use aplace_common::geom::point::Point;
use aplace_common::util::config::GlobalPlacementConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy)]
pub struct PlacementStats {
    pub iterations: usize,
    pub overflow: f64,
    pub hpwl: f64,
    /// True when the run ended because the overflow threshold was met,
    /// false on an iteration-cap or plateau exit.
    pub converged: bool,
}

/// Runs global placement and commits the result into the database.
///
/// Degenerate designs are rejected before the loop starts. Non-convergence
/// is not an error: hitting the iteration cap or an overflow plateau commits
/// the best-effort layout with a warning.
pub fn place(
    db: &mut PlacementDB,
    cfg: &GlobalPlacementConfig,
) -> Result<PlacementStats, PlaceError> {
    validate(db)?;
    let (positions, iterations, overflow, converged) = run_loop(db, cfg)?;
    commit(db, &positions);
    let hpwl = db.compute_hpwl();
    log::info!(
        "Global placement finished: {} iterations, overflow {:.4}, HPWL {:.0}",
        iterations,
        overflow,
        hpwl
    );
    Ok(PlacementStats {
        iterations,
        overflow,
        hpwl,
        converged,
    })
}

fn validate(db: &PlacementDB) -> Result<(), PlaceError> {
    if db.num_modules() == 0 {
        return Err(PlaceError::DegenerateInput("design has no modules".into()));
    }
    if db.num_nets() == 0 {
        return Err(PlaceError::DegenerateInput("design has no nets".into()));
    }
    if db.num_movable() == 0 {
        return Err(PlaceError::DegenerateInput(
            "design has no movable modules".into(),
        ));
    }
    if db.region.width() <= 0.0 || db.region.height() <= 0.0 {
        return Err(PlaceError::DegenerateInput(
            "placement region is empty".into(),
        ));
    }
    for module in &db.modules {
        if module.width > db.region.width() || module.height > db.region.height() {
            return Err(PlaceError::DegenerateInput(format!(
                "module '{}' ({}x{}) does not fit the {}x{} region",
                module.name,
                module.width,
                module.height,
                db.region.width(),
                db.region.height()
            )));
        }
    }
    Ok(())
}

fn run_loop(
    db: &PlacementDB,
    cfg: &GlobalPlacementConfig,
) -> Result<(Vec<Point<f64>>, usize, f64, bool), PlaceError> {
    let num_modules = db.num_modules();
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    // Fixed modules anchor at their committed centers for the whole run.
    let anchors: Vec<Point<f64>> = (0..num_modules)
        .map(|i| db.module_center(ModuleId::new(i)))
        .collect();

    let region_center = db.region.center();
    let jitter = Point::new(
        cfg.jitter_fraction * db.region.width(),
        cfg.jitter_fraction * db.region.height(),
    );
    let mut positions: Vec<Point<f64>> = (0..num_modules)
        .map(|i| {
            if db.modules[i].is_fixed {
                anchors[i]
            } else {
                // Jitter breaks the symmetry of an all-at-center start.
                region_center
                    + Point::new(
                        rng.gen_range(-1.0..1.0) * jitter.x,
                        rng.gen_range(-1.0..1.0) * jitter.y,
                    )
            }
        })
        .collect();

    let mut objective = CompositeObjective::new(db, cfg);
    let (bin_w, bin_h) = objective.bin_size();
    let step_size = cfg.step_size_factor * bin_w.min(bin_h);
    let mut solver = ConjugateGradient::new(step_size, num_modules);
    solver.initialize();

    log::info!(
        "Starting global placement: {} modules ({} movable), {} nets, gamma {:.2}, step {:.2}",
        num_modules,
        db.num_movable(),
        db.num_nets(),
        objective.gamma(),
        step_size
    );

    let mut window_overflow = f64::INFINITY;
    let mut overflow = f64::INFINITY;
    let mut iterations = 0;
    let mut converged = false;
    let mut stopped_early = false;

    for iter in 0..cfg.max_iterations {
        let value = solver.step(&mut objective, &mut positions);
        iterations = iter + 1;

        for i in 0..num_modules {
            if db.modules[i].is_fixed {
                positions[i] = anchors[i];
                continue;
            }
            if !positions[i].is_finite() {
                return Err(PlaceError::NumericalInstability {
                    module: db.modules[i].name.clone(),
                    iteration: iter,
                });
            }
            nudge_inside(db, i, &mut positions[i], &mut rng);
        }

        overflow = objective.overflow_ratio();
        objective.end_iteration();

        if cfg.log_every > 0 && iter % cfg.log_every == 0 {
            log::info!(
                "iter {:5}: cost {:.1}, overflow {:.4}, lambda {:.3e}",
                iter,
                value,
                overflow,
                objective.lambda()
            );
        }

        if overflow <= cfg.overflow_threshold {
            log::info!(
                "Layout spread enough at iteration {} (overflow {:.4}).",
                iter,
                overflow
            );
            converged = true;
            stopped_early = true;
            break;
        }

        if cfg.stagnation_window > 0 && iterations % cfg.stagnation_window == 0 {
            if window_overflow - overflow <= cfg.stagnation_tolerance {
                log::warn!(
                    "Overflow plateaued at {:.4}; stopping with a best-effort layout.",
                    overflow
                );
                stopped_early = true;
                break;
            }
            window_overflow = overflow;
        }
    }

    if !stopped_early {
        log::warn!("Iteration cap reached; proceeding with the current layout.");
    }
    Ok((positions, iterations, overflow, converged))
}

/// Pushes an out-of-bounds module back into the region with a small random
/// offset. A hard clamp here makes modules stick to the boundary and
/// oscillate; randomizing the re-entry point avoids that. The hard clamp
/// happens exactly once, at commit.
fn nudge_inside(db: &PlacementDB, i: usize, pos: &mut Point<f64>, rng: &mut StdRng) {
    let module = &db.modules[i];
    let lo_x = db.region.min.x + module.width / 2.0;
    let hi_x = db.region.max.x - module.width / 2.0;
    let lo_y = db.region.min.y + module.height / 2.0;
    let hi_y = db.region.max.y - module.height / 2.0;

    let nudge_x = (0.01 * db.region.width()).min((hi_x - lo_x) / 2.0).max(0.0);
    let nudge_y = (0.01 * db.region.height()).min((hi_y - lo_y) / 2.0).max(0.0);

    if pos.x < lo_x {
        pos.x = lo_x + rng.gen_range(0.0..=nudge_x);
    } else if pos.x > hi_x {
        pos.x = hi_x - rng.gen_range(0.0..=nudge_x);
    }
    if pos.y < lo_y {
        pos.y = lo_y + rng.gen_range(0.0..=nudge_y);
    } else if pos.y > hi_y {
        pos.y = hi_y - rng.gen_range(0.0..=nudge_y);
    }
}

/// Final commit: clamp every movable module's rectangle fully into the
/// region and convert centers back to the bottom-left corners the database
/// stores. Fixed modules keep their original committed positions.
fn commit(db: &mut PlacementDB, positions: &[Point<f64>]) {
    for i in 0..db.num_modules() {
        if db.modules[i].is_fixed {
            continue;
        }
        let module = &db.modules[i];
        let lo_x = db.region.min.x + module.width / 2.0;
        let hi_x = db.region.max.x - module.width / 2.0;
        let lo_y = db.region.min.y + module.height / 2.0;
        let hi_y = db.region.max.y - module.height / 2.0;
        let center = Point::new(
            positions[i].x.clamp(lo_x, hi_x),
            positions[i].y.clamp(lo_y, hi_y),
        );
        db.set_module_center(ModuleId::new(i), center);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aplace_common::geom::rect::Rect;
    use aplace_common::util::check::worst_overlap_ratio;
    use aplace_common::util::config::BenchmarkConfig;
    use aplace_common::util::generator::generate_random_db;

    fn four_module_db() -> PlacementDB {
        let region = Rect::new(Point::new(0.0, 0.0), Point::new(1000.0, 1000.0));
        let mut db = PlacementDB::new(region);
        let net = db.add_net("n".into());
        for i in 0..4 {
            let m = db.add_module(format!("m{}", i), 100.0, 100.0, false);
            db.add_pin(m, net, Point::new(0.0, 0.0));
        }
        db
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let cfg = GlobalPlacementConfig::default();
        let region = Rect::new(Point::new(0.0, 0.0), Point::new(1000.0, 1000.0));

        let mut empty = PlacementDB::new(region);
        assert!(matches!(
            place(&mut empty, &cfg),
            Err(PlaceError::DegenerateInput(_))
        ));

        let mut no_nets = PlacementDB::new(region);
        no_nets.add_module("a".into(), 10.0, 10.0, false);
        assert!(matches!(
            place(&mut no_nets, &cfg),
            Err(PlaceError::DegenerateInput(_))
        ));

        let mut oversized = PlacementDB::new(region);
        let a = oversized.add_module("a".into(), 2000.0, 50.0, false);
        let b = oversized.add_module("b".into(), 10.0, 10.0, false);
        let n = oversized.add_net("n".into());
        oversized.add_pin(a, n, Point::new(0.0, 0.0));
        oversized.add_pin(b, n, Point::new(0.0, 0.0));
        assert!(matches!(
            place(&mut oversized, &cfg),
            Err(PlaceError::DegenerateInput(_))
        ));
    }

    #[test]
    fn fixed_modules_never_drift() {
        let region = Rect::new(Point::new(0.0, 0.0), Point::new(1000.0, 1000.0));
        let mut db = PlacementDB::new(region);
        let anchor = db.add_module("anchor".into(), 100.0, 100.0, true);
        let m1 = db.add_module("m1".into(), 100.0, 100.0, false);
        let m2 = db.add_module("m2".into(), 100.0, 100.0, false);
        let n = db.add_net("n".into());
        db.add_pin(anchor, n, Point::new(0.0, 0.0));
        db.add_pin(m1, n, Point::new(0.0, 0.0));
        db.add_pin(m2, n, Point::new(0.0, 0.0));
        db.positions[anchor.index()] = Point::new(450.0, 450.0);

        let mut cfg = GlobalPlacementConfig::default();
        cfg.max_iterations = 50;
        cfg.log_every = 1000;

        place(&mut db, &cfg).unwrap();
        assert_eq!(db.positions[anchor.index()], Point::new(450.0, 450.0));
    }

    #[test]
    fn end_to_end_four_modules_spread_within_bounds() {
        let mut db = four_module_db();

        // Four modules on a large die barely register against the default
        // overflow threshold, so tighten it enough to force real spreading.
        let mut cfg = GlobalPlacementConfig::default();
        cfg.bins_per_edge = 8;
        cfg.overflow_threshold = 0.005;
        cfg.lambda_freeze_overflow = 0.004;
        cfg.max_iterations = 2000;
        cfg.stagnation_window = 200;
        cfg.log_every = 500;
        cfg.seed = 7;

        let stats = place(&mut db, &cfg).unwrap();
        assert!(stats.converged);
        assert!(
            stats.overflow <= cfg.overflow_threshold,
            "final overflow {} above threshold",
            stats.overflow
        );

        for i in 0..db.num_modules() {
            let rect = db.module_rect(ModuleId::new(i));
            assert!(
                db.region.contains_rect(&rect),
                "module {} out of bounds: {:?}",
                i,
                rect
            );
        }
        let overlap = worst_overlap_ratio(&db);
        assert!(overlap < 0.05, "worst overlap ratio {}", overlap);
    }

    #[test]
    fn overflow_plateau_stops_early_with_committed_layout() {
        let mut db = four_module_db();

        // Unreachable threshold plus a tolerance that accepts any window
        // sample: the run must exit on the plateau path, not the cap.
        let mut cfg = GlobalPlacementConfig::default();
        cfg.overflow_threshold = 0.0;
        cfg.stagnation_window = 5;
        cfg.stagnation_tolerance = 1e9;
        cfg.max_iterations = 100;
        cfg.log_every = 1000;

        let stats = place(&mut db, &cfg).unwrap();
        assert!(!stats.converged);
        // First window sample only seeds the baseline; the second trips.
        assert_eq!(stats.iterations, 2 * cfg.stagnation_window);
        for i in 0..db.num_modules() {
            let rect = db.module_rect(ModuleId::new(i));
            assert!(db.region.contains_rect(&rect));
        }
    }

    #[test]
    fn iteration_cap_exit_is_not_reported_as_converged() {
        let mut db = four_module_db();

        let mut cfg = GlobalPlacementConfig::default();
        cfg.overflow_threshold = 0.0;
        cfg.stagnation_window = 0;
        cfg.max_iterations = 3;
        cfg.log_every = 1000;

        let stats = place(&mut db, &cfg).unwrap();
        assert!(!stats.converged);
        assert_eq!(stats.iterations, 3);
    }

    #[test]
    fn runaway_step_size_reports_numerical_instability() {
        let mut db = four_module_db();

        // A step size this large overflows the position update to infinity
        // on the first iteration.
        let mut cfg = GlobalPlacementConfig::default();
        cfg.step_size_factor = 1e308;
        cfg.max_iterations = 5;
        cfg.log_every = 1000;

        assert!(matches!(
            place(&mut db, &cfg),
            Err(PlaceError::NumericalInstability { .. })
        ));
    }

    #[test]
    fn identical_seeds_give_identical_layouts() {
        let bench = BenchmarkConfig {
            modules: 30,
            nets: 40,
            utilization: 0.2,
            max_net_degree: 4,
            seed: 11,
        };
        let mut cfg = GlobalPlacementConfig::default();
        cfg.max_iterations = 100;
        cfg.log_every = 1000;

        let mut db_a = generate_random_db(&bench);
        let mut db_b = generate_random_db(&bench);
        place(&mut db_a, &cfg).unwrap();
        place(&mut db_b, &cfg).unwrap();
        assert_eq!(db_a.positions, db_b.positions);
    }
}
