use crate::db::core::PlacementDB;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

const BOUNDS_TOLERANCE: f64 = 1e-6;

/// Worst pairwise overlap, reported as a fraction of the smaller module's
/// area. Global placement is allowed to leave small residual overlaps; this
/// quantifies how far from legal the layout still is.
pub fn worst_overlap_ratio(db: &PlacementDB) -> f64 {
    (0..db.num_modules())
        .into_par_iter()
        .map(|i| {
            let r1 = db.module_rect(crate::db::indices::ModuleId::new(i));
            let a1 = db.modules[i].area();
            let mut worst: f64 = 0.0;
            for j in (i + 1)..db.num_modules() {
                let r2 = db.module_rect(crate::db::indices::ModuleId::new(j));
                let overlap = r1.overlap_area(&r2);
                if overlap > 0.0 {
                    let ratio = overlap / a1.min(db.modules[j].area());
                    worst = worst.max(ratio);
                }
            }
            worst
        })
        .reduce(|| 0.0, f64::max)
}

/// Post-placement verification: every module inside the region, residual
/// overlap below the given fraction of module area.
pub fn run_placement_check(db: &PlacementDB, max_overlap_ratio: f64) -> Result<(), String> {
    log::info!("Starting placement verification...");
    let valid = AtomicBool::new(true);

    db.modules.par_iter().enumerate().for_each(|(i, module)| {
        let rect = db.module_rect(crate::db::indices::ModuleId::new(i));
        if rect.min.x < db.region.min.x - BOUNDS_TOLERANCE
            || rect.min.y < db.region.min.y - BOUNDS_TOLERANCE
            || rect.max.x > db.region.max.x + BOUNDS_TOLERANCE
            || rect.max.y > db.region.max.y + BOUNDS_TOLERANCE
        {
            log::error!("FAIL: module '{}' out of bounds.", module.name);
            valid.store(false, Ordering::Relaxed);
        }
    });

    let overlap = worst_overlap_ratio(db);
    if overlap > max_overlap_ratio {
        log::error!(
            "FAIL: worst module overlap is {:.1}% of module area (limit {:.1}%).",
            overlap * 100.0,
            max_overlap_ratio * 100.0
        );
        valid.store(false, Ordering::Relaxed);
    } else {
        log::info!(
            "Worst module overlap: {:.2}% of module area.",
            overlap * 100.0
        );
    }

    if valid.load(Ordering::Relaxed) {
        log::info!("\x1b[32mPASS\x1b[0m: placement is within bounds and overlap budget.");
        Ok(())
    } else {
        Err("Placement verification failed.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::point::Point;
    use crate::geom::rect::Rect;

    fn two_module_db(c1: Point<f64>, c2: Point<f64>) -> PlacementDB {
        let region = Rect::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
        let mut db = PlacementDB::new(region);
        let a = db.add_module("a".into(), 10.0, 10.0, false);
        let b = db.add_module("b".into(), 10.0, 10.0, false);
        db.set_module_center(a, c1);
        db.set_module_center(b, c2);
        db
    }

    #[test]
    fn disjoint_modules_pass() {
        let db = two_module_db(Point::new(20.0, 20.0), Point::new(80.0, 80.0));
        assert_eq!(worst_overlap_ratio(&db), 0.0);
        assert!(run_placement_check(&db, 0.05).is_ok());
    }

    #[test]
    fn heavy_overlap_fails() {
        let db = two_module_db(Point::new(50.0, 50.0), Point::new(51.0, 50.0));
        assert!(worst_overlap_ratio(&db) > 0.5);
        assert!(run_placement_check(&db, 0.05).is_err());
    }

    #[test]
    fn out_of_bounds_fails() {
        let db = two_module_db(Point::new(2.0, 50.0), Point::new(80.0, 80.0));
        assert!(run_placement_check(&db, 0.05).is_err());
    }
}
