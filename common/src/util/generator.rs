use crate::db::core::PlacementDB;
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use crate::util::config::BenchmarkConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Builds a synthetic in-memory design: a square region sized from the
/// target utilization, random movable modules, four fixed boundary pads,
/// and random multi-pin nets.
pub fn generate_random_db(cfg: &BenchmarkConfig) -> PlacementDB {
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let sizes: Vec<(f64, f64)> = (0..cfg.modules)
        .map(|_| (rng.gen_range(6.0..12.0), rng.gen_range(6.0..12.0)))
        .collect();
    let total_area: f64 = sizes.iter().map(|(w, h)| w * h).sum();

    let util = cfg.utilization.clamp(0.01, 0.9);
    let die_side = (total_area / util).sqrt();
    let region = Rect::new(Point::new(0.0, 0.0), Point::new(die_side, die_side));

    log::info!(
        "Generating benchmark: {} modules, {} nets, die {:.0}x{:.0} (target util {:.1}%)",
        cfg.modules,
        cfg.nets,
        die_side,
        die_side,
        util * 100.0
    );

    let mut db = PlacementDB::new(region);

    for (i, &(w, h)) in sizes.iter().enumerate() {
        let id = db.add_module(format!("inst{}", i), w, h, false);
        let x = rng.gen_range(0.0..(die_side - w));
        let y = rng.gen_range(0.0..(die_side - h));
        db.positions[id.index()] = Point::new(x, y);
    }

    // Fixed I/O pads at the edge midpoints.
    let pad = 2.0;
    let mid = die_side / 2.0 - pad / 2.0;
    let pad_specs = [
        ("pad_w", 0.0, mid),
        ("pad_e", die_side - pad, mid),
        ("pad_s", mid, 0.0),
        ("pad_n", mid, die_side - pad),
    ];
    let mut pad_ids = Vec::new();
    for (name, x, y) in pad_specs {
        let id = db.add_module(name.to_string(), pad, pad, true);
        db.positions[id.index()] = Point::new(x, y);
        pad_ids.push(id);
    }

    let max_degree = cfg.max_net_degree.max(2);
    for i in 0..cfg.nets {
        let net = db.add_net(format!("net{}", i));
        // Cap the degree at the distinct modules a net can draw from, or the
        // distinct-member sampling below can never finish on tiny designs.
        let available = cfg.modules + usize::from(i < pad_ids.len());
        let degree = rng.gen_range(2..=max_degree).min(available);

        let mut members = Vec::with_capacity(degree);
        if i < pad_ids.len() {
            members.push(pad_ids[i]);
        }
        while members.len() < degree {
            let id = crate::db::indices::ModuleId::new(rng.gen_range(0..cfg.modules));
            if !members.contains(&id) {
                members.push(id);
            }
        }
        for id in members {
            db.add_pin(id, net, Point::new(0.0, 0.0));
        }
    }

    db
}
