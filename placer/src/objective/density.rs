use super::Objective;
use aplace_common::db::core::PlacementDB;
use aplace_common::geom::point::Point;

/// Bin-density penalty with a separable bell-shaped spreading kernel.
///
/// The region is discretized into a fixed grid of bins. Every module deposits
/// occupancy into the bins whose centers fall inside its kernel support
/// (footprint plus a two-bin halo); the deposit is scaled so the module's
/// total occupancy equals its area in bin units. Cost is the sum of squared
/// deviations of bin occupancy from the target `mb`; the overflow ratio sums
/// only the positive deviations and is the driver's legality signal.
pub struct SpatialDensity<'a> {
    db: &'a PlacementDB,
    bins_x: usize,
    bins_y: usize,
    bin_w: f64,
    bin_h: f64,
    target: f64,
    bin_density: Vec<f64>,
    overflow: f64,
    // Kernel-row scratch, refilled per module.
    px: Vec<f64>,
    py: Vec<f64>,
    dpx: Vec<f64>,
    dpy: Vec<f64>,
}

/// Piecewise bell kernel, C1-continuous at both breakpoints:
/// `1 - d^2/(inner*outer)` inside the core radius, a quadratic falloff
/// `(|d| - outer)^2/(bin*outer)` out to the support radius, zero beyond.
/// `inner = half_extent + bin`, `outer = half_extent + 2*bin`.
fn bell(d: f64, inner: f64, outer: f64, bin: f64) -> f64 {
    let ad = d.abs();
    if ad <= inner {
        1.0 - ad * ad / (inner * outer)
    } else if ad <= outer {
        let t = ad - outer;
        t * t / (bin * outer)
    } else {
        0.0
    }
}

fn bell_derivative(d: f64, inner: f64, outer: f64, bin: f64) -> f64 {
    let ad = d.abs();
    let slope = if ad <= inner {
        -2.0 * ad / (inner * outer)
    } else if ad <= outer {
        2.0 * (ad - outer) / (bin * outer)
    } else {
        0.0
    };
    if d < 0.0 { -slope } else { slope }
}

/// Fills `values` (and `derivs` when present) with the kernel evaluated at
/// every bin center a module at coordinate `v` can influence. Returns the
/// first bin index, the kernel sum, and the sum of derivatives.
fn kernel_row(
    v: f64,
    half_extent: f64,
    region_min: f64,
    bin: f64,
    bins: usize,
    values: &mut Vec<f64>,
    mut derivs: Option<&mut Vec<f64>>,
) -> (usize, f64, f64) {
    let inner = half_extent + bin;
    let outer = half_extent + 2.0 * bin;
    let last = bins as isize - 1;
    let start = (((v - outer - region_min) / bin).floor() as isize).clamp(0, last) as usize;
    let end = (((v + outer - region_min) / bin).ceil() as isize).clamp(0, last) as usize;

    values.clear();
    if let Some(d) = derivs.as_deref_mut() {
        d.clear();
    }

    let mut sum = 0.0;
    let mut dsum = 0.0;
    for j in start..=end {
        let center = region_min + (j as f64 + 0.5) * bin;
        let d = v - center;
        let p = bell(d, inner, outer, bin);
        sum += p;
        values.push(p);
        if let Some(dv) = derivs.as_deref_mut() {
            let dp = bell_derivative(d, inner, outer, bin);
            dsum += dp;
            dv.push(dp);
        }
    }
    (start, sum, dsum)
}

impl<'a> SpatialDensity<'a> {
    pub fn new(db: &'a PlacementDB, bins_per_edge: usize, density_multiplier: f64) -> Self {
        debug_assert!(bins_per_edge > 0);
        let bins_x = bins_per_edge;
        let bins_y = bins_per_edge;
        let bin_w = db.region.width() / bins_x as f64;
        let bin_h = db.region.height() / bins_y as f64;
        // Calibrated above raw utilization: with the smoothing halo, a target
        // of exactly total-area/region-area over-penalizes and collapses the
        // layout toward degenerate uniform smearing.
        let target = db.total_module_area() / db.region.area() * density_multiplier;
        Self {
            db,
            bins_x,
            bins_y,
            bin_w,
            bin_h,
            target,
            bin_density: vec![0.0; bins_x * bins_y],
            overflow: 0.0,
            px: Vec::new(),
            py: Vec::new(),
            dpx: Vec::new(),
            dpy: Vec::new(),
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn bin_size(&self) -> (f64, f64) {
        (self.bin_w, self.bin_h)
    }

    /// Normalized sum of positive bin-density deviations from the last
    /// forward pass; tends to zero as the layout spreads out.
    pub fn overflow_ratio(&self) -> f64 {
        self.overflow
    }

    /// Rebuilds the bin grid from scratch and returns the density cost.
    fn forward(&mut self, positions: &[Point<f64>]) -> f64 {
        self.bin_density.fill(0.0);
        let bin_area = self.bin_w * self.bin_h;

        for (i, module) in self.db.modules.iter().enumerate() {
            let pos = positions[i];
            let (start_x, sum_x, _) = kernel_row(
                pos.x,
                module.width / 2.0,
                self.db.region.min.x,
                self.bin_w,
                self.bins_x,
                &mut self.px,
                None,
            );
            let (start_y, sum_y, _) = kernel_row(
                pos.y,
                module.height / 2.0,
                self.db.region.min.y,
                self.bin_h,
                self.bins_y,
                &mut self.py,
                None,
            );

            let support = sum_x * sum_y;
            if support <= f64::EPSILON {
                continue; // module entirely outside the grid's reach
            }
            let scale = module.area() / bin_area / support;

            for (ky, &py) in self.py.iter().enumerate() {
                let row = (start_y + ky) * self.bins_x + start_x;
                for (kx, &px) in self.px.iter().enumerate() {
                    self.bin_density[row + kx] += scale * px * py;
                }
            }
        }

        let mut value = 0.0;
        let mut overflow = 0.0;
        for &d in &self.bin_density {
            let dev = d - self.target;
            value += dev * dev;
            if dev > 0.0 {
                overflow += dev;
            }
        }
        self.overflow = overflow / (self.bins_x * self.bins_y) as f64;
        value
    }

    /// Per-module gradient of the squared-deviation sum against the bin
    /// snapshot produced by the matching forward pass. The position
    /// derivative of the area-normalization factor is included, so the
    /// analytic gradient agrees with finite differences.
    fn backward(&mut self, positions: &[Point<f64>], grad: &mut [Point<f64>]) {
        let bin_area = self.bin_w * self.bin_h;

        for (i, module) in self.db.modules.iter().enumerate() {
            grad[i] = Point::default();
            let pos = positions[i];
            let (start_x, sum_x, dsum_x) = kernel_row(
                pos.x,
                module.width / 2.0,
                self.db.region.min.x,
                self.bin_w,
                self.bins_x,
                &mut self.px,
                Some(&mut self.dpx),
            );
            let (start_y, sum_y, dsum_y) = kernel_row(
                pos.y,
                module.height / 2.0,
                self.db.region.min.y,
                self.bin_h,
                self.bins_y,
                &mut self.py,
                Some(&mut self.dpy),
            );

            let support = sum_x * sum_y;
            if support <= f64::EPSILON {
                continue;
            }
            let scale = module.area() / bin_area / support;

            let mut gx = 0.0;
            let mut gy = 0.0;
            for (ky, &py) in self.py.iter().enumerate() {
                let dpy = self.dpy[ky];
                let row = (start_y + ky) * self.bins_x + start_x;
                for (kx, &px) in self.px.iter().enumerate() {
                    let dpx = self.dpx[kx];
                    let dev = self.bin_density[row + kx] - self.target;
                    // Product rule on scale(pos) * px * py: the kernel-row
                    // derivative plus the normalization's own derivative.
                    gx += 2.0 * dev * scale * py * (dpx - px * dsum_x / sum_x);
                    gy += 2.0 * dev * scale * px * (dpy - py * dsum_y / sum_y);
                }
            }
            grad[i] = Point::new(gx, gy);
        }
    }
}

impl Objective for SpatialDensity<'_> {
    fn evaluate(&mut self, positions: &[Point<f64>]) -> f64 {
        self.forward(positions)
    }

    fn gradient(&mut self, positions: &[Point<f64>], grad: &mut [Point<f64>]) -> f64 {
        let value = self.forward(positions);
        self.backward(positions, grad);
        value
    }
}
