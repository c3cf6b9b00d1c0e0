use crate::db::indices::*;
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct ModuleData {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub is_fixed: bool,
    pub pins: Vec<PinId>,
}

impl ModuleData {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

#[derive(Clone, Debug)]
pub struct NetData {
    pub name: String,
    pub weight: f64,
    pub pins: Vec<PinId>,
}

/// Flat netlist and placement state. Positions are bottom-left corners;
/// the placement engine works with module centers and converts at commit.
pub struct PlacementDB {
    pub modules: Vec<ModuleData>,
    pub nets: Vec<NetData>,

    pub pin_offsets: Vec<Point<f64>>, // offset from the owning module's center
    pub pin_to_module: Vec<ModuleId>,
    pub pin_to_net: Vec<NetId>,

    pub positions: Vec<Point<f64>>,
    pub region: Rect,

    pub module_name_map: HashMap<String, ModuleId>,
    pub net_name_map: HashMap<String, NetId>,
}

impl PlacementDB {
    pub fn new(region: Rect) -> Self {
        Self {
            modules: Vec::with_capacity(1000),
            nets: Vec::with_capacity(1000),
            pin_offsets: Vec::with_capacity(5000),
            pin_to_module: Vec::with_capacity(5000),
            pin_to_net: Vec::with_capacity(5000),
            positions: Vec::with_capacity(1000),
            region,
            module_name_map: HashMap::new(),
            net_name_map: HashMap::new(),
        }
    }

    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }
    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    pub fn num_movable(&self) -> usize {
        self.modules.iter().filter(|m| !m.is_fixed).count()
    }

    pub fn total_module_area(&self) -> f64 {
        self.modules.iter().map(|m| m.area()).sum()
    }

    pub fn add_module(
        &mut self,
        name: String,
        width: f64,
        height: f64,
        is_fixed: bool,
    ) -> ModuleId {
        let id = ModuleId::new(self.modules.len());
        self.modules.push(ModuleData {
            name: name.clone(),
            width,
            height,
            is_fixed,
            pins: Vec::new(),
        });
        self.positions.push(Point::new(0.0, 0.0));
        self.module_name_map.insert(name, id);
        id
    }

    pub fn add_net(&mut self, name: String) -> NetId {
        if let Some(&id) = self.net_name_map.get(&name) {
            return id;
        }
        let id = NetId::new(self.nets.len());
        self.nets.push(NetData {
            name: name.clone(),
            weight: 1.0,
            pins: Vec::new(),
        });
        self.net_name_map.insert(name, id);
        id
    }

    pub fn add_pin(&mut self, module: ModuleId, net: NetId, offset: Point<f64>) -> PinId {
        let pid = PinId::new(self.pin_offsets.len());
        self.pin_offsets.push(offset);
        self.pin_to_module.push(module);
        self.pin_to_net.push(net);

        self.modules[module.index()].pins.push(pid);
        self.nets[net.index()].pins.push(pid);
        pid
    }

    /// Center of a module as currently committed.
    pub fn module_center(&self, id: ModuleId) -> Point<f64> {
        let m = &self.modules[id.index()];
        self.positions[id.index()] + Point::new(m.width / 2.0, m.height / 2.0)
    }

    /// Commit a module position given its center.
    pub fn set_module_center(&mut self, id: ModuleId, center: Point<f64>) {
        let m = &self.modules[id.index()];
        self.positions[id.index()] = center - Point::new(m.width / 2.0, m.height / 2.0);
    }

    pub fn module_rect(&self, id: ModuleId) -> Rect {
        let m = &self.modules[id.index()];
        let pos = self.positions[id.index()];
        Rect::new(pos, pos + Point::new(m.width, m.height))
    }

    /// Pin location for a given owning-module center.
    #[inline]
    pub fn pin_position(&self, pin: PinId, module_center: &Point<f64>) -> Point<f64> {
        *module_center + self.pin_offsets[pin.index()]
    }

    /// Exact half-perimeter wirelength of the committed placement.
    pub fn compute_hpwl(&self) -> f64 {
        let mut total = 0.0;
        for net in &self.nets {
            if net.pins.len() < 2 {
                continue;
            }
            let mut max_x = f64::NEG_INFINITY;
            let mut min_x = f64::INFINITY;
            let mut max_y = f64::NEG_INFINITY;
            let mut min_y = f64::INFINITY;
            for &pin in &net.pins {
                let center = self.module_center(self.pin_to_module[pin.index()]);
                let pos = self.pin_position(pin, &center);
                max_x = max_x.max(pos.x);
                min_x = min_x.min(pos.x);
                max_y = max_y.max(pos.y);
                min_y = min_y.min(pos.y);
            }
            total += net.weight * ((max_x - min_x) + (max_y - min_y));
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hpwl_of_two_pin_net_is_bounding_box_half_perimeter() {
        let region = Rect::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
        let mut db = PlacementDB::new(region);
        let a = db.add_module("a".into(), 10.0, 10.0, false);
        let b = db.add_module("b".into(), 10.0, 10.0, false);
        let n = db.add_net("n1".into());
        db.add_pin(a, n, Point::new(0.0, 0.0));
        db.add_pin(b, n, Point::new(0.0, 0.0));

        db.set_module_center(a, Point::new(10.0, 10.0));
        db.set_module_center(b, Point::new(40.0, 70.0));

        assert!((db.compute_hpwl() - (30.0 + 60.0)).abs() < 1e-12);
    }

    #[test]
    fn center_corner_round_trip() {
        let region = Rect::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
        let mut db = PlacementDB::new(region);
        let a = db.add_module("a".into(), 8.0, 4.0, false);
        db.set_module_center(a, Point::new(50.0, 50.0));
        assert_eq!(db.positions[a.index()], Point::new(46.0, 48.0));
        assert_eq!(db.module_center(a), Point::new(50.0, 50.0));
    }
}
