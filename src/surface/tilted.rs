use nalgebra::Vector3;

use super::plane_root;

/// Plane `z = x tan(θx) + y tan(θy)`
pub struct Tilted {
    pub tanx: f64,
    pub tany: f64,
}
impl Tilted {
    pub fn sag(&self, x: f64, y: f64) -> f64 {
        x * self.tanx + y * self.tany
    }
    pub fn gradient(&self) -> (f64, f64) {
        (self.tanx, self.tany)
    }
    pub fn roots(&self, r: &Vector3<f64>, v: &Vector3<f64>) -> [Option<f64>; 2] {
        [plane_root(r, v, self.tanx, self.tany), None]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_lies_on_the_plane() {
        let tilted = Tilted {
            tanx: 0.1,
            tany: -0.05,
        };
        let r = Vector3::new(0.2, 0.3, 2.);
        let v = Vector3::new(0.01, -0.02, -1.).normalize();
        let dt = tilted.roots(&r, &v)[0].unwrap();
        let p = r + v * dt;
        assert!((p.z - tilted.sag(p.x, p.y)).abs() < 1e-14);
    }

    #[test]
    fn parallel_ray_misses() {
        let tilted = Tilted { tanx: 0., tany: 0. };
        let r = Vector3::new(0., 0., 1.);
        assert!(tilted.roots(&r, &Vector3::x())[0].is_none());
    }
}
