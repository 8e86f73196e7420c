use nalgebra::Vector3;

use super::{conic::Conic, newton_root, plane_root};

/// Conic plus the even polynomial `Σ c_k r^(2k+4)`
pub struct Asphere<'a> {
    pub conic: Conic,
    pub coefs: &'a [f64],
}
impl<'a> Asphere<'a> {
    pub fn new(radius: f64, constant: f64, coefs: &'a [f64]) -> Self {
        Self {
            conic: Conic::new(radius, constant),
            coefs,
        }
    }
    pub fn sag(&self, x: f64, y: f64) -> Option<f64> {
        let r2 = x * x + y * y;
        let mut rn = r2 * r2;
        let mut z = self.conic.sag(r2)?;
        for c in self.coefs {
            z += c * rn;
            rn *= r2;
        }
        Some(z)
    }
    pub fn gradient(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let r2 = x * x + y * y;
        let mut dzdr_over_r = self.conic.dzdr_over_r(r2)?;
        let mut rn = r2;
        for (k, c) in self.coefs.iter().enumerate() {
            dzdr_over_r += (2 * k + 4) as f64 * c * rn;
            rn *= r2;
        }
        Some((x * dzdr_over_r, y * dzdr_over_r))
    }
    /// Propagation times refined by Newton iterations from the conic intersections
    pub fn roots(&self, r: &Vector3<f64>, v: &Vector3<f64>) -> [Option<f64>; 2] {
        let mut starts = self.conic.roots(r, v);
        if starts.iter().all(Option::is_none) {
            starts[0] = plane_root(r, v, 0., 0.);
        }
        starts.map(|start| {
            start.and_then(|dt| {
                newton_root(|x, y| self.sag(x, y), |x, y| self.gradient(x, y), r, v, dt)
            })
        })
    }
}
