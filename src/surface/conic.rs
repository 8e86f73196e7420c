use nalgebra::Vector3;
use roots::find_roots_quadratic;

use super::BRANCH_TOLERANCE;

/// Conic of revolution `r² - 2 R z + (1 + κ) z² = 0`
///
/// `κ = 0` is a sphere, `κ = -1` a paraboloid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conic {
    /// Radius of curvature at the vertex
    pub radius: f64,
    /// Conic constant
    pub constant: f64,
}
impl Conic {
    pub fn new(radius: f64, constant: f64) -> Self {
        Self { radius, constant }
    }
    /// `sqrt(1 - (1 + κ) r² / R²)`, `None` outside the conic domain
    fn s(&self, r2: f64) -> Option<f64> {
        let s2 = 1. - (1. + self.constant) * r2 / (self.radius * self.radius);
        (s2 >= 0.).then(|| s2.sqrt())
    }
    /// Sag at the squared radial distance `r2`
    pub fn sag(&self, r2: f64) -> Option<f64> {
        self.s(r2).map(|s| r2 / (self.radius * (1. + s)))
    }
    /// `dz/dr / r`, so that `dz/dx = x * dzdr_over_r`
    pub fn dzdr_over_r(&self, r2: f64) -> Option<f64> {
        self.s(r2)
            .filter(|s| *s > 0.)
            .map(|s| (self.radius * s).recip())
    }
    /// Checks that `z` lies on the sheet described by the sag function
    fn on_branch(&self, z: f64) -> bool {
        1. - (1. + self.constant) * z / self.radius >= -BRANCH_TOLERANCE
    }
    /// Propagation times from `r` along `v` to the sheet of the conic described by the sag
    pub fn roots(&self, r: &Vector3<f64>, v: &Vector3<f64>) -> [Option<f64>; 2] {
        let k1 = 1. + self.constant;
        let a = v.x * v.x + v.y * v.y + k1 * v.z * v.z;
        let b = 2. * (r.x * v.x + r.y * v.y) - 2. * self.radius * v.z + 2. * k1 * r.z * v.z;
        let c = r.x * r.x + r.y * r.y - 2. * self.radius * r.z + k1 * r.z * r.z;
        let check = |dt: f64| (dt.is_finite() && self.on_branch(r.z + v.z * dt)).then_some(dt);
        match find_roots_quadratic(a, b, c) {
            roots::Roots::One([dt]) => [check(dt), None],
            roots::Roots::Two([dt1, dt2]) => [check(dt1), check(dt2)],
            _ => [None, None],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_sag() {
        let radius = 2.5;
        let sphere = Conic::new(radius, 0.);
        for r in [0., 0.1, 1., 2., 2.5] {
            let z = sphere.sag(r * r).unwrap();
            let expected = radius - (radius * radius - r * r).sqrt();
            assert!((z - expected).abs() <= 1e-12 * expected.abs().max(1e-12));
        }
        assert!(sphere.sag(2.6f64.powi(2)).is_none());
    }

    #[test]
    fn paraboloid_sag() {
        let paraboloid = Conic::new(-8., -1.);
        let z = paraboloid.sag(4.).unwrap();
        assert!((z + 0.25).abs() < 1e-15);
    }

    #[test]
    fn sphere_intersection_picks_the_sag_branch() {
        let sphere = Conic::new(1., 0.);
        let r = Vector3::new(0.3, 0., 5.);
        let v = Vector3::new(0., 0., -1.);
        let dts: Vec<_> = sphere.roots(&r, &v).into_iter().flatten().collect();
        assert_eq!(dts.len(), 1);
        let z = r.z + v.z * dts[0];
        assert!((z - sphere.sag(0.09).unwrap()).abs() < 1e-14);
    }
}
