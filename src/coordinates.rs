//!
//! # Coordinate systems
//!
//! A [`CoordSys`] is an affine frame defined by its origin and by the rotation matrix whose
//! columns are the frame axes, both expressed in the global frame.
//! A [`CoordTransform`] maps coordinates from one frame into another.

use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::rays::{Ray, RayBatch, RaysError};

/// Tolerance used to decide whether two frames are the same
const FRAME_TOLERANCE: f64 = 1e-12;

/// Rotation matrix around the x axis
pub fn rot_x(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(1., 0., 0., 0., c, -s, 0., s, c)
}
/// Rotation matrix around the y axis
pub fn rot_y(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(c, 0., s, 0., 1., 0., -s, 0., c)
}
/// Rotation matrix around the z axis
pub fn rot_z(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(c, -s, 0., s, c, 0., 0., 0., 1.)
}

/// Affine frame relative to the global frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordSys {
    /// Frame origin in global coordinates
    pub origin: Vector3<f64>,
    /// Frame axes (columns) in global coordinates
    pub rot: Matrix3<f64>,
}
impl Default for CoordSys {
    fn default() -> Self {
        Self::global()
    }
}
impl CoordSys {
    /// Creates a new frame from its origin and orientation
    pub fn new(origin: Vector3<f64>, rot: Matrix3<f64>) -> Self {
        Self { origin, rot }
    }
    /// The global frame
    pub fn global() -> Self {
        Self {
            origin: Vector3::zeros(),
            rot: Matrix3::identity(),
        }
    }
    /// Creates a frame from an origin and the Euler angles `[rx, ry, rz]`
    ///
    /// The rotation is `Rz * Ry * Rx`.
    pub fn from_euler_angles(origin: [f64; 3], euler_angles: [f64; 3]) -> Self {
        let [rx, ry, rz] = euler_angles;
        Self {
            origin: origin.into(),
            rot: rot_z(rz) * rot_y(ry) * rot_x(rx),
        }
    }
    pub fn x_hat(&self) -> Vector3<f64> {
        self.rot.column(0).into_owned()
    }
    pub fn y_hat(&self) -> Vector3<f64> {
        self.rot.column(1).into_owned()
    }
    pub fn z_hat(&self) -> Vector3<f64> {
        self.rot.column(2).into_owned()
    }
    /// Shifts the origin by a vector given in global coordinates
    pub fn shift_global(&self, dr: Vector3<f64>) -> Self {
        Self {
            origin: self.origin + dr,
            ..*self
        }
    }
    /// Shifts the origin by a vector given in this frame coordinates
    pub fn shift_local(&self, dr: Vector3<f64>) -> Self {
        Self {
            origin: self.origin + self.rot * dr,
            ..*self
        }
    }
    /// Rotates the frame by `rot`, given in global coordinates, around the point `center`
    /// expressed in the `center_frame` coordinates
    pub fn rotate_global(
        &self,
        rot: &Matrix3<f64>,
        center: Vector3<f64>,
        center_frame: &CoordSys,
    ) -> Self {
        let c = center_frame.rot * center + center_frame.origin;
        Self {
            origin: rot * (self.origin - c) + c,
            rot: rot * self.rot,
        }
    }
    /// Rotates the frame by `rot`, given in this frame coordinates, around the point `center`
    /// expressed in this frame coordinates
    pub fn rotate_local(&self, rot: &Matrix3<f64>, center: Vector3<f64>) -> Self {
        let c = self.rot * center + self.origin;
        Self {
            origin: self.rot * rot * self.rot.transpose() * (self.origin - c) + c,
            rot: self.rot * rot,
        }
    }
    /// Checks if two frames are the same within `tolerance`
    pub fn approx_eq(&self, other: &CoordSys, tolerance: f64) -> bool {
        (self.origin - other.origin).amax() <= tolerance
            && (self.rot - other.rot).amax() <= tolerance
    }
}

/// Rigid-body transform between two [`CoordSys`]
///
/// Coordinates transform as `p_to = R p_from + d`, velocities as `v_to = R v_from`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordTransform {
    from: CoordSys,
    to: CoordSys,
    rot: Matrix3<f64>,
    dr: Vector3<f64>,
}
impl CoordTransform {
    /// Creates the transform from the frame `from` into the frame `to`
    pub fn new(from: &CoordSys, to: &CoordSys) -> Self {
        let rot_t = to.rot.transpose();
        Self {
            from: *from,
            to: *to,
            rot: rot_t * from.rot,
            dr: rot_t * (from.origin - to.origin),
        }
    }
    pub fn from_sys(&self) -> &CoordSys {
        &self.from
    }
    pub fn to_sys(&self) -> &CoordSys {
        &self.to
    }
    /// Returns the transform from `to` into `from`
    pub fn inverse(&self) -> Self {
        Self::new(&self.to, &self.from)
    }
    pub fn apply_forward_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rot * p + self.dr
    }
    pub fn apply_reverse_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rot.tr_mul(&(p - self.dr))
    }
    pub fn apply_forward_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rot * v
    }
    pub fn apply_reverse_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.rot.tr_mul(v)
    }
    pub(crate) fn forward_ray(&self, ray: &Ray) -> Ray {
        Ray {
            r: self.apply_forward_point(&ray.r),
            v: self.apply_forward_vector(&ray.v),
            ..*ray
        }
    }
    pub(crate) fn reverse_ray(&self, ray: &Ray) -> Ray {
        Ray {
            r: self.apply_reverse_point(&ray.r),
            v: self.apply_reverse_vector(&ray.v),
            ..*ray
        }
    }
    /// Moves the rays from the `from` frame into the `to` frame
    pub fn apply_forward(&self, rays: &mut RayBatch) -> Result<(), RaysError> {
        if !rays.coord_sys.approx_eq(&self.from, FRAME_TOLERANCE) {
            return Err(RaysError::CoordSys);
        }
        (rays.r.par_iter_mut(), rays.v.par_iter_mut())
            .into_par_iter()
            .for_each(|(r, v)| {
                *r = self.apply_forward_point(r);
                *v = self.apply_forward_vector(v);
            });
        rays.coord_sys = self.to;
        Ok(())
    }
    /// Moves the rays from the `to` frame back into the `from` frame
    pub fn apply_reverse(&self, rays: &mut RayBatch) -> Result<(), RaysError> {
        if !rays.coord_sys.approx_eq(&self.to, FRAME_TOLERANCE) {
            return Err(RaysError::CoordSys);
        }
        (rays.r.par_iter_mut(), rays.v.par_iter_mut())
            .into_par_iter()
            .for_each(|(r, v)| {
                *r = self.apply_reverse_point(r);
                *v = self.apply_reverse_vector(v);
            });
        rays.coord_sys = self.from;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, FromBuilder};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::FRAC_PI_2;

    fn random_frame(rng: &mut StdRng) -> CoordSys {
        CoordSys::from_euler_angles(
            [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ],
            [
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-3.0..3.0),
            ],
        )
    }

    #[test]
    fn rotations_are_orthonormal() {
        let rot = rot_z(0.3) * rot_y(-1.2) * rot_x(2.1);
        assert!((rot * rot.transpose() - Matrix3::identity()).amax() < 1e-15);
        assert!((rot.determinant() - 1.).abs() < 1e-15);
    }

    #[test]
    fn rot_x_maps_y_to_z() {
        let v = rot_x(FRAC_PI_2) * Vector3::y();
        assert!((v - Vector3::z()).amax() < 1e-15);
    }

    #[test]
    fn shift_local_follows_axes() {
        let cs = CoordSys::global()
            .rotate_local(&rot_z(FRAC_PI_2), Vector3::zeros())
            .shift_local(Vector3::new(1., 0., 0.));
        assert!((cs.origin - Vector3::new(0., 1., 0.)).amax() < 1e-15);
    }

    #[test]
    fn point_transform_round_trip() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let transform = CoordTransform::new(&random_frame(&mut rng), &random_frame(&mut rng));
            let p = Vector3::new(
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
            );
            let q = transform.apply_reverse_point(&transform.apply_forward_point(&p));
            assert!((p - q).amax() < 1e-12);
        }
    }

    #[test]
    fn global_point_is_frame_invariant() {
        let mut rng = StdRng::seed_from_u64(57);
        let a = random_frame(&mut rng);
        let b = random_frame(&mut rng);
        let p_a = Vector3::new(0.1, -0.2, 0.3);
        let p_b = CoordTransform::new(&a, &b).apply_forward_point(&p_a);
        let global_from_a = a.rot * p_a + a.origin;
        let global_from_b = b.rot * p_b + b.origin;
        assert!((global_from_a - global_from_b).amax() < 1e-12);
    }

    #[test]
    fn batch_transform_round_trip() {
        let mut rng = StdRng::seed_from_u64(577);
        let n = 1000;
        let coords = |rng: &mut StdRng| -> Vec<f64> {
            (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
        };
        let from = random_frame(&mut rng);
        let to = random_frame(&mut rng);
        let rays = RayBatch::builder()
            .position(coords(&mut rng), coords(&mut rng), coords(&mut rng))
            .velocity(coords(&mut rng), coords(&mut rng), coords(&mut rng))
            .wavelength(500e-9)
            .coord_sys(from)
            .build()
            .unwrap();
        let transform = CoordTransform::new(&from, &to);
        let mut moved = rays.clone();
        transform.apply_forward(&mut moved).unwrap();
        assert_eq!(moved.coord_sys(), &to);
        transform.apply_reverse(&mut moved).unwrap();
        assert_eq!(moved.coord_sys(), &from);
        for (a, b) in rays.r().iter().zip(moved.r()) {
            assert!((a - b).amax() < 1e-10);
        }
        for (a, b) in rays.v().iter().zip(moved.v()) {
            assert!((a - b).amax() < 1e-10);
        }
    }

    #[test]
    fn frame_mismatch_is_an_error() {
        let mut rays = RayBatch::builder()
            .position(0., 0., 0.)
            .velocity(0., 0., 1.)
            .wavelength(500e-9)
            .build()
            .unwrap();
        let transform = CoordTransform::new(
            &CoordSys::global().shift_global(Vector3::new(0., 0., 1.)),
            &CoordSys::global(),
        );
        assert!(matches!(
            transform.apply_forward(&mut rays),
            Err(RaysError::CoordSys)
        ));
    }
}
