//!
//! # Rays
//!
//! A [`Ray`] is a single ray value and a [`RayBatch`] a structure of arrays over many of them.
//!
//! Positions are in meters, velocities in units of the speed of light (`|v| = 1/n`),
//! time in meters (`c t`) and wavelengths are vacuum wavelengths in meters.

use std::{f64::consts::PI, fmt::Display};

use nalgebra::{Complex, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::coordinates::{CoordSys, CoordTransform};

mod builder;
pub use builder::{Column, RayBatchBuilder};

#[derive(Debug, thiserror::Error)]
pub enum RaysError {
    #[error("column `{column}` has {len} entries, expected 1 or {expected}")]
    Shape {
        column: &'static str,
        len: usize,
        expected: usize,
    },
    #[error("missing `{0}` column")]
    Missing(&'static str),
    #[error("rays wavelength is not set")]
    MissingWavelength,
    #[error("invalid wavelength {value} for ray #{index}")]
    Wavelength { index: usize, value: f64 },
    #[error("rays coordinate system does not match the transform source frame")]
    CoordSys,
}

/// Ray status
///
/// The status only ever increases: a vignetted ray stays vignetted and a failed ray stays failed.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum RayStatus {
    #[default]
    Ok,
    Vignetted,
    Failed,
}
impl RayStatus {
    /// Status from the vignetted and failed flags
    pub fn from_flags(vignetted: bool, failed: bool) -> Self {
        if failed {
            Self::Failed
        } else if vignetted {
            Self::Vignetted
        } else {
            Self::Ok
        }
    }
    /// Raises the status to `other` if `other` is worse
    pub fn raise(&mut self, other: RayStatus) {
        *self = (*self).max(other);
    }
    /// A failed ray is also vignetted
    pub fn is_vignetted(&self) -> bool {
        *self >= Self::Vignetted
    }
    pub fn is_failed(&self) -> bool {
        *self == Self::Failed
    }
}

/// A single ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub r: Vector3<f64>,
    pub v: Vector3<f64>,
    pub t: f64,
    pub wavelength: f64,
    pub flux: f64,
    pub status: RayStatus,
}
impl Ray {
    /// Creates a new ray with unit flux
    pub fn new(r: Vector3<f64>, v: Vector3<f64>, t: f64, wavelength: f64) -> Self {
        Self {
            r,
            v,
            t,
            wavelength,
            flux: 1.,
            status: RayStatus::Ok,
        }
    }
    pub fn vignetted(&self) -> bool {
        self.status.is_vignetted()
    }
    pub fn failed(&self) -> bool {
        self.status.is_failed()
    }
    /// Refractive index of the medium the ray is travelling in
    pub fn n(&self) -> f64 {
        self.v.norm().recip()
    }
    /// Position of the ray at time `t`
    pub fn position_at_time(&self, t: f64) -> Vector3<f64> {
        self.r + self.v * (t - self.t)
    }
    /// Returns the ray moved to time `t`
    pub fn propagated_to_time(&self, t: f64) -> Self {
        Self {
            r: self.position_at_time(t),
            t,
            ..*self
        }
    }
    /// Wave vector `2π v / (λ |v|²)`
    pub fn k(&self) -> Vector3<f64> {
        self.v * (2. * PI / (self.wavelength * self.v.norm_squared()))
    }
    /// Temporal frequency `2π / λ`
    pub fn omega(&self) -> f64 {
        2. * PI / self.wavelength
    }
    /// Phase of the ray wave at position `r` and time `t`
    pub fn phase(&self, r: &Vector3<f64>, t: f64) -> f64 {
        self.k().dot(&(r - self.r)) - (t - self.t) * self.omega()
    }
    /// Unit complex amplitude of the ray wave at position `r` and time `t`
    pub fn amplitude(&self, r: &Vector3<f64>, t: f64) -> Complex<f64> {
        Complex::from_polar(1., self.phase(r, t))
    }
    /// Returns the ray travelling backward in time
    pub fn reversed(&self) -> Self {
        Self {
            v: -self.v,
            t: -self.t,
            ..*self
        }
    }
}
impl Display for Ray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Ray: r = [{:+.6e},{:+.6e},{:+.6e}], v = [{:+.6e},{:+.6e},{:+.6e}]",
            self.r.x, self.r.y, self.r.z, self.v.x, self.v.y, self.v.z
        )?;
        write!(
            f,
            "     t = {:.6e}, wavelength = {:.1}nm, flux = {}, status = {:?}",
            self.t,
            self.wavelength * 1e9,
            self.flux,
            self.status
        )
    }
}

/// Structure of arrays over a bundle of rays
///
/// The number of rays is set at construction and never changes.
/// Use [`RayBatch::builder`](crate::FromBuilder::builder) to create a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RayBatch {
    pub(crate) r: Vec<Vector3<f64>>,
    pub(crate) v: Vec<Vector3<f64>>,
    pub(crate) t: Vec<f64>,
    pub(crate) wavelength: Vec<f64>,
    pub(crate) flux: Vec<f64>,
    pub(crate) status: Vec<RayStatus>,
    pub(crate) coord_sys: CoordSys,
}
impl RayBatch {
    /// Creates a batch from a slice of rays expressed in `coord_sys`
    pub fn from_rays(rays: &[Ray], coord_sys: CoordSys) -> Self {
        let mut batch = Self {
            r: Vec::with_capacity(rays.len()),
            v: Vec::with_capacity(rays.len()),
            t: Vec::with_capacity(rays.len()),
            wavelength: Vec::with_capacity(rays.len()),
            flux: Vec::with_capacity(rays.len()),
            status: Vec::with_capacity(rays.len()),
            coord_sys,
        };
        for ray in rays {
            batch.r.push(ray.r);
            batch.v.push(ray.v);
            batch.t.push(ray.t);
            batch.wavelength.push(ray.wavelength);
            batch.flux.push(ray.flux);
            batch.status.push(ray.status);
        }
        batch
    }
    /// Number of rays
    pub fn len(&self) -> usize {
        self.r.len()
    }
    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }
    /// Returns the ray at `index`
    pub fn ray(&self, index: usize) -> Option<Ray> {
        (index < self.len()).then(|| Ray {
            r: self.r[index],
            v: self.v[index],
            t: self.t[index],
            wavelength: self.wavelength[index],
            flux: self.flux[index],
            status: self.status[index],
        })
    }
    /// Iterator over the rays
    pub fn iter(&self) -> impl Iterator<Item = Ray> + '_ {
        (0..self.len()).filter_map(|i| self.ray(i))
    }
    pub fn coord_sys(&self) -> &CoordSys {
        &self.coord_sys
    }
    pub fn r(&self) -> &[Vector3<f64>] {
        &self.r
    }
    pub fn v(&self) -> &[Vector3<f64>] {
        &self.v
    }
    pub fn x(&self) -> Vec<f64> {
        self.r.iter().map(|r| r.x).collect()
    }
    pub fn y(&self) -> Vec<f64> {
        self.r.iter().map(|r| r.y).collect()
    }
    pub fn z(&self) -> Vec<f64> {
        self.r.iter().map(|r| r.z).collect()
    }
    pub fn vx(&self) -> Vec<f64> {
        self.v.iter().map(|v| v.x).collect()
    }
    pub fn vy(&self) -> Vec<f64> {
        self.v.iter().map(|v| v.y).collect()
    }
    pub fn vz(&self) -> Vec<f64> {
        self.v.iter().map(|v| v.z).collect()
    }
    pub fn t(&self) -> &[f64] {
        &self.t
    }
    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }
    pub fn flux(&self) -> &[f64] {
        &self.flux
    }
    pub fn status(&self) -> &[RayStatus] {
        &self.status
    }
    pub fn vignetted(&self) -> Vec<bool> {
        self.status.iter().map(|s| s.is_vignetted()).collect()
    }
    pub fn failed(&self) -> Vec<bool> {
        self.status.iter().map(|s| s.is_failed()).collect()
    }
    /// Number of vignetted rays, failed rays included
    pub fn n_vignetted(&self) -> usize {
        self.status.iter().filter(|s| s.is_vignetted()).count()
    }
    pub fn n_failed(&self) -> usize {
        self.status.iter().filter(|s| s.is_failed()).count()
    }
    /// Checks that every wavelength is positive and finite
    pub fn validate(&self) -> Result<(), RaysError> {
        match self
            .wavelength
            .iter()
            .enumerate()
            .find(|(_, w)| !(w.is_finite() && **w > 0.))
        {
            Some((index, &value)) => Err(RaysError::Wavelength { index, value }),
            None => Ok(()),
        }
    }
    /// Positions of the rays at time `t`
    pub fn position_at_time(&self, t: f64) -> Vec<Vector3<f64>> {
        self.iter().map(|ray| ray.position_at_time(t)).collect()
    }
    /// Moves, in place, all the rays to time `t`
    pub fn propagate(&mut self, t: f64) {
        (self.r.par_iter_mut(), self.v.par_iter(), self.t.par_iter_mut())
            .into_par_iter()
            .for_each(|(r, v, ti)| {
                *r += v * (t - *ti);
                *ti = t;
            });
    }
    /// Returns a copy of the rays moved to time `t`
    pub fn propagated_to_time(&self, t: f64) -> Self {
        let mut rays = self.clone();
        rays.propagate(t);
        rays
    }
    pub fn k(&self) -> Vec<Vector3<f64>> {
        self.iter().map(|ray| ray.k()).collect()
    }
    pub fn omega(&self) -> Vec<f64> {
        self.wavelength.iter().map(|w| 2. * PI / w).collect()
    }
    /// Phases of the rays at position `r` and time `t`
    pub fn phase(&self, r: &Vector3<f64>, t: f64) -> Vec<f64> {
        self.iter().map(|ray| ray.phase(r, t)).collect()
    }
    /// Complex amplitudes of the rays at position `r` and time `t`
    pub fn amplitude(&self, r: &Vector3<f64>, t: f64) -> Vec<Complex<f64>> {
        self.iter().map(|ray| ray.amplitude(r, t)).collect()
    }
    /// Sum of the complex amplitudes of the rays at position `r` and time `t`
    pub fn sum_amplitude(&self, r: &Vector3<f64>, t: f64, ignore_vignetted: bool) -> Complex<f64> {
        self.iter()
            .filter(|ray| !(ignore_vignetted && ray.vignetted()))
            .map(|ray| ray.amplitude(r, t))
            .sum()
    }
    /// Expresses, in place, the rays in the coordinate system `coord_sys`
    pub fn to_coord_sys(&mut self, coord_sys: &CoordSys) -> Result<(), RaysError> {
        CoordTransform::new(&self.coord_sys, coord_sys).apply_forward(self)
    }
    /// Returns a copy of the rays that are not vignetted
    ///
    /// The length of `self` is left untouched, the returned batch may be shorter.
    pub fn unvignetted(&self) -> Self {
        let rays: Vec<_> = self.iter().filter(|ray| !ray.vignetted()).collect();
        Self::from_rays(&rays, self.coord_sys)
    }
    /// Returns a copy of the rays travelling backward in time
    pub fn reversed(&self) -> Self {
        Self {
            v: self.v.iter().map(|v| -v).collect(),
            t: self.t.iter().map(|t| -t).collect(),
            ..self.clone()
        }
    }
    /// Applies `f` to every ray in parallel
    pub(crate) fn par_update<F>(&mut self, f: F)
    where
        F: Fn(Ray) -> Ray + Send + Sync,
    {
        (
            self.r.par_iter_mut(),
            self.v.par_iter_mut(),
            self.t.par_iter_mut(),
            self.wavelength.par_iter(),
            self.flux.par_iter_mut(),
            self.status.par_iter_mut(),
        )
            .into_par_iter()
            .for_each(|(r, v, t, &wavelength, flux, status)| {
                let ray = f(Ray {
                    r: *r,
                    v: *v,
                    t: *t,
                    wavelength,
                    flux: *flux,
                    status: *status,
                });
                *r = ray.r;
                *v = ray.v;
                *t = ray.t;
                *flux = ray.flux;
                status.raise(ray.status);
            });
    }
}
impl Display for RayBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RayBatch: {} rays ({} vignetted, {} failed), origin = [{:+.3},{:+.3},{:+.3}]",
            self.len(),
            self.n_vignetted(),
            self.n_failed(),
            self.coord_sys.origin.x,
            self.coord_sys.origin.y,
            self.coord_sys.origin.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, FromBuilder};

    fn batch() -> RayBatch {
        RayBatch::builder()
            .position(vec![0., 1., 2.], 0., 0.)
            .velocity(0., 0., 1.)
            .wavelength(500e-9)
            .vignetted(vec![false, true, false])
            .failed(vec![false, false, true])
            .build()
            .unwrap()
    }

    #[test]
    fn status_is_ordered() {
        assert!(RayStatus::Ok < RayStatus::Vignetted);
        assert!(RayStatus::Vignetted < RayStatus::Failed);
        let mut status = RayStatus::Failed;
        status.raise(RayStatus::Ok);
        assert_eq!(status, RayStatus::Failed);
        assert!(status.is_vignetted());
        assert_eq!(RayStatus::from_flags(true, true), RayStatus::Failed);
        assert_eq!(RayStatus::from_flags(true, false), RayStatus::Vignetted);
    }

    #[test]
    fn counts() {
        let rays = batch();
        assert_eq!(rays.len(), 3);
        assert_eq!(rays.n_vignetted(), 2);
        assert_eq!(rays.n_failed(), 1);
        assert_eq!(rays.unvignetted().len(), 1);
        assert_eq!(rays.vignetted(), vec![false, true, true]);
    }

    #[test]
    fn propagation() {
        let mut rays = batch();
        let expected = rays.position_at_time(2.);
        rays.propagate(2.);
        assert_eq!(rays.r(), expected.as_slice());
        assert!(rays.z().iter().all(|z| (*z - 2.).abs() < 1e-15));
        assert!(rays.t().iter().all(|t| *t == 2.));
    }

    #[test]
    fn phase_along_the_ray_is_constant() {
        let ray = Ray::new(
            Vector3::zeros(),
            Vector3::new(0., 0.6, 0.8) / 1.5,
            0.,
            633e-9,
        );
        let later = ray.propagated_to_time(3.7);
        assert!(ray.phase(&later.r, later.t).abs() < 1e-6);
        let amplitude = ray.amplitude(&later.r, later.t);
        assert!((amplitude.norm() - 1.).abs() < 1e-12);
    }

    #[test]
    fn wave_vector_norm() {
        let ray = Ray::new(Vector3::zeros(), Vector3::z() / 1.5, 0., 500e-9);
        assert!((ray.k().norm() - 1.5 * ray.omega()).abs() / ray.omega() < 1e-14);
    }

    #[test]
    fn sum_amplitude_skips_vignetted() {
        let rays = batch();
        let r = Vector3::new(0., 0., 1.);
        assert!((rays.sum_amplitude(&r, 1., true).norm() - 1.).abs() < 1e-12);
        assert!(rays.sum_amplitude(&r, 1., false).norm() > 1.);
    }

    #[test]
    fn reversed_twice_is_identity() {
        let rays = batch();
        assert_eq!(rays.reversed().reversed(), rays);
    }

    #[test]
    fn par_update_keeps_status_monotone() {
        let mut rays = batch();
        rays.par_update(|ray| Ray {
            status: RayStatus::Ok,
            ..ray
        });
        assert_eq!(rays.n_failed(), 1);
        assert_eq!(rays.n_vignetted(), 2);
    }
}
