//!
//! # Ray-surface interactions
//!
//! Reflection and refraction kernels, and their batch and scalar applications on a [`Surface`].
//! Rays that cannot interact, because of total internal reflection or of an invalid
//! refractive index, are marked as failed at the intersection point.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    coordinates::{CoordSys, CoordTransform},
    medium::Medium,
    rays::{Ray, RayBatch, RayStatus},
    surface::Surface,
};

/// Surface interaction types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    /// Reflection
    Mirror,
    /// Refraction
    Lens,
    /// Refraction, usually between identical media
    Filter,
    /// Intersection only
    Detector,
}

/// Reflects the direction `v` on the surface of unit normal `n`
pub fn reflect_direction(v: &Vector3<f64>, n: &Vector3<f64>) -> Vector3<f64> {
    v - n * (2. * v.dot(n))
}

/// Refracts the velocity `v` through the surface of unit normal `n` from the index `n1` into `n2`
///
/// The refracted velocity has the norm `1/n2`.
/// Returns `None` for total internal reflection.
pub fn refract_direction(
    v: &Vector3<f64>,
    n: &Vector3<f64>,
    n1: f64,
    n2: f64,
) -> Option<Vector3<f64>> {
    let i = v.normalize();
    let mut cos_i = i.dot(n);
    let n = if cos_i < 0. {
        cos_i = -cos_i;
        -n
    } else {
        *n
    };
    let eta = n1 / n2;
    let sin2_t = eta * eta * (1. - cos_i * cos_i);
    if sin2_t > 1. {
        return None;
    }
    let cos_t = (1. - sin2_t).sqrt();
    Some((i * eta + n * (cos_t - eta * cos_i)) / n2)
}

fn index(medium: &Medium, wavelength: f64) -> Option<f64> {
    medium
        .n(wavelength)
        .ok()
        .filter(|n| n.is_finite() && *n > 0.)
}

impl Surface {
    fn reflect_local(&self, ray: &mut Ray) {
        match self.normal(ray.r.x, ray.r.y) {
            Ok(n) => ray.v = reflect_direction(&ray.v, &n),
            Err(_) => ray.status.raise(RayStatus::Failed),
        }
    }
    fn refract_local(&self, ray: &mut Ray, m1: &Medium, m2: &Medium) {
        let refracted = index(m1, ray.wavelength)
            .zip(index(m2, ray.wavelength))
            .zip(self.normal(ray.r.x, ray.r.y).ok())
            .and_then(|((n1, n2), n)| refract_direction(&ray.v, &n, n1, n2));
        match refracted {
            Some(v) => ray.v = v,
            None => ray.status.raise(RayStatus::Failed),
        }
    }
    fn interact_local(&self, ray: &mut Ray, interaction: Interaction, m1: &Medium, m2: &Medium) {
        match interaction {
            Interaction::Mirror => self.reflect_local(ray),
            Interaction::Lens | Interaction::Filter => self.refract_local(ray, m1, m2),
            Interaction::Detector => (),
        }
    }
    fn global_transform(&self) -> CoordTransform {
        CoordTransform::new(&CoordSys::global(), self.coord_sys())
    }
    /// Intersects and reflects the rays
    pub fn reflect(&self, rays: &mut RayBatch) -> crate::Result<()> {
        self.process(rays, |ray| self.reflect_local(ray))
    }
    /// Intersects and refracts the rays from the medium `m1` into the medium `m2`
    pub fn refract(&self, rays: &mut RayBatch, m1: &Medium, m2: &Medium) -> crate::Result<()> {
        self.process(rays, |ray| self.refract_local(ray, m1, m2))
    }
    /// Intersects the rays without changing their directions
    pub fn pass(&self, rays: &mut RayBatch) -> crate::Result<()> {
        self.intersect(rays)
    }
    /// Intersects the rays and applies the `interaction` from the medium `m1` into the medium `m2`
    pub fn interact(
        &self,
        rays: &mut RayBatch,
        interaction: Interaction,
        m1: &Medium,
        m2: &Medium,
    ) -> crate::Result<()> {
        self.process(rays, |ray| self.interact_local(ray, interaction, m1, m2))
    }
    /// Intersects and reflects a ray given in the global frame
    pub fn reflect_ray(&self, ray: &Ray) -> Ray {
        self.process_ray(&self.global_transform(), *ray, &|ray: &mut Ray| {
            self.reflect_local(ray)
        })
    }
    /// Intersects and refracts a ray given in the global frame
    pub fn refract_ray(&self, ray: &Ray, m1: &Medium, m2: &Medium) -> Ray {
        self.process_ray(&self.global_transform(), *ray, &|ray: &mut Ray| {
            self.refract_local(ray, m1, m2)
        })
    }
    pub fn pass_ray(&self, ray: &Ray) -> Ray {
        self.intersect_ray(ray)
    }
    pub fn interact_ray(
        &self,
        ray: &Ray,
        interaction: Interaction,
        m1: &Medium,
        m2: &Medium,
    ) -> Ray {
        self.process_ray(&self.global_transform(), *ray, &|ray: &mut Ray| {
            self.interact_local(ray, interaction, m1, m2)
        })
    }
}
