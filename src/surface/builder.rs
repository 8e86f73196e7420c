use serde::{Deserialize, Serialize};

use super::{Aperture, Shape, Surface, SurfaceError};
use crate::{coordinates::CoordSys, Builder};

/// [`Surface`] builder
///
/// The default surface is the plane `z = 0` of the global frame without aperture limits.
///
/// ```
/// use optrace::{Builder, SurfaceBuilder};
/// let m1 = SurfaceBuilder::quadric(36., -0.9982857)
///     .outer(4.2)
///     .origin([0., 0., 3.9])
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceBuilder {
    #[serde(default)]
    pub(crate) z0: f64,
    #[serde(default)]
    pub(crate) inner: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) outer: Option<f64>,
    #[serde(default)]
    pub(crate) origin: [f64; 3],
    #[serde(default)]
    pub(crate) euler_angles: [f64; 3],
    pub(crate) shape: Shape,
}
impl SurfaceBuilder {
    pub fn plane() -> Self {
        Self::default()
    }
    /// Sphere with the radius of curvature `radius`
    pub fn sphere(radius: f64) -> Self {
        Self::default().shape(Shape::Sphere { radius })
    }
    pub fn paraboloid(radius: f64) -> Self {
        Self::default().shape(Shape::Paraboloid { radius })
    }
    /// Conic of revolution with the radius of curvature `radius` and the conic constant `conic`
    pub fn quadric(radius: f64, conic: f64) -> Self {
        Self::default().shape(Shape::Quadric { radius, conic })
    }
    /// Quadric with the polynomial coefficients of `r^4`, `r^6`, ...
    pub fn asphere(radius: f64, conic: f64, coefs: Vec<f64>) -> Self {
        Self::default().shape(Shape::Asphere {
            radius,
            conic,
            coefs,
        })
    }
    /// Plane tilted by the angles `theta_x` and `theta_y` (rd)
    pub fn tilted(theta_x: f64, theta_y: f64) -> Self {
        Self::default().shape(Shape::Tilted {
            tanx: theta_x.tan(),
            tany: theta_y.tan(),
        })
    }
    pub fn sum(terms: Vec<Shape>) -> Self {
        Self::default().shape(Shape::Sum { terms })
    }
    pub fn shape(self, shape: Shape) -> Self {
        Self { shape, ..self }
    }
    /// Sets the vertex height in the local frame
    pub fn vertex(self, z0: f64) -> Self {
        Self { z0, ..self }
    }
    /// Sets the outer radius of the clear aperture
    pub fn outer(self, outer: f64) -> Self {
        Self {
            outer: Some(outer),
            ..self
        }
    }
    /// Sets the inner radius of the clear aperture
    pub fn inner(self, inner: f64) -> Self {
        Self { inner, ..self }
    }
    /// Sets the origin of the local frame
    pub fn origin(self, origin: [f64; 3]) -> Self {
        Self { origin, ..self }
    }
    /// Sets the orientation of the local frame from the Euler angles `[rx, ry, rz]`
    pub fn euler_angles(self, euler_angles: [f64; 3]) -> Self {
        Self {
            euler_angles,
            ..self
        }
    }
}
impl Builder for SurfaceBuilder {
    type Component = Surface;
    fn build(self) -> crate::Result<Surface> {
        if !(self.z0.is_finite() && self.inner.is_finite() && self.inner >= 0.) {
            return Err(SurfaceError::Parameter(format!(
                "vertex {} or inner radius {}",
                self.z0, self.inner
            ))
            .into());
        }
        if let Some(outer) = self.outer {
            if !(outer > self.inner) {
                return Err(SurfaceError::Parameter(format!(
                    "outer radius {outer} is not larger than the inner radius {}",
                    self.inner
                ))
                .into());
            }
        }
        Ok(Surface::new(self.shape)?
            .with_vertex(self.z0)
            .with_aperture(Aperture::new(self.inner, self.outer))
            .with_coord_sys(CoordSys::from_euler_angles(
                self.origin,
                self.euler_angles,
            )))
    }
}
