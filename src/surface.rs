//!
//! # Optical surfaces
//!
//! A [`Surface`] is a [`Shape`] with a vertex height, a clear [`Aperture`] and
//! the coordinate system of its local frame.
//! The shape sag is given in the local frame, relative to the vertex.

use nalgebra::Vector3;
use roots::{find_root_newton_raphson, SimpleConvergency};
use serde::{Deserialize, Serialize};

use crate::{
    coordinates::{rot_x, rot_y, rot_z, CoordSys, CoordTransform},
    rays::{Ray, RayBatch, RayStatus},
    FromBuilder,
};

mod asphere;
mod builder;
mod conic;
mod sum;
mod tilted;
pub use asphere::Asphere;
pub use builder::SurfaceBuilder;
pub use conic::Conic;
pub use tilted::Tilted;

/// Newton-Raphson convergence tolerance on the propagation time (m)
const NEWTON_TOLERANCE: f64 = 1e-12;
const NEWTON_MAX_ITER: usize = 30;
/// Largest accepted sag residual after Newton-Raphson (m)
const RESIDUAL_TOLERANCE: f64 = 1e-9;
/// Rays sitting on a surface may have slightly negative propagation times
const TIME_TOLERANCE: f64 = 1e-10;
const BRANCH_TOLERANCE: f64 = 1e-12;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("({x},{y}) is outside of the surface domain")]
    OutOfDomain { x: f64, y: f64 },
    #[error("invalid surface parameter: {0}")]
    Parameter(String),
}

/// Surface sag functions
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sagtype", rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Plane,
    Sphere {
        radius: f64,
    },
    Paraboloid {
        radius: f64,
    },
    /// Conic of revolution with conic constant `conic`
    Quadric {
        radius: f64,
        conic: f64,
    },
    /// Quadric with the polynomial terms `coefs[k] r^(2k+4)`
    Asphere {
        radius: f64,
        conic: f64,
        coefs: Vec<f64>,
    },
    Tilted {
        tanx: f64,
        tany: f64,
    },
    /// Sum of the sags of other shapes
    Sum {
        terms: Vec<Shape>,
    },
}
impl Shape {
    fn conic(&self) -> Option<Conic> {
        match self {
            Shape::Sphere { radius } => Some(Conic::new(*radius, 0.)),
            Shape::Paraboloid { radius } => Some(Conic::new(*radius, -1.)),
            Shape::Quadric { radius, conic } => Some(Conic::new(*radius, *conic)),
            _ => None,
        }
    }
    /// Sag relative to the vertex, `None` outside of the shape domain
    pub fn sag(&self, x: f64, y: f64) -> Option<f64> {
        if let Some(conic) = self.conic() {
            return conic.sag(x * x + y * y);
        }
        match self {
            Shape::Asphere {
                radius,
                conic,
                coefs,
            } => Asphere::new(*radius, *conic, coefs).sag(x, y),
            Shape::Tilted { tanx, tany } => Some(
                Tilted {
                    tanx: *tanx,
                    tany: *tany,
                }
                .sag(x, y),
            ),
            Shape::Sum { terms } => sum::sag(terms, x, y),
            _ => Some(0.),
        }
    }
    /// Sag partial derivatives `(dz/dx, dz/dy)`
    pub fn gradient(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if let Some(conic) = self.conic() {
            return conic
                .dzdr_over_r(x * x + y * y)
                .map(|dzdr_over_r| (x * dzdr_over_r, y * dzdr_over_r));
        }
        match self {
            Shape::Asphere {
                radius,
                conic,
                coefs,
            } => Asphere::new(*radius, *conic, coefs).gradient(x, y),
            Shape::Tilted { tanx, tany } => Some(
                Tilted {
                    tanx: *tanx,
                    tany: *tany,
                }
                .gradient(),
            ),
            Shape::Sum { terms } => sum::gradient(terms, x, y),
            _ => Some((0., 0.)),
        }
    }
    /// Propagation times from `r` along `v` to the shape, forward or backward
    ///
    /// `r` is given relative to the vertex.
    pub(crate) fn roots(&self, r: &Vector3<f64>, v: &Vector3<f64>) -> [Option<f64>; 2] {
        if let Some(conic) = self.conic() {
            return conic.roots(r, v);
        }
        match self {
            Shape::Asphere {
                radius,
                conic,
                coefs,
            } => Asphere::new(*radius, *conic, coefs).roots(r, v),
            Shape::Tilted { tanx, tany } => Tilted {
                tanx: *tanx,
                tany: *tany,
            }
            .roots(r, v),
            Shape::Sum { terms } => sum::roots(terms, r, v),
            _ => [plane_root(r, v, 0., 0.), None],
        }
    }
    /// Forward propagation times from `r` along `v` to the shape
    pub(crate) fn candidates(&self, r: &Vector3<f64>, v: &Vector3<f64>) -> [Option<f64>; 2] {
        self.roots(r, v).map(|dt| dt.and_then(valid_time))
    }
    /// Checks the shape parameters
    pub fn validate(&self) -> Result<(), SurfaceError> {
        let finite = |name: &str, value: f64| {
            if value.is_finite() {
                Ok(())
            } else {
                Err(SurfaceError::Parameter(format!("{name} = {value}")))
            }
        };
        if let Some(Conic { radius, constant }) = self.conic().or(match self {
            Shape::Asphere { radius, conic, .. } => Some(Conic::new(*radius, *conic)),
            _ => None,
        }) {
            finite("radius", radius)?;
            finite("conic", constant)?;
            if radius == 0. {
                return Err(SurfaceError::Parameter("radius = 0".into()));
            }
        }
        match self {
            Shape::Asphere { coefs, .. } => coefs.iter().try_for_each(|c| finite("coefs", *c)),
            Shape::Tilted { tanx, tany } => {
                finite("tanx", *tanx)?;
                finite("tany", *tany)
            }
            Shape::Sum { terms } => terms.iter().try_for_each(Shape::validate),
            _ => Ok(()),
        }
    }
}

/// Propagation time to the plane `z = x tanx + y tany`
fn plane_root(r: &Vector3<f64>, v: &Vector3<f64>, tanx: f64, tany: f64) -> Option<f64> {
    let dt = -(r.z - tanx * r.x - tany * r.y) / (v.z - tanx * v.x - tany * v.y);
    dt.is_finite().then_some(dt)
}

fn valid_time(dt: f64) -> Option<f64> {
    (dt.is_finite() && dt >= -TIME_TOLERANCE).then_some(dt)
}

/// Solves `z(dt) = sag(x(dt), y(dt))` with Newton-Raphson iterations starting at `start`
fn newton_root<S, G>(
    sag: S,
    gradient: G,
    r: &Vector3<f64>,
    v: &Vector3<f64>,
    start: f64,
) -> Option<f64>
where
    S: Fn(f64, f64) -> Option<f64>,
    G: Fn(f64, f64) -> Option<(f64, f64)>,
{
    let f = |dt: f64| {
        let p = r + v * dt;
        sag(p.x, p.y).map_or(f64::NAN, |z| p.z - z)
    };
    let df = |dt: f64| {
        let p = r + v * dt;
        gradient(p.x, p.y).map_or(f64::NAN, |(dzdx, dzdy)| v.z - dzdx * v.x - dzdy * v.y)
    };
    let mut convergency = SimpleConvergency {
        eps: NEWTON_TOLERANCE,
        max_iter: NEWTON_MAX_ITER,
    };
    find_root_newton_raphson(start, &f, &df, &mut convergency)
        .ok()
        .filter(|dt| dt.is_finite() && f(*dt).abs() <= RESIDUAL_TOLERANCE)
}

/// Annular clear aperture
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aperture {
    pub inner: f64,
    pub outer: Option<f64>,
}
impl Aperture {
    pub fn new(inner: f64, outer: Option<f64>) -> Self {
        Self { inner, outer }
    }
    /// Checks if the point `(x,y)` is inside the aperture
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let r = x.hypot(y);
        r >= self.inner && self.outer.map_or(true, |outer| r <= outer)
    }
}

/// Optical surface
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    shape: Shape,
    z0: f64,
    aperture: Aperture,
    coord_sys: CoordSys,
}
impl FromBuilder for Surface {
    type ComponentBuilder = SurfaceBuilder;
}
impl Surface {
    /// Creates a surface with its vertex at the origin of the global frame
    pub fn new(shape: Shape) -> Result<Self, SurfaceError> {
        shape.validate()?;
        Ok(Self {
            shape,
            z0: 0.,
            aperture: Aperture::default(),
            coord_sys: CoordSys::global(),
        })
    }
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
    /// Vertex height in the local frame
    pub fn z0(&self) -> f64 {
        self.z0
    }
    pub fn aperture(&self) -> &Aperture {
        &self.aperture
    }
    pub fn coord_sys(&self) -> &CoordSys {
        &self.coord_sys
    }
    pub fn with_vertex(self, z0: f64) -> Self {
        Self { z0, ..self }
    }
    pub fn with_aperture(self, aperture: Aperture) -> Self {
        Self { aperture, ..self }
    }
    pub fn with_coord_sys(self, coord_sys: CoordSys) -> Self {
        Self { coord_sys, ..self }
    }
    /// Returns a copy of the surface shifted by `dr` in the global frame
    pub fn with_shift(&self, dr: [f64; 3]) -> Self {
        Self {
            coord_sys: self.coord_sys.shift_global(dr.into()),
            ..self.clone()
        }
    }
    /// Returns a copy of the surface rotated around its local x axis
    pub fn with_rot_x(&self, angle: f64) -> Self {
        Self {
            coord_sys: self.coord_sys.rotate_local(&rot_x(angle), Vector3::zeros()),
            ..self.clone()
        }
    }
    /// Returns a copy of the surface rotated around its local y axis
    pub fn with_rot_y(&self, angle: f64) -> Self {
        Self {
            coord_sys: self.coord_sys.rotate_local(&rot_y(angle), Vector3::zeros()),
            ..self.clone()
        }
    }
    /// Returns a copy of the surface rotated around its local z axis
    pub fn with_rot_z(&self, angle: f64) -> Self {
        Self {
            coord_sys: self.coord_sys.rotate_local(&rot_z(angle), Vector3::zeros()),
            ..self.clone()
        }
    }
    /// Surface height at `(x,y)` in the local frame
    pub fn sag(&self, x: f64, y: f64) -> Result<f64, SurfaceError> {
        self.shape
            .sag(x, y)
            .map(|z| z + self.z0)
            .ok_or(SurfaceError::OutOfDomain { x, y })
    }
    /// Unit normal at `(x,y)` in the local frame
    pub fn normal(&self, x: f64, y: f64) -> Result<Vector3<f64>, SurfaceError> {
        self.shape
            .gradient(x, y)
            .map(|(dzdx, dzdy)| Vector3::new(-dzdx, -dzdy, 1.).normalize())
            .ok_or(SurfaceError::OutOfDomain { x, y })
    }
    /// Propagation time of a ray, given in the local frame, to the surface and whether
    /// the intersection is inside the clear aperture
    ///
    /// Intersections inside the aperture come first, then the nearest to the vertex.
    fn select_root(&self, ray: &Ray) -> Option<(f64, bool)> {
        let r = ray.r - Vector3::new(0., 0., self.z0);
        self.shape
            .candidates(&r, &ray.v)
            .into_iter()
            .flatten()
            .map(|dt| {
                let p = r + ray.v * dt;
                (dt, p.z.abs(), self.aperture.contains(p.x, p.y))
            })
            .min_by(|a, b| {
                b.2.cmp(&a.2)
                    .then(a.1.total_cmp(&b.1))
                    .then(a.0.total_cmp(&b.0))
            })
            .map(|(dt, _, inside)| (dt, inside))
    }
    /// Propagation time of a ray, given in the global frame, to the surface
    ///
    /// Returns `None` if the ray misses the surface.
    pub fn time_to_intersect(&self, ray: &Ray) -> Option<f64> {
        let local = CoordTransform::new(&CoordSys::global(), &self.coord_sys).forward_ray(ray);
        self.select_root(&local).map(|(dt, _)| dt)
    }
    /// Moves a ray, given in the local frame, to its intersection with the surface
    ///
    /// Returns `false` if the ray does not intersect the surface, leaving the ray untouched.
    /// An intersection outside of the clear aperture vignettes the ray.
    pub(crate) fn intersect_local(&self, ray: &mut Ray) -> bool {
        match self.select_root(ray) {
            Some((dt, inside)) => {
                ray.r += ray.v * dt;
                ray.t += dt;
                if !inside {
                    ray.status.raise(RayStatus::Vignetted);
                }
                true
            }
            None => false,
        }
    }
    /// Applies `interact` to every ray once moved to the surface, in the surface local frame
    ///
    /// Failed rays are left untouched and rays missing the surface are marked as failed.
    pub(crate) fn process_ray<F>(&self, transform: &CoordTransform, ray: Ray, interact: &F) -> Ray
    where
        F: Fn(&mut Ray),
    {
        if ray.failed() {
            return ray;
        }
        let mut local = transform.forward_ray(&ray);
        if !self.intersect_local(&mut local) {
            return Ray {
                status: RayStatus::Failed,
                ..ray
            };
        }
        interact(&mut local);
        transform.reverse_ray(&local)
    }
    /// Applies `interact` to a batch of rays, in parallel
    pub(crate) fn process<F>(&self, rays: &mut RayBatch, interact: F) -> crate::Result<()>
    where
        F: Fn(&mut Ray) + Send + Sync,
    {
        rays.validate()?;
        let transform = CoordTransform::new(&rays.coord_sys, &self.coord_sys);
        rays.par_update(|ray| self.process_ray(&transform, ray, &interact));
        Ok(())
    }
    /// Moves the rays to their intersection with the surface
    pub fn intersect(&self, rays: &mut RayBatch) -> crate::Result<()> {
        self.process(rays, |_: &mut Ray| ())
    }
    /// Moves a ray, given in the global frame, to its intersection with the surface
    pub fn intersect_ray(&self, ray: &Ray) -> Ray {
        let transform = CoordTransform::new(&CoordSys::global(), &self.coord_sys);
        self.process_ray(&transform, *ray, &|_: &mut Ray| ())
    }
}
