use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use skyangle::Conversion;

use super::{field_to_dir_cos, Origin, Projection, PupilSampling, SourceError, Spacing};
use crate::{
    medium::Medium,
    optics::OpticalTrain,
    rays::{RayBatch, RaysError},
    surface::Surface,
    Builder, FromBuilder,
};

/// Ray source builder
///
/// Default properties:
///  - origin          : on-axis, at infinity
///  - medium          : vacuum
///  - stop surface    : the plane `z = 0` of the global frame
///  - back distance   : 40m
///  - pupil sampling  : 10 polar rings with up to 60 rays
///  - flux            : 1
///
/// The wavelength must be set and so must the pupil size unless the rays coordinates are given.
///
/// # Examples
///
/// - 11x11 rays on a square grid from a 1.5 arcminute off-axis field
///
/// ```
/// use optrace::{Builder, SourceBuilder};
/// let rays = SourceBuilder::new()
///     .wavelength(750e-9)
///     .pupil_size(8.4)
///     .field_arcmin(1.5, 0.)
///     .grid(11)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBuilder {
    wavelength: Option<f64>,
    medium: Medium,
    #[serde(skip)]
    stop_surface: Option<Surface>,
    back_dist: f64,
    outer: Option<f64>,
    inner: f64,
    origin: Origin,
    sampling: PupilSampling,
    flux: f64,
}
impl Default for SourceBuilder {
    fn default() -> Self {
        Self {
            wavelength: None,
            medium: Medium::vacuum(),
            stop_surface: None,
            back_dist: 40.,
            outer: None,
            inner: 0.,
            origin: Origin::default(),
            sampling: PupilSampling::default(),
            flux: 1.,
        }
    }
}
impl SourceBuilder {
    /// Sets the vacuum wavelength in meters
    pub fn wavelength(self, wavelength: f64) -> Self {
        Self {
            wavelength: Some(wavelength),
            ..self
        }
    }
    /// Sets the medium the rays start in
    pub fn medium(self, medium: Medium) -> Self {
        Self { medium, ..self }
    }
    pub fn stop_surface(self, stop_surface: Surface) -> Self {
        Self {
            stop_surface: Some(stop_surface),
            ..self
        }
    }
    /// Sets the distance from the stop surface the rays start from
    pub fn back_dist(self, back_dist: f64) -> Self {
        Self { back_dist, ..self }
    }
    /// Sets the pupil diameter
    pub fn pupil_size(self, pupil_size: f64) -> Self {
        Self {
            outer: Some(0.5 * pupil_size),
            ..self
        }
    }
    /// Sets the pupil inner and outer radius
    pub fn annulus(self, inner: f64, outer: f64) -> Self {
        Self {
            inner,
            outer: Some(outer),
            ..self
        }
    }
    /// Sets the source field angles in radians
    pub fn field(self, theta_x: f64, theta_y: f64) -> Self {
        let projection = match self.origin {
            Origin::Field { projection, .. } => projection,
            _ => Projection::default(),
        };
        Self {
            origin: Origin::Field {
                theta_x,
                theta_y,
                projection,
            },
            ..self
        }
    }
    /// Sets the source field angles in arcminutes
    pub fn field_arcmin(self, theta_x: f64, theta_y: f64) -> Self {
        self.field(theta_x.from_arcmin(), theta_y.from_arcmin())
    }
    /// Sets the source field angles in arcseconds
    pub fn field_arcsec(self, theta_x: f64, theta_y: f64) -> Self {
        self.field(theta_x.from_arcsec(), theta_y.from_arcsec())
    }
    /// Sets the projection of the field angles
    pub fn projection(self, projection: Projection) -> Self {
        let (theta_x, theta_y) = match self.origin {
            Origin::Field {
                theta_x, theta_y, ..
            } => (theta_x, theta_y),
            _ => (0., 0.),
        };
        Self {
            origin: Origin::Field {
                theta_x,
                theta_y,
                projection,
            },
            ..self
        }
    }
    /// Sets the direction cosines of a source at infinity
    pub fn dir_cos(self, dir_cos: [f64; 3]) -> Self {
        Self {
            origin: Origin::Infinity { dir_cos },
            ..self
        }
    }
    /// Sets the position of a point source
    pub fn point_source(self, position: [f64; 3]) -> Self {
        Self {
            origin: Origin::Point { position },
            ..self
        }
    }
    /// Samples the pupil with a `nx`x`nx` grid
    pub fn grid(self, nx: usize) -> Self {
        Self {
            sampling: PupilSampling::Grid { nx, lx: None },
            ..self
        }
    }
    /// Samples the pupil with `nrad` rings of up to `naz` rays
    pub fn polar(self, nrad: usize, naz: usize) -> Self {
        Self {
            sampling: PupilSampling::Polar { nrad, naz },
            ..self
        }
    }
    /// Samples the pupil with `2 rings + 1` spokes of `rings` rays
    pub fn spokes(self, rings: usize, spacing: Spacing) -> Self {
        Self {
            sampling: PupilSampling::Spokes {
                rings,
                spokes: None,
                spacing,
            },
            ..self
        }
    }
    /// Samples the pupil with `n` random rays
    pub fn random(self, n: usize, seed: u64) -> Self {
        Self {
            sampling: PupilSampling::Random { n, seed },
            ..self
        }
    }
    /// Sets the rays coordinates on the stop surface
    pub fn from_stop(self, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            sampling: PupilSampling::UserSet { x, y },
            ..self
        }
    }
    pub fn sampling(self, sampling: PupilSampling) -> Self {
        Self { sampling, ..self }
    }
    /// Sets the total flux of each ray
    pub fn flux(self, flux: f64) -> Self {
        Self { flux, ..self }
    }
    /// Uses the entrance medium, the stop surface, the back distance and the pupil size of `optic`
    pub fn optic(self, optic: &OpticalTrain) -> Self {
        Self {
            medium: optic.in_medium().clone(),
            stop_surface: Some(optic.stop_surface().clone()),
            back_dist: optic.back_dist(),
            outer: optic.pupil_size().map(|d| 0.5 * d).or(self.outer),
            ..self
        }
    }
}
impl Builder for SourceBuilder {
    type Component = RayBatch;
    fn build(self) -> crate::Result<RayBatch> {
        let wavelength = self.wavelength.ok_or(SourceError::MissingWavelength)?;
        if !(wavelength.is_finite() && wavelength > 0.) {
            return Err(RaysError::Wavelength {
                index: 0,
                value: wavelength,
            }
            .into());
        }
        let outer = match self.outer {
            Some(outer) => outer,
            None if self.sampling.needs_pupil() => return Err(SourceError::MissingPupilSize.into()),
            None => f64::INFINITY,
        };
        let stop = match self.stop_surface {
            Some(stop) => stop,
            None => Surface::builder().build()?,
        };
        let n = self.medium.n(wavelength)?;

        let points = self.sampling.points(self.inner, outer)?;
        let mut r = Vec::with_capacity(points.len());
        let mut flux = Vec::with_capacity(points.len());
        let cs = stop.coord_sys();
        for point in &points {
            let z = stop.sag(point.x, point.y)?;
            r.push(cs.rot * Vector3::new(point.x, point.y, z) + cs.origin);
            flux.push(self.flux * point.weight);
        }

        // rays on the plane perpendicular to `direction` at `back_dist` upstream of the stop
        let plane_wave = |r: Vec<Vector3<f64>>,
                          direction: Vector3<f64>|
         -> (Vec<Vector3<f64>>, Vec<Vector3<f64>>) {
            let d = direction.normalize();
            let v = d / n;
            r.into_iter()
                .map(|p| (p - v * n * (self.back_dist + p.dot(&d)), v))
                .unzip()
        };
        let (r, v): (Vec<_>, Vec<_>) = match self.origin {
            Origin::Infinity { dir_cos } => plane_wave(r, dir_cos.into()),
            Origin::Field {
                theta_x,
                theta_y,
                projection,
            } => plane_wave(r, field_to_dir_cos(theta_x, theta_y, projection)?),
            Origin::Point { position } => {
                let source = Vector3::from(position);
                r.into_iter()
                    .map(|p| (source, (p - source).normalize() / n))
                    .unzip()
            }
        };

        log::info!(
            "{} rays at {:.1}nm from {:?}",
            r.len(),
            wavelength * 1e9,
            self.origin
        );
        RayBatch::builder()
            .position(
                r.iter().map(|r| r.x).collect::<Vec<_>>(),
                r.iter().map(|r| r.y).collect::<Vec<_>>(),
                r.iter().map(|r| r.z).collect::<Vec<_>>(),
            )
            .velocity(
                v.iter().map(|v| v.x).collect::<Vec<_>>(),
                v.iter().map(|v| v.y).collect::<Vec<_>>(),
                v.iter().map(|v| v.z).collect::<Vec<_>>(),
            )
            .wavelength(wavelength)
            .flux(flux)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OptraceError, SurfaceBuilder};

    #[test]
    fn on_axis_rays_start_at_back_dist() {
        let rays = SourceBuilder::new()
            .wavelength(500e-9)
            .pupil_size(2.)
            .polar(3, 12)
            .back_dist(10.)
            .build()
            .unwrap();
        assert_eq!(rays.len(), 19);
        assert!(rays.z().iter().all(|z| (z - 10.).abs() < 1e-12));
        assert!(rays.v().iter().all(|v| (v - Vector3::new(0., 0., -1.)).norm() < 1e-15));
        assert!(rays.t().iter().all(|t| *t == 0.));
    }

    #[test]
    fn off_axis_rays_cross_the_stop() {
        let theta = 0.01;
        let medium = Medium::Const { n: 1.2 };
        let mut rays = SourceBuilder::new()
            .wavelength(500e-9)
            .medium(medium)
            .pupil_size(1.)
            .field(theta, 0.)
            .grid(9)
            .build()
            .unwrap();
        let d = field_to_dir_cos(theta, 0., Projection::Postel).unwrap();
        for ray in rays.iter() {
            assert!((ray.v.norm() - 1. / 1.2).abs() < 1e-15);
            // starting plane is perpendicular to the direction
            assert!((ray.r.dot(&d) + 40.).abs() < 1e-12);
        }
        Surface::builder()
            .build()
            .unwrap()
            .intersect(&mut rays)
            .unwrap();
        assert!(rays.z().iter().all(|z| z.abs() < 1e-12));
        assert!(rays
            .r()
            .iter()
            .all(|r| r.x.abs() <= 0.5 + 1e-12 && r.y.abs() <= 0.5 + 1e-12));
        assert_eq!(rays.len(), 81);
    }

    #[test]
    fn point_source() {
        let rays = SourceBuilder::new()
            .wavelength(500e-9)
            .point_source([0., 0., 2.])
            .from_stop(vec![0., 1.], vec![0., 0.])
            .build()
            .unwrap();
        assert!(rays.r().iter().all(|r| *r == Vector3::new(0., 0., 2.)));
        let v = rays.v()[1];
        assert!((v - Vector3::new(1., 0., -2.).normalize()).norm() < 1e-15);
    }

    #[test]
    fn tilted_stop_surface() {
        let stop = SurfaceBuilder::plane()
            .origin([0., 0., 1.])
            .euler_angles([0.1, 0., 0.])
            .build()
            .unwrap();
        let rays = SourceBuilder::new()
            .wavelength(500e-9)
            .stop_surface(stop.clone())
            .from_stop(vec![0.], vec![0.5])
            .build()
            .unwrap();
        let mut on_stop = rays.clone();
        stop.intersect(&mut on_stop).unwrap();
        let expected = stop.coord_sys().rot * Vector3::new(0., 0.5, 0.) + stop.coord_sys().origin;
        assert!((on_stop.r()[0] - expected).norm() < 1e-12);
    }

    #[test]
    fn missing_parameters() {
        assert!(matches!(
            SourceBuilder::new().pupil_size(1.).build(),
            Err(OptraceError::Source(SourceError::MissingWavelength))
        ));
        assert!(matches!(
            SourceBuilder::new().wavelength(500e-9).build(),
            Err(OptraceError::Source(SourceError::MissingPupilSize))
        ));
    }

    #[test]
    fn gauss_quadrature_flux() {
        let rays = SourceBuilder::new()
            .wavelength(500e-9)
            .annulus(0.1, 0.5)
            .spokes(3, Spacing::GaussQuadrature)
            .flux(2.)
            .build()
            .unwrap();
        let flux: f64 = rays.flux().iter().sum();
        // annulus area over the squared outer radius, scaled by the ray flux
        let area = std::f64::consts::PI * (1. - 0.2f64.powi(2));
        assert!((flux - 2. * area).abs() < 1e-12);
    }
}
