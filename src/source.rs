//!
//! # Ray sources
//!
//! Rays are generated at the stop surface of an optical train, sampling the pupil according
//! to a [`PupilSampling`], and launched either from infinity or from a point source.
//! See [`SourceBuilder`].

use std::f64::consts::PI;

use nalgebra::Vector3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use roots::{find_root_newton_raphson, SimpleConvergency};
use serde::{Deserialize, Serialize};

mod builder;
pub use builder::SourceBuilder;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source wavelength is not set")]
    MissingWavelength,
    #[error("pupil size is not set, either set it or use the pupil size of an optical train")]
    MissingPupilSize,
    #[error("invalid pupil sampling: {0}")]
    Sampling(String),
    #[error("field ({theta_x},{theta_y}) outside of the {projection:?} projection domain")]
    Projection {
        theta_x: f64,
        theta_y: f64,
        projection: Projection,
    },
    #[error("Gauss-Legendre quadrature of order {0} failed to converge")]
    Quadrature(usize),
}

/// Projections from field angles to direction cosines
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    #[default]
    Postel,
    Zemax,
    Gnomonic,
    Stereographic,
    Lambert,
    Orthographic,
}

/// Direction cosines of the rays coming from the field angles `(theta_x, theta_y)`
///
/// The rays travel toward negative z.
pub fn field_to_dir_cos(
    theta_x: f64,
    theta_y: f64,
    projection: Projection,
) -> Result<Vector3<f64>, SourceError> {
    let (u, v) = (theta_x, theta_y);
    let rho2 = u * u + v * v;
    let rho = rho2.sqrt();
    let radial = |theta: f64| {
        if rho == 0. {
            (0., 0.)
        } else {
            let s = theta.sin() / rho;
            (u * s, v * s)
        }
    };
    let dir_cos = match projection {
        Projection::Postel => {
            let (alpha, beta) = radial(rho);
            Vector3::new(alpha, beta, -rho.cos())
        }
        Projection::Zemax => {
            let (tu, tv) = (u.tan(), v.tan());
            Vector3::new(tu, tv, -1.) / (1. + tu * tu + tv * tv).sqrt()
        }
        Projection::Gnomonic => Vector3::new(u, v, -1.) / (1. + rho2).sqrt(),
        Projection::Stereographic => {
            let theta = 2. * (rho / 2.).atan();
            let (alpha, beta) = radial(theta);
            Vector3::new(alpha, beta, -theta.cos())
        }
        Projection::Lambert if rho2 <= 4. => {
            let s = (1. - rho2 / 4.).sqrt();
            Vector3::new(u * s, v * s, -(1. - rho2 / 2.))
        }
        Projection::Orthographic if rho2 <= 1. => Vector3::new(u, v, -(1. - rho2).sqrt()),
        _ => {
            return Err(SourceError::Projection {
                theta_x,
                theta_y,
                projection,
            })
        }
    };
    Ok(dir_cos)
}

/// Rays origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Plane wave with the given direction cosines
    Infinity { dir_cos: [f64; 3] },
    /// Plane wave from the field angles
    Field {
        theta_x: f64,
        theta_y: f64,
        projection: Projection,
    },
    /// Spherical wave from a point
    Point { position: [f64; 3] },
}
impl Default for Origin {
    fn default() -> Self {
        Origin::Infinity {
            dir_cos: [0., 0., -1.],
        }
    }
}

/// Radial spacing of the spokes rings
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spacing {
    #[default]
    Uniform,
    /// Gauss-Legendre radii with the rays flux set to the quadrature weights
    ///
    /// The weights of all the rays add up to the area of the annulus normalized to the outer radius.
    GaussQuadrature,
}

/// Pupil sampling schemes
///
/// The pupil is the annulus of the stop surface between the inner and outer radius
/// of the [`SourceBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PupilSampling {
    /// `nx` x `nx` centered square grid of size `lx`, the pupil diameter by default
    ///
    /// The grid is not cut to the pupil, rays outside of it are left to the optics to vignette.
    Grid { nx: usize, lx: Option<f64> },
    /// `nrad` rings from the outer to the inner radius, each with a multiple of 6 rays
    /// and up to `naz` rays on the outer ring
    Polar { nrad: usize, naz: usize },
    /// `spokes` radial lines of `rings` rays each
    Spokes {
        rings: usize,
        spokes: Option<usize>,
        spacing: Spacing,
    },
    /// `n` rays uniformly distributed over the pupil
    Random { n: usize, seed: u64 },
    /// User defined coordinates on the stop surface
    UserSet { x: Vec<f64>, y: Vec<f64> },
}
impl Default for PupilSampling {
    fn default() -> Self {
        PupilSampling::Polar { nrad: 10, naz: 60 }
    }
}

/// A point in the pupil with its relative flux
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PupilPoint {
    pub x: f64,
    pub y: f64,
    pub weight: f64,
}
impl PupilPoint {
    fn new(x: f64, y: f64) -> Self {
        Self { x, y, weight: 1. }
    }
    fn polar(r: f64, phi: f64, weight: f64) -> Self {
        let (s, c) = phi.sin_cos();
        Self {
            x: r * c,
            y: r * s,
            weight,
        }
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

impl PupilSampling {
    /// Sampling points of the annulus `[inner, outer]`
    pub(crate) fn points(&self, inner: f64, outer: f64) -> Result<Vec<PupilPoint>, SourceError> {
        match self {
            PupilSampling::Grid { nx, lx } => {
                let n = *nx;
                if n == 0 {
                    return Err(SourceError::Sampling("grid of size 0".into()));
                }
                let lx = lx.unwrap_or(2. * outer);
                let dx = match n {
                    1 | 2 => lx / n as f64,
                    _ if n % 2 == 0 => lx / (n - 2) as f64,
                    _ => lx / (n - 1) as f64,
                };
                let k0 = (n / 2) as f64;
                let x: Vec<f64> = (0..n).map(|k| (k as f64 - k0) * dx).collect();
                Ok(x.iter()
                    .flat_map(|&y| x.iter().map(move |&x| PupilPoint::new(x, y)))
                    .collect())
            }
            PupilSampling::Polar { nrad, naz } => {
                if *nrad == 0 || *naz == 0 {
                    return Err(SourceError::Sampling(format!(
                        "polar sampling with {nrad} rings and {naz} azimuths"
                    )));
                }
                let mut points = vec![];
                for r in linspace(outer, inner, *nrad) {
                    if r == 0. {
                        points.push(PupilPoint::new(0., 0.));
                        continue;
                    }
                    let nphi = ((*naz as f64 * r / outer / 6.).floor() as usize * 6).max(6);
                    points.extend(
                        (0..nphi).map(|j| PupilPoint::polar(r, 2. * PI * j as f64 / nphi as f64, 1.)),
                    );
                }
                Ok(points)
            }
            PupilSampling::Spokes {
                rings,
                spokes,
                spacing,
            } => {
                let spokes = spokes.unwrap_or(2 * rings + 1);
                if *rings == 0 || spokes == 0 {
                    return Err(SourceError::Sampling(format!(
                        "{spokes} spokes with {rings} rings"
                    )));
                }
                let (radii, weights) = match spacing {
                    Spacing::Uniform => (linspace(inner, outer, *rings), vec![1.; *rings]),
                    Spacing::GaussQuadrature => {
                        let (nodes, weights) = gauss_legendre(*rings)?;
                        let eps = inner / outer;
                        let area = PI * (1. - eps * eps);
                        (
                            nodes
                                .iter()
                                .map(|l| (eps * eps + (1. + l) * (1. - eps * eps) / 2.).sqrt() * outer)
                                .collect(),
                            weights
                                .iter()
                                .map(|w| w * area / (2. * spokes as f64))
                                .collect(),
                        )
                    }
                };
                Ok((0..spokes)
                    .flat_map(|s| {
                        let phi = 2. * PI * s as f64 / spokes as f64;
                        radii
                            .iter()
                            .zip(&weights)
                            .map(move |(&r, &w)| PupilPoint::polar(r, phi, w))
                    })
                    .collect())
            }
            PupilSampling::Random { n, seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                let (r2_min, r2_max) = (inner * inner, outer * outer);
                Ok((0..*n)
                    .map(|_| {
                        let r = rng.gen_range(r2_min..=r2_max).sqrt();
                        let phi = rng.gen_range(0f64..2. * PI);
                        PupilPoint::polar(r, phi, 1.)
                    })
                    .collect())
            }
            PupilSampling::UserSet { x, y } => {
                if x.len() != y.len() {
                    return Err(SourceError::Sampling(format!(
                        "{} x coordinates for {} y coordinates",
                        x.len(),
                        y.len()
                    )));
                }
                Ok(x.iter()
                    .zip(y)
                    .map(|(&x, &y)| PupilPoint::new(x, y))
                    .collect())
            }
        }
    }
    /// Checks if the sampling needs the pupil radius
    pub(crate) fn needs_pupil(&self) -> bool {
        !matches!(
            self,
            PupilSampling::UserSet { .. } | PupilSampling::Grid { lx: Some(_), .. }
        )
    }
}

/// Legendre polynomial `P_n(x)` and its derivative
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let (mut p0, mut p1) = (1., x);
    if n == 0 {
        return (1., 0.);
    }
    for k in 1..n {
        let k = k as f64;
        let p2 = ((2. * k + 1.) * x * p1 - k * p0) / (k + 1.);
        p0 = p1;
        p1 = p2;
    }
    (p1, n as f64 * (x * p1 - p0) / (x * x - 1.))
}

/// Nodes, in increasing order, and weights of the Gauss-Legendre quadrature of order `n` over `[-1,1]`
pub fn gauss_legendre(n: usize) -> Result<(Vec<f64>, Vec<f64>), SourceError> {
    let mut nodes = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for i in 0..n {
        let start = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut convergency = SimpleConvergency {
            eps: 1e-15,
            max_iter: 100,
        };
        let x = find_root_newton_raphson(
            start,
            |x| legendre(n, x).0,
            |x| legendre(n, x).1,
            &mut convergency,
        )
        .map_err(|_| SourceError::Quadrature(n))?;
        let dp = legendre(n, x).1;
        nodes.push(x);
        weights.push(2. / ((1. - x * x) * dp * dp));
    }
    nodes.reverse();
    weights.reverse();
    Ok((nodes, weights))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_axis_direction() {
        for projection in [
            Projection::Postel,
            Projection::Zemax,
            Projection::Gnomonic,
            Projection::Stereographic,
            Projection::Lambert,
            Projection::Orthographic,
        ] {
            let d = field_to_dir_cos(0., 0., projection).unwrap();
            assert_eq!(d, Vector3::new(0., 0., -1.));
        }
    }

    #[test]
    fn projections_are_unit_vectors() {
        for projection in [
            Projection::Postel,
            Projection::Zemax,
            Projection::Gnomonic,
            Projection::Stereographic,
            Projection::Lambert,
            Projection::Orthographic,
        ] {
            let d = field_to_dir_cos(0.1, -0.05, projection).unwrap();
            assert!((d.norm() - 1.).abs() < 1e-14, "{projection:?}");
            assert!(d.x > 0. && d.y < 0. && d.z < 0.);
        }
    }

    #[test]
    fn postel_is_equidistant() {
        let d = field_to_dir_cos(0.2, 0., Projection::Postel).unwrap();
        assert!((d.x - 0.2f64.sin()).abs() < 1e-15);
        assert!((d.z + 0.2f64.cos()).abs() < 1e-15);
    }

    #[test]
    fn orthographic_domain() {
        assert!(matches!(
            field_to_dir_cos(0.8, 0.8, Projection::Orthographic),
            Err(SourceError::Projection { .. })
        ));
    }

    #[test]
    fn quadrature() {
        let (nodes, weights) = gauss_legendre(5).unwrap();
        assert!((weights.iter().sum::<f64>() - 2.).abs() < 1e-14);
        assert!(nodes.windows(2).all(|x| x[0] < x[1]));
        let integral: f64 = nodes
            .iter()
            .zip(&weights)
            .map(|(x, w)| w * x.powi(8))
            .sum();
        assert!((integral - 2. / 9.).abs() < 1e-14);
    }

    #[test]
    fn grid_spacing() {
        let points = PupilSampling::Grid { nx: 5, lx: None }
            .points(0., 1.)
            .unwrap();
        // 5x5 grid with 0.5 spacing, corners included
        assert_eq!(points.len(), 25);
        assert!(points.contains(&PupilPoint::new(-1., 0.)));
        assert!(points.contains(&PupilPoint::new(0.5, 0.5)));
        assert!(points.contains(&PupilPoint::new(1., 1.)));
        // row major, x varies first
        assert_eq!(points[1], PupilPoint::new(-0.5, -1.));
    }

    #[test]
    fn polar_rings() {
        let points = PupilSampling::Polar { nrad: 3, naz: 12 }
            .points(0., 1.)
            .unwrap();
        // 12 + 6 rays on the rings and 1 ray at the center
        assert_eq!(points.len(), 19);
        assert_eq!(points.last(), Some(&PupilPoint::new(0., 0.)));
    }

    #[test]
    fn gauss_quadrature_spokes_flux() {
        let (inner, outer) = (0.4, 2.);
        let points = PupilSampling::Spokes {
            rings: 4,
            spokes: None,
            spacing: Spacing::GaussQuadrature,
        }
        .points(inner, outer)
        .unwrap();
        assert_eq!(points.len(), 4 * 9);
        let flux: f64 = points.iter().map(|p| p.weight).sum();
        let eps = inner / outer;
        assert!((flux - PI * (1. - eps * eps)).abs() < 1e-12);
        assert!(points
            .iter()
            .all(|p| p.x.hypot(p.y) > inner && p.x.hypot(p.y) < outer));
    }

    #[test]
    fn random_is_seeded() {
        let sampling = PupilSampling::Random { n: 100, seed: 7 };
        let a = sampling.points(0.1, 0.5).unwrap();
        assert_eq!(a, sampling.points(0.1, 0.5).unwrap());
        assert!(a.iter().all(|p| {
            let r = p.x.hypot(p.y);
            r >= 0.1 - 1e-15 && r <= 0.5 + 1e-15
        }));
    }
}
