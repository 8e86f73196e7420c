//!
//! # Wavefront analysis
//!
//! Exit pupil, reference sphere, wavefront and point spread functions of an [`OpticalTrain`].

use std::f64::consts::PI;

use nalgebra::Vector3;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::{
    optics::{OpticalTrain, OpticsError},
    rays::RayBatch,
    source::SourceBuilder,
    surface::{Shape, Surface},
    Builder,
};

/// Field angle of the chief ray used to locate the exit pupil
const CHIEF_RAY_FIELD: f64 = 1e-4;

impl OpticalTrain {
    /// Height of the exit pupil
    ///
    /// The exit pupil is where the chief ray from the field angle `theta`, once out of the train,
    /// crosses the z axis.
    pub fn exit_pupil_z(&self, wavelength: f64, theta: f64) -> crate::Result<f64> {
        let rays = SourceBuilder::new()
            .optic(self)
            .wavelength(wavelength)
            .field(0., theta)
            .from_stop(vec![0.], vec![0.])
            .build()?;
        let chief_ray = rays
            .ray(0)
            .map(|ray| self.trace_ray(&ray))
            .filter(|ray| !ray.failed() && ray.v.y != 0.)
            .ok_or(OpticsError::ExitPupil)?;
        let z = chief_ray.r.z - chief_ray.r.y * chief_ray.v.z / chief_ray.v.y;
        log::debug!("exit pupil at z = {z:.6}m");
        Ok(z)
    }
    /// Sphere centered on `point` with its vertex in the exit pupil
    pub fn reference_sphere(&self, point: &Vector3<f64>, wavelength: f64) -> crate::Result<Surface> {
        let z_xp = self.exit_pupil_z(wavelength, CHIEF_RAY_FIELD)?;
        Ok(Surface::new(Shape::Sphere {
            radius: point.z - z_xp,
        })?
        .with_shift([point.x, point.y, z_xp]))
    }
    /// Wavefront of the `rays` at the exit pupil, in units of `wavelength`
    ///
    /// The rays are traced through the train and their arrival times on the reference sphere,
    /// centered on the rays centroid, are compared to their mean: rays arriving late have a
    /// positive wavefront.
    /// The wavefront of vignetted rays is `None`.
    pub fn wavefront(&self, rays: &RayBatch, wavelength: f64) -> crate::Result<Vec<Option<f64>>> {
        let mut rays = rays.clone();
        self.trace(&mut rays)?;
        rays.to_coord_sys(&Default::default())?;
        let n_valid = rays.len() - rays.n_vignetted();
        if n_valid == 0 {
            log::warn!("no valid rays for the wavefront");
            return Ok(vec![None; rays.len()]);
        }
        let centroid = rays
            .iter()
            .filter(|ray| !ray.vignetted())
            .fold(Vector3::zeros(), |c, ray| c + ray.r)
            / n_valid as f64;
        let sphere = self.reference_sphere(&centroid, wavelength)?;
        // arrival times on the sphere, from the rays travelling backward
        let mut back = rays.reversed();
        sphere.intersect(&mut back)?;
        let t: Vec<_> = back
            .iter()
            .map(|ray| (!ray.vignetted()).then_some(-ray.t))
            .collect();
        let valid: Vec<f64> = t.iter().flatten().copied().collect();
        if valid.is_empty() {
            return Ok(t);
        }
        let t_ref = valid.iter().sum::<f64>() / valid.len() as f64;
        Ok(t.into_iter()
            .map(|t| t.map(|t| (t - t_ref) / wavelength))
            .collect())
    }
    /// Huygens point spread function of the `rays` at the given `points`
    ///
    /// The rays are traced through the train and the PSF is the squared modulus of the sum
    /// of the complex amplitudes of the rays that are not vignetted.
    pub fn huygens_psf(&self, rays: &RayBatch, points: &[Vector3<f64>]) -> crate::Result<Vec<f64>> {
        let mut rays = rays.clone();
        self.trace(&mut rays)?;
        Ok(points
            .par_iter()
            .map(|point| rays.sum_amplitude(point, 0., true).norm_sqr())
            .collect())
    }
    /// FFT point spread function of a source at the field angles `(theta_x, theta_y)`
    ///
    /// The wavefront is sampled with a `nx`x`nx` grid over the pupil and zero padded to
    /// `2nx`x`2nx`. The PSF is returned row major with its peak at the `(nx,nx)` pixel
    /// for an aberration free train.
    pub fn fft_psf(
        &self,
        theta_x: f64,
        theta_y: f64,
        wavelength: f64,
        nx: usize,
    ) -> crate::Result<Vec<f64>> {
        let rays = SourceBuilder::new()
            .optic(self)
            .wavelength(wavelength)
            .field(theta_x, theta_y)
            .grid(nx)
            .build()?;
        let wavefront = self.wavefront(&rays, wavelength)?;
        let n = 2 * nx;
        let mut field = vec![Complex::new(0f64, 0f64); n * n];
        for (k, w) in wavefront.iter().enumerate() {
            if let Some(w) = w {
                let (i, j) = (k / nx + nx / 2, k % nx + nx / 2);
                field[i * n + j] = Complex::from_polar(1., 2. * PI * w);
            }
        }
        let mut field = fftshift(&field, n);
        fft2(&mut field, n);
        let psf: Vec<_> = field.iter().map(|c| c.norm_sqr()).collect();
        log::debug!("{n}x{n} FFT PSF from {} rays", wavefront.iter().flatten().count());
        Ok(fftshift(&psf, n))
    }
}

/// Swaps the quadrants of a `n`x`n` array, `n` even
fn fftshift<T: Copy>(data: &[T], n: usize) -> Vec<T> {
    let h = n / 2;
    (0..n * n)
        .map(|k| data[((k / n + h) % n) * n + (k % n + h) % n])
        .collect()
}

fn transpose<T: Copy>(data: &[T], n: usize) -> Vec<T> {
    (0..n * n).map(|k| data[(k % n) * n + k / n]).collect()
}

/// In place 2D forward FFT of a `n`x`n` row major array
fn fft2(data: &mut [Complex<f64>], n: usize) {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    // rows
    fft.process(data);
    // columns
    let mut columns = transpose(data, n);
    fft.process(&mut columns);
    data.copy_from_slice(&transpose(&columns, n));
}
