use nalgebra::Vector3;

use super::{RayBatch, RayStatus, RaysError};
use crate::{coordinates::CoordSys, Builder, FromBuilder};

/// A ray batch column: either a single value broadcast to every ray or one value per ray
#[derive(Debug, Clone, PartialEq)]
pub enum Column<T> {
    Scalar(T),
    Array(Vec<T>),
}
impl<T: Copy> Column<T> {
    fn len(&self) -> usize {
        match self {
            Column::Scalar(_) => 1,
            Column::Array(values) => values.len(),
        }
    }
    fn broadcast(self, name: &'static str, n: usize) -> Result<Vec<T>, RaysError> {
        match self {
            Column::Scalar(value) => Ok(vec![value; n]),
            Column::Array(values) if values.len() == n => Ok(values),
            Column::Array(values) if values.len() == 1 => Ok(vec![values[0]; n]),
            Column::Array(values) => Err(RaysError::Shape {
                column: name,
                len: values.len(),
                expected: n,
            }),
        }
    }
}
macro_rules! impl_column_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Column<$t> {
                fn from(value: $t) -> Self {
                    Column::Scalar(value)
                }
            }
            impl From<Vec<$t>> for Column<$t> {
                fn from(values: Vec<$t>) -> Self {
                    Column::Array(values)
                }
            }
            impl From<&[$t]> for Column<$t> {
                fn from(values: &[$t]) -> Self {
                    Column::Array(values.to_vec())
                }
            }
        )*
    };
}
impl_column_from!(f64, bool);

/// [`RayBatch`] builder
///
/// Positions, velocities and wavelengths must be given, other columns default to
/// `t = 0`, `flux = 1` and neither vignetted nor failed.
/// Columns of length 1 are broadcast to the length of the other columns.
///
/// ```
/// use optrace::{Builder, FromBuilder, RayBatch};
/// let rays = RayBatch::builder()
///     .position(vec![-0.5, 0., 0.5], 0., 1.)
///     .velocity(0., 0., -1.)
///     .wavelength(500e-9)
///     .build()
///     .unwrap();
/// assert_eq!(rays.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct RayBatchBuilder {
    x: Option<Column<f64>>,
    y: Option<Column<f64>>,
    z: Option<Column<f64>>,
    vx: Option<Column<f64>>,
    vy: Option<Column<f64>>,
    vz: Option<Column<f64>>,
    t: Column<f64>,
    wavelength: Option<Column<f64>>,
    flux: Column<f64>,
    vignetted: Column<bool>,
    failed: Column<bool>,
    coord_sys: CoordSys,
}
impl Default for RayBatchBuilder {
    fn default() -> Self {
        Self {
            x: None,
            y: None,
            z: None,
            vx: None,
            vy: None,
            vz: None,
            t: Column::Scalar(0.),
            wavelength: None,
            flux: Column::Scalar(1.),
            vignetted: Column::Scalar(false),
            failed: Column::Scalar(false),
            coord_sys: CoordSys::global(),
        }
    }
}
impl RayBatchBuilder {
    /// Sets the rays positions
    pub fn position<X, Y, Z>(self, x: X, y: Y, z: Z) -> Self
    where
        X: Into<Column<f64>>,
        Y: Into<Column<f64>>,
        Z: Into<Column<f64>>,
    {
        Self {
            x: Some(x.into()),
            y: Some(y.into()),
            z: Some(z.into()),
            ..self
        }
    }
    /// Sets the rays velocities
    pub fn velocity<X, Y, Z>(self, vx: X, vy: Y, vz: Z) -> Self
    where
        X: Into<Column<f64>>,
        Y: Into<Column<f64>>,
        Z: Into<Column<f64>>,
    {
        Self {
            vx: Some(vx.into()),
            vy: Some(vy.into()),
            vz: Some(vz.into()),
            ..self
        }
    }
    pub fn time<T: Into<Column<f64>>>(self, t: T) -> Self {
        Self {
            t: t.into(),
            ..self
        }
    }
    /// Sets the rays vacuum wavelength in meters
    pub fn wavelength<T: Into<Column<f64>>>(self, wavelength: T) -> Self {
        Self {
            wavelength: Some(wavelength.into()),
            ..self
        }
    }
    pub fn flux<T: Into<Column<f64>>>(self, flux: T) -> Self {
        Self {
            flux: flux.into(),
            ..self
        }
    }
    pub fn vignetted<T: Into<Column<bool>>>(self, vignetted: T) -> Self {
        Self {
            vignetted: vignetted.into(),
            ..self
        }
    }
    pub fn failed<T: Into<Column<bool>>>(self, failed: T) -> Self {
        Self {
            failed: failed.into(),
            ..self
        }
    }
    /// Sets the coordinate system the rays are expressed in
    pub fn coord_sys(self, coord_sys: CoordSys) -> Self {
        Self { coord_sys, ..self }
    }
}
impl Builder for RayBatchBuilder {
    type Component = RayBatch;
    fn build(self) -> crate::Result<RayBatch> {
        let wavelength = self.wavelength.ok_or(RaysError::MissingWavelength)?;
        let x = self.x.ok_or(RaysError::Missing("x"))?;
        let y = self.y.ok_or(RaysError::Missing("y"))?;
        let z = self.z.ok_or(RaysError::Missing("z"))?;
        let vx = self.vx.ok_or(RaysError::Missing("vx"))?;
        let vy = self.vy.ok_or(RaysError::Missing("vy"))?;
        let vz = self.vz.ok_or(RaysError::Missing("vz"))?;
        let f64_columns = [&x, &y, &z, &vx, &vy, &vz, &self.t, &wavelength, &self.flux];
        let n = f64_columns
            .iter()
            .map(|c| c.len())
            .chain([self.vignetted.len(), self.failed.len()])
            .filter(|&len| len != 1)
            .max()
            .unwrap_or(1);

        let x = x.broadcast("x", n)?;
        let y = y.broadcast("y", n)?;
        let z = z.broadcast("z", n)?;
        let vx = vx.broadcast("vx", n)?;
        let vy = vy.broadcast("vy", n)?;
        let vz = vz.broadcast("vz", n)?;
        let vignetted = self.vignetted.broadcast("vignetted", n)?;
        let failed = self.failed.broadcast("failed", n)?;
        let rays = RayBatch {
            r: x
                .into_iter()
                .zip(y)
                .zip(z)
                .map(|((x, y), z)| Vector3::new(x, y, z))
                .collect(),
            v: vx
                .into_iter()
                .zip(vy)
                .zip(vz)
                .map(|((x, y), z)| Vector3::new(x, y, z))
                .collect(),
            t: self.t.broadcast("t", n)?,
            wavelength: wavelength.broadcast("wavelength", n)?,
            flux: self.flux.broadcast("flux", n)?,
            status: vignetted
                .into_iter()
                .zip(failed)
                .map(|(v, f)| RayStatus::from_flags(v, f))
                .collect(),
            coord_sys: self.coord_sys,
        };
        rays.validate()?;
        Ok(rays)
    }
}
impl FromBuilder for RayBatch {
    type ComponentBuilder = RayBatchBuilder;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OptraceError;

    #[test]
    fn broadcast() {
        let rays = RayBatch::builder()
            .position(vec![0., 1.], vec![2.], 3.)
            .velocity(0., 0., 1.)
            .wavelength(vec![500e-9, 600e-9])
            .build()
            .unwrap();
        assert_eq!(rays.len(), 2);
        assert_eq!(rays.y(), vec![2., 2.]);
        assert_eq!(rays.z(), vec![3., 3.]);
        assert_eq!(rays.flux(), &[1., 1.]);
    }

    #[test]
    fn shape_mismatch() {
        let rays = RayBatch::builder()
            .position(vec![0., 1.], vec![0., 1., 2.], 0.)
            .velocity(0., 0., 1.)
            .wavelength(500e-9)
            .build();
        assert!(matches!(
            rays,
            Err(OptraceError::Rays(RaysError::Shape { column: "x", .. }))
        ));
    }

    #[test]
    fn wavelength_is_required() {
        let rays = RayBatch::builder()
            .position(0., 0., 0.)
            .velocity(0., 0., 1.)
            .build();
        assert!(matches!(
            rays,
            Err(OptraceError::Rays(RaysError::MissingWavelength))
        ));
    }

    #[test]
    fn negative_wavelength() {
        let rays = RayBatch::builder()
            .position(0., 0., 0.)
            .velocity(0., 0., 1.)
            .wavelength(vec![500e-9, -1.])
            .build();
        assert!(matches!(
            rays,
            Err(OptraceError::Rays(RaysError::Wavelength { index: 1, .. }))
        ));
    }
}
