//!
//! # Optical media
//!
//! A [`Medium`] gives the refractive index as a function of the vacuum wavelength (in meters).
//!
//! ```
//! use optrace::Medium;
//! let silica = Medium::silica();
//! let n = silica.n(587.6e-9).unwrap();
//! assert!((n - 1.4585).abs() < 1e-4);
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum MediumError {
    #[error("wavelength {wavelength:e} outside of the table range [{min:e},{max:e}]")]
    Domain { wavelength: f64, min: f64, max: f64 },
    #[error("invalid wavelength: {0:e}")]
    Wavelength(f64),
    #[error("invalid refractive index table: {0}")]
    Table(String),
}

/// Table interpolation scheme
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolant {
    #[default]
    Linear,
    Floor,
    Ceil,
    Nearest,
}

#[derive(Serialize, Deserialize)]
struct TableData {
    wavelength: Vec<f64>,
    n: Vec<f64>,
    #[serde(default)]
    interpolant: Interpolant,
}

/// Refractive index table sorted by increasing wavelength
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableData", into = "TableData")]
pub struct Table {
    wavelength: Vec<f64>,
    n: Vec<f64>,
    interpolant: Interpolant,
}
impl TryFrom<TableData> for Table {
    type Error = MediumError;
    fn try_from(data: TableData) -> Result<Self, Self::Error> {
        Table::new(data.wavelength, data.n, data.interpolant)
    }
}
impl From<Table> for TableData {
    fn from(table: Table) -> Self {
        Self {
            wavelength: table.wavelength,
            n: table.n,
            interpolant: table.interpolant,
        }
    }
}
impl Table {
    /// Creates a new table from wavelengths in meters and refractive indices
    pub fn new(
        wavelength: Vec<f64>,
        n: Vec<f64>,
        interpolant: Interpolant,
    ) -> Result<Self, MediumError> {
        if wavelength.is_empty() || wavelength.len() != n.len() {
            return Err(MediumError::Table(format!(
                "{} wavelengths for {} indices",
                wavelength.len(),
                n.len()
            )));
        }
        if wavelength.windows(2).any(|w| w[1] <= w[0]) {
            return Err(MediumError::Table(
                "wavelengths must be strictly increasing".into(),
            ));
        }
        Ok(Self {
            wavelength,
            n,
            interpolant,
        })
    }
    fn eval(&self, wavelength: f64) -> Result<f64, MediumError> {
        let (min, max) = (self.wavelength[0], self.wavelength[self.wavelength.len() - 1]);
        if wavelength < min || wavelength > max {
            return Err(MediumError::Domain {
                wavelength,
                min,
                max,
            });
        }
        // index of the first entry above `wavelength`
        let i = self.wavelength.partition_point(|&w| w <= wavelength);
        if i == self.wavelength.len() {
            return Ok(self.n[i - 1]);
        }
        let (w0, w1) = (self.wavelength[i - 1], self.wavelength[i]);
        let (n0, n1) = (self.n[i - 1], self.n[i]);
        Ok(match self.interpolant {
            Interpolant::Linear => n0 + (n1 - n0) * (wavelength - w0) / (w1 - w0),
            Interpolant::Floor => n0,
            Interpolant::Ceil if wavelength == w0 => n0,
            Interpolant::Ceil => n1,
            Interpolant::Nearest if wavelength - w0 <= w1 - wavelength => n0,
            Interpolant::Nearest => n1,
        })
    }
}

/// Optical medium
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Medium {
    /// Wavelength independent index
    Const { n: f64 },
    /// Tabulated index
    Table(Table),
    /// Sellmeier dispersion formula with `c` in square microns
    Sellmeier { b: [f64; 3], c: [f64; 3] },
    /// Air with the pressure and the water vapour pressure in kPa and the temperature in K
    Air {
        pressure: f64,
        temperature: f64,
        h2o_pressure: f64,
    },
}
impl Default for Medium {
    fn default() -> Self {
        Self::vacuum()
    }
}
impl Medium {
    pub fn vacuum() -> Self {
        Self::Const { n: 1. }
    }
    /// Air at the default observatory conditions
    pub fn air() -> Self {
        Self::Air {
            pressure: 69.328,
            temperature: 293.15,
            h2o_pressure: 1.067,
        }
    }
    /// Fused silica
    pub fn silica() -> Self {
        Self::Sellmeier {
            b: [0.6961663, 0.4079426, 0.8974794],
            c: [0.0684043f64.powi(2), 0.1162414f64.powi(2), 9.896161f64.powi(2)],
        }
    }
    /// Refractive index at the vacuum `wavelength` given in meters
    pub fn n(&self, wavelength: f64) -> Result<f64, MediumError> {
        if !(wavelength.is_finite() && wavelength > 0.) {
            return Err(MediumError::Wavelength(wavelength));
        }
        match self {
            Medium::Const { n } => Ok(*n),
            Medium::Table(table) => table.eval(wavelength),
            Medium::Sellmeier { b, c } => {
                let w2 = (wavelength * 1e6).powi(2);
                let n2 = 1. + b.iter().zip(c).map(|(b, c)| b * w2 / (w2 - c)).sum::<f64>();
                Ok(n2.sqrt())
            }
            Medium::Air {
                pressure,
                temperature,
                h2o_pressure,
            } => {
                const KPA_TO_MMHG: f64 = 7.50061683;
                let p = pressure * KPA_TO_MMHG;
                let t = temperature - 273.15;
                let w = h2o_pressure * KPA_TO_MMHG;
                let sigma2 = (wavelength * 1e6).powi(2).recip();
                let mut nm1 = 64.328 + 29498.1 / (146. - sigma2) + 255.4 / (41. - sigma2);
                nm1 *= p * (1. + (1.049 - 0.0157 * t) * 1e-6 * p) / (720.883 * (1. + 0.003661 * t));
                nm1 -= (0.0624 - 0.000680 * sigma2) / (1. + 0.003661 * t) * w;
                Ok(1. + nm1 * 1e-6)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant() {
        let medium = Medium::Const { n: 1.33 };
        assert_eq!(medium.n(400e-9).unwrap(), 1.33);
        assert_eq!(medium.n(1e-3).unwrap(), 1.33);
    }

    #[test]
    fn invalid_wavelength() {
        assert!(matches!(
            Medium::vacuum().n(-500e-9),
            Err(MediumError::Wavelength(_))
        ));
        assert!(Medium::silica().n(f64::NAN).is_err());
    }

    #[test]
    fn table_interpolation() {
        let table = |interpolant| {
            Medium::Table(
                Table::new(vec![400e-9, 500e-9, 600e-9], vec![1.5, 1.4, 1.3], interpolant).unwrap(),
            )
        };
        let w = 420e-9;
        assert!((table(Interpolant::Linear).n(w).unwrap() - 1.48).abs() < 1e-12);
        assert_eq!(table(Interpolant::Floor).n(w).unwrap(), 1.5);
        assert_eq!(table(Interpolant::Ceil).n(w).unwrap(), 1.4);
        assert_eq!(table(Interpolant::Nearest).n(w).unwrap(), 1.5);
        assert_eq!(table(Interpolant::Linear).n(600e-9).unwrap(), 1.3);
        assert!(matches!(
            table(Interpolant::Linear).n(700e-9),
            Err(MediumError::Domain { .. })
        ));
    }

    #[test]
    fn unsorted_table() {
        assert!(Table::new(vec![500e-9, 400e-9], vec![1.4, 1.5], Interpolant::Linear).is_err());
        assert!(Table::new(vec![500e-9], vec![1.4, 1.5], Interpolant::Linear).is_err());
    }

    #[test]
    fn silica_dispersion() {
        let silica = Medium::silica();
        let blue = silica.n(486.1e-9).unwrap();
        let red = silica.n(656.3e-9).unwrap();
        assert!(blue > red);
        assert!((red - 1.4564).abs() < 1e-3);
    }

    #[test]
    fn air_is_close_to_one() {
        let n = Medium::air().n(500e-9).unwrap();
        assert!(n > 1. && n < 1.0003);
        let dry = Medium::Air {
            pressure: 101.325,
            temperature: 288.15,
            h2o_pressure: 0.,
        };
        let n = dry.n(633e-9).unwrap();
        assert!((n - 1.000277).abs() < 5e-6);
    }

    #[test]
    fn toml_round_trip() {
        #[derive(Serialize, Deserialize)]
        struct Media {
            media: Vec<Medium>,
        }
        let media = Media {
            media: vec![
                Medium::air(),
                Medium::silica(),
                Medium::Table(
                    Table::new(vec![4e-7, 5e-7], vec![1.5, 1.4], Interpolant::Nearest).unwrap(),
                ),
            ],
        };
        let toml = toml::to_string(&media).unwrap();
        let loaded: Media = toml::from_str(&toml).unwrap();
        assert_eq!(loaded.media, media.media);
    }
}
