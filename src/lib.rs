//!
//! # Sequential optical ray tracing
//!
//! `optrace` traces bundles of rays through an ordered train of optical surfaces
//! (planes, conics, aspheres, ...) and computes, for each ray, the intersection with
//! every surface and the reflected or refracted direction.
//!
//! Rays are stored in a [`RayBatch`], a structure of arrays processed in parallel.
//! Per-ray problems (missing a surface, total internal reflection, ...) never abort a trace:
//! they are recorded in the sticky [`RayStatus`] of each ray.
//!
//! Elements are created with the builder associated to each of them.
//!
//! # Examples
//!
//! A single paraboloid mirror focusing a plane wave on a detector:
//!
//! ```
//! use optrace::{
//!     Builder, ElementBuilder, FromBuilder, OpticalTrain, SourceBuilder, SurfaceBuilder,
//! };
//! # fn main() -> optrace::Result<()> {
//! let train = OpticalTrain::builder()
//!     .pupil_size(1.)
//!     .element(ElementBuilder::mirror(
//!         "M1",
//!         SurfaceBuilder::paraboloid(4.).outer(0.6),
//!     ))
//!     .element(ElementBuilder::detector(
//!         "D",
//!         SurfaceBuilder::plane().vertex(2.),
//!     ))
//!     .build()?;
//! let mut rays = SourceBuilder::new()
//!     .optic(&train)
//!     .wavelength(500e-9)
//!     .polar(4, 24)
//!     .build()?;
//! train.trace(&mut rays)?;
//! assert_eq!(rays.n_failed(), 0);
//! # Ok(())
//! # }
//! ```

mod analysis;
pub mod coordinates;
pub mod error;
pub mod interaction;
pub mod medium;
pub mod optics;
pub mod rays;
pub mod source;
pub mod surface;

#[doc(inline)]
pub use self::coordinates::{CoordSys, CoordTransform};
#[doc(inline)]
pub use self::error::OptraceError;
#[doc(inline)]
pub use self::interaction::Interaction;
#[doc(inline)]
pub use self::medium::{Interpolant, Medium, Table};
#[doc(inline)]
pub use self::optics::{
    ElementBuilder, ElementId, OpticalElement, OpticalTrain, OpticalTrainBuilder, TraceStep,
};
#[doc(inline)]
pub use self::rays::{Column, Ray, RayBatch, RayBatchBuilder, RayStatus};
#[doc(inline)]
pub use self::source::{Origin, Projection, PupilSampling, SourceBuilder, Spacing};
#[doc(inline)]
pub use self::surface::{Aperture, Shape, Surface, SurfaceBuilder};

pub type Result<T> = std::result::Result<T, OptraceError>;

/// Builder type trait
pub trait Builder: Default {
    type Component;
    fn new() -> Self {
        Default::default()
    }
    fn build(self) -> Result<Self::Component>;
}

/// Access to the builder of a component
///
/// ```
/// use optrace::{Builder, FromBuilder, Surface};
/// let m1 = Surface::builder().build().unwrap();
/// ```
pub trait FromBuilder {
    type ComponentBuilder: Builder;
    fn builder() -> Self::ComponentBuilder {
        Self::ComponentBuilder::new()
    }
}
