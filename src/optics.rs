//!
//! # Optical trains
//!
//! An [`OpticalTrain`] is an ordered sequence of [`OpticalElement`]s traced one after the other.
//! A train is immutable: [`OpticalTrain::with_shift`] and the `with_rot_*` methods return a new
//! train sharing all the elements but the modified one.

use std::{fmt::Display, sync::Arc};

use crate::{
    interaction::Interaction,
    medium::Medium,
    rays::{Ray, RayBatch},
    surface::Surface,
};

mod builder;
pub use builder::{ElementBuilder, OpticalTrainBuilder, OpticalTrainBuilderError};

#[derive(Debug, thiserror::Error)]
pub enum OpticsError {
    #[error("optical train without elements")]
    Empty,
    #[error("duplicated element name: {0}")]
    DuplicateName(String),
    #[error("unknown element: {0}")]
    UnknownElement(String),
    #[error("invalid train parameter: {0}")]
    Parameter(String),
    #[error("chief ray lost while looking for the exit pupil")]
    ExitPupil,
}

/// Element identifier, either its index in the train or its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementId {
    Index(usize),
    Name(String),
}
impl From<usize> for ElementId {
    fn from(index: usize) -> Self {
        ElementId::Index(index)
    }
}
impl From<&str> for ElementId {
    fn from(name: &str) -> Self {
        ElementId::Name(name.to_string())
    }
}
impl From<String> for ElementId {
    fn from(name: String) -> Self {
        ElementId::Name(name)
    }
}
impl Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementId::Index(index) => write!(f, "#{index}"),
            ElementId::Name(name) => write!(f, "{name}"),
        }
    }
}

/// A surface with the interaction it applies and the media on each side
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalElement {
    pub name: String,
    pub surface: Surface,
    pub interaction: Interaction,
    pub medium_before: Medium,
    pub medium_after: Medium,
}
impl OpticalElement {
    /// Intersects the rays with the element and applies the element interaction
    pub fn interact(&self, rays: &mut RayBatch) -> crate::Result<()> {
        self.surface.interact(
            rays,
            self.interaction,
            &self.medium_before,
            &self.medium_after,
        )
    }
    /// Intersects a ray, given in the global frame, with the element and applies the element interaction
    pub fn interact_ray(&self, ray: &Ray) -> Ray {
        self.surface.interact_ray(
            ray,
            self.interaction,
            &self.medium_before,
            &self.medium_after,
        )
    }
}

/// Rays entering and leaving an element
#[derive(Debug, Clone)]
pub struct TraceStep {
    pub name: String,
    pub in_rays: RayBatch,
    pub out_rays: RayBatch,
}

/// Sequence of optical elements
///
/// Use [`OpticalTrain::builder`](crate::FromBuilder::builder) to create a train.
#[derive(Debug, Clone)]
pub struct OpticalTrain {
    pub(crate) elements: Vec<Arc<OpticalElement>>,
    pub(crate) in_medium: Medium,
    pub(crate) stop_surface: Surface,
    pub(crate) pupil_size: Option<f64>,
    pub(crate) back_dist: f64,
}
impl OpticalTrain {
    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
    pub fn elements(&self) -> impl Iterator<Item = &OpticalElement> {
        self.elements.iter().map(|element| element.as_ref())
    }
    pub fn names(&self) -> Vec<&str> {
        self.elements().map(|e| e.name.as_str()).collect()
    }
    /// Medium the rays enter the train from
    pub fn in_medium(&self) -> &Medium {
        &self.in_medium
    }
    pub fn stop_surface(&self) -> &Surface {
        &self.stop_surface
    }
    /// Entrance pupil diameter
    pub fn pupil_size(&self) -> Option<f64> {
        self.pupil_size
    }
    /// Distance from the stop surface the rays start from
    pub fn back_dist(&self) -> f64 {
        self.back_dist
    }
    /// Index of the element `id`
    pub fn index<I: Into<ElementId>>(&self, id: I) -> Result<usize, OpticsError> {
        match id.into() {
            ElementId::Index(index) if index < self.len() => Ok(index),
            ElementId::Name(name) => self
                .elements()
                .position(|e| e.name == name)
                .ok_or(OpticsError::UnknownElement(name)),
            id => Err(OpticsError::UnknownElement(id.to_string())),
        }
    }
    pub fn element<I: Into<ElementId>>(&self, id: I) -> Result<&OpticalElement, OpticsError> {
        self.index(id).map(|index| self.elements[index].as_ref())
    }
    /// Traces the rays through all the elements, in place
    ///
    /// Rays that failed at one element go through the following elements untouched.
    pub fn trace(&self, rays: &mut RayBatch) -> crate::Result<()> {
        for element in &self.elements {
            element.interact(rays)?;
            log::debug!(
                "{}: {} vignetted and {} failed rays out of {}",
                element.name,
                rays.n_vignetted(),
                rays.n_failed(),
                rays.len()
            );
        }
        if !rays.is_empty() && rays.n_failed() == rays.len() {
            log::warn!("all the {} rays failed", rays.len());
        }
        Ok(())
    }
    /// Traces the rays through all the elements, returning the rays entering and leaving each element
    pub fn trace_full(&self, rays: RayBatch) -> crate::Result<Vec<TraceStep>> {
        let mut steps = Vec::with_capacity(self.len());
        let mut in_rays = rays;
        for element in &self.elements {
            let mut out_rays = in_rays.clone();
            element.interact(&mut out_rays)?;
            steps.push(TraceStep {
                name: element.name.clone(),
                in_rays,
                out_rays: out_rays.clone(),
            });
            in_rays = out_rays;
        }
        Ok(steps)
    }
    /// Traces a ray, given in the global frame, through all the elements
    pub fn trace_ray(&self, ray: &Ray) -> Ray {
        self.elements()
            .fold(*ray, |ray, element| element.interact_ray(&ray))
    }
    fn with_element<I, F>(&self, id: I, f: F) -> Result<Self, OpticsError>
    where
        I: Into<ElementId>,
        F: FnOnce(&Surface) -> Surface,
    {
        let index = self.index(id)?;
        let mut elements = self.elements.clone();
        let element = &self.elements[index];
        elements[index] = Arc::new(OpticalElement {
            surface: f(&element.surface),
            ..element.as_ref().clone()
        });
        Ok(Self {
            elements,
            ..self.clone()
        })
    }
    /// Returns a new train with the surface of the element `id` replaced
    pub fn with_surface<I: Into<ElementId>>(
        &self,
        id: I,
        surface: Surface,
    ) -> Result<Self, OpticsError> {
        self.with_element(id, |_| surface)
    }
    /// Returns a new train with the element `id` shifted by `dr` in the global frame
    pub fn with_shift<I: Into<ElementId>>(&self, id: I, dr: [f64; 3]) -> Result<Self, OpticsError> {
        self.with_element(id, |surface| surface.with_shift(dr))
    }
    /// Returns a new train with the element `id` rotated around its local x axis
    pub fn with_rot_x<I: Into<ElementId>>(&self, id: I, angle: f64) -> Result<Self, OpticsError> {
        self.with_element(id, |surface| surface.with_rot_x(angle))
    }
    /// Returns a new train with the element `id` rotated around its local y axis
    pub fn with_rot_y<I: Into<ElementId>>(&self, id: I, angle: f64) -> Result<Self, OpticsError> {
        self.with_element(id, |surface| surface.with_rot_y(angle))
    }
    /// Returns a new train with the element `id` rotated around its local z axis
    pub fn with_rot_z<I: Into<ElementId>>(&self, id: I, angle: f64) -> Result<Self, OpticsError> {
        self.with_element(id, |surface| surface.with_rot_z(angle))
    }
}
impl Display for OpticalTrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Optical train:")?;
        for (i, element) in self.elements().enumerate() {
            let o = element.surface.coord_sys().origin;
            writeln!(
                f,
                " {i:>2}. {:<12} {:?} @ [{:+.4},{:+.4},{:+.4}]",
                element.name, element.interaction, o.x, o.y, o.z
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Builder, FromBuilder, SurfaceBuilder};
    use nalgebra::Vector3;

    fn cassegrain() -> OpticalTrain {
        OpticalTrain::builder()
            .pupil_size(1.)
            .element(ElementBuilder::mirror(
                "M1",
                SurfaceBuilder::paraboloid(4.).outer(0.6).inner(0.1),
            ))
            .element(ElementBuilder::mirror(
                "M2",
                SurfaceBuilder::quadric(1.2, -2.).origin([0., 0., 1.5]).outer(0.2),
            ))
            .element(ElementBuilder::detector(
                "D",
                SurfaceBuilder::plane().vertex(-1.5),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn element_lookup() {
        let train = cassegrain();
        assert_eq!(train.index("M2").unwrap(), 1);
        assert_eq!(train.element(2usize).unwrap().name, "D");
        assert!(matches!(
            train.index("M3"),
            Err(OpticsError::UnknownElement(_))
        ));
        assert!(train.index(3usize).is_err());
    }

    #[test]
    fn copy_on_write() {
        let train = cassegrain();
        let shifted = train.with_shift("M2", [1e-3, 0., 0.]).unwrap();
        assert!(Arc::ptr_eq(&train.elements[0], &shifted.elements[0]));
        assert!(Arc::ptr_eq(&train.elements[2], &shifted.elements[2]));
        assert!(!Arc::ptr_eq(&train.elements[1], &shifted.elements[1]));
        let o = shifted.element("M2").unwrap().surface.coord_sys().origin;
        assert_eq!(o, Vector3::new(1e-3, 0., 1.5));
        assert_eq!(
            train.element("M2").unwrap().surface.coord_sys().origin,
            Vector3::new(0., 0., 1.5)
        );
    }

    #[test]
    fn trace_matches_trace_ray_and_trace_full() {
        let train = cassegrain().with_rot_x("M1", 1e-4).unwrap();
        let rays = RayBatch::builder()
            .position(vec![0.2, -0.3, 0.05, 0.], vec![0.1, 0.2, 0., 0.5], 5.)
            .velocity(0., 0., -1.)
            .wavelength(500e-9)
            .build()
            .unwrap();
        let mut traced = rays.clone();
        train.trace(&mut traced).unwrap();
        for (ray, expected) in rays.iter().zip(traced.iter()) {
            assert_eq!(train.trace_ray(&ray), expected);
        }
        let steps = train.trace_full(rays).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].out_rays, traced);
        assert_eq!(steps[1].in_rays, steps[0].out_rays);
    }

    #[test]
    fn status_is_monotone_along_the_train() {
        let train = cassegrain();
        let rays = RayBatch::builder()
            .position(vec![0.2, 0.05, 0.3, 0.59, 0.7], 0., 5.)
            .velocity(0., 0., -1.)
            .wavelength(500e-9)
            .build()
            .unwrap();
        let steps = train.trace_full(rays).unwrap();
        for step in &steps {
            for (a, b) in step.in_rays.status().iter().zip(step.out_rays.status()) {
                assert!(b >= a);
            }
        }
        let out = &steps[2].out_rays;
        // central obscuration and outside of M1
        assert!(out.vignetted()[1]);
        assert!(out.vignetted()[4]);
        assert!(!out.vignetted()[0]);
    }
}
