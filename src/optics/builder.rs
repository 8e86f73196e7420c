use std::{
    collections::HashSet,
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use super::{OpticalElement, OpticalTrain, OpticsError};
use crate::{
    interaction::Interaction, medium::Medium, surface::SurfaceBuilder, Builder, FromBuilder,
};

#[derive(Debug, thiserror::Error)]
pub enum OpticalTrainBuilderError {
    #[error("cannot open `::optrace::OpticalTrainBuilder` toml file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create `::optrace::OpticalTrainBuilder` toml file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot read `::optrace::OpticalTrainBuilder` toml file: {1}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("cannot write `::optrace::OpticalTrainBuilder` toml file: {1}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("cannot deserialize `::optrace::OpticalTrainBuilder` from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize `::optrace::OpticalTrainBuilder` into toml")]
    Save(#[from] toml::ser::Error),
}

/// [`OpticalElement`] builder
///
/// The medium after the element defaults to the medium before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBuilder {
    name: String,
    interaction: Interaction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    medium: Option<Medium>,
    surface: SurfaceBuilder,
}
impl ElementBuilder {
    pub fn new<S: Into<String>>(name: S, interaction: Interaction, surface: SurfaceBuilder) -> Self {
        Self {
            name: name.into(),
            interaction,
            medium: None,
            surface,
        }
    }
    pub fn mirror<S: Into<String>>(name: S, surface: SurfaceBuilder) -> Self {
        Self::new(name, Interaction::Mirror, surface)
    }
    /// Refracting surface into the medium `medium`
    pub fn lens<S: Into<String>>(name: S, surface: SurfaceBuilder, medium: Medium) -> Self {
        Self::new(name, Interaction::Lens, surface).medium(medium)
    }
    pub fn filter<S: Into<String>>(name: S, surface: SurfaceBuilder) -> Self {
        Self::new(name, Interaction::Filter, surface)
    }
    pub fn detector<S: Into<String>>(name: S, surface: SurfaceBuilder) -> Self {
        Self::new(name, Interaction::Detector, surface)
    }
    /// Sets the medium after the element
    pub fn medium(self, medium: Medium) -> Self {
        Self {
            medium: Some(medium),
            ..self
        }
    }
}

/// [`OpticalTrain`] builder
///
/// The builder can be saved to and loaded from a toml file:
/// ```no_run
/// use optrace::{Builder, OpticalTrainBuilder};
/// # fn main() -> anyhow::Result<()> {
/// let train = OpticalTrainBuilder::load("telescope.toml")?.build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalTrainBuilder {
    #[serde(default)]
    in_medium: Medium,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pupil_size: Option<f64>,
    #[serde(default = "default_back_dist")]
    back_dist: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stop_surface: Option<SurfaceBuilder>,
    #[serde(default)]
    elements: Vec<ElementBuilder>,
}
fn default_back_dist() -> f64 {
    40.
}
impl Default for OpticalTrainBuilder {
    fn default() -> Self {
        Self {
            in_medium: Medium::vacuum(),
            pupil_size: None,
            back_dist: default_back_dist(),
            stop_surface: None,
            elements: Vec::new(),
        }
    }
}
impl FromBuilder for OpticalTrain {
    type ComponentBuilder = OpticalTrainBuilder;
}
impl OpticalTrainBuilder {
    /// Load the optical train builder from a toml file
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, OpticalTrainBuilderError> {
        let mut file = File::open(&path)
            .map_err(|e| OpticalTrainBuilderError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| OpticalTrainBuilderError::Read(e, path.as_ref().to_path_buf()))?;
        let builder: OpticalTrainBuilder = toml::from_str(&toml)?;
        Ok(builder)
    }
    /// Save the optical train builder into a toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), OpticalTrainBuilderError> {
        let toml = toml::to_string_pretty(self)?;
        let mut file = File::create(&path)
            .map_err(|e| OpticalTrainBuilderError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# ::optrace::OpticalTrainBuilder\n\n{}", toml)
            .map_err(|e| OpticalTrainBuilderError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    /// Sets the medium the rays enter the train from
    pub fn in_medium(self, in_medium: Medium) -> Self {
        Self { in_medium, ..self }
    }
    /// Sets the entrance pupil diameter
    pub fn pupil_size(self, pupil_size: f64) -> Self {
        Self {
            pupil_size: Some(pupil_size),
            ..self
        }
    }
    /// Sets the distance from the stop surface the rays start from
    pub fn back_dist(self, back_dist: f64) -> Self {
        Self { back_dist, ..self }
    }
    /// Sets the stop surface, by default the plane `z = 0` of the global frame
    pub fn stop_surface(self, stop_surface: SurfaceBuilder) -> Self {
        Self {
            stop_surface: Some(stop_surface),
            ..self
        }
    }
    /// Appends an element to the train
    pub fn element(mut self, element: ElementBuilder) -> Self {
        self.elements.push(element);
        self
    }
}
impl Builder for OpticalTrainBuilder {
    type Component = OpticalTrain;
    fn build(self) -> crate::Result<OpticalTrain> {
        if self.elements.is_empty() {
            return Err(OpticsError::Empty.into());
        }
        let mut names = HashSet::new();
        if let Some(element) = self.elements.iter().find(|e| !names.insert(e.name.as_str())) {
            return Err(OpticsError::DuplicateName(element.name.clone()).into());
        }
        if !(self.back_dist.is_finite() && self.back_dist > 0.) {
            return Err(OpticsError::Parameter(format!("back_dist = {}", self.back_dist)).into());
        }
        if let Some(pupil_size) = self.pupil_size.filter(|p| !(p.is_finite() && *p > 0.)) {
            return Err(OpticsError::Parameter(format!("pupil_size = {pupil_size}")).into());
        }

        let mut medium = self.in_medium.clone();
        let mut elements = Vec::with_capacity(self.elements.len());
        for element in self.elements {
            let medium_after = element.medium.unwrap_or_else(|| medium.clone());
            elements.push(Arc::new(OpticalElement {
                name: element.name,
                surface: element.surface.build()?,
                interaction: element.interaction,
                medium_before: medium,
                medium_after: medium_after.clone(),
            }));
            medium = medium_after;
        }
        let train = OpticalTrain {
            elements,
            in_medium: self.in_medium,
            stop_surface: self.stop_surface.unwrap_or_default().build()?,
            pupil_size: self.pupil_size,
            back_dist: self.back_dist,
        };
        log::info!(
            "optical train with {} elements: {}",
            train.len(),
            train.names().join(" -> ")
        );
        Ok(train)
    }
}
