use crate::{
    medium::MediumError, optics::OpticalTrainBuilderError, optics::OpticsError,
    rays::RaysError, source::SourceError, surface::SurfaceError,
};

#[derive(Debug, thiserror::Error)]
pub enum OptraceError {
    #[error("refractive index evaluation failed")]
    Medium(#[from] MediumError),
    #[error("invalid surface")]
    Surface(#[from] SurfaceError),
    #[error("invalid `::optrace::RayBatch`")]
    Rays(#[from] RaysError),
    #[error("cannot trace through `::optrace::OpticalTrain`")]
    Optics(#[from] OpticsError),
    #[error("cannot generate rays from `::optrace::SourceBuilder`")]
    Source(#[from] SourceError),
    #[error("cannot load or save `::optrace::OpticalTrainBuilder`")]
    Config(#[from] OpticalTrainBuilderError),
}
