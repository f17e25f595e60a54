use std::sync::Arc;

use crate::adapters::{LibavEncoderFactory, LibavMediaBackend, PipelineConfig};
use crate::app::pipeline::Pipeline;
use crate::error::ReelcutResult;
use crate::ports::{EncoderFactory, MediaBackend};

pub trait AppContainer: Send + Sync {
    fn pipeline(&self) -> Pipeline;
}

/// Wires the libav adapters into a [`Pipeline`]
pub struct DefaultAppContainer {
    pipeline: Pipeline,
}

impl DefaultAppContainer {
    pub fn new(config: PipelineConfig) -> ReelcutResult<Self> {
        crate::init()?;

        let backend = Arc::new(LibavMediaBackend::new());
        let encoders = Arc::new(LibavEncoderFactory::new());
        let pipeline = Pipeline::new(
            Arc::clone(&backend) as Arc<dyn MediaBackend>,
            Arc::clone(&encoders) as Arc<dyn EncoderFactory>,
            config,
        );

        Ok(Self { pipeline })
    }
}

impl AppContainer for DefaultAppContainer {
    fn pipeline(&self) -> Pipeline {
        self.pipeline.clone()
    }
}
