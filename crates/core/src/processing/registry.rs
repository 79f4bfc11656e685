//! Name → capability resolution.

use std::collections::HashMap;
use std::sync::Arc;

use super::error::ProcessorError;
use super::pipeline::FramePipeline;
use super::traits::{FrameBundle, FrameProcessor, WorkingFrame};

type Factory = Box<dyn Fn() -> Arc<dyn FrameProcessor> + Send + Sync>;

/// Maps configured capability names to constructors.
///
/// Names are only looked up while building a [`FramePipeline`]; the frame
/// hot path only ever sees trait objects.
#[derive(Default)]
pub struct ProcessorRegistry {
    factories: HashMap<String, Factory>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the capabilities that ship with the crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("passthrough", || Arc::new(PassthroughProcessor));
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn FrameProcessor> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds a pipeline in the order given.
    pub fn build_pipeline(&self, names: &[String]) -> Result<FramePipeline, ProcessorError> {
        names
            .iter()
            .map(|name| {
                self.factories
                    .get(name)
                    .map(|factory| factory())
                    .ok_or_else(|| ProcessorError::UnknownProcessor { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(FramePipeline::new)
    }
}

/// Leaves frames untouched.
pub struct PassthroughProcessor;

impl FrameProcessor for PassthroughProcessor {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn process_frame(
        &self,
        _bundle: &FrameBundle<'_>,
        working: WorkingFrame,
    ) -> Result<WorkingFrame, ProcessorError> {
        Ok(working)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProcessor;

    #[test]
    fn test_build_pipeline_in_order() {
        let mut registry = ProcessorRegistry::with_builtins();
        registry.register("tint", || Arc::new(MockProcessor::tinting("tint", [1, 0, 0])));

        let pipeline = registry
            .build_pipeline(&["tint".to_string(), "passthrough".to_string()])
            .unwrap();
        assert_eq!(pipeline.names(), vec!["tint", "passthrough"]);
    }

    #[test]
    fn test_unknown_processor() {
        let registry = ProcessorRegistry::with_builtins();
        let err = registry
            .build_pipeline(&["face_swapper".to_string()])
            .err()
            .unwrap();
        assert!(matches!(err, ProcessorError::UnknownProcessor { name } if name == "face_swapper"));
    }
}
