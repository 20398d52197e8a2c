use anyhow::Context;
use ndarray::Array4;
use std::path::Path;
use tract_onnx::prelude::*;

use crate::{error::PredictError, preprocess::INPUT_SHAPE};

pub type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Read-only image classifier shared by every request.
pub trait Classifier: Send + Sync + 'static {
    /// Raw logits for one `[1, 3, 224, 224]` input, one value per class.
    fn logits(&self, input: Array4<f32>) -> Result<Vec<f32>, PredictError>;
}

/// Index of the highest logit. Ties go to the first index.
pub fn argmax(logits: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in logits.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, top)| value > top) {
            best = Some((index, value));
        }
    }
    best.map(|(index, _)| index)
}

/// Checks the tensor shape, runs the model and picks the top-1 class.
pub fn classify(classifier: &dyn Classifier, input: Array4<f32>) -> Result<usize, PredictError> {
    if input.shape() != &INPUT_SHAPE[..] {
        return Err(PredictError::ShapeMismatch {
            expected: INPUT_SHAPE.to_vec(),
            got: input.shape().to_vec(),
        });
    }

    let logits = classifier.logits(input)?;
    argmax(&logits).ok_or_else(|| PredictError::UnexpectedOutput(vec![1, logits.len()]))
}

/// Parses the ONNX file, pins its input to `f32[1, 3, 224, 224]` and returns
/// the decluttered typed graph.
pub fn load_model(path: impl AsRef<Path>) -> anyhow::Result<TypedModel> {
    let path = path.as_ref();
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("Failed to load ONNX model from {:?}", path))?
        .with_input_fact(0, f32::fact(INPUT_SHAPE).into())?
        .into_typed()
        .context("Failed to type ONNX model")?
        .into_decluttered()
        .context("Failed to declutter ONNX model")?;

    tracing::info!(
        path = %path.display(),
        nodes = model.nodes().len(),
        "Loaded model"
    );
    Ok(model)
}

pub struct TractClassifier {
    plan: Plan,
}

impl TractClassifier {
    /// Optimizes the typed graph and freezes it into a runnable plan.
    pub fn new(model: TypedModel) -> anyhow::Result<Self> {
        let inputs = model.input_outlets()?;
        if inputs.len() != 1 {
            anyhow::bail!("Expected a single model input, found {}", inputs.len());
        }
        let fact = model.outlet_fact(inputs[0])?;
        if fact.shape.as_concrete() != Some(&INPUT_SHAPE[..]) {
            anyhow::bail!(
                "Model input shape {:?} does not match {:?}",
                fact.shape,
                INPUT_SHAPE
            );
        }

        let plan = model
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to make model runnable")?;

        Ok(Self { plan })
    }
}

impl Classifier for TractClassifier {
    fn logits(&self, input: Array4<f32>) -> Result<Vec<f32>, PredictError> {
        let tensor: Tensor = input.into();
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| PredictError::Inference(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| PredictError::Inference("model produced no output".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| PredictError::Inference(e.to_string()))?;

        match view.shape() {
            [1, classes] if *classes > 0 => Ok(view.iter().copied().collect()),
            shape => Err(PredictError::UnexpectedOutput(shape.to_vec())),
        }
    }
}
