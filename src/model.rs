use anyhow::{anyhow, Result};

use dfdx::losses::cross_entropy_with_logits_loss;
use dfdx::nn::DeviceBuildExt;
use dfdx::nn::ModuleMut;
use dfdx::nn::ZeroGrads;
use dfdx::optim::Adam;
use dfdx::optim::Optimizer;
use dfdx::shapes::{Axis, Const};
use dfdx::tensor::TensorFrom;
use dfdx::tensor::TensorFromVec;
use dfdx::tensor::{AsArray, AutoDevice, Tensor, Trace};
use dfdx::tensor_ops::Backward;
use dfdx::tensor_ops::MaxTo;

use dfdx::nn::SaveToNpz;
use dfdx::prelude::{LoadFromNpz, Module, SaveToSafetensors};

pub const EPOCHS: usize = 10;
pub const SEQUENCE_LENGTH: usize = 100; // the length of all sequences (number of words per sample)
pub const EMBEDDING_SIZE: usize = 100; // Using 100-Dimensional GloVe embedding vectors
pub const KERNEL_SIZE: usize = 3; // Conv window of 3 consecutive words
pub const CONV_STEPS: usize = SEQUENCE_LENGTH - KERNEL_SIZE + 1; // valid positions for the conv window
pub const WINDOW_DIM: usize = KERNEL_SIZE * EMBEDDING_SIZE; // concatenated word vectors per window
pub const NUM_FILTERS: usize = 128; // Conv output channels
pub const HIDDEN_DIM: usize = 64; // Dense layer between pooling and the classifier
pub const NUM_CLASSES: usize = 5; // frustrated, negative, neutral, positive, satisfied

pub const MODEL_SAFETENSORS: &str = "cnn_model.safetensors";
pub const MODEL_NPZ: &str = "cnn_model.npz";

type Device = dfdx::tensor::Cpu;
type DType = f32;

// The embedding lookup is frozen, so each sample arrives pre-embedded and
// unfolded into CONV_STEPS windows of WINDOW_DIM values. Applied to those
// windows, the first Linear is exactly a width-3 Conv1D with 128 filters.
type SentimentCnn = (
    dfdx::nn::builders::Linear<WINDOW_DIM, NUM_FILTERS>,
    dfdx::nn::builders::ReLU,
    dfdx::nn::builders::Linear<NUM_FILTERS, HIDDEN_DIM>,
    dfdx::nn::builders::ReLU,
    dfdx::nn::builders::Linear<HIDDEN_DIM, NUM_CLASSES>,
);

/// Train Model
/// Fits the sentiment CNN and writes the weights to disk
pub fn train_sentiment_model(x_train: Vec<Vec<f32>>, y_train: Vec<Vec<f32>>) -> Result<()> {
    assert_eq!(x_train.len(), y_train.len());

    let dev: Device = AutoDevice::default();
    let mut model = dev.build_module::<SentimentCnn, DType>();
    let mut grads = model.alloc_grads();
    let mut opt = Adam::new(&model, Default::default());

    let start: std::time::Instant = std::time::Instant::now();
    for epoch in 0..EPOCHS {
        let mut total_epoch_loss: f32 = 0.0;
        for (i, x_input) in x_train.iter().enumerate() {
            let x: Tensor<(Const<CONV_STEPS>, Const<WINDOW_DIM>), DType, Device> =
                dev.tensor_from_vec(x_input.clone(), (Const::<CONV_STEPS>, Const::<WINDOW_DIM>));

            let y_d: &[f32] = y_train[i].as_slice();
            let y_d_array: &[f32; NUM_CLASSES] = y_d.try_into().expect("wrong length");
            let target_probs: Tensor<(Const<NUM_CLASSES>,), DType, Device> = dev.tensor(y_d_array);

            let x: Tensor<(Const<CONV_STEPS>, Const<NUM_FILTERS>), DType, Device, dfdx::tensor::OwnedTape<DType, Device>> = model.0.forward_mut(x.leaky_trace());
            let x: Tensor<(Const<CONV_STEPS>, Const<NUM_FILTERS>), DType, Device, dfdx::tensor::OwnedTape<DType, Device>> = model.1.forward_mut(x);
            let x: Tensor<(Const<NUM_FILTERS>,), DType, Device, dfdx::tensor::OwnedTape<DType, Device>> = x.max(); // GlobalMaxPooling1D as library does not have one
            let x: Tensor<(Const<HIDDEN_DIM>,), DType, Device, dfdx::tensor::OwnedTape<DType, Device>> = model.2.forward_mut(x);
            let x: Tensor<(Const<HIDDEN_DIM>,), DType, Device, dfdx::tensor::OwnedTape<DType, Device>> = model.3.forward_mut(x);
            let logits: Tensor<(Const<NUM_CLASSES>,), DType, Device, dfdx::tensor::OwnedTape<DType, Device>> = model.4.forward_mut(x);

            let loss = cross_entropy_with_logits_loss(logits, target_probs);
            total_epoch_loss += loss.array();

            grads = loss.backward();
            opt.update(&mut model, &grads)
                .map_err(|e| anyhow!("optimizer update failed: {:?}", e))?;
            model.zero_grads(&mut grads);
        }

        tracing::info!(
            epoch = epoch + 1,
            loss = total_epoch_loss / x_train.len() as f32,
            "finished epoch"
        );
    }
    tracing::info!(elapsed = ?start.elapsed(), "training complete");

    model
        .save_safetensors(MODEL_SAFETENSORS)
        .map_err(|e| anyhow!("failed to save '{}': {:?}", MODEL_SAFETENSORS, e))?;
    model
        .save(MODEL_NPZ)
        .map_err(|e| anyhow!("failed to save '{}': {:?}", MODEL_NPZ, e))?;

    Ok(())
}

/// Get Predictions
/// Loads the trained weights once and predicts a class index per sample
pub fn predict_classes(x_samples: &[Vec<f32>]) -> Result<Vec<usize>> {
    let dev: Device = AutoDevice::default();
    let mut model = dev.build_module::<SentimentCnn, DType>();
    model
        .load(MODEL_NPZ)
        .map_err(|e| anyhow!("failed to load '{}': {:?}", MODEL_NPZ, e))?;

    let mut classes: Vec<usize> = Vec::with_capacity(x_samples.len());
    for x_input in x_samples {
        let x: Tensor<(Const<CONV_STEPS>, Const<WINDOW_DIM>), DType, Device> =
            dev.tensor_from_vec(x_input.clone(), (Const::<CONV_STEPS>, Const::<WINDOW_DIM>));

        let x: Tensor<(Const<CONV_STEPS>, Const<NUM_FILTERS>), DType, Device> = model.0.forward(x);
        let x: Tensor<(Const<CONV_STEPS>, Const<NUM_FILTERS>), DType, Device> = model.1.forward(x);
        let x: Tensor<(Const<NUM_FILTERS>,), DType, Device> = x.max(); // GlobalMaxPooling1D as library does not have one
        let x: Tensor<(Const<HIDDEN_DIM>,), DType, Device> = model.2.forward(x);
        let x: Tensor<(Const<HIDDEN_DIM>,), DType, Device> = model.3.forward(x);
        let logits: Tensor<(Const<NUM_CLASSES>,), DType, Device> = model.4.forward(x);

        let y_hat: Tensor<(Const<NUM_CLASSES>,), DType, Device> = logits.softmax::<Axis<0>>();
        let y_hat: Vec<f32> = y_hat.as_vec();
        classes.push(argmax(&y_hat));
    }

    Ok(classes)
}

/// Index of the largest value in a probability vector
pub fn argmax(values: &[f32]) -> usize {
    let mut best: usize = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_takes_the_first_max_on_ties() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), 1);
    }

    #[test]
    fn it_finds_the_argmax() {
        assert_eq!(argmax(&[0.05, 0.1, 0.7, 0.1, 0.05]), 2);
        assert_eq!(argmax(&[1.0]), 0);
    }

    #[test]
    fn conv_dimensions_line_up() {
        assert_eq!(CONV_STEPS, 98);
        assert_eq!(WINDOW_DIM, 300);
    }
}
