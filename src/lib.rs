pub mod embedding;
pub mod metrics;
pub mod model;
pub mod preprocessing;

use anyhow::Result;
use ndarray::Array2;

use embedding::{build_embedding_matrix, embed_windows, load_glove};
use metrics::EvaluationReport;
use model::{EMBEDDING_SIZE, NUM_CLASSES, SEQUENCE_LENGTH};
use preprocessing::{
    label_to_int, one_hot, pad_sequence, train_test_split, FeedbackTokenizer, SPLIT_SEED,
    TEST_SIZE,
};

pub const TRAIN_CSV: &str = "train.csv";
pub const GLOVE_PATH: &str = "data/glove.6B.100d.txt";
pub const TOKENIZER_PATH: &str = "tokenizer.bin";

/// Train And Evaluate
/// Runs the full pipeline: load the labeled feedback, vectorize it, fit the
/// CNN on the training split and score the held-out split.
pub fn train_and_evaluate() -> Result<EvaluationReport> {
    tracing::info!("loading data");
    let (texts, labels) = preprocessing::load_data(TRAIN_CSV)?;

    let mut tokenizer: FeedbackTokenizer = FeedbackTokenizer::new();
    tokenizer.fit_on_texts(&texts);
    // dump it to a file, so the prediction path can reuse it
    tokenizer.save(TOKENIZER_PATH)?;
    tracing::info!(words = tokenizer.word_index.len(), "fitted tokenizer");

    let sequences: Vec<Vec<u32>> = tokenizer.texts_to_sequences(&texts);
    let x: Vec<Vec<u32>> = sequences
        .iter()
        .map(|s| pad_sequence(s, SEQUENCE_LENGTH))
        .collect();

    let y: Vec<u32> = labels.iter().map(|l| label_to_int(l)).collect::<Result<_>>()?;
    let y: Vec<Vec<f32>> = y.into_iter().map(|c| one_hot(c, NUM_CLASSES)).collect();

    let (x_train, y_train, x_test, y_test) = train_test_split(x, y, TEST_SIZE, SPLIT_SEED);
    tracing::info!(train = x_train.len(), test = x_test.len(), "split data");

    let embedding_index = load_glove(GLOVE_PATH, EMBEDDING_SIZE)?;
    let embedding_matrix: Array2<f32> =
        build_embedding_matrix(&tokenizer, &embedding_index, EMBEDDING_SIZE);

    let x_train: Vec<Vec<f32>> = x_train
        .iter()
        .map(|t| embed_windows(&embedding_matrix, t))
        .collect();
    let x_test: Vec<Vec<f32>> = x_test
        .iter()
        .map(|t| embed_windows(&embedding_matrix, t))
        .collect();

    model::train_sentiment_model(x_train, y_train)?;

    let y_pred: Vec<usize> = model::predict_classes(&x_test)?;
    let y_true: Vec<usize> = y_test.iter().map(|row| model::argmax(row)).collect();

    Ok(metrics::evaluate(&y_true, &y_pred, NUM_CLASSES))
}

/// Sentiment Prediction
/// Classifies one piece of feedback with the saved tokenizer and weights
pub fn predict_sentiment(sentence: &str) -> Result<&'static str> {
    let tokenizer: FeedbackTokenizer = FeedbackTokenizer::load(TOKENIZER_PATH)?;
    let embedding_index = load_glove(GLOVE_PATH, EMBEDDING_SIZE)?;
    let embedding_matrix: Array2<f32> =
        build_embedding_matrix(&tokenizer, &embedding_index, EMBEDDING_SIZE);

    let tokens: Vec<u32> = pad_sequence(&tokenizer.text_to_sequence(sentence), SEQUENCE_LENGTH);
    let windows: Vec<f32> = embed_windows(&embedding_matrix, &tokens);

    let classes: Vec<usize> = model::predict_classes(&[windows])?;
    Ok(preprocessing::int_to_label(classes[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires train.csv and data/glove.6B.100d.txt"]
    fn it_trains_and_evaluates_the_model() {
        let report = train_and_evaluate().unwrap();
        for score in [report.accuracy, report.precision, report.recall, report.f1_score] {
            assert!((0.0..=100.0).contains(&score));
        }
    }

    #[test]
    #[ignore = "requires a trained model on disk"]
    fn it_makes_a_prediction() {
        let sentence: &str = "The support team resolved my issue quickly, thank you!";
        let label: &str = predict_sentiment(sentence).unwrap();
        assert!(preprocessing::LABELS.contains(&label));
    }
}
