use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::model::{CONV_STEPS, EMBEDDING_SIZE, KERNEL_SIZE, SEQUENCE_LENGTH, WINDOW_DIM};
use crate::preprocessing::FeedbackTokenizer;

/// Read GloVe
/// Parses a pretrained GloVe vectors file into a word -> vector map.
/// Each line is a word followed by `dim` whitespace-separated floats.
pub fn load_glove(path: impl AsRef<Path>, dim: usize) -> Result<HashMap<String, Vec<f32>>> {
    let file: File = File::open(path.as_ref())
        .with_context(|| format!("cannot open '{}'", path.as_ref().display()))?;
    let reader: BufReader<File> = BufReader::new(file);

    let progress: ProgressBar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} reading glove vectors: {pos} lines")
            .expect("valid template"),
    );

    let mut embedding_index: HashMap<String, Vec<f32>> = HashMap::new();
    for line in reader.lines() {
        let line: String = line?;
        let mut values = line.split_whitespace();
        let word: &str = match values.next() {
            Some(w) => w,
            None => continue,
        };
        let vector: Vec<f32> = values
            .map(|v| v.parse::<f32>())
            .collect::<Result<Vec<f32>, _>>()
            .with_context(|| format!("malformed glove line for word '{}'", word))?;
        if vector.len() != dim {
            bail!(
                "glove vector for '{}' has {} components, expected {}",
                word,
                vector.len(),
                dim
            );
        }
        embedding_index.insert(word.to_string(), vector);
        progress.inc(1);
    }
    progress.finish_and_clear();

    tracing::info!("loaded {} pretrained word vectors", embedding_index.len());
    Ok(embedding_index)
}

/// Builds the embedding lookup matrix, one row per vocabulary id.
/// Row 0 (padding) and rows for words missing from the pretrained set
/// stay all zeros.
pub fn build_embedding_matrix(
    tokenizer: &FeedbackTokenizer,
    embedding_index: &HashMap<String, Vec<f32>>,
    dim: usize,
) -> Array2<f32> {
    let mut matrix: Array2<f32> = Array2::zeros((tokenizer.vocab_len(), dim));
    for (word, &id) in &tokenizer.word_index {
        if let Some(vector) = embedding_index.get(word) {
            for (j, &v) in vector.iter().enumerate() {
                matrix[[id as usize, j]] = v;
            }
        }
    }
    matrix
}

/// Looks up the embedding of every token and unfolds the result into
/// sliding windows of `KERNEL_SIZE` consecutive word vectors, concatenated.
/// The embedding is frozen, so this runs outside the autograd graph and the
/// convolution reduces to a dense layer over the window values.
pub fn embed_windows(matrix: &Array2<f32>, tokens: &[u32]) -> Vec<f32> {
    assert_eq!(tokens.len(), SEQUENCE_LENGTH);
    assert_eq!(matrix.ncols(), EMBEDDING_SIZE);

    let mut windows: Vec<f32> = Vec::with_capacity(CONV_STEPS * WINDOW_DIM);
    for t in 0..CONV_STEPS {
        for k in 0..KERNEL_SIZE {
            let row = matrix.row(tokens[t + k] as usize);
            windows.extend(row.iter());
        }
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn glove_fixture(name: &str, dim: usize) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("glove_{}_{}d.txt", name, dim));
        let mut f = File::create(&path).unwrap();
        writeln!(f, "good {}", vec!["0.5"; dim].join(" ")).unwrap();
        writeln!(f, "bad {}", vec!["-0.5"; dim].join(" ")).unwrap();
        path
    }

    #[test]
    fn it_parses_glove_lines() {
        let path = glove_fixture("parse", 4);
        let index = load_glove(&path, 4).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index["good"], vec![0.5, 0.5, 0.5, 0.5]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn it_rejects_wrong_vector_width() {
        let path = glove_fixture("width", 4);
        assert!(load_glove(&path, 100).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn it_zero_fills_missing_words() {
        let mut tokenizer = FeedbackTokenizer::new();
        tokenizer.fit_on_texts(&["good unseen".to_string()]);

        let mut index: HashMap<String, Vec<f32>> = HashMap::new();
        index.insert("good".to_string(), vec![1.0, 2.0, 3.0]);

        let matrix = build_embedding_matrix(&tokenizer, &index, 3);
        assert_eq!(matrix.dim(), (3, 3));

        let good_id = tokenizer.word_index["good"] as usize;
        let unseen_id = tokenizer.word_index["unseen"] as usize;
        assert_eq!(matrix.row(good_id).to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(matrix.row(unseen_id).to_vec(), vec![0.0, 0.0, 0.0]);
        // padding row
        assert_eq!(matrix.row(0).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn it_unfolds_into_conv_windows() {
        let matrix: Array2<f32> =
            Array2::from_shape_fn((4, EMBEDDING_SIZE), |(i, _)| i as f32);
        let tokens: Vec<u32> = (0..SEQUENCE_LENGTH).map(|i| (i % 4) as u32).collect();

        let windows = embed_windows(&matrix, &tokens);
        assert_eq!(windows.len(), CONV_STEPS * WINDOW_DIM);
        // first window concatenates the vectors of tokens 0, 1, 2
        assert_eq!(windows[0], 0.0);
        assert_eq!(windows[EMBEDDING_SIZE], 1.0);
        assert_eq!(windows[2 * EMBEDDING_SIZE], 2.0);
    }
}
