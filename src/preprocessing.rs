use anyhow::{bail, Context, Result};
use csv::Reader;
use ndarray::Array2;
use ndarray_csv::Array2Reader;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read as IoRead};
use std::path::Path;

/// The five sentiment categories, in class-index order.
pub const LABELS: [&str; 5] = ["frustrated", "negative", "neutral", "positive", "satisfied"];

/// Ratio of samples held out for testing
pub const TEST_SIZE: f64 = 0.25;

/// Seed for the shuffle before the train/test split
pub const SPLIT_SEED: u64 = 7;

// Punctuation stripped during tokenization
const WORD_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Label Encoding
/// Maps a sentiment label string to its class index
pub fn label_to_int(label: &str) -> Result<u32> {
    match LABELS.iter().position(|&l| l == label) {
        Some(i) => Ok(i as u32),
        None => bail!("unknown sentiment label '{}'", label),
    }
}

/// Maps a class index back to its sentiment label string
pub fn int_to_label(class: usize) -> &'static str {
    LABELS[class]
}

/// Word-level tokenizer fitted on the training corpus.
/// Ids are assigned from 1 in descending word-frequency order, with ties
/// broken by order of first appearance. Id 0 is reserved for padding.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FeedbackTokenizer {
    pub word_index: HashMap<String, u32>,
}

impl FeedbackTokenizer {
    pub fn new() -> Self {
        Self { word_index: HashMap::new() }
    }

    /// Builds the word index from the raw training texts
    pub fn fit_on_texts(&mut self, texts: &[String]) {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut seen: usize = 0;
        for text in texts {
            for word in split_words(text) {
                let entry = counts.entry(word).or_insert_with(|| {
                    seen += 1;
                    (0, seen)
                });
                entry.0 += 1;
            }
        }

        let mut ordered: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ordered.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

        self.word_index = ordered
            .into_iter()
            .enumerate()
            .map(|(i, (word, _))| (word, i as u32 + 1))
            .collect();
    }

    /// Converts one text into a sequence of word ids, skipping unknown words
    pub fn text_to_sequence(&self, text: &str) -> Vec<u32> {
        split_words(text)
            .into_iter()
            .filter_map(|w| self.word_index.get(&w).copied())
            .collect()
    }

    /// Converts a batch of texts into id sequences
    pub fn texts_to_sequences(&self, texts: &[String]) -> Vec<Vec<u32>> {
        texts.iter().map(|t| self.text_to_sequence(t)).collect()
    }

    /// Number of rows the embedding matrix needs (unique words + padding row)
    pub fn vocab_len(&self) -> usize {
        self.word_index.len() + 1
    }

    /// Serializes the fitted vocabulary so the prediction path can reuse it
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file: File = File::create(path.as_ref())
            .with_context(|| format!("cannot create '{}'", path.as_ref().display()))?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Loads a previously fitted vocabulary
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file: File = File::open(path.as_ref())
            .with_context(|| format!("cannot open '{}'", path.as_ref().display()))?;
        let tokenizer: Self = bincode::deserialize_from(BufReader::new(file))?;
        Ok(tokenizer)
    }
}

/// Lowercases, strips punctuation and splits on whitespace
fn split_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if WORD_FILTERS.contains(c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect()
}

/// Pads a sequence at the beginning with 0's, or truncates from the
/// beginning, so every sequence comes out at exactly `maxlen`.
/// For example with maxlen=4:
/// [[5, 3, 2], [5, 1, 2, 3], [3, 4]]
/// becomes:
/// [[0, 5, 3, 2], [5, 1, 2, 3], [0, 0, 3, 4]]
pub fn pad_sequence(seq: &[u32], maxlen: usize) -> Vec<u32> {
    if seq.len() >= maxlen {
        seq[seq.len() - maxlen..].to_vec()
    } else {
        let mut padded: Vec<u32> = vec![0; maxlen - seq.len()];
        padded.extend_from_slice(seq);
        padded
    }
}

/// One-hot encodes a class index into a probability target vector
pub fn one_hot(class: u32, num_classes: usize) -> Vec<f32> {
    let mut row: Vec<f32> = vec![0.0; num_classes];
    row[class as usize] = 1.0;
    row
}

/// Shuffles with a fixed seed and splits paired data into train and test sets
pub fn train_test_split<T: Clone, U: Clone>(
    x: Vec<T>,
    y: Vec<U>,
    test_size: f64,
    seed: u64,
) -> (Vec<T>, Vec<U>, Vec<T>, Vec<U>) {
    assert_eq!(x.len(), y.len());
    let data_len: usize = x.len();

    let mut indices: Vec<usize> = (0..data_len).collect();
    let mut rng: StdRng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_len: usize = ((data_len as f64) * test_size).ceil() as usize;
    let train_len: usize = data_len - test_len;

    let mut x_train: Vec<T> = Vec::with_capacity(train_len);
    let mut y_train: Vec<U> = Vec::with_capacity(train_len);
    let mut x_test: Vec<T> = Vec::with_capacity(test_len);
    let mut y_test: Vec<U> = Vec::with_capacity(test_len);

    for (pos, &i) in indices.iter().enumerate() {
        if pos < train_len {
            x_train.push(x[i].clone());
            y_train.push(y[i].clone());
        } else {
            x_test.push(x[i].clone());
            y_test.push(y[i].clone());
        }
    }

    (x_train, y_train, x_test, y_test)
}

/// Loads the feedback CSV as (texts, labels) column vectors.
/// The file is latin-1 encoded, so every byte maps directly to the
/// code point of the same value before the csv parse.
pub fn load_data(path: impl AsRef<Path>) -> Result<(Vec<String>, Vec<String>)> {
    let mut bytes: Vec<u8> = Vec::new();
    File::open(path.as_ref())
        .with_context(|| format!("cannot open '{}'", path.as_ref().display()))?
        .read_to_end(&mut bytes)?;
    let decoded: String = bytes.iter().map(|&b| b as char).collect();

    let mut reader: Reader<&[u8]> = Reader::from_reader(decoded.as_bytes());
    let data: Array2<String> = reader
        .deserialize_array2_dynamic()
        .map_err(|e| anyhow::anyhow!("malformed csv in '{}': {:?}", path.as_ref().display(), e))?;
    if data.ncols() != 2 {
        bail!("expected 2 columns (feedback, sentiment), got {}", data.ncols());
    }

    let texts: Vec<String> = data.column(0).to_vec();
    let labels: Vec<String> = data.column(1).to_vec();
    Ok((texts, labels))
}
