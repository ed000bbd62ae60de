use anyhow::{Result, bail};
use image::DynamicImage;
use ndarray::{ArrayView1, ArrayView2, Axis, Ix3};
use tracing::{debug, instrument};

use crate::{
    arch::{Decoding, RecognitionArch},
    hub::{ModelConfig, ModelFiles},
    predictor::PredictorOptions,
    preprocess::{self, Normalization},
    session::OnnxSession,
};

/// Digits, ASCII letters, punctuation, currency signs and French accents.
pub const FRENCH_VOCAB: &str = concat!(
    "0123456789",
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~",
    "°",
    "£€¥¢฿",
    "àâéèêëîïôùûüçÀÂÉÈÊËÎÏÔÙÛÜÇ",
);

pub struct RecognitionPredictor {
    arch: RecognitionArch,
    session: OnnxSession,
    input_size: (u32, u32),
    normalization: Normalization,
    vocab: Vec<char>,
    batch_size: usize,
}

impl RecognitionPredictor {
    pub fn load(
        arch: RecognitionArch,
        files: &ModelFiles,
        options: &PredictorOptions,
    ) -> Result<Self> {
        let spec = arch.spec();
        let config = ModelConfig::load(files.config.as_deref())?;
        let session = OnnxSession::load(&files.model, options.threads)?;

        let vocab: Vec<char> = config.vocab.as_deref().unwrap_or(FRENCH_VOCAB).chars().collect();
        if vocab.is_empty() {
            bail!("{arch}: model config declares an empty vocab");
        }

        Ok(Self {
            arch,
            session,
            input_size: config.input_size().unwrap_or(spec.input_size),
            normalization: Normalization {
                mean: config.mean.unwrap_or(spec.normalization.mean),
                std: config.std.unwrap_or(spec.normalization.std),
            },
            vocab,
            batch_size: options.reco_batch_size.max(1),
        })
    }

    /// Reads one word per crop, returning its text and confidence.
    #[instrument(level = "info", skip_all, fields(arch = %self.arch, crops = crops.len()))]
    pub fn predict(&mut self, crops: &[DynamicImage]) -> Result<Vec<(String, f32)>> {
        let mut words = Vec::with_capacity(crops.len());

        for batch in crops.chunks(self.batch_size) {
            // aspect ratio kept, padded bottom/right
            let inputs: Vec<_> = batch
                .iter()
                .map(|crop| preprocess::resize(crop, self.input_size, true, false).0)
                .collect();
            let tensor = preprocess::to_tensor(&inputs, self.input_size, &self.normalization);

            let output = self.session.run(tensor)?;
            let logits = output.into_dimensionality::<Ix3>()?;
            if logits.len_of(Axis(0)) != batch.len() {
                bail!(
                    "recognition returned {} sequences for {} crops",
                    logits.len_of(Axis(0)),
                    batch.len()
                );
            }

            for sequence in logits.outer_iter() {
                words.push(match self.arch.decoding() {
                    Decoding::Ctc => ctc_decode(sequence, &self.vocab),
                    Decoding::Attention => attention_decode(sequence, &self.vocab),
                });
            }
            debug!(batch = batch.len(), "batch recognized");
        }

        Ok(words)
    }
}

/// Argmax class of a logit row and its softmax probability.
fn best_class(logits: ArrayView1<f32>) -> (usize, f32) {
    let (index, max) = logits
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 { (i, v) } else { best }
        });
    let denominator: f32 = logits.iter().map(|v| (v - max).exp()).sum();
    (index, 1.0 / denominator)
}

/// Greedy CTC decoding over `(steps, classes)` logits, blank being the last
/// class.
pub fn ctc_decode(logits: ArrayView2<f32>, vocab: &[char]) -> (String, f32) {
    let blank = vocab.len();
    let mut text = String::new();
    let mut confidence = f32::INFINITY;
    let mut previous = None;

    for step in logits.outer_iter() {
        let (index, prob) = best_class(step);
        confidence = confidence.min(prob);
        if previous != Some(index) && index != blank {
            if let Some(c) = vocab.get(index) {
                text.push(*c);
            }
        }
        previous = Some(index);
    }

    (text, if confidence.is_finite() { confidence } else { 0.0 })
}

/// Greedy decoding for heads emitting one class per position, stopping at
/// the end-of-sequence class `vocab.len()`.
pub fn attention_decode(logits: ArrayView2<f32>, vocab: &[char]) -> (String, f32) {
    let eos = vocab.len();
    let mut text = String::new();
    let mut confidence = f32::INFINITY;

    for position in logits.outer_iter() {
        let (index, prob) = best_class(position);
        confidence = confidence.min(prob);
        if index == eos {
            break;
        }
        if let Some(c) = vocab.get(index) {
            text.push(*c);
        }
    }

    (text, if confidence.is_finite() { confidence } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    const VOCAB: [char; 3] = ['a', 'b', 'c'];

    /// Logits with a single strong class per row.
    fn one_hot(rows: &[usize], classes: usize) -> Array2<f32> {
        let mut logits = Array2::zeros((rows.len(), classes));
        for (row, &class) in rows.iter().enumerate() {
            logits[[row, class]] = 10.0;
        }
        logits
    }

    #[test]
    fn french_vocab_is_complete() {
        let vocab: Vec<char> = FRENCH_VOCAB.chars().collect();
        assert_eq!(vocab.len(), 10 + 52 + 32 + 1 + 5 + 26);
        assert!(vocab.contains(&'€'));
        assert!(vocab.contains(&'Ç'));
        assert!(vocab.contains(&'\\'));
    }

    #[test]
    fn softmax_probability_of_argmax() {
        let logits = ndarray::arr1(&[0.0f32, 0.0, 0.0, 0.0]);
        let (_, prob) = best_class(logits.view());
        assert!((prob - 0.25).abs() < 1e-6);

        let logits = ndarray::arr1(&[1.0f32, 3.0, 2.0]);
        let (index, prob) = best_class(logits.view());
        assert_eq!(index, 1);
        let expected = 3f32.exp() / (1f32.exp() + 3f32.exp() + 2f32.exp());
        assert!((prob - expected).abs() < 1e-6);
    }

    #[test]
    fn ctc_collapses_repeats_and_drops_blank() {
        // a a blank a b b blank c
        let logits = one_hot(&[0, 0, 3, 0, 1, 1, 3, 2], 4);
        let (text, confidence) = ctc_decode(logits.view(), &VOCAB);
        assert_eq!(text, "aabc");
        assert!(confidence > 0.99);
    }

    #[test]
    fn ctc_confidence_is_the_weakest_step() {
        let mut logits = one_hot(&[0, 1], 4);
        logits[[1, 1]] = 0.0;
        let (text, confidence) = ctc_decode(logits.view(), &VOCAB);
        assert_eq!(text, "a");
        assert!((confidence - 0.25).abs() < 1e-6);
    }

    #[test]
    fn attention_stops_at_eos() {
        // c a eos b
        let logits = one_hot(&[2, 0, 3, 1], 5);
        let (text, _) = attention_decode(logits.view(), &VOCAB);
        assert_eq!(text, "ca");
    }

    #[test]
    fn attention_ignores_confidence_after_eos() {
        let mut logits = one_hot(&[0, 3, 1], 5);
        logits[[2, 1]] = 0.0;
        let (text, confidence) = attention_decode(logits.view(), &VOCAB);
        assert_eq!(text, "a");
        assert!(confidence > 0.99);
    }

    #[test]
    fn attention_skips_special_classes() {
        // class 4 sits past the end-of-sequence index
        let logits = one_hot(&[4, 1, 3], 5);
        let (text, _) = attention_decode(logits.view(), &VOCAB);
        assert_eq!(text, "b");
    }

    #[test]
    fn empty_sequences_have_zero_confidence() {
        let logits = Array2::<f32>::zeros((0, 4));
        assert_eq!(ctc_decode(logits.view(), &VOCAB), (String::new(), 0.0));
        assert_eq!(attention_decode(logits.view(), &VOCAB), (String::new(), 0.0));
    }
}
