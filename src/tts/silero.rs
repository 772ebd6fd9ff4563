use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::Deserialize;

use crate::error::AppError;
use crate::tts::SpeechModel;

/// Sidecar JSON shipped next to each ONNX export: the symbol table the model
/// was trained with, its speaker roster, and the sample rates it can emit.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub symbols: String,
    pub speakers: Vec<String>,
    #[serde(default = "default_sample_rates")]
    pub sample_rates: Vec<u32>,
}

fn default_sample_rates() -> Vec<u32> {
    vec![8_000, 24_000, 48_000]
}

pub struct SileroEngine {
    session: Mutex<Session>,
    symbol_ids: HashMap<char, i64>,
    speakers: Vec<String>,
    sample_rates: Vec<u32>,
}

impl SileroEngine {
    /// Load an ONNX export plus its `<model>.json` sidecar config.
    pub fn load(model_path: &Path) -> Result<Self, AppError> {
        let config_path = PathBuf::from(format!("{}.json", model_path.display()));
        let config: ModelConfig = serde_json::from_reader(File::open(&config_path)?)?;

        let session = Session::builder()
            .map_err(|e| AppError::Model(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| AppError::Model(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| AppError::Model(format!("failed to set threads: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| AppError::Model(format!("failed to load model: {e}")))?;

        Ok(Self {
            session: Mutex::new(session),
            symbol_ids: symbol_table(&config.symbols),
            speakers: config.speakers,
            sample_rates: config.sample_rates,
        })
    }
}

impl SpeechModel for SileroEngine {
    fn apply_tts(
        &self,
        text: &str,
        speaker: &str,
        sample_rate: u32,
    ) -> Result<ArrayD<f32>, AppError> {
        let speaker_id = self
            .speakers
            .iter()
            .position(|s| s == speaker)
            .ok_or_else(|| AppError::Model(format!("unknown speaker: {speaker}")))?
            as i64;

        if !self.sample_rates.contains(&sample_rate) {
            return Err(AppError::Model(format!(
                "unsupported sample rate: {sample_rate}"
            )));
        }

        let ids = text_to_ids(text, &self.symbol_ids);
        if ids.is_empty() {
            return Ok(ArrayD::zeros(IxDyn(&[1, 0])));
        }

        let input_len = ids.len();

        // input: [batch, sequence] = [1, symbol_count]
        let input_value = Value::from_array((vec![1, input_len], ids))
            .map_err(|e| AppError::Model(format!("failed to create input tensor: {e}")))?;

        // input_lengths: [batch] = [1]
        let lengths_value = Value::from_array((vec![1], vec![input_len as i64]))
            .map_err(|e| AppError::Model(format!("failed to create lengths tensor: {e}")))?;

        // sid: [batch] = [1]
        let speaker_value = Value::from_array((vec![1], vec![speaker_id]))
            .map_err(|e| AppError::Model(format!("failed to create speaker tensor: {e}")))?;

        // sr: [batch] = [1]
        let rate_value = Value::from_array((vec![1], vec![sample_rate as i64]))
            .map_err(|e| AppError::Model(format!("failed to create sample-rate tensor: {e}")))?;

        let mut session = self.session.lock().unwrap();
        let outputs = session
            .run(ort::inputs![input_value, lengths_value, speaker_value, rate_value])
            .map_err(|e| AppError::Model(format!("inference failed: {e}")))?;

        let output = outputs
            .get("output")
            .or_else(|| outputs.get("audio"))
            .ok_or_else(|| AppError::Model("missing output tensor".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Model(format!("failed to extract output tensor: {e}")))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
            .map_err(|e| AppError::Model(format!("inconsistent output shape: {e}")))
    }
}

fn symbol_table(symbols: &str) -> HashMap<char, i64> {
    symbols
        .chars()
        .enumerate()
        .map(|(i, c)| (c, i as i64))
        .collect()
}

/// Map text to the model's symbol ids. Characters outside the symbol table
/// are skipped, matching how the upstream exports tokenize.
pub fn text_to_ids(text: &str, symbol_ids: &HashMap<char, i64>) -> Vec<i64> {
    text.chars()
        .filter_map(|c| symbol_ids.get(&c).copied())
        .collect()
}
