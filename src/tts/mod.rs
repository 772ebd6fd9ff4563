pub mod fetch;
pub mod silero;
pub mod voice;

use std::io::Cursor;
use std::sync::Arc;

use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::{Array2, ArrayD, Ix2};

use crate::error::AppError;

pub use silero::SileroEngine;
pub use voice::{RoutingPolicy, VoiceRoute};

/// All voices synthesize at this rate.
pub const SAMPLE_RATE: u32 = 24_000;

/// The synthesis collaborator: text plus a speaker name in, raw sample
/// tensor out. The tensor may be 1-D (samples) or 2-D (channels x samples).
pub trait SpeechModel: Send + Sync {
    fn apply_tts(
        &self,
        text: &str,
        speaker: &str,
        sample_rate: u32,
    ) -> Result<ArrayD<f32>, AppError>;
}

/// Holds the model handles, loaded once at startup and shared read-only
/// across requests.
pub struct TtsService {
    default_model: Arc<dyn SpeechModel>,
    english_model: Option<Arc<dyn SpeechModel>>,
    policy: RoutingPolicy,
}

impl TtsService {
    pub fn new(
        default_model: Arc<dyn SpeechModel>,
        english_model: Option<Arc<dyn SpeechModel>>,
        policy: RoutingPolicy,
    ) -> Self {
        Self {
            default_model,
            english_model,
            policy,
        }
    }

    /// Run the full pipeline for one request: pick a voice, synthesize,
    /// normalize the tensor, encode to WAV.
    pub fn synthesize(&self, text: &str) -> Result<Vec<u8>, AppError> {
        let (model, speaker) = self.select_voice(text);

        tracing::debug!(speaker, chars = text.chars().count(), "synthesizing");

        let audio = model.apply_tts(text, speaker, SAMPLE_RATE)?;
        let audio = to_channels(audio)?;
        encode_wav(&audio, SAMPLE_RATE)
    }

    fn select_voice(&self, text: &str) -> (&Arc<dyn SpeechModel>, &'static str) {
        match voice::route(self.policy, text) {
            VoiceRoute::English => match &self.english_model {
                Some(model) => (model, voice::ENGLISH_SPEAKER),
                None => (&self.default_model, voice::DEFAULT_SPEAKER),
            },
            VoiceRoute::Default => (&self.default_model, voice::DEFAULT_SPEAKER),
        }
    }
}

/// Coerce a model output tensor to exactly 2 dimensions. A 1-D result is
/// promoted to a single channel; anything above rank 2 is rejected.
fn to_channels(tensor: ArrayD<f32>) -> Result<Array2<f32>, AppError> {
    match tensor.ndim() {
        1 => {
            let samples = tensor.len();
            tensor
                .into_shape_with_order((1, samples))
                .map_err(|e| AppError::Model(format!("reshape failed: {e}")))
        }
        2 => tensor
            .into_dimensionality::<Ix2>()
            .map_err(|e| AppError::Model(format!("reshape failed: {e}"))),
        rank => Err(AppError::BadTensorRank(rank)),
    }
}

/// Encode channels x samples into an in-memory 16-bit PCM WAV file.
fn encode_wav(audio: &Array2<f32>, sample_rate: u32) -> Result<Vec<u8>, AppError> {
    let spec = WavSpec {
        channels: audio.nrows() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Vec::new();
    {
        let cursor = Cursor::new(&mut buffer);
        let mut writer = WavWriter::new(cursor, spec)?;

        for frame in audio.columns() {
            for sample in frame {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled)?;
            }
        }

        writer.finalize()?;
    }

    Ok(buffer)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::IxDyn;
    use std::sync::Mutex;

    /// Records what it was asked to synthesize and plays back a canned tensor.
    pub struct FakeModel {
        pub calls: Mutex<Vec<(String, String)>>,
        pub output: ArrayD<f32>,
    }

    impl FakeModel {
        pub fn returning(output: ArrayD<f32>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                output,
            })
        }
    }

    impl SpeechModel for FakeModel {
        fn apply_tts(
            &self,
            text: &str,
            speaker: &str,
            _sample_rate: u32,
        ) -> Result<ArrayD<f32>, AppError> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), speaker.to_string()));
            Ok(self.output.clone())
        }
    }

    fn mono(samples: &[f32]) -> ArrayD<f32> {
        ArrayD::from_shape_vec(IxDyn(&[samples.len()]), samples.to_vec()).unwrap()
    }

    #[test]
    fn one_dim_output_is_promoted_to_mono() {
        let out = to_channels(mono(&[0.0, 0.5, -0.5])).unwrap();
        assert_eq!(out.dim(), (1, 3));
    }

    #[test]
    fn two_dim_output_passes_through() {
        let stereo = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.0, 0.1, 0.2, 0.3]).unwrap();
        let out = to_channels(stereo).unwrap();
        assert_eq!(out.dim(), (2, 2));
    }

    #[test]
    fn higher_rank_output_is_rejected() {
        let cube = ArrayD::zeros(IxDyn(&[1, 1, 4]));
        assert!(matches!(
            to_channels(cube),
            Err(AppError::BadTensorRank(3))
        ));
    }

    #[test]
    fn wav_header_is_well_formed() {
        let audio = Array2::from_shape_vec((1, 4), vec![0.0, 0.5, -0.5, 1.0]).unwrap();
        let wav = encode_wav(&audio, SAMPLE_RATE).unwrap();
        assert!(wav.starts_with(b"RIFF"));
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > 44);

        let reader = hound::WavReader::new(Cursor::new(&wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
    }

    #[test]
    fn empty_audio_still_produces_a_valid_header() {
        let audio = Array2::from_shape_vec((1, 0), vec![]).unwrap();
        let wav = encode_wav(&audio, SAMPLE_RATE).unwrap();
        assert!(wav.starts_with(b"RIFF"));
    }

    #[test]
    fn samples_are_clamped_to_i16_range() {
        let audio = Array2::from_shape_vec((1, 2), vec![2.0, -2.0]).unwrap();
        let wav = encode_wav(&audio, SAMPLE_RATE).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(&wav)).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![32767, -32768]);
    }

    #[test]
    fn english_text_uses_english_model_and_speaker() {
        let default_model = FakeModel::returning(mono(&[0.0]));
        let english_model = FakeModel::returning(mono(&[0.0]));
        let service = TtsService::new(
            default_model.clone(),
            Some(english_model.clone()),
            RoutingPolicy::LanguageRouting,
        );

        service
            .synthesize("The quick brown fox jumps over the lazy dog.")
            .unwrap();

        assert!(default_model.calls.lock().unwrap().is_empty());
        let calls = english_model.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, voice::ENGLISH_SPEAKER);
    }

    #[test]
    fn non_english_text_uses_default_model_and_speaker() {
        let default_model = FakeModel::returning(mono(&[0.0]));
        let english_model = FakeModel::returning(mono(&[0.0]));
        let service = TtsService::new(
            default_model.clone(),
            Some(english_model.clone()),
            RoutingPolicy::LanguageRouting,
        );

        service.synthesize("Съешь же ещё этих мягких французских булок.").unwrap();

        assert!(english_model.calls.lock().unwrap().is_empty());
        let calls = default_model.calls.lock().unwrap();
        assert_eq!(calls[0].1, voice::DEFAULT_SPEAKER);
    }

    #[test]
    fn english_route_without_english_model_falls_back() {
        let default_model = FakeModel::returning(mono(&[0.0]));
        let service = TtsService::new(
            default_model.clone(),
            None,
            RoutingPolicy::LanguageRouting,
        );

        service
            .synthesize("The quick brown fox jumps over the lazy dog.")
            .unwrap();

        let calls = default_model.calls.lock().unwrap();
        assert_eq!(calls[0].1, voice::DEFAULT_SPEAKER);
    }

    #[test]
    fn fixed_policy_never_consults_the_english_model() {
        let default_model = FakeModel::returning(mono(&[0.0]));
        let english_model = FakeModel::returning(mono(&[0.0]));
        let service = TtsService::new(
            default_model.clone(),
            Some(english_model.clone()),
            RoutingPolicy::FixedVoice,
        );

        service
            .synthesize("The quick brown fox jumps over the lazy dog.")
            .unwrap();

        assert!(english_model.calls.lock().unwrap().is_empty());
        assert_eq!(default_model.calls.lock().unwrap().len(), 1);
    }
}
