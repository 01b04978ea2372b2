//! Audio loading
//!
//! WAV decoding, downmix to mono and resampling to the analysis rate. The
//! engine itself only ever sees mono `f32` waveforms at the configured rate.

mod decoder;
mod resample;

pub use decoder::{decode_wav, load_wav, AudioData};
pub use resample::resample_to_target;
