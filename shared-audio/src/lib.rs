mod filter;
mod ring;

pub use filter::{MIN_RMS, filter_hypothesis, is_silent, rms};
pub use ring::AudioBuffer;
