// Copyright (C) 2026 Talkless Contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::error::DecodeError;

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Upper bound on flush passes when draining the resampler's delay line.
const MAX_FLUSH_PASSES: usize = 64;

/// Resamples a whole interleaved buffer from one rate to another.
///
/// The resampler's output delay is trimmed off so the result lines up with
/// the input, and the output is cut to exactly `ceil(frames * target / source)`
/// frames.
pub fn resample(
    samples: &[f32],
    channels: u16,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, DecodeError> {
    let num_channels = channels as usize;
    if source_rate == target_rate || num_channels == 0 || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let failed = || DecodeError::ResamplingFailed(source_rate, target_rate);

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / source_rate as f64;
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, num_channels)
            .map_err(|_| failed())?;

    let planar = deinterleave(samples, num_channels);
    let frames = planar[0].len();
    let expected = (frames as u64 * target_rate as u64).div_ceil(source_rate as u64) as usize;
    let delay = resampler.output_delay();

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); num_channels];
    let mut position = 0;

    loop {
        let needed = resampler.input_frames_next();
        if frames - position < needed {
            break;
        }
        let chunk: Vec<&[f32]> = planar
            .iter()
            .map(|channel| &channel[position..position + needed])
            .collect();
        let produced = resampler.process(&chunk, None).map_err(|_| failed())?;
        append_planar(&mut output, produced);
        position += needed;
    }

    if position < frames {
        let remainder: Vec<&[f32]> = planar.iter().map(|channel| &channel[position..]).collect();
        let produced = resampler
            .process_partial(Some(remainder.as_slice()), None)
            .map_err(|_| failed())?;
        append_planar(&mut output, produced);
    }

    // Push the tail of the delay line through.
    let mut passes = 0;
    while output[0].len() < expected + delay && passes < MAX_FLUSH_PASSES {
        let produced = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|_| failed())?;
        if produced.first().map_or(true, |channel| channel.is_empty()) {
            break;
        }
        append_planar(&mut output, produced);
        passes += 1;
    }

    for channel in output.iter_mut() {
        channel.drain(..delay.min(channel.len()));
        channel.resize(expected, 0.0);
    }

    Ok(interleave(&output))
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (channel, sample) in planar.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.first().map_or(0, |channel| channel.len());
    let mut samples = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        samples.extend(planar.iter().map(|channel| channel[frame]));
    }
    samples
}

fn append_planar(output: &mut [Vec<f32>], produced: Vec<Vec<f32>>) {
    for (channel, block) in output.iter_mut().zip(produced) {
        channel.extend_from_slice(&block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_length() {
        let source_rate = 48000;
        let target_rate = 44100;
        let samples: Vec<f32> = (0..4800)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / source_rate as f32).sin())
            .collect();

        let result = resample(&samples, 1, source_rate, target_rate).unwrap();
        assert_eq!(result.len(), 4410);
    }

    #[test]
    fn test_resample_stereo_preserves_channels() {
        // Left is a constant 0.5, right a constant -0.5.
        let samples: Vec<f32> = (0..8000)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();

        let result = resample(&samples, 2, 22050, 44100).unwrap();
        assert_eq!(result.len(), 8000 * 2);

        // Away from the edges the constant levels should be preserved.
        let middle = result.len() / 2;
        let middle = middle - middle % 2;
        assert!((result[middle] - 0.5).abs() < 0.01);
        assert!((result[middle + 1] + 0.5).abs() < 0.01);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 1, 44100, 44100).unwrap(), samples);
    }

    #[test]
    fn test_resample_short_input() {
        // Shorter than a single resampler block.
        let samples = vec![0.5f32; 100];
        let result = resample(&samples, 1, 48000, 44100).unwrap();
        assert_eq!(result.len(), 92);
    }
}
