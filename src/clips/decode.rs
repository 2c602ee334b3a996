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

use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info, warn};

use super::error::DecodeError;
use super::resample::resample;
use crate::audio::StreamFormat;

/// File extensions accepted for import.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a"];

/// Interleaved f32 audio with its format.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Returns true if the file has one of the supported extensions.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext))
        })
}

/// Decodes an audio file and converts it to the given stream format.
///
/// This is CPU and IO heavy and must never run on the audio thread.
pub fn decode_file(path: &Path, format: &StreamFormat) -> Result<DecodedAudio, DecodeError> {
    if !is_supported(path) {
        return Err(DecodeError::UnsupportedFormat(path.display().to_string()));
    }

    let raw = read_file(path)?;
    if raw.samples.is_empty() {
        return Err(DecodeError::Empty(path.display().to_string()));
    }
    let source_rate = raw.sample_rate;
    let source_channels = raw.channels;

    let samples = convert_channels(raw.samples, source_channels, format.channels);
    let samples = if source_rate != format.sample_rate {
        info!(
            path = ?path,
            source_rate,
            target_rate = format.sample_rate,
            "Resampling clip"
        );
        resample(&samples, format.channels, source_rate, format.sample_rate)?
    } else {
        samples
    };

    if samples.is_empty() {
        return Err(DecodeError::Empty(path.display().to_string()));
    }

    debug!(
        path = ?path,
        source_channels,
        channels = format.channels,
        samples = samples.len(),
        "Clip decoded"
    );

    Ok(DecodedAudio {
        samples,
        channels: format.channels,
        sample_rate: format.sample_rate,
    })
}

/// Reads every packet of the first audio track into interleaved samples.
fn read_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path)
        .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedFormat(format!("{}: {}", path.display(), e)))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::NoAudioTrack(path.display().to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(format!("{}: {}", path.display(), e)))?;

    let mut samples = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            // A new chained stream starts; clips only ever use the first one.
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let capacity = decoded.capacity() as u64;
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count() as u16);

                let mut buffer = SampleBuffer::<f32>::new(capacity, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, error = e, "Skipping undecodable packet");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let channels = channels
        .filter(|channels| *channels > 0)
        .ok_or_else(|| DecodeError::NoAudioTrack(path.display().to_string()))?;
    let sample_rate = sample_rate
        .filter(|rate| *rate > 0)
        .ok_or_else(|| DecodeError::NoAudioTrack(path.display().to_string()))?;

    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
    })
}

/// Converts interleaved samples between channel counts. Downmixing to mono
/// averages all channels; otherwise source channels are repeated cyclically.
pub(crate) fn convert_channels(samples: Vec<f32>, from: u16, to: u16) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples;
    }

    let from = from as usize;
    let to = to as usize;
    let mut output = Vec::with_capacity(samples.len() / from * to);

    for frame in samples.chunks_exact(from) {
        if to == 1 {
            output.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            output.extend((0..to).map(|ch| frame[ch % from]));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::testutil::write_wav;

    fn format(sample_rate: u32, channels: u16) -> StreamFormat {
        StreamFormat::new(sample_rate, channels, 512).unwrap()
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("airhorn.mp3")));
        assert!(is_supported(Path::new("airhorn.WAV")));
        assert!(is_supported(Path::new("dir/laugh.flac")));
        assert!(is_supported(Path::new("laugh.ogg")));
        assert!(is_supported(Path::new("laugh.m4a")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("no_extension")));
    }

    #[test]
    fn test_convert_channels() {
        // Stereo to mono averages.
        let mono = convert_channels(vec![1.0, 0.0, 0.5, 0.5], 2, 1);
        assert_eq!(mono, vec![0.5, 0.5]);

        // Mono to stereo duplicates.
        let stereo = convert_channels(vec![0.25, -0.25], 1, 2);
        assert_eq!(stereo, vec![0.25, 0.25, -0.25, -0.25]);

        // Same layout passes through.
        let same = convert_channels(vec![0.1, 0.2], 2, 2);
        assert_eq!(same, vec![0.1, 0.2]);
    }

    #[test]
    fn test_decode_wav_matching_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(path.clone(), &[0.5f32; 1000], 1, 44100).unwrap();

        let decoded = decode_file(&path, &format(44100, 1)).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.samples.len(), 1000);
        assert!(decoded.samples.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_decode_wav_downmix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let interleaved: Vec<f32> = (0..400)
            .map(|i| if i % 2 == 0 { 0.8 } else { 0.2 })
            .collect();
        write_wav(path.clone(), &interleaved, 2, 44100).unwrap();

        let decoded = decode_file(&path, &format(44100, 1)).unwrap();
        assert_eq!(decoded.samples.len(), 200);
        assert!(decoded.samples.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_decode_wav_resampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone48k.wav");
        write_wav(path.clone(), &[0.25f32; 4800], 1, 48000).unwrap();

        let decoded = decode_file(&path, &format(44100, 1)).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.samples.len(), 4410);
    }

    #[test]
    fn test_decode_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not audio").unwrap();

        assert!(matches!(
            decode_file(&path, &format(44100, 1)),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_decode_corrupt_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, vec![0x42u8; 2048]).unwrap();

        assert!(decode_file(&path, &format(44100, 1)).is_err());
    }

    #[test]
    fn test_decode_missing_file() {
        let path = PathBuf::from("/nonexistent/clip.wav");
        assert!(matches!(
            decode_file(&path, &format(44100, 1)),
            Err(DecodeError::IoError(_))
        ));
    }
}
