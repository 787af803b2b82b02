use crate::error::{EngineError, EngineResult};
use earmark_core::Duration;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

pub struct AudioDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    params: CodecParameters,
    spec: SignalSpec,
}

pub struct DecodedAudio {
    /// Interleaved samples
    pub samples: Vec<f32>,
    pub frames: usize,
    pub spec: SignalSpec,
}

impl AudioDecoder {
    pub fn new(path: &Path) -> EngineResult<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| EngineError::DecodeError(format!("Failed to open file: {}", e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| EngineError::DecodeError(format!("Failed to probe format: {}", e)))?;

        let reader = probed.format;

        let track = reader
            .default_track()
            .ok_or_else(|| EngineError::DecodeError("No audio track found".to_string()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| EngineError::DecodeError(format!("Failed to create decoder: {}", e)))?;

        let spec = SignalSpec::new(
            params.sample_rate.unwrap_or(44100),
            params.channels.unwrap_or_default(),
        );

        Ok(Self {
            reader,
            decoder,
            track_id,
            params,
            spec,
        })
    }

    /// Length declared by the container, if it declares one
    pub fn declared_duration(&self) -> Option<Duration> {
        let frames = self.params.n_frames?;
        if let Some(time_base) = self.params.time_base {
            return Some(time_to_duration(time_base.calc_time(frames)));
        }
        let rate = self.params.sample_rate?;
        Some(Duration::from_millis(frames * 1000 / u64::from(rate)))
    }

    /// Length of the file, decoding it completely if the container does not
    /// declare one
    pub fn measure_duration(&mut self) -> EngineResult<Duration> {
        if let Some(duration) = self.declared_duration() {
            return Ok(duration);
        }

        let mut millis = 0f64;
        while let Some(decoded) = self.decode_next()? {
            millis += decoded.frames as f64 * 1000.0 / f64::from(decoded.spec.rate);
        }
        Ok(Duration::from_millis(millis.round() as u64))
    }

    pub fn decode_next(&mut self) -> EngineResult<Option<DecodedAudio>> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => {
                    return Err(EngineError::DecodeError(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Decode error, skipping packet: {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(EngineError::DecodeError(format!(
                        "Failed to decode packet: {}",
                        e
                    )));
                }
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();
            let samples = interleave(decoded);

            return Ok(Some(DecodedAudio {
                samples,
                frames,
                spec,
            }));
        }
    }

    pub fn spec(&self) -> &SignalSpec {
        &self.spec
    }

    /// Seeks to `offset`, returning where decoding will actually resume
    pub fn seek(&mut self, offset: Duration) -> EngineResult<Duration> {
        if offset.is_zero() {
            return Ok(Duration::ZERO);
        }

        let millis = offset.as_millis();
        let time = Time::new(millis / 1000, (millis % 1000) as f64 / 1000.0);
        let seeked = self
            .reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| EngineError::SeekError(format!("Failed to seek: {}", e)))?;

        self.decoder.reset();

        Ok(match self.params.time_base {
            Some(time_base) => time_to_duration(time_base.calc_time(seeked.actual_ts)),
            None => offset,
        })
    }
}

fn time_to_duration(time: Time) -> Duration {
    Duration::from_millis(time.seconds * 1000 + (time.frac * 1000.0).round() as u64)
}

fn interleave(decoded: AudioBufferRef<'_>) -> Vec<f32> {
    let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
    sample_buf.copy_interleaved_ref(decoded);
    sample_buf.samples().to_vec()
}
