use anyhow::{anyhow, Context, Result};
use std::path::Path;

use symphonia::core::{
    codecs::CODEC_TYPE_NULL,
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

/// Read the duration of an audio file in seconds from its container metadata.
///
/// The waveform is never decoded. When the container does not declare a frame
/// count, packet durations of the selected track are summed instead, which
/// only demuxes the stream.
pub fn probe_duration<P: AsRef<Path>>(path: P) -> Result<f64> {
    let path = path.as_ref();

    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Hint from extension (optional but helps).
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("unsupported format or failed to probe container")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no supported audio tracks found"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("could not determine sample rate"))?;

    let declared_frames = track.codec_params.n_frames;

    if sample_rate == 0 {
        return Err(anyhow!("container reports a sample rate of zero"));
    }

    let n_frames = match declared_frames {
        Some(n) => n,
        None => count_frames(format.as_mut(), track_id)?,
    };

    Ok(n_frames as f64 / sample_rate as f64)
}

/// Sum packet durations for one track without decoding any of them.
fn count_frames(format: &mut dyn FormatReader, track_id: u32) -> Result<u64> {
    let mut frames = 0u64;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(e) if is_end_of_stream(&e) => break,
            Err(SymphoniaError::ResetRequired) => {
                return Err(anyhow!("stream reset required while counting frames"));
            }
            Err(e) => return Err(e).context("error reading next packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        frames += packet.dur();
    }

    Ok(frames)
}

fn is_end_of_stream(err: &SymphoniaError) -> bool {
    matches!(err, SymphoniaError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
}
