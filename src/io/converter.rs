use crate::dsp::oscillator::Waveform;

/// MIDI note to Hz, A4 (note 69) = 440 Hz.
pub fn midi_note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/// Waveform names as they appear in node params.
///
/// Unknown names fall back to `default`.
pub fn waveform_from_name(name: Option<&str>, default: Waveform) -> Waveform {
    match name {
        Some("sine") => Waveform::Sine,
        Some("square") => Waveform::Square,
        Some("sawtooth") | Some("saw") => Waveform::Sawtooth,
        Some("triangle") => Waveform::Triangle,
        _ => default,
    }
}
