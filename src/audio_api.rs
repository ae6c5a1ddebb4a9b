// Everything the game loop asks of the audio engine. Stems are decoded and
// handed over before the stream starts; after that only these cross over.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioCommand {
    // start/resume mixing; the clock only runs while playing
    Play,
    // freeze output and the clock, positions are kept
    Pause,
    // every stem back to frame 0 and the clock to zero
    Rewind,
    // new gain for one stem, slewed in by the mixer
    SetTargetGain { stem: usize, gain: f32 },
}
