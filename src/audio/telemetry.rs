// events the output callback reports back to the game loop; the callback only
// try_sends, the loop drains and hands them to whatever observer it was given

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioEvent {
    // the game loop held the mixer (rewind/setup), this block went out silent
    BlockSkipped { frames: usize },
    // every stem has played to its end
    StemsExhausted,
}

pub trait MixObserver {
    fn on_event(&mut self, event: AudioEvent);
}

#[derive(Default)]
pub struct NoopObserver;

impl MixObserver for NoopObserver {
    fn on_event(&mut self, _event: AudioEvent) {}
}

// forwards to the log facade, counting skipped blocks so a burst is one line
#[derive(Default)]
pub struct LogObserver {
    skipped_blocks: u64,
}

impl LogObserver {
    pub fn skipped_blocks(&self) -> u64 {
        self.skipped_blocks
    }
}

impl MixObserver for LogObserver {
    fn on_event(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::BlockSkipped { frames } => {
                self.skipped_blocks += 1;
                log::debug!(
                    "audio: skipped {frames}-frame block while mixer was busy ({} total)",
                    self.skipped_blocks
                );
            }
            AudioEvent::StemsExhausted => log::info!("audio: all stems finished"),
        }
    }
}
