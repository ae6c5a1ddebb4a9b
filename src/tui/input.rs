use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::mode::TuiState;
use crate::shared::{InputEvent, OFFSET_STEP_MS};

// wait up to `timeout` for input, then drain everything already queued so a
// fast strum+fret pair lands in the same frame
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    let mut events = Vec::new();
    if event::poll(timeout)? {
        loop {
            match event::read()? {
                Event::Key(key) => events.extend(handle_key(key, ts, Instant::now())),
                Event::FocusLost => events.push(InputEvent::FocusLost),
                _ => {}
            }
            if !event::poll(Duration::ZERO)? {
                break;
            }
        }
    }
    events.extend(ts.expire(Instant::now()).into_iter().map(InputEvent::FretUp));
    Ok(events)
}

fn handle_key(key: KeyEvent, ts: &mut TuiState, now: Instant) -> Option<InputEvent> {
    // ctrl-c wins even when 'c' is a fret
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return (key.kind == KeyEventKind::Press).then_some(InputEvent::Quit);
    }
    // frets need both edges, everything else acts on press
    if let KeyCode::Char(c) = key.code {
        if let Some(lane) = ts.lane_for(c) {
            return match key.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => {
                    ts.note_press(lane, now).then_some(InputEvent::FretDown(lane))
                }
                KeyEventKind::Release => {
                    ts.note_release(lane);
                    Some(InputEvent::FretUp(lane))
                }
            };
        }
    }
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Enter => Some(InputEvent::Strum),
        KeyCode::Char(c) if c == ts.strum => Some(InputEvent::Strum),
        KeyCode::Esc => Some(InputEvent::TogglePause),
        KeyCode::Char('q') => Some(InputEvent::Quit),
        KeyCode::Char('r') => Some(InputEvent::Restart),
        KeyCode::Char('-') => Some(InputEvent::NudgeSongOffset(-OFFSET_STEP_MS)),
        KeyCode::Char('+' | '=') => Some(InputEvent::NudgeSongOffset(OFFSET_STEP_MS)),
        KeyCode::Char('[') => Some(InputEvent::NudgeGlobalOffset(-OFFSET_STEP_MS)),
        KeyCode::Char(']') => Some(InputEvent::NudgeGlobalOffset(OFFSET_STEP_MS)),
        KeyCode::Char('0') => Some(InputEvent::AllTracks),
        KeyCode::Char(d @ '1'..='9') => Some(InputEvent::SelectTrack(d as u16 - '0' as u16)),
        _ => None,
    }
}
