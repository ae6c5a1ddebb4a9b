// the note highway: lanes scroll toward a strike line at the bottom, one text row per slice of lookahead
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::judge::{HitGrade, LaneEffect};
use crate::shared::{DisplayState, NUM_LANES};

const LANE_W: usize = 4;
const LANE_COLORS: [Color; NUM_LANES] = [
    Color::Green,
    Color::Red,
    Color::Yellow,
    Color::Blue,
    Color::Rgb(255, 140, 0),
];

#[derive(Clone, Copy, PartialEq)]
enum Cell {
    Guide,
    Tail,
    Note { hopo: bool },
}

// row 0 is the far end of the lookahead, `strike` is now
fn row_for(dt: f64, lookahead: f64, strike: usize) -> Option<usize> {
    let from_strike = (dt / lookahead * strike as f64).round();
    if from_strike < 0.0 || from_strike > strike as f64 {
        return None;
    }
    Some(strike - from_strike as usize)
}

fn layout_cells(state: &DisplayState, strike: usize) -> Vec<[Cell; NUM_LANES]> {
    let mut rows = vec![[Cell::Guide; NUM_LANES]; strike];
    let lookahead = state.lookahead_sec.max(f64::EPSILON);
    let t = state.song_time;

    for chord in state.chords.iter().skip(state.view_cursor) {
        let dt = chord.time_sec - t;
        if dt > lookahead {
            break;
        }
        let head = row_for(dt, lookahead, strike);
        if chord.duration_sec > 0.0 {
            let tail_dt = (chord.time_sec + chord.duration_sec - t).min(lookahead);
            if tail_dt > 0.0 {
                let top = row_for(tail_dt, lookahead, strike).unwrap_or(0);
                let bottom = head.unwrap_or(strike).min(strike);
                for row in rows.iter_mut().take(bottom).skip(top) {
                    for lane in 0..NUM_LANES {
                        if chord.has_lane(lane as u8) {
                            row[lane] = Cell::Tail;
                        }
                    }
                }
            }
        }
        if let Some(row) = head.filter(|&r| r < strike) {
            for lane in 0..NUM_LANES {
                if chord.has_lane(lane as u8) {
                    rows[row][lane] = Cell::Note { hopo: chord.is_hopo };
                }
            }
        }
    }
    rows
}

pub fn draw_highway(frame: &mut Frame, area: Rect, state: &DisplayState) {
    if area.height < 3 {
        return;
    }
    // strike line plus the closing rule below it
    let strike = area.height as usize - 2;
    let mut lines: Vec<Line> = layout_cells(state, strike)
        .into_iter()
        .map(|row| {
            let spans: Vec<Span> = row
                .iter()
                .enumerate()
                .map(|(lane, cell)| {
                    let color = LANE_COLORS[lane];
                    match cell {
                        Cell::Guide => Span::styled(" |  ", Style::default().fg(Color::DarkGray)),
                        Cell::Tail => Span::styled(" #  ", Style::default().fg(color)),
                        Cell::Note { hopo: false } => {
                            Span::styled("[=] ", Style::default().fg(color).add_modifier(Modifier::BOLD))
                        }
                        Cell::Note { hopo: true } => Span::styled("(o) ", Style::default().fg(color)),
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let mut strike_line: Vec<Span> = (0..NUM_LANES)
        .map(|lane| {
            let color = LANE_COLORS[lane];
            if let Some(effect) = state.lane_effects[lane] {
                let (text, fg) = effect_glyph(effect);
                Span::styled(text, Style::default().fg(fg).add_modifier(Modifier::BOLD))
            } else if state.held_mask & (1 << lane) != 0 {
                Span::styled("<O> ", Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD))
            } else {
                Span::styled("[ ] ", Style::default().fg(color))
            }
        })
        .collect();
    if let Some(text) = state.feedback {
        let color = if text.contains("LATE") || text.contains("WRONG") { Color::Red } else { Color::Yellow };
        strike_line.push(Span::styled(format!("  {text}"), Style::default().fg(color)));
    }
    lines.push(Line::from(strike_line));
    lines.push(Line::from("=".repeat(NUM_LANES * LANE_W)));

    frame.render_widget(Paragraph::new(lines), area);
}

// hit and miss flashes take over the strike cell while they last
fn effect_glyph(effect: LaneEffect) -> (&'static str, Color) {
    match effect {
        LaneEffect::Miss => ("[X] ", Color::Red),
        LaneEffect::Hit(HitGrade::Perfect) => ("{*} ", Color::Yellow),
        LaneEffect::Hit(HitGrade::Good) => ("<*> ", Color::Green),
        LaneEffect::Hit(HitGrade::Ok) => ("<*> ", Color::Cyan),
    }
}
