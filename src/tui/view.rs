use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::highway::draw_highway;
use super::mode::TuiState;
use crate::judge::PlayState;
use crate::shared::DisplayState;

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // controls, track, stats, status
            Constraint::Min(6),    // highway
        ])
        .split(area);

    draw_header(frame, sections[0], state, ts);
    draw_highway(frame, sections[1], state);
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let frets: String = ts
        .frets
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("/");
    let strum = if ts.strum == ' ' { "enter/space".to_string() } else { format!("enter/{}", ts.strum) };
    let controls = format!(
        "Controls: [{frets}]=frets [{strum}]=strum [esc]=pause [r]=restart [+/-]=song offset [[/]]=global offset [q]=quit"
    );

    let track = format!(
        "{}{}Track: {} (0-9 to switch) | {}",
        state.title,
        if state.title.is_empty() { "" } else { " | " },
        state.track_label,
        state.difficulty.name()
    );

    let total = state.stats.hit + state.stats.miss;
    let stats = format!(
        "t={:.3}s  offset={:.1}ms (song {:.1} / global {:.1})  score={}  streak={}  {}x  hit={}/{}",
        state.song_time,
        state.song_offset_ms + state.global_offset_ms,
        state.song_offset_ms,
        state.global_offset_ms,
        state.stats.score,
        state.stats.streak,
        state.multiplier,
        state.stats.hit,
        total
    );

    let status = match state.play_state {
        PlayState::WaitingToStart => Span::styled("Press enter to start", Style::default().fg(Color::Cyan)),
        PlayState::Paused => Span::styled(
            "PAUSED (esc to resume, r to restart)",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        PlayState::SongComplete => Span::styled(
            "SONG COMPLETE",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        PlayState::Playing => Span::raw(""),
    };

    let lines = vec![
        Line::from(Span::styled(controls, Style::default().fg(Color::DarkGray))),
        Line::from(track),
        Line::from(stats),
        Line::from(status),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}
