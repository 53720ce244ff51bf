use crate::registry::MediaElement;
use crate::sequencer::SequencerState;
use crate::session::BattleSession;
use crate::vote::SCORES;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use std::time::{Duration, Instant};

const APP_TITLE: &str = "Battlr  ";

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    vote: Color,
    selected_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    panel_alt_bg: Color::Rgb(24, 38, 58),
    border: Color::Rgb(69, 121, 176),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(149, 173, 204),
    accent: Color::Rgb(100, 203, 184),
    alert: Color::Rgb(249, 174, 88),
    vote: Color::Rgb(214, 205, 133),
    selected_bg: Color::Rgb(34, 55, 82),
};

fn split_screen(area: Rect) -> (Rect, Rect, Rect, Rect) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);
    (vertical[0], vertical[1], vertical[2], vertical[3])
}

fn split_body(body: Rect) -> (Rect, Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(body);
    (columns[0], columns[1])
}

/// Area of the entry list, used for mouse hit testing.
pub fn entries_rect(area: Rect) -> Rect {
    let (_, body, _, _) = split_screen(area);
    split_body(body).0
}

pub fn draw<M: MediaElement>(
    frame: &mut Frame,
    session: &BattleSession<M>,
    command_buffer: &str,
    command_mode: bool,
) {
    let colors = PALETTE;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let (header, body, timeline, footer) = split_screen(frame.area());
    let (entries_area, details_area) = split_body(body);

    draw_header(frame, session, header, &colors);
    draw_entries(frame, session, entries_area, &colors);
    draw_details(frame, session, details_area, &colors);

    let timeline_text = session
        .sequencer
        .active()
        .and_then(|index| session.registry.get(index))
        .map(|entry| {
            let width = usize::from(timeline.width.saturating_sub(24)).clamp(10, 60);
            timeline_line(entry.media().position(), entry.media().duration(), width)
        })
        .unwrap_or_else(|| String::from("Nothing playing"));
    frame.render_widget(
        Paragraph::new(Span::styled(timeline_text, Style::default().fg(colors.text)))
            .block(panel_block(
                "Timeline",
                colors.panel_bg,
                colors.text,
                colors.border,
            )),
        timeline,
    );

    let footer_line = if command_mode {
        Line::from(vec![
            Span::styled(":", Style::default().fg(colors.accent)),
            Span::styled(command_buffer, Style::default().fg(colors.text)),
        ])
    } else {
        Line::from(vec![
            Span::styled(session.status.as_str(), Style::default().fg(colors.alert)),
            Span::styled(
                "  |  Enter play  Space pause  a autoplay  [ ] delay  1-3 vote  u unvote  N notes  : cmd",
                Style::default().fg(colors.muted),
            ),
        ])
    };
    frame.render_widget(
        Paragraph::new(footer_line).block(panel_block(
            if command_mode { "Command" } else { "Status" },
            colors.panel_bg,
            colors.text,
            colors.border,
        )),
        footer,
    );
}

fn draw_header<M: MediaElement>(
    frame: &mut Frame,
    session: &BattleSession<M>,
    area: Rect,
    colors: &Palette,
) {
    let autoplay_box = if session.settings.autoplay {
        "[x]"
    } else {
        "[ ]"
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Battle {}", session.battle_name),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Autoplay {autoplay_box}"),
            Style::default().fg(colors.alert),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Delay {}", session.delay_label()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            state_label(session.state(), Instant::now()),
            Style::default().fg(colors.accent),
        ),
    ]))
    .block(panel_block(
        "Battle",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(header, area);
}

fn draw_entries<M: MediaElement>(
    frame: &mut Frame,
    session: &BattleSession<M>,
    area: Rect,
    colors: &Palette,
) {
    let markers = session.now_playing_markers();
    let items: Vec<ListItem> = session
        .registry
        .list()
        .iter()
        .zip(markers)
        .map(|(entry, now_playing)| {
            let marker = if now_playing { "  > " } else { "    " };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(entry.clip().label(), Style::default().fg(colors.text)),
                Span::raw("  "),
            ];
            spans.extend(vote_buttons(session, &entry.clip().id, colors));
            ListItem::new(Line::from(spans))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!session.registry.is_empty()).then_some(session.selected));

    let title = format!("Entries ({})", session.registry.len());
    let list = List::new(items)
        .block(panel_block(
            &title,
            colors.panel_alt_bg,
            colors.text,
            colors.border,
        ))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, area, &mut state);
}

fn vote_buttons<M: MediaElement>(
    session: &BattleSession<M>,
    entry_id: &str,
    colors: &Palette,
) -> Vec<Span<'static>> {
    SCORES
        .iter()
        .map(|score| {
            let style = if session.ballot.is_marked(entry_id, *score) {
                Style::default()
                    .fg(colors.bg)
                    .bg(colors.vote)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.muted)
            };
            Span::styled(format!("[{score}]"), style)
        })
        .collect()
}

fn draw_details<M: MediaElement>(
    frame: &mut Frame,
    session: &BattleSession<M>,
    area: Rect,
    colors: &Palette,
) {
    let mut lines = Vec::new();
    if let Some(clip) = session.selected_clip() {
        lines.push(Line::from(Span::styled(
            clip.label(),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            clip.id.clone(),
            Style::default().fg(colors.muted),
        )));
        let score = session
            .ballot
            .score_for(&clip.id)
            .map(|score| score.to_string())
            .unwrap_or_else(|| String::from("-"));
        lines.push(Line::from(Span::styled(
            format!("Your score: {score}"),
            Style::default().fg(colors.vote),
        )));
        lines.push(Line::default());

        let notes = if session.settings.show_notes {
            clip.notes
                .clone()
                .unwrap_or_else(|| String::from("No notes for this entry"))
        } else {
            String::from("Press N to show notes")
        };
        lines.push(Line::from(Span::styled(
            notes,
            Style::default().fg(colors.text),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "This battle has no entries",
            Style::default().fg(colors.muted),
        )));
    }

    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(panel_block(
                "Entry",
                colors.panel_bg,
                colors.text,
                colors.border,
            )),
        area,
    );
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn state_label(state: SequencerState, now: Instant) -> String {
    match state {
        SequencerState::Idle => String::from("Idle"),
        SequencerState::Playing(index) => format!("Playing #{}", index + 1),
        SequencerState::AwaitingAdvance { next, deadline } => {
            let left = deadline.saturating_duration_since(now);
            format!("Next #{} in {:.1}s", next + 1, left.as_secs_f64())
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

fn timeline_line(elapsed: Duration, total: Option<Duration>, width: usize) -> String {
    let ratio = total.and_then(|duration| {
        let total_secs = duration.as_secs_f64();
        (total_secs > 0.0).then_some((elapsed.as_secs_f64() / total_secs).clamp(0.0, 1.0))
    });

    format!(
        "{} / {} {}",
        format_duration(elapsed),
        total
            .map(format_duration)
            .unwrap_or_else(|| String::from("--:--")),
        progress_bar(ratio, width),
    )
}
