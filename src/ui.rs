use crate::app::AppView;
use crate::audio::MAX_VOLUME;
use crate::model::PlaybackPhase;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use std::time::Duration;

const APP_TITLE: &str = "lilt  ";
const KEY_HINTS: &str =
    "space play/pause  n next  p prev  s shuffle  r repeat  enter play  +/- vol  : command  q quit";

struct Palette {
    bg: Color,
    panel_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    selected_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    border: Color::Rgb(69, 121, 176),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(149, 173, 204),
    accent: Color::Rgb(100, 203, 184),
    alert: Color::Rgb(249, 174, 88),
    selected_bg: Color::Rgb(34, 55, 82),
};

pub fn draw(frame: &mut Frame, view: &AppView) {
    let colors = &PALETTE;
    let snapshot = &view.snapshot;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Tracks {}", snapshot.queue_titles.len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!(
                "Shuffle {}  {}",
                if snapshot.shuffle { "on" } else { "off" },
                snapshot.repeat_mode.label()
            ),
            Style::default().fg(colors.alert),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            snapshot.output.as_deref().unwrap_or("no output"),
            Style::default().fg(colors.muted),
        ),
    ]))
    .block(panel_block("Status", colors));
    frame.render_widget(header, vertical[0]);

    let items: Vec<ListItem> = snapshot
        .queue_titles
        .iter()
        .enumerate()
        .map(|(index, title)| {
            let marker = if snapshot.current_index == Some(index) {
                if snapshot.is_playing { "  > " } else { "  = " }
            } else {
                "    "
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.accent)),
                Span::styled(title.as_str(), Style::default().fg(colors.text)),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!snapshot.queue_titles.is_empty()).then_some(view.selected));

    let queue_title = match &view.folder {
        Some(folder) => format!("Queue / {}", folder.display()),
        None => String::from("Queue (open a folder with :open <path>)"),
    };
    let list = List::new(items)
        .block(panel_block(&queue_title, colors))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_stateful_widget(list, vertical[1], &mut state);

    let now_playing = Paragraph::new(vec![Line::from(vec![
        Span::styled(
            phase_label(snapshot.phase),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            snapshot.current_title.as_deref().unwrap_or("-"),
            Style::default().fg(colors.text),
        ),
        Span::raw("  "),
        Span::styled(
            timeline_line(snapshot.position, snapshot.duration, snapshot.volume, 24, 10),
            Style::default().fg(colors.muted),
        ),
    ])])
    .block(panel_block("Now Playing", colors));
    frame.render_widget(now_playing, vertical[2]);

    let footer_text = if view.command_mode {
        format!(":{}", view.command_buffer)
    } else if view.status.is_empty() {
        String::from(KEY_HINTS)
    } else {
        view.status.clone()
    };
    let footer = Paragraph::new(Span::styled(footer_text, Style::default().fg(colors.text)))
        .block(panel_block("Keys", colors));
    frame.render_widget(footer, vertical[3]);
}

fn panel_block<'a>(title: &str, colors: &Palette) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(colors.text)
                .add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(colors.border))
        .style(Style::default().bg(colors.panel_bg))
}

fn phase_label(phase: PlaybackPhase) -> &'static str {
    match phase {
        PlaybackPhase::Idle => "Stopped",
        PlaybackPhase::Loading => "Loading",
        PlaybackPhase::Playing => "Playing",
        PlaybackPhase::Paused => "Paused",
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

fn timeline_line(
    position: Option<Duration>,
    duration: Option<Duration>,
    volume: f32,
    timeline_bar_width: usize,
    volume_bar_width: usize,
) -> String {
    let elapsed = position.unwrap_or(Duration::ZERO);
    let ratio = duration.and_then(|total| {
        let total_secs = total.as_secs_f64();
        (total_secs > 0.0).then_some((elapsed.as_secs_f64() / total_secs).clamp(0.0, 1.0))
    });
    let volume_ratio = f64::from(volume / MAX_VOLUME);

    format!(
        "{} / {} {}  Vol {} {:>3}%",
        format_duration(elapsed),
        duration
            .map(format_duration)
            .unwrap_or_else(|| String::from("--:--")),
        progress_bar(ratio, timeline_bar_width),
        progress_bar(Some(volume_ratio), volume_bar_width),
        (volume * 100.0).round() as u16
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_clamps_and_fills() {
        assert_eq!(progress_bar(Some(0.5), 4), "[##--]");
        assert_eq!(progress_bar(Some(3.0), 2), "[##]");
        assert_eq!(progress_bar(None, 3), "[---]");
    }

    #[test]
    fn timeline_shows_placeholder_for_unknown_duration() {
        let line = timeline_line(Some(Duration::from_secs(65)), None, 1.0, 4, 2);
        assert!(line.starts_with("01:05 / --:--"));
        assert!(line.ends_with("100%"));
    }
}
