//! Seek bar under the transport ring.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_MUTED, C_PLAYING, C_SECONDARY};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// `progress` is 0.0..=1.0; elapsed/total labels appear once the duration is known.
pub fn draw_progress(frame: &mut Frame, area: Rect, progress: f64, duration: Option<f64>) {
    if area.width < 4 || area.height == 0 {
        return;
    }
    frame.render_widget(Paragraph::new(progress_line(area.width, progress, duration)), area);
}

pub fn progress_line(width: u16, progress: f64, duration: Option<f64>) -> Line<'static> {
    let progress = progress.clamp(0.0, 1.0);
    let (left, right) = match duration {
        Some(total) => (fmt_time(total * progress), fmt_time(total)),
        None => (format!("{:>3.0}%", progress * 100.0), String::new()),
    };
    let right_w = if right.is_empty() { 0 } else { right.chars().count() + 1 };
    let label_w = (left.chars().count() + 1 + right_w) as u16;
    let bar_w = width.saturating_sub(label_w).max(4) as usize;

    // eighths of a cell
    let eighths = (progress * bar_w as f64 * 8.0) as usize;
    let full = (eighths / 8).min(bar_w);
    let mut bar: String = "█".repeat(full);
    if full < bar_w {
        bar.push(BLOCKS[eighths % 8]);
        bar.push_str(&" ".repeat(bar_w - full - 1));
    }

    let mut spans = vec![
        Span::styled(format!("{} ", left), Style::default().fg(C_SECONDARY)),
        Span::styled(bar, Style::default().fg(C_PLAYING)),
    ];
    if !right.is_empty() {
        spans.push(Span::styled(format!(" {}", right), Style::default().fg(C_MUTED)));
    }
    Line::from(spans)
}

fn fmt_time(secs: f64) -> String {
    let s = secs.max(0.0) as u64;
    let (h, m, s) = (s / 3600, (s % 3600) / 60, s % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
