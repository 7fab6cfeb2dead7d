//! Terminal charts for the keyword analysis.

use itertools::Itertools;

/// Horizontal bar chart, one labelled row per entry, scaled to `width` cells.
#[must_use]
pub fn bar_chart(entries: &[(&str, usize)], width: usize) -> String {
    let max_count = entries.iter().map(|(_, count)| *count).max().unwrap_or(0);
    let label_width = entries
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);

    entries
        .iter()
        .map(|(label, count)| {
            let bar_len = if max_count > 0 {
                count.saturating_mul(width) / max_count
            } else {
                0
            };
            format!("{label:>label_width$} {} {count}", "█".repeat(bar_len))
        })
        .join("\n")
}

/// Scatter plot of `(x, y)` points on a `width` x `height` character grid.
///
/// Both axes start at zero; negative values are clamped onto the axis. Cell
/// glyphs get denser as more points land in them.
#[must_use]
pub fn scatter_plot(points: &[(i64, i64)], width: usize, height: usize) -> String {
    if points.is_empty() || width == 0 || height == 0 {
        return String::new();
    }

    let max_x = points.iter().map(|p| p.0.max(0)).max().unwrap_or(0).max(1);
    let max_y = points.iter().map(|p| p.1.max(0)).max().unwrap_or(0).max(1);

    let mut grid = vec![vec![0_u32; width]; height];
    for &(x, y) in points {
        let col = scale(x, max_x, width);
        let row = scale(y, max_y, height);
        grid[height - 1 - row][col] += 1;
    }

    let top_label = max_y.to_string();
    let label_width = top_label.len();
    let mut lines = Vec::with_capacity(height + 2);

    for (i, row) in grid.iter().enumerate() {
        let label = if i == 0 {
            top_label.as_str()
        } else if i == height - 1 {
            "0"
        } else {
            ""
        };
        let cells: String = row.iter().map(|&n| density_glyph(n)).collect();
        lines.push(format!("{label:>label_width$} │{cells}"));
    }

    lines.push(format!("{:>label_width$} └{}", "", "─".repeat(width)));
    lines.push(format!(
        "{:>label_width$}  0{:>rest$}",
        "",
        max_x,
        rest = width.saturating_sub(1)
    ));
    lines.join("\n")
}

fn scale(value: i64, max: i64, cells: usize) -> usize {
    let last = cells.saturating_sub(1);
    let steps = i64::try_from(last).unwrap_or(i64::MAX);
    let scaled = value.clamp(0, max).saturating_mul(steps) / max;
    usize::try_from(scaled).unwrap_or(0).min(last)
}

const fn density_glyph(count: u32) -> char {
    match count {
        0 => ' ',
        1 => '·',
        2..=4 => '•',
        _ => '●',
    }
}
