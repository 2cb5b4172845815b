//! Usage sparkline widget for the energy cards

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Block characters for different usage levels (8 levels)
const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// A one-line sparkline scaled between the series' min and max
pub struct UsageSparkline<'a> {
    values: &'a [f64],
    style: Style,
}

impl<'a> UsageSparkline<'a> {
    pub fn new(values: &'a [f64]) -> Self {
        Self {
            values,
            style: Style::default().fg(Color::Cyan),
        }
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Block characters for the series; empty when every point is zero
    pub fn blocks(&self) -> Vec<char> {
        if self.values.iter().all(|v| *v == 0.0) {
            return Vec::new();
        }
        let max = self.values.iter().copied().fold(f64::MIN, f64::max);
        let min = self.values.iter().copied().fold(f64::MAX, f64::min);
        let range = if max > min { max - min } else { 1.0 };

        self.values
            .iter()
            .map(|v| {
                let normalized = ((v - min) / range).clamp(0.0, 1.0);
                BLOCKS[((normalized * 7.0).round() as usize).min(7)]
            })
            .collect()
    }
}

impl<'a> Widget for UsageSparkline<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let blocks = self.blocks();
        if blocks.is_empty() {
            return;
        }

        // Stretch each point over an equal share of the width
        let width = area.width as usize;
        let per_point = (width / blocks.len()).max(1);
        for (i, block) in blocks.iter().enumerate() {
            for j in 0..per_point {
                let offset = i * per_point + j;
                if offset >= width {
                    return;
                }
                if let Some(cell) = buf.cell_mut((area.x + offset as u16, area.y)) {
                    cell.set_char(*block).set_style(self.style);
                }
            }
        }
    }
}
