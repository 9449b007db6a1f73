//! Login QR rendering: SVG for the browser, half-block text for the terminal.

use qrcode::render::svg;
use qrcode::{Color, QrCode};

const QUIET_ZONE: usize = 4;

/// Module grid with the quiet zone applied.
struct Grid {
    colors: Vec<Color>,
    width: usize,
}

impl Grid {
    fn new(data: &str) -> Option<Self> {
        let code = QrCode::new(data.as_bytes()).ok()?;
        Some(Self {
            colors: code.to_colors(),
            width: code.width(),
        })
    }

    fn total(&self) -> usize {
        self.width + QUIET_ZONE * 2
    }

    fn color_at(&self, x: usize, y: usize) -> Color {
        let w = self.width;
        if x < QUIET_ZONE || x >= QUIET_ZONE + w || y < QUIET_ZONE || y >= QUIET_ZONE + w {
            Color::Light
        } else {
            self.colors[(y - QUIET_ZONE) * w + (x - QUIET_ZONE)]
        }
    }
}

/// Render `data` as a standalone SVG document, 8px per module.
/// Returns `None` if the payload does not fit in a QR code.
pub fn render_svg(data: &str) -> Option<String> {
    let code = QrCode::new(data.as_bytes()).ok()?;
    Some(
        code.render::<svg::Color>()
            .quiet_zone(true)
            .module_dimensions(8, 8)
            .build(),
    )
}

/// Render `data` for a terminal, two module rows per text line.
pub fn render_unicode(data: &str) -> Option<String> {
    let grid = Grid::new(data)?;
    let total = grid.total();
    let mut out = String::new();

    let mut y = 0;
    while y < total {
        for x in 0..total {
            let top = grid.color_at(x, y);
            let bot = if y + 1 < total {
                grid.color_at(x, y + 1)
            } else {
                Color::Light
            };
            let ch = match (top, bot) {
                (Color::Light, Color::Light) => ' ',
                (Color::Dark, Color::Dark) => '\u{2588}',
                (Color::Dark, Color::Light) => '\u{2580}',
                (Color::Light, Color::Dark) => '\u{2584}',
            };
            out.push(ch);
        }
        out.push('\n');
        y += 2;
    }
    Some(out)
}
