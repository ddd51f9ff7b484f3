//! Paint command planning: matrix + options -> ordered draw list

use crate::encoder::SymbolMatrix;
use crate::options::{DotType, Options};

pub type Rgba = [u8; 4];

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    /// Fill the whole surface
    Clear { rgba: Rgba },
    SolidRect {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        rgba: Rgba,
    },
    /// Filled circle inscribed in the `size` square at (x, y)
    Circle { x: u32, y: u32, size: u32, rgba: Rgba },
}

const FINDER: usize = 7;

/// Parse a CSS colour, falling back to `fallback` with a warning
pub fn parse_color(value: &str, fallback: Rgba) -> Rgba {
    match csscolorparser::parse(value) {
        Ok(c) => c.to_rgba8(),
        Err(e) => {
            log::warn!("Unrecognized colour '{}': {}", value, e);
            fallback
        }
    }
}

/// Which finder region a module sits in, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Data,
    CornerSquare,
    CornerDot,
}

fn region(size: usize, row: usize, col: usize) -> Region {
    let origins = [(0, 0), (0, size.saturating_sub(FINDER)), (size.saturating_sub(FINDER), 0)];
    for (r0, c0) in origins {
        if row >= r0 && row < r0 + FINDER && col >= c0 && col < c0 + FINDER {
            let (r, c) = (row - r0, col - c0);
            return if (2..=4).contains(&r) && (2..=4).contains(&c) {
                Region::CornerDot
            } else {
                Region::CornerSquare
            };
        }
    }
    Region::Data
}

/// Plan the draw list for one surface of `width` x `height` pixels.
///
/// Modules are laid out on an integer grid centred in the area left after the
/// margin, mirroring how a canvas renderer snaps dot sizes.
pub fn plan(matrix: &SymbolMatrix, options: &Options) -> Vec<PaintCommand> {
    let background = parse_color(&options.background_options.color, [255, 255, 255, 255]);
    let dots = parse_color(&options.dots_options.color, [0, 0, 0, 255]);
    let corner_square = options
        .corners_square_options
        .as_ref()
        .and_then(|c| c.color.as_deref())
        .map(|c| parse_color(c, dots))
        .unwrap_or(dots);
    let corner_dot = options
        .corners_dot_options
        .as_ref()
        .and_then(|c| c.color.as_deref())
        .map(|c| parse_color(c, corner_square))
        .unwrap_or(corner_square);

    let mut cmds = vec![PaintCommand::Clear { rgba: background }];

    let count = matrix.size() as u32;
    if count == 0 {
        return cmds;
    }
    let min_side = options.width.min(options.height).saturating_sub(options.margin.saturating_mul(2));
    let dot = min_side / count;
    if dot == 0 {
        log::warn!("Surface too small for a {}x{} symbol; painting background only", count, count);
        return cmds;
    }
    let x0 = (options.width - count * dot) / 2;
    let y0 = (options.height - count * dot) / 2;

    if !matches!(options.dots_options.dot_type, DotType::Square | DotType::Dots) {
        log::debug!("Dot type {:?} painted as squares", options.dots_options.dot_type);
    }

    let size = matrix.size();
    for row in 0..size {
        for col in 0..size {
            if !matrix.is_dark(row, col) {
                continue;
            }
            let x = x0 + col as u32 * dot;
            let y = y0 + row as u32 * dot;
            let cmd = match region(size, row, col) {
                Region::CornerSquare => PaintCommand::SolidRect { x, y, width: dot, height: dot, rgba: corner_square },
                Region::CornerDot => PaintCommand::SolidRect { x, y, width: dot, height: dot, rgba: corner_dot },
                Region::Data if options.dots_options.dot_type == DotType::Dots => {
                    PaintCommand::Circle { x, y, size: dot, rgba: dots }
                }
                Region::Data => PaintCommand::SolidRect { x, y, width: dot, height: dot, rgba: dots },
            };
            cmds.push(cmd);
        }
    }
    cmds
}
