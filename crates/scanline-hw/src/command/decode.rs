//! GP0 render-command decoding.
//!
//! Word layouts (little-endian u32 each):
//! - polygon `0x20..=0x3F`: `cmd|color`, then per vertex `[color]` (shaded, not for
//!   the first vertex), `yyyy|xxxx`, `[attr|vvuu]` (textured; attr is the CLUT for
//!   vertex 0 and the texpage for vertex 1)
//! - line `0x40..=0x5F`: `cmd|color`, `pos`, then `[color] pos` per extra vertex;
//!   poly-lines end at a `0x5xxx5xxx` word
//! - rectangle `0x60..=0x7F`: `cmd|color`, `pos`, `[clut|vvuu]`, `[hhhh|wwww]` (only
//!   for variable-size rectangles)

use thiserror::Error;

use super::draw_mode::sign_extend_11;
use super::{
    DrawFlags, LineCommand, LineVertex, Palette, PolygonCommand, PolygonVertex,
    RectangleCommand, RenderCommand,
};

const POLYLINE_TERMINATOR_MASK: u32 = 0xF000_F000;
const POLYLINE_TERMINATOR: u32 = 0x5000_5000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty command stream")]
    Empty,

    #[error("command 0x{opcode:02X} needs {needed} words, only {available} available")]
    Truncated {
        opcode: u8,
        needed: usize,
        available: usize,
    },
}

/// Decodes the command at the start of `words`.
///
/// Returns the command and the number of words it occupied. Opcodes outside the
/// render-command ranges decode to [`RenderCommand::Unsupported`] and consume one word.
pub fn decode(words: &[u32]) -> Result<(RenderCommand, usize), DecodeError> {
    let first = *words.first().ok_or(DecodeError::Empty)?;
    let opcode = (first >> 24) as u8;

    match opcode {
        0x20..=0x3F => decode_polygon(opcode, words),
        0x40..=0x5F => decode_line(opcode, words),
        0x60..=0x7F => decode_rectangle(opcode, words),
        _ => Ok((RenderCommand::Unsupported { opcode }, 1)),
    }
}

/// Decodes every command in `words`.
pub fn decode_stream(mut words: &[u32]) -> Result<Vec<RenderCommand>, DecodeError> {
    let mut out = Vec::new();
    while !words.is_empty() {
        let (cmd, used) = decode(words)?;
        out.push(cmd);
        words = &words[used..];
    }
    Ok(out)
}

#[inline]
fn color_of(word: u32) -> u32 {
    word & 0x00FF_FFFF
}

#[inline]
fn position_of(word: u32) -> (i32, i32) {
    (sign_extend_11(word & 0x7FF), sign_extend_11((word >> 16) & 0x7FF))
}

fn require(opcode: u8, words: &[u32], needed: usize) -> Result<(), DecodeError> {
    if words.len() < needed {
        return Err(DecodeError::Truncated {
            opcode,
            needed,
            available: words.len(),
        });
    }
    Ok(())
}

fn decode_polygon(opcode: u8, words: &[u32]) -> Result<(RenderCommand, usize), DecodeError> {
    let flags = DrawFlags::from_opcode(opcode);
    let count = if opcode & 0x08 != 0 { 4 } else { 3 };
    let needed = 1
        + count * (1 + flags.textured as usize)
        + if flags.shaded { count - 1 } else { 0 };
    require(opcode, words, needed)?;

    let mut it = words.iter().copied();
    let first_color = it.next().map(color_of).unwrap_or_default();

    let mut vertices = Vec::with_capacity(count);
    let mut palette = None;
    let mut texpage = None;
    for i in 0..count {
        let color = if flags.shaded && i > 0 {
            it.next().map(color_of).unwrap_or_default()
        } else {
            first_color
        };
        let (x, y) = it.next().map(position_of).unwrap_or_default();

        let (mut u, mut v) = (0, 0);
        if flags.textured {
            let word = it.next().unwrap_or_default();
            u = word as u8;
            v = (word >> 8) as u8;
            match i {
                0 => palette = Some(Palette((word >> 16) as u16)),
                1 => texpage = Some((word >> 16) as u16),
                _ => {}
            }
        }
        vertices.push(PolygonVertex { x, y, color, u, v });
    }

    let cmd = PolygonCommand { flags, vertices, palette, texpage };
    Ok((RenderCommand::Polygon(cmd), needed))
}

fn decode_line(opcode: u8, words: &[u32]) -> Result<(RenderCommand, usize), DecodeError> {
    // Lines carry no texture bits; bit 2 is ignored.
    let flags = DrawFlags {
        shaded: opcode & 0x10 != 0,
        semi_transparent: opcode & 0x02 != 0,
        ..DrawFlags::default()
    };
    let polyline = opcode & 0x08 != 0;
    let per_vertex = if flags.shaded { 2 } else { 1 };

    require(opcode, words, 1 + 2 * per_vertex - usize::from(flags.shaded))?;

    let first_color = color_of(words[0]);
    let mut vertices = vec![LineVertex {
        x: position_of(words[1]).0,
        y: position_of(words[1]).1,
        color: first_color,
    }];
    let mut pos = 2;

    loop {
        if !polyline && vertices.len() == 2 {
            break;
        }
        let Some(&head) = words.get(pos) else {
            if polyline {
                // An unterminated poly-line is still waiting for words.
                return Err(DecodeError::Truncated {
                    opcode,
                    needed: pos + 1,
                    available: words.len(),
                });
            }
            break;
        };
        if polyline && vertices.len() >= 2 && head & POLYLINE_TERMINATOR_MASK == POLYLINE_TERMINATOR {
            pos += 1;
            break;
        }

        let color = if flags.shaded { color_of(head) } else { first_color };
        let pos_word_at = pos + usize::from(flags.shaded);
        let Some(&pos_word) = words.get(pos_word_at) else {
            return Err(DecodeError::Truncated {
                opcode,
                needed: pos_word_at + 1,
                available: words.len(),
            });
        };
        let (x, y) = position_of(pos_word);
        vertices.push(LineVertex { x, y, color });
        pos = pos_word_at + 1;
    }

    Ok((RenderCommand::Line(LineCommand { flags, vertices }), pos))
}

fn decode_rectangle(opcode: u8, words: &[u32]) -> Result<(RenderCommand, usize), DecodeError> {
    // Bits 3..=4 select the size instead of shading.
    let flags = DrawFlags { shaded: false, ..DrawFlags::from_opcode(opcode) };
    let size_bits = (opcode >> 3) & 3;
    let needed = 2 + usize::from(flags.textured) + usize::from(size_bits == 0);
    require(opcode, words, needed)?;

    let color = color_of(words[0]);
    let (x, y) = position_of(words[1]);
    let mut pos = 2;

    let (mut u, mut v, mut palette) = (0, 0, None);
    if flags.textured {
        let word = words[pos];
        u = word as u8;
        v = (word >> 8) as u8;
        palette = Some(Palette((word >> 16) as u16));
        pos += 1;
    }

    let (width, height) = match size_bits {
        0 => {
            let word = words[pos];
            (word & 0x3FF, (word >> 16) & 0x1FF)
        }
        1 => (1, 1),
        2 => (8, 8),
        _ => (16, 16),
    };

    let cmd = RectangleCommand { flags, x, y, width, height, color, u, v, palette };
    Ok((RenderCommand::Rectangle(cmd), needed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32, y: i32) -> u32 {
        ((y as u32 & 0x7FF) << 16) | (x as u32 & 0x7FF)
    }

    #[test]
    fn flat_triangle() {
        let words = [0x2000_00FF, pos(0, 0), pos(10, 0), pos(0, 10)];
        let (cmd, used) = decode(&words).unwrap();
        assert_eq!(used, 4);
        let RenderCommand::Polygon(p) = cmd else { panic!("expected polygon") };
        assert!(!p.is_quad());
        assert_eq!(p.vertices[2].y, 10);
        assert!(p.vertices.iter().all(|v| v.color == 0xFF));
    }

    #[test]
    fn shaded_textured_quad_reads_attributes() {
        // 0x3C: shaded, quad, textured
        let mut words = vec![0x3C00_0001];
        for i in 0..4u32 {
            if i > 0 {
                words.push(i + 1);
            }
            words.push(pos(i as i32 * 4, -2));
            let attr = match i {
                0 => 0x1234,
                1 => 0x0085,
                _ => 0,
            };
            words.push((attr << 16) | ((i * 2) << 8) | i);
        }
        let (cmd, used) = decode(&words).unwrap();
        assert_eq!(used, words.len());
        let RenderCommand::Polygon(p) = cmd else { panic!("expected polygon") };
        assert!(p.is_quad());
        assert_eq!(p.palette, Some(Palette(0x1234)));
        assert_eq!(p.texpage, Some(0x0085));
        assert_eq!(p.vertices[3].color, 4);
        assert_eq!((p.vertices[3].u, p.vertices[3].v), (3, 6));
        assert_eq!(p.vertices[1].y, -2);
    }

    #[test]
    fn polyline_terminates() {
        let words = [0x4800_0010, pos(0, 0), pos(5, 5), pos(9, 1), 0x5555_5555, 0xDEAD];
        let (cmd, used) = decode(&words).unwrap();
        assert_eq!(used, 5);
        let RenderCommand::Line(l) = cmd else { panic!("expected line") };
        assert_eq!(l.vertices.len(), 3);
    }

    #[test]
    fn shaded_single_line() {
        let words = [0x5000_0001, pos(1, 1), 0x0000_0002, pos(8, 1)];
        let (cmd, used) = decode(&words).unwrap();
        assert_eq!(used, 4);
        let RenderCommand::Line(l) = cmd else { panic!("expected line") };
        assert_eq!(l.vertices[1].color, 2);
    }

    #[test]
    fn fixed_size_textured_rectangle() {
        // 0x7C: 16x16, textured
        let words = [0x7C80_8080, pos(32, 48), 0x0040_1008];
        let (cmd, used) = decode(&words).unwrap();
        assert_eq!(used, 3);
        let RenderCommand::Rectangle(r) = cmd else { panic!("expected rectangle") };
        assert_eq!((r.width, r.height), (16, 16));
        assert_eq!((r.u, r.v), (0x08, 0x10));
        assert_eq!(r.palette, Some(Palette(0x40)));
    }

    #[test]
    fn variable_rectangle_size_is_masked() {
        let words = [0x6000_0000, pos(0, 0), 0xFFFF_FFFF];
        let (cmd, _) = decode(&words).unwrap();
        let RenderCommand::Rectangle(r) = cmd else { panic!("expected rectangle") };
        assert_eq!((r.width, r.height), (0x3FF, 0x1FF));
    }

    #[test]
    fn truncated_and_unsupported() {
        assert_eq!(
            decode(&[0x2000_0000, pos(0, 0)]),
            Err(DecodeError::Truncated { opcode: 0x20, needed: 4, available: 2 })
        );
        assert_eq!(decode(&[]), Err(DecodeError::Empty));
        assert_eq!(decode(&[0x0200_0000]).unwrap(), (RenderCommand::Unsupported { opcode: 0x02 }, 1));
    }

    #[test]
    fn stream_decodes_back_to_back() {
        let words = [0x6800_00FF, pos(1, 2), 0xE100_0000, 0x2000_0000, pos(0, 0), pos(1, 0), pos(0, 1)];
        let cmds = decode_stream(&words).unwrap();
        assert_eq!(cmds.len(), 3);
        assert!(matches!(cmds[1], RenderCommand::Unsupported { opcode: 0xE1 }));
    }
}
