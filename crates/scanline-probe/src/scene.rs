//! A fixed test scene in raw GP0 words plus block transfers.

use anyhow::Result;
use scanline_hw::{DisplayArea, HwRenderer, InterlacedRenderMode, RenderBackend};

pub const DISPLAY_WIDTH: u32 = 320;
pub const DISPLAY_HEIGHT: u32 = 240;

/// Where the checkerboard texture lives: texture page 5 (x = 320).
const TEXTURE_X: u32 = 320;
const TEXTURE_SIZE: u32 = 32;

pub fn display_area() -> DisplayArea {
    DisplayArea {
        x: 0,
        y: 0,
        width: DISPLAY_WIDTH,
        height: DISPLAY_HEIGHT,
        color_24bit: false,
        interlace: InterlacedRenderMode::None,
        field: 0,
    }
}

fn vertex(x: i32, y: i32) -> u32 {
    ((y as u32 & 0x7FF) << 16) | (x as u32 & 0x7FF)
}

fn checkerboard() -> Vec<u16> {
    (0..TEXTURE_SIZE * TEXTURE_SIZE)
        .map(|i| {
            let (x, y) = (i % TEXTURE_SIZE, i / TEXTURE_SIZE);
            if (x / 4 + y / 4) % 2 == 0 { 0x7FFF } else { 0x001F | 0x8000 }
        })
        .collect()
}

/// Uploads the scene's texture. Only needed once: it lives outside the display area.
pub fn upload<B: RenderBackend>(renderer: &mut HwRenderer<B>) -> Result<()> {
    renderer.write(TEXTURE_X, 0, TEXTURE_SIZE, TEXTURE_SIZE, &checkerboard())?;
    Ok(())
}

/// Draws one frame into the display area. `frame` animates the geometry.
pub fn draw<B: RenderBackend>(renderer: &mut HwRenderer<B>, frame: u32) -> Result<()> {
    renderer.fill(0, 0, DISPLAY_WIDTH, DISPLAY_HEIGHT, 0x0030_2010);

    let sway = ((frame % 120) as i32 - 60).abs();
    let words = [
        // Drawing area = display, no offset, 15-bit texpage at x = 320 with dither.
        0xE300_0000,
        0xE400_0000 | ((DISPLAY_HEIGHT - 1) << 10) | (DISPLAY_WIDTH - 1),
        0xE500_0000,
        0xE100_0200 | 5 | (2 << 7),
        // Gouraud triangle.
        0x3000_00FF,
        vertex(20 + sway, 20),
        0x0000_FF00,
        vertex(200, 40),
        0x00FF_0000,
        vertex(60, 200),
        // Semi-transparent flat quad, additive.
        0x2A80_8080,
        vertex(150, 100),
        vertex(300, 100),
        vertex(150, 220),
        vertex(300, 220),
        // Textured raw rectangle, 32x32.
        0x6500_0000,
        vertex(240, 16),
        0,
        (TEXTURE_SIZE << 16) | TEXTURE_SIZE,
        // Line.
        0x4000_FFFF,
        vertex(0, 230),
        vertex(319, 230 - sway),
    ];
    renderer.dispatch_words(&words)?;

    // Mirror the top-left corner into the bottom-right through a copy.
    renderer.copy(0, 0, 256, 176, 64, 64);
    Ok(())
}

/// Order-independent digest of a pixel block, for comparing runs.
pub fn checksum(pixels: &[u16]) -> u64 {
    pixels
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &p)| acc.wrapping_add((p as u64 + 1).wrapping_mul(i as u64 + 1)))
}
