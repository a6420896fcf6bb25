//! Primitive command → vertex records.
//!
//! Everything here is a pure function of the command and the draw-mode state. The
//! builders append to a caller-owned scratch vector and return the VRAM area the
//! emitted primitives may touch, clipped to the drawing area.

use log::debug;

use crate::command::{
    DrawMode, LineCommand, PolygonCommand, RectangleCommand, RenderCommand, sign_extend_11,
};
use crate::coords::VramRect;
use crate::vram::{MAX_PRIMITIVE_HEIGHT, MAX_PRIMITIVE_WIDTH, TEXTURE_PAGE_HEIGHT, TEXTURE_PAGE_WIDTH};

use super::BatchVertex;

/// Vertex color used for raw (unmodulated) textures.
pub const RAW_TEXTURE_COLOR: u32 = 0x0080_8080;

/// Appends the vertices for `cmd` to `out`.
///
/// Returns the drawing-area-clipped bounds of everything emitted, or `None` if the
/// command produced no primitives (culled, degenerate or unsupported).
pub fn build_vertices(
    cmd: &RenderCommand,
    mode: &DrawMode,
    depth: i32,
    out: &mut Vec<BatchVertex>,
) -> Option<VramRect> {
    match cmd {
        RenderCommand::Polygon(p) => build_polygon(p, mode, depth, out),
        RenderCommand::Rectangle(r) => build_rectangle(r, mode, depth, out),
        RenderCommand::Line(l) => build_lines(l, mode, depth, out),
        RenderCommand::Unsupported { .. } => None,
    }
}

#[inline]
fn offset_position(mode: &DrawMode, x: i32, y: i32) -> (i32, i32) {
    (
        sign_extend_11(mode.drawing_offset.x.wrapping_add(x) as u32),
        sign_extend_11(mode.drawing_offset.y.wrapping_add(y) as u32),
    )
}

#[inline]
fn exceeds_primitive_limits(width: i32, height: i32) -> bool {
    width >= MAX_PRIMITIVE_WIDTH as i32 || height >= MAX_PRIMITIVE_HEIGHT as i32
}

fn include(bounds: &mut Option<VramRect>, rect: VramRect) {
    *bounds = Some(match *bounds {
        Some(b) => b.union(rect),
        None => rect,
    });
}

// ── polygons ──────────────────────────────────────────────────────────────

fn build_polygon(
    cmd: &PolygonCommand,
    mode: &DrawMode,
    depth: i32,
    out: &mut Vec<BatchVertex>,
) -> Option<VramRect> {
    let count = cmd.vertices.len();
    if count < 3 {
        return None;
    }

    let texpage = mode.packed_texpage();
    let first_color = cmd.vertices[0].color;
    let raw = cmd.flags.textured && cmd.flags.raw_texture;

    let mut corners = [BatchVertex::default(); 4];
    for (dst, src) in corners.iter_mut().zip(&cmd.vertices) {
        let color = if raw {
            RAW_TEXTURE_COLOR
        } else if cmd.flags.shaded {
            src.color
        } else {
            first_color
        };
        let (x, y) = offset_position(mode, src.x, src.y);
        let (u, v) = if cmd.flags.textured { (src.u as u16, src.v as u16) } else { (0, 0) };
        *dst = BatchVertex::new(x, y, depth, color, texpage, u, v);
    }

    let quad = cmd.is_quad();
    if quad && cmd.flags.textured {
        fix_flipped_quad_texcoords(&mut corners);
    }

    let mut bounds = None;
    let triangles: &[[usize; 3]] = if quad { &[[0, 1, 2], [2, 1, 3]] } else { &[[0, 1, 2]] };
    for tri in triangles {
        let verts = tri.map(|i| corners[i]);
        let min_x = verts.iter().map(|v| v.x).min().unwrap_or_default();
        let max_x = verts.iter().map(|v| v.x).max().unwrap_or_default();
        let min_y = verts.iter().map(|v| v.y).min().unwrap_or_default();
        let max_y = verts.iter().map(|v| v.y).max().unwrap_or_default();

        if exceeds_primitive_limits(max_x - min_x, max_y - min_y) {
            debug!(
                "culling too-large polygon: {},{} {},{} {},{}",
                verts[0].x, verts[0].y, verts[1].x, verts[1].y, verts[2].x, verts[2].y
            );
            continue;
        }

        out.extend_from_slice(&verts);
        include(&mut bounds, mode.drawing_area.clip(min_x, min_y, max_x, max_y));
    }
    bounds
}

/// Nudges texture coordinates of sprites drawn with flipped U or V.
///
/// The hardware samples each pixel at its top-left corner, so a coordinate that
/// decreases across the primitive lands one texel further than a GPU's pixel-center
/// interpolation would. For axis-aligned cases (U or V changes along only one screen
/// axis) every corner is shifted by one texel to compensate. Quads with zero screen
/// or texture area are left alone.
pub fn fix_flipped_quad_texcoords(vertices: &mut [BatchVertex; 4]) {
    let [a, b, c, _] = *vertices;

    let abx = (b.x - a.x) as f32;
    let aby = (b.y - a.y) as f32;
    let bcx = (c.x - b.x) as f32;
    let bcy = (c.y - b.y) as f32;
    let cax = (a.x - c.x) as f32;
    let cay = (a.y - c.y) as f32;

    let (u0, u1, u2) = (a.u as f32, b.u as f32, c.u as f32);
    let (v0, v1, v2) = (a.v as f32, b.v as f32, c.v as f32);

    let dudx = -aby * u2 - bcy * u0 - cay * u1;
    let dvdx = -aby * v2 - bcy * v0 - cay * v1;
    let dudy = abx * u2 + bcx * u0 + cax * u1;
    let dvdy = abx * v2 + bcx * v0 + cax * v1;
    let area = bcx * cay - bcy * cax;

    let tex_area = (b.u as i32 - a.u as i32) * (c.v as i32 - a.v as i32)
        - (c.u as i32 - a.u as i32) * (b.v as i32 - a.v as i32);

    if area == 0.0 || tex_area == 0 {
        return;
    }

    let rcp_area = 1.0 / area;
    let (dudx, dudy) = (dudx * rcp_area, dudy * rcp_area);
    let (dvdx, dvdy) = (dvdx * rcp_area, dvdy * rcp_area);

    if (dudx < 0.0 && dudy == 0.0) || (dudy < 0.0 && dudx == 0.0) {
        for v in vertices.iter_mut() {
            v.u = v.u.wrapping_add(1);
        }
    }
    if (dvdx < 0.0 && dvdy == 0.0) || (dvdy < 0.0 && dvdx == 0.0) {
        for v in vertices.iter_mut() {
            v.v = v.v.wrapping_add(1);
        }
    }
}

// ── rectangles ────────────────────────────────────────────────────────────

fn build_rectangle(
    cmd: &RectangleCommand,
    mode: &DrawMode,
    depth: i32,
    out: &mut Vec<BatchVertex>,
) -> Option<VramRect> {
    let width = cmd.width as i32;
    let height = cmd.height as i32;
    if exceeds_primitive_limits(width, height) {
        debug!("culling too-large rectangle: {},{} {}x{}", cmd.x, cmd.y, width, height);
        return None;
    }
    if width == 0 || height == 0 {
        return None;
    }

    let (pos_x, pos_y) = offset_position(mode, cmd.x, cmd.y);
    let color = if cmd.flags.textured && cmd.flags.raw_texture {
        RAW_TEXTURE_COLOR
    } else {
        cmd.color
    };
    let texpage = mode.packed_texpage();
    let (orig_left, orig_top) =
        if cmd.flags.textured { (cmd.u as u16, cmd.v as u16) } else { (0, 0) };

    // One quad per texture-page span, so the page repeats across large rectangles.
    let mut tex_top = orig_top;
    let mut y_offset = 0;
    while y_offset < height {
        let quad_height = (height - y_offset).min(TEXTURE_PAGE_HEIGHT as i32 - tex_top as i32);
        let y0 = pos_y + y_offset;
        let y1 = y0 + quad_height;
        let tex_bottom = tex_top + quad_height as u16;

        let mut tex_left = orig_left;
        let mut x_offset = 0;
        while x_offset < width {
            let quad_width = (width - x_offset).min(TEXTURE_PAGE_WIDTH as i32 - tex_left as i32);
            let x0 = pos_x + x_offset;
            let x1 = x0 + quad_width;
            let tex_right = tex_left + quad_width as u16;

            let vertex = |x, y, u, v| BatchVertex::new(x, y, depth, color, texpage, u, v);
            out.extend_from_slice(&[
                vertex(x0, y0, tex_left, tex_top),
                vertex(x1, y0, tex_right, tex_top),
                vertex(x0, y1, tex_left, tex_bottom),
                vertex(x0, y1, tex_left, tex_bottom),
                vertex(x1, y0, tex_right, tex_top),
                vertex(x1, y1, tex_right, tex_bottom),
            ]);

            x_offset += quad_width;
            tex_left = 0;
        }
        y_offset += quad_height;
        tex_top = 0;
    }

    Some(mode.drawing_area.clip(pos_x, pos_y, pos_x + width - 1, pos_y + height - 1))
}

// ── lines ─────────────────────────────────────────────────────────────────

fn build_lines(
    cmd: &LineCommand,
    mode: &DrawMode,
    depth: i32,
    out: &mut Vec<BatchVertex>,
) -> Option<VramRect> {
    let first_color = cmd.vertices.first()?.color;
    let mut bounds = None;

    for segment in cmd.vertices.windows(2) {
        let (start, end) = (segment[0], segment[1]);
        let (x0, y0) = offset_position(mode, start.x, start.y);
        let (x1, y1) = offset_position(mode, end.x, end.y);

        if exceeds_primitive_limits((x1 - x0).abs(), (y1 - y0).abs()) {
            debug!("culling too-large line: {x0},{y0} - {x1},{y1}");
            continue;
        }

        let (c0, c1) = if cmd.flags.shaded {
            (start.color, end.color)
        } else {
            (first_color, first_color)
        };
        out.push(BatchVertex::new(x0, y0, depth, c0, 0, 0, 0));
        out.push(BatchVertex::new(x1, y1, depth, c1, 0, 0, 0));

        include(
            &mut bounds,
            mode.drawing_area.clip(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)),
        );
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::MAX_VERTICES_FOR_RECTANGLE;
    use crate::command::{DrawFlags, DrawingArea, DrawingOffset, LineVertex, PolygonVertex};

    fn vert(x: i32, y: i32, u: u8, v: u8) -> PolygonVertex {
        PolygonVertex { x, y, color: 0x112233, u, v }
    }

    fn polygon(flags: DrawFlags, vertices: Vec<PolygonVertex>) -> RenderCommand {
        RenderCommand::Polygon(PolygonCommand { flags, vertices, palette: None, texpage: None })
    }

    #[test]
    fn quad_splits_into_two_triangles() {
        let cmd = polygon(
            DrawFlags::default(),
            vec![vert(0, 0, 0, 0), vert(10, 0, 0, 0), vert(0, 10, 0, 0), vert(10, 10, 0, 0)],
        );
        let mut out = Vec::new();
        let bounds = build_vertices(&cmd, &DrawMode::default(), 7, &mut out);

        assert_eq!(out.len(), 6);
        let xy: Vec<_> = out.iter().map(|v| (v.x, v.y)).collect();
        assert_eq!(xy, [(0, 0), (10, 0), (0, 10), (0, 10), (10, 0), (10, 10)]);
        assert!(out.iter().all(|v| v.z == 7));
        assert_eq!(bounds, Some(VramRect::new(0, 0, 11, 11)));
    }

    #[test]
    fn raw_texture_uses_neutral_color() {
        let flags = DrawFlags { textured: true, raw_texture: true, shaded: true, ..Default::default() };
        let cmd = polygon(flags, vec![vert(0, 0, 0, 0), vert(4, 0, 4, 0), vert(0, 4, 0, 4)]);
        let mut out = Vec::new();
        build_vertices(&cmd, &DrawMode::default(), 1, &mut out);
        assert!(out.iter().all(|v| v.color == RAW_TEXTURE_COLOR));
    }

    #[test]
    fn flat_polygon_repeats_first_color() {
        let mut verts = vec![vert(0, 0, 0, 0), vert(4, 0, 0, 0), vert(0, 4, 0, 0)];
        verts[2].color = 0xABCDEF;
        let mut out = Vec::new();
        build_vertices(&polygon(DrawFlags::default(), verts.clone()), &DrawMode::default(), 1, &mut out);
        assert!(out.iter().all(|v| v.color == 0x112233));

        out.clear();
        let shaded = DrawFlags { shaded: true, ..Default::default() };
        build_vertices(&polygon(shaded, verts), &DrawMode::default(), 1, &mut out);
        assert_eq!(out[2].color, 0xABCDEF);
    }

    #[test]
    fn oversized_triangle_is_culled() {
        let cmd = polygon(
            DrawFlags::default(),
            vec![vert(-600, 0, 0, 0), vert(500, 0, 0, 0), vert(0, 10, 0, 0)],
        );
        let mut out = Vec::new();
        assert_eq!(build_vertices(&cmd, &DrawMode::default(), 1, &mut out), None);
        assert!(out.is_empty());
    }

    #[test]
    fn drawing_offset_applies_and_bounds_clip() {
        let mode = DrawMode {
            drawing_offset: DrawingOffset { x: 100, y: 50 },
            drawing_area: DrawingArea::new(0, 0, 105, 1023),
            ..Default::default()
        };
        let cmd = polygon(DrawFlags::default(), vec![vert(0, 0, 0, 0), vert(10, 0, 0, 0), vert(0, 10, 0, 0)]);
        let mut out = Vec::new();
        let bounds = build_vertices(&cmd, &mode, 1, &mut out);
        assert_eq!((out[0].x, out[0].y), (100, 50));
        assert_eq!(bounds, Some(VramRect::new(100, 50, 106, 61)));
    }

    #[test]
    fn flipped_sprite_u_is_nudged() {
        let flags = DrawFlags { textured: true, ..Default::default() };
        let cmd = polygon(
            flags,
            vec![vert(0, 0, 15, 0), vert(16, 0, 0, 0), vert(0, 16, 15, 15), vert(16, 16, 0, 15)],
        );
        let mut out = Vec::new();
        build_vertices(&cmd, &DrawMode::default(), 1, &mut out);
        let us: Vec<_> = out.iter().map(|v| v.u).collect();
        let vs: Vec<_> = out.iter().map(|v| v.v).collect();
        assert_eq!(us, [16, 1, 16, 16, 1, 1]);
        assert_eq!(vs, [0, 0, 15, 15, 0, 15]);
    }

    #[test]
    fn unflipped_and_degenerate_quads_untouched() {
        let mut quad = [
            BatchVertex::new(0, 0, 0, 0, 0, 0, 0),
            BatchVertex::new(16, 0, 0, 0, 0, 15, 0),
            BatchVertex::new(0, 16, 0, 0, 0, 0, 15),
            BatchVertex::new(16, 16, 0, 0, 0, 15, 15),
        ];
        let before = quad;
        fix_flipped_quad_texcoords(&mut quad);
        assert_eq!(quad, before);

        let mut flat = [BatchVertex::new(0, 0, 0, 0, 0, 3, 3); 4];
        let before = flat;
        fix_flipped_quad_texcoords(&mut flat);
        assert_eq!(flat, before);
    }

    #[test]
    fn rectangle_tiles_per_texture_page() {
        let cmd = RenderCommand::Rectangle(RectangleCommand {
            flags: DrawFlags { textured: true, ..Default::default() },
            x: 0,
            y: 0,
            width: 300,
            height: 10,
            color: 0x808080,
            u: 200,
            v: 250,
            palette: None,
        });
        let mut out = Vec::new();
        let bounds = build_vertices(&cmd, &DrawMode::default(), 1, &mut out);

        // x spans: 56 (200..256), 244 (0..244); y spans: 6 (250..256), 4 (0..4)
        assert_eq!(out.len(), 4 * 6);
        assert_eq!((out[1].x, out[1].u), (56, 256));
        assert_eq!((out[2].y, out[2].v), (6, 256));
        assert_eq!((out[6].x, out[6].u), (56, 0));
        assert_eq!((out[12].y, out[12].v, out[12].u), (6, 0, 200));
        assert_eq!(bounds, Some(VramRect::new(0, 0, 300, 10)));
    }

    #[test]
    fn largest_rectangle_fits_reserved_space() {
        let cmd = RenderCommand::Rectangle(RectangleCommand {
            flags: DrawFlags { textured: true, ..Default::default() },
            width: 1023,
            height: 511,
            u: 255,
            v: 255,
            ..Default::default()
        });
        let mut out = Vec::new();
        build_vertices(&cmd, &DrawMode::default(), 1, &mut out);
        assert!(out.len() <= MAX_VERTICES_FOR_RECTANGLE);
    }

    #[test]
    fn oversized_rectangle_is_culled() {
        let cmd = RenderCommand::Rectangle(RectangleCommand {
            width: 1024,
            height: 8,
            ..Default::default()
        });
        let mut out = Vec::new();
        assert_eq!(build_vertices(&cmd, &DrawMode::default(), 1, &mut out), None);
        assert!(out.is_empty());
    }

    #[test]
    fn polyline_emits_two_vertices_per_segment() {
        let cmd = RenderCommand::Line(LineCommand {
            flags: DrawFlags { shaded: true, ..Default::default() },
            vertices: vec![
                LineVertex { x: 0, y: 0, color: 1 },
                LineVertex { x: 10, y: 0, color: 2 },
                LineVertex { x: 10, y: 20, color: 3 },
            ],
        });
        let mut out = Vec::new();
        let bounds = build_vertices(&cmd, &DrawMode::default(), 1, &mut out);
        assert_eq!(out.len(), 4);
        assert_eq!(out.iter().map(|v| v.color).collect::<Vec<_>>(), [1, 2, 2, 3]);
        assert!(out.iter().all(|v| v.texpage == 0));
        assert_eq!(bounds, Some(VramRect::new(0, 0, 11, 21)));
    }
}
