//! Scanline triangle fill
//!
//! Triangles are split at the middle vertex into an upper and a lower half.
//! Edge x positions step in 16.16 fixed point and edge colours in 16.15.
//! Each span covers `[x_start, x_end)`, so triangles sharing an edge never
//! write the same pixel twice. Colours are packed HSL16 at the vertices and
//! interpolated in RGB across each span.

use super::types::{Framebuffer, Palette, OPAQUE};

#[derive(Debug, Clone, Copy)]
struct Corner {
    x: i32,
    y: i32,
    color: i32,
    z: i32,
}

/// One end of a horizontal span
#[derive(Debug, Clone, Copy)]
struct SpanEnd {
    x: i32,
    color: i32,
    z: i32,
}

struct Edge {
    x: i64,
    dx: i64,
    color: i64,
    dcolor: i64,
    z: i64,
    dz: i64,
}

impl Edge {
    fn new(from: Corner, to: Corner) -> Self {
        let dy = (to.y - from.y) as i64;
        let slope = |delta: i32, shift: u32| {
            if dy == 0 {
                0
            } else {
                ((delta as i64) << shift) / dy
            }
        };
        Self {
            x: (from.x as i64) << 16,
            dx: slope(to.x - from.x, 16),
            color: (from.color as i64) << 15,
            dcolor: slope(to.color - from.color, 15),
            z: (from.z as i64) << 16,
            dz: slope(to.z - from.z, 16),
        }
    }

    /// Edge position `rows` below its top vertex
    fn at(&self, rows: i32) -> SpanEnd {
        let rows = rows as i64;
        SpanEnd {
            x: ((self.x + self.dx * rows) >> 16) as i32,
            color: ((self.color + self.dcolor * rows) >> 15) as i32,
            z: ((self.z + self.dz * rows) >> 16) as i32,
        }
    }
}

/// Walk the rows of a triangle, clipped to `[0, height)`
fn raster_triangle(height: i32, mut v: [Corner; 3], mut span: impl FnMut(i32, SpanEnd, SpanEnd)) {
    if v[1].y < v[0].y {
        v.swap(0, 1);
    }
    if v[2].y < v[0].y {
        v.swap(0, 2);
    }
    if v[2].y < v[1].y {
        v.swap(1, 2);
    }
    let [a, b, c] = v;

    if a.x == b.x && b.x == c.x {
        return;
    }
    if c.y == a.y {
        return;
    }

    let ac = Edge::new(a, c);
    let ab = Edge::new(a, b);
    let bc = Edge::new(b, c);

    for y in a.y.max(0)..b.y.min(height) {
        span(y, ac.at(y - a.y), ab.at(y - a.y));
    }
    for y in b.y.max(0)..c.y.min(height) {
        span(y, ac.at(y - a.y), bc.at(y - b.y));
    }
}

/// Order span ends left to right and clip to `[0, width)`.
/// Returns `None` for an empty span.
fn clip_span(width: i32, a: SpanEnd, b: SpanEnd) -> Option<(SpanEnd, SpanEnd, i32, i32)> {
    let (left, right) = if a.x <= b.x { (a, b) } else { (b, a) };
    let start = left.x.max(0);
    let end = right.x.min(width);
    (start < end).then_some((left, right, start, end))
}

/// Position of `x` between the span ends, 16.16
#[inline]
fn span_t(left: &SpanEnd, right: &SpanEnd, x: i32) -> i64 {
    (((x - left.x) as i64) << 16) / (right.x - left.x) as i64
}

#[inline]
fn lerp_channel(a: u32, b: u32, t: i64) -> u32 {
    ((((a as i64) << 16) + (b as i64 - a as i64) * t) >> 16) as u32
}

/// Interpolate two `0x00RRGGBB` colours per channel
#[inline]
fn lerp_rgb(from: u32, to: u32, t: i64) -> u32 {
    let r = lerp_channel((from >> 16) & 0xff, (to >> 16) & 0xff, t);
    let g = lerp_channel((from >> 8) & 0xff, (to >> 8) & 0xff, t);
    let b = lerp_channel(from & 0xff, to & 0xff, t);
    (r << 16) | (g << 8) | b
}

/// Mix `other` over `base` with `alpha` in 0..=255; the alpha byte is dropped
pub fn alpha_blend(alpha: u32, base: u32, other: u32) -> u32 {
    let inv = 0xFF - alpha;
    (((base & 0xFF00FF) * inv >> 8) & 0xFF00FF)
        + (((other & 0xFF00FF) * alpha >> 8) & 0xFF00FF)
        + (((other & 0xFF00) * alpha >> 8) & 0xFF00)
        + (((base & 0xFF00) * inv >> 8) & 0xFF00)
}

/// Fill one row from `x_start` (inclusive) to `x_end` (exclusive), either
/// order, interpolating between two HSL16 colours.
pub fn draw_scanline_gouraud(
    fb: &mut Framebuffer,
    palette: &Palette,
    y: i32,
    x_start: i32,
    x_end: i32,
    color_start: i32,
    color_end: i32,
) {
    if y < 0 || y >= fb.height as i32 {
        return;
    }
    let a = SpanEnd {
        x: x_start,
        color: color_start,
        z: 0,
    };
    let b = SpanEnd {
        x: x_end,
        color: color_end,
        z: 0,
    };
    gouraud_span(fb, palette, y, a, b);
}

fn gouraud_span(fb: &mut Framebuffer, palette: &Palette, y: i32, a: SpanEnd, b: SpanEnd) {
    let Some((left, right, start, end)) = clip_span(fb.width as i32, a, b) else {
        return;
    };
    let (from, to) = (palette.rgb(left.color), palette.rgb(right.color));
    let row = y as usize * fb.width;
    for x in start..end {
        let rgb = lerp_rgb(from, to, span_t(&left, &right, x));
        fb.pixels[row + x as usize] = OPAQUE | rgb;
    }
}

fn corners(x: [i32; 3], y: [i32; 3], color: [i32; 3], z: [i32; 3]) -> [Corner; 3] {
    [0, 1, 2].map(|i| Corner {
        x: x[i],
        y: y[i],
        color: color[i],
        z: z[i],
    })
}

/// Opaque Gouraud triangle
pub fn raster_gouraud(fb: &mut Framebuffer, palette: &Palette, x: [i32; 3], y: [i32; 3], color: [i32; 3]) {
    let height = fb.height as i32;
    raster_triangle(height, corners(x, y, color, [0; 3]), |row, a, b| {
        gouraud_span(fb, palette, row, a, b)
    });
}

/// Gouraud triangle mixed over the framebuffer with `opacity` in 0..=255
pub fn raster_gouraud_blend(
    fb: &mut Framebuffer,
    palette: &Palette,
    x: [i32; 3],
    y: [i32; 3],
    color: [i32; 3],
    opacity: u32,
) {
    let height = fb.height as i32;
    let width = fb.width as i32;
    raster_triangle(height, corners(x, y, color, [0; 3]), |row, a, b| {
        let Some((left, right, start, end)) = clip_span(width, a, b) else {
            return;
        };
        let (from, to) = (palette.rgb(left.color), palette.rgb(right.color));
        let offset = row as usize * fb.width;
        for x in start..end {
            let rgb = lerp_rgb(from, to, span_t(&left, &right, x));
            let pixel = &mut fb.pixels[offset + x as usize];
            *pixel = OPAQUE | alpha_blend(opacity, *pixel, rgb);
        }
    });
}

/// Gouraud triangle against the depth buffer; a pixel is written when its
/// stored depth is greater than or equal to the new one.
pub fn raster_gouraud_zbuf(
    fb: &mut Framebuffer,
    palette: &Palette,
    x: [i32; 3],
    y: [i32; 3],
    z: [i32; 3],
    color: [i32; 3],
) {
    let height = fb.height as i32;
    let width = fb.width as i32;
    raster_triangle(height, corners(x, y, color, z), |row, a, b| {
        let Some((left, right, start, end)) = clip_span(width, a, b) else {
            return;
        };
        let (from, to) = (palette.rgb(left.color), palette.rgb(right.color));
        let offset = row as usize * fb.width;
        for x in start..end {
            let t = span_t(&left, &right, x);
            let depth = (left.z as i64 + (((right.z - left.z) as i64 * t) >> 16)) as i32;
            let index = offset + x as usize;
            if fb.zbuffer[index] >= depth {
                fb.zbuffer[index] = depth;
                fb.pixels[index] = OPAQUE | lerp_rgb(from, to, t);
            }
        }
    });
}

/// Single-colour triangle; `rgb` is `0x00RRGGBB`, opacity 255 overwrites
pub fn raster_flat(fb: &mut Framebuffer, x: [i32; 3], y: [i32; 3], rgb: u32, opacity: u32) {
    let height = fb.height as i32;
    let width = fb.width as i32;
    raster_triangle(height, corners(x, y, [0; 3], [0; 3]), |row, a, b| {
        let Some((_, _, start, end)) = clip_span(width, a, b) else {
            return;
        };
        let offset = row as usize * fb.width;
        let span = &mut fb.pixels[offset + start as usize..offset + end as usize];
        if opacity >= 0xFF {
            span.fill(OPAQUE | rgb);
        } else {
            for pixel in span {
                *pixel = OPAQUE | alpha_blend(opacity, *pixel, rgb);
            }
        }
    });
}
