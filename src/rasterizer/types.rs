//! Core types for the rasterizer: packed HSL16 colours, the HSL16 to RGB
//! palette and the framebuffer.

use std::sync::OnceLock;

/// Pixels are `0xAARRGGBB`
pub const OPAQUE: u32 = 0xFF00_0000;

/// Packed HSL16 entries in the palette
pub const PALETTE_SIZE: usize = 65536;

/// Packed HSL16 colour: 6 bits hue, 3 bits saturation, 7 bits lightness
pub fn pack_hsl(hue: u8, saturation: u8, lightness: u8) -> u16 {
    ((hue as u16 & 63) << 10) | ((saturation as u16 & 7) << 7) | (lightness as u16 & 127)
}

pub fn hsl_hue(hsl: u16) -> u8 {
    (hsl >> 10) as u8 & 63
}

pub fn hsl_saturation(hsl: u16) -> u8 {
    (hsl >> 7) as u8 & 7
}

pub fn hsl_lightness(hsl: u16) -> u8 {
    hsl as u8 & 127
}

// ============================================================================
// Palette
// ============================================================================

const GAMMA: f64 = 0.8;

/// HSL16 to `0x00RRGGBB` lookup table
pub struct Palette {
    rgb: Vec<u32>,
}

fn hue_channel(p: f64, q: f64, t: f64) -> f64 {
    if 6.0 * t < 1.0 {
        p + (q - p) * 6.0 * t
    } else if 2.0 * t < 1.0 {
        q
    } else if 3.0 * t < 2.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn apply_gamma(channel: i32) -> u32 {
    ((channel as f64 / 256.0).powf(GAMMA) * 256.0) as u32
}

impl Palette {
    fn build() -> Self {
        let mut rgb = Vec::with_capacity(PALETTE_SIZE);
        for hue_sat in 0..512usize {
            let hue = (hue_sat >> 3) as f64 / 64.0 + 0.0078125;
            let saturation = (hue_sat & 7) as f64 / 8.0 + 0.0625;

            for lightness in 0..128 {
                let l = lightness as f64 / 128.0;
                let q = if l < 0.5 {
                    l * (1.0 + saturation)
                } else {
                    l + saturation - l * saturation
                };
                let p = 2.0 * l - q;

                let mut t_red = hue + 1.0 / 3.0;
                if t_red > 1.0 {
                    t_red -= 1.0;
                }
                let mut t_blue = hue - 1.0 / 3.0;
                if t_blue < 0.0 {
                    t_blue += 1.0;
                }

                let r = apply_gamma((hue_channel(p, q, t_red) * 256.0) as i32);
                let g = apply_gamma((hue_channel(p, q, hue) * 256.0) as i32);
                let b = apply_gamma((hue_channel(p, q, t_blue) * 256.0) as i32);

                // 0 is reserved for "no colour"
                let packed = (r << 16) | (g << 8) | b;
                rgb.push(packed.max(1));
            }
        }
        Self { rgb }
    }

    /// Shared palette, built on first use
    pub fn get() -> &'static Palette {
        static PALETTE: OnceLock<Palette> = OnceLock::new();
        PALETTE.get_or_init(Self::build)
    }

    /// `0x00RRGGBB` for the low 16 bits of `hsl`
    #[inline]
    pub fn rgb(&self, hsl: i32) -> u32 {
        self.rgb[(hsl & 0xffff) as usize]
    }
}

// ============================================================================
// Framebuffer
// ============================================================================

/// Software render target with an integer depth buffer
pub struct Framebuffer {
    /// `0xAARRGGBB`, row-major
    pub pixels: Vec<u32>,
    /// Smaller is nearer; cleared to `i32::MAX`
    pub zbuffer: Vec<i32>,
    pub width: usize,
    pub height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![OPAQUE; width * height],
            zbuffer: vec![i32::MAX; width * height],
            width,
            height,
        }
    }

    pub fn clear(&mut self, color: u32) {
        self.pixels.fill(color);
        self.zbuffer.fill(i32::MAX);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Copy into an RGBA8 image
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let argb = self.pixels[y as usize * self.width + x as usize];
            image::Rgba([
                (argb >> 16) as u8,
                (argb >> 8) as u8,
                argb as u8,
                (argb >> 24) as u8,
            ])
        })
    }

    /// Write the framebuffer to an image file; the format follows the extension
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.to_rgba_image().save(path)
    }
}
