//! Fixed-point trigonometry
//!
//! Angles are 11-bit: 2048 steps per turn. Table entries are scaled by
//! 65536, so products are shifted right by 16 to get back to model units.
//! Intermediates are widened to i64; large coordinates times a 16.16
//! factor do not fit in 32 bits.

use std::sync::OnceLock;

/// Steps per full turn
pub const ANGLE_STEPS: usize = 2048;
pub const ANGLE_MASK: i32 = ANGLE_STEPS as i32 - 1;

/// Radians per angle step (2 * PI / 2048)
const ANGLE_UNIT: f64 = 0.0030679615;

/// Sine, cosine and tangent per angle step, 16.16 fixed point
pub struct TrigTables {
    pub sin: Vec<i32>,
    pub cos: Vec<i32>,
    pub tan: Vec<i32>,
}

impl TrigTables {
    fn build() -> Self {
        let angle = |i: usize| i as f64 * ANGLE_UNIT;
        Self {
            sin: (0..ANGLE_STEPS).map(|i| (angle(i).sin() * 65536.0) as i32).collect(),
            cos: (0..ANGLE_STEPS).map(|i| (angle(i).cos() * 65536.0) as i32).collect(),
            tan: (0..ANGLE_STEPS).map(|i| (angle(i).tan() * 65536.0) as i32).collect(),
        }
    }

    /// Shared tables, built on first use
    pub fn get() -> &'static TrigTables {
        static TABLES: OnceLock<TrigTables> = OnceLock::new();
        TABLES.get_or_init(Self::build)
    }

    pub fn sin(&self, angle: i32) -> i64 {
        self.sin[(angle & ANGLE_MASK) as usize] as i64
    }

    pub fn cos(&self, angle: i32) -> i64 {
        self.cos[(angle & ANGLE_MASK) as usize] as i64
    }

    pub fn tan(&self, angle: i32) -> i64 {
        self.tan[(angle & ANGLE_MASK) as usize] as i64
    }
}

/// Rotate a coordinate pair in its plane:
/// `((a*cos + b*sin) >> 16, (b*cos - a*sin) >> 16)`
#[inline]
pub fn rotate_pair(a: i64, b: i64, sin: i64, cos: i64) -> (i64, i64) {
    ((a * cos + b * sin) >> 16, (b * cos - a * sin) >> 16)
}

/// Square root truncated toward zero, 0 for non-positive input
pub fn isqrt(value: i64) -> i32 {
    if value <= 0 {
        0
    } else {
        (value as f64).sqrt() as i32
    }
}
