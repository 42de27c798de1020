use crate::error::StampError;
use fixed::types::I32F32;

/// Typographic points stored as fixed-point, quantized to milli-points so that
/// repeated conversions stay deterministic across platforms.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Pt {
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Neg for Pt {
    type Output = Pt;
    fn neg(self) -> Pt {
        Pt::from_milli_i128(-(self.to_milli_i64() as i128))
    }
}

impl std::ops::Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        if !rhs.is_finite() {
            return Pt::ZERO;
        }
        Pt::from_f32(self.to_f32() * rhs)
    }
}

impl std::ops::Div<f32> for Pt {
    type Output = Pt;
    fn div(self, rhs: f32) -> Pt {
        if rhs == 0.0 || !rhs.is_finite() {
            Pt::ZERO
        } else {
            Pt::from_f32(self.to_f32() / rhs)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn new(width: Pt, height: Pt) -> Self {
        Self { width, height }
    }

    pub fn a4() -> Self {
        Self {
            width: Pt::from_f32(595.276),
            height: Pt::from_f32(841.89),
        }
    }

    pub fn letter() -> Self {
        // 8.5in x 11in at 72pt/in.
        Self {
            width: Pt::from_f32(612.0),
            height: Pt::from_f32(792.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
}

impl Rect {
    pub fn center(&self) -> (Pt, Pt) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }
}

/// RGB color with 0..=1 channels. Stamp styling arrives as `#RRGGBB` strings
/// from the editor collaborator, so hex parsing lives here.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    pub fn from_hex(hex: &str) -> Result<Self, StampError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StampError::InvalidColor(hex.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).unwrap_or(0) as f32 / 255.0
        };
        Ok(Self {
            r: channel(0..2),
            g: channel(2..4),
            b: channel(4..6),
        })
    }

    pub fn to_rgba8(self, alpha: f32) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(alpha)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pt_milli_quantization_round_trips() {
        for raw in [0.0f32, 1.0, 141.732, 595.276, 841.89, 0.001] {
            let pt = Pt::from_f32(raw);
            assert!((pt.to_f32() - raw).abs() < 0.001, "{raw}");
        }
    }

    #[test]
    fn pt_arithmetic() {
        let a = Pt::from_f32(10.0);
        let b = Pt::from_f32(4.0);
        assert_eq!((a + b).to_milli_i64(), 14_000);
        assert_eq!((a - b).to_milli_i64(), 6_000);
        assert_eq!((a * 0.5).to_milli_i64(), 5_000);
        assert_eq!((-b).to_milli_i64(), -4_000);
    }

    #[test]
    fn rect_center() {
        let rect = Rect {
            x: Pt::from_f32(10.0),
            y: Pt::from_f32(20.0),
            width: Pt::from_f32(40.0),
            height: Pt::from_f32(10.0),
        };
        let (cx, cy) = rect.center();
        assert_eq!(cx.to_milli_i64(), 30_000);
        assert_eq!(cy.to_milli_i64(), 25_000);
    }

    #[test]
    fn color_hex_parsing() {
        let c = Color::from_hex("#FF8000").unwrap();
        assert!((c.r - 1.0).abs() < 1e-6);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert!(c.b.abs() < 1e-6);
        assert!(Color::from_hex("FFFFFF").is_ok());
        assert!(Color::from_hex("#FFF").is_err());
        assert!(Color::from_hex("#GGGGGG").is_err());
    }
}
