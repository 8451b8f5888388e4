//! Red-yellow-green cell shading for numeric table columns.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

// matplotlib "RdYlGn", low to high.
const RD_YL_GN: [Rgb; 11] = [
    Rgb(165, 0, 38),
    Rgb(215, 48, 39),
    Rgb(244, 109, 67),
    Rgb(253, 174, 97),
    Rgb(254, 224, 139),
    Rgb(255, 255, 191),
    Rgb(217, 239, 139),
    Rgb(166, 217, 106),
    Rgb(102, 189, 99),
    Rgb(26, 152, 80),
    Rgb(0, 104, 55),
];

/// Color at position `t` in `[0, 1]` (clamped).
pub fn rd_yl_gn(t: f64) -> Rgb {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
    let scaled = t * (RD_YL_GN.len() - 1) as f64;
    let lo = scaled.floor() as usize;
    let hi = (lo + 1).min(RD_YL_GN.len() - 1);
    let frac = scaled - lo as f64;
    let (a, b) = (RD_YL_GN[lo], RD_YL_GN[hi]);
    Rgb(lerp(a.0, b.0, frac), lerp(a.1, b.1, frac), lerp(a.2, b.2, frac))
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    let v = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
    v.round().clamp(0.0, 255.0) as u8
}

/// Min/max of one column over the rows currently shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnScale {
    pub min: f64,
    pub max: f64,
}

impl ColumnScale {
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut out: Option<Self> = None;
        for v in values.into_iter().filter(|v| v.is_finite()) {
            out = Some(match out {
                None => Self { min: v, max: v },
                Some(s) => Self {
                    min: s.min.min(v),
                    max: s.max.max(v),
                },
            });
        }
        out
    }

    /// Position of `value` in the column, 0.5 for a constant column.
    pub fn position(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    pub fn color(&self, value: f64) -> Rgb {
        rd_yl_gn(self.position(value))
    }
}

/// Readable text color for a shaded background.
pub fn text_color(bg: Rgb) -> Rgb {
    let lum = 0.2126 * channel(bg.0) + 0.7152 * channel(bg.1) + 0.0722 * channel(bg.2);
    if lum < 0.408 { Rgb(241, 241, 241) } else { Rgb(0, 0, 0) }
}

fn channel(c: u8) -> f64 {
    let c = f64::from(c) / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
