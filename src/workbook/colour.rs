// ==========================================
// 手术排程表导入系统 - 颜色解析
// ==========================================
// 职责: 索引色/主题色/色调(tint) → RGB 十六进制
// 说明: .xls 与 .xlsx 共用同一套 64 色索引表
// ==========================================

use std::fmt;

/// RGB 颜色（不含 alpha）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Rgb = Rgb(0x00, 0x00, 0x00);

    /// 小写 6 位十六进制，如 `ff0000`
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    /// 解析 `RRGGBB` / `AARRGGBB`（可带 `#`），alpha 被丢弃
    pub fn from_hex(value: &str) -> Option<Rgb> {
        let hex = value.trim().trim_start_matches('#');
        let rgb = match hex.len() {
            6 => u32::from_str_radix(hex, 16).ok()?,
            8 => u32::from_str_radix(hex, 16).ok()? & 0x00FF_FFFF,
            _ => return None,
        };
        Some(Rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8))
    }

    /// 应用主题色调: tint < 0 变暗 `c*(1+t)`，tint > 0 变亮 `c+(255-c)*t`
    pub fn with_tint(self, tint: f64) -> Rgb {
        if tint == 0.0 {
            return self;
        }
        let tint = tint.clamp(-1.0, 1.0);
        let channel = |c: u8| {
            let c = f64::from(c);
            let adjusted = if tint < 0.0 {
                c * (1.0 + tint)
            } else {
                c + (255.0 - c) * tint
            };
            adjusted.round().clamp(0.0, 255.0) as u8
        };
        Rgb(channel(self.0), channel(self.1), channel(self.2))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ==========================================
// 默认 64 色索引表
// ==========================================
// 0-7: 固定色；8-63: 可被工作簿调色板覆盖
const DEFAULT_PALETTE: [Rgb; 64] = [
    Rgb(0x00, 0x00, 0x00), Rgb(0xFF, 0xFF, 0xFF), Rgb(0xFF, 0x00, 0x00), Rgb(0x00, 0xFF, 0x00),
    Rgb(0x00, 0x00, 0xFF), Rgb(0xFF, 0xFF, 0x00), Rgb(0xFF, 0x00, 0xFF), Rgb(0x00, 0xFF, 0xFF),
    Rgb(0x00, 0x00, 0x00), Rgb(0xFF, 0xFF, 0xFF), Rgb(0xFF, 0x00, 0x00), Rgb(0x00, 0xFF, 0x00),
    Rgb(0x00, 0x00, 0xFF), Rgb(0xFF, 0xFF, 0x00), Rgb(0xFF, 0x00, 0xFF), Rgb(0x00, 0xFF, 0xFF),
    Rgb(0x80, 0x00, 0x00), Rgb(0x00, 0x80, 0x00), Rgb(0x00, 0x00, 0x80), Rgb(0x80, 0x80, 0x00),
    Rgb(0x80, 0x00, 0x80), Rgb(0x00, 0x80, 0x80), Rgb(0xC0, 0xC0, 0xC0), Rgb(0x80, 0x80, 0x80),
    Rgb(0x99, 0x99, 0xFF), Rgb(0x99, 0x33, 0x66), Rgb(0xFF, 0xFF, 0xCC), Rgb(0xCC, 0xFF, 0xFF),
    Rgb(0x66, 0x00, 0x66), Rgb(0xFF, 0x80, 0x80), Rgb(0x00, 0x66, 0xCC), Rgb(0xCC, 0xCC, 0xFF),
    Rgb(0x00, 0x00, 0x80), Rgb(0xFF, 0x00, 0xFF), Rgb(0xFF, 0xFF, 0x00), Rgb(0x00, 0xFF, 0xFF),
    Rgb(0x80, 0x00, 0x80), Rgb(0x80, 0x00, 0x00), Rgb(0x00, 0x80, 0x80), Rgb(0x00, 0x00, 0xFF),
    Rgb(0x00, 0xCC, 0xFF), Rgb(0xCC, 0xFF, 0xFF), Rgb(0xCC, 0xFF, 0xCC), Rgb(0xFF, 0xFF, 0x99),
    Rgb(0x99, 0xCC, 0xFF), Rgb(0xFF, 0x99, 0xCC), Rgb(0xCC, 0x99, 0xFF), Rgb(0xFF, 0xCC, 0x99),
    Rgb(0x33, 0x66, 0xFF), Rgb(0x33, 0xCC, 0xCC), Rgb(0x99, 0xCC, 0x00), Rgb(0xFF, 0xCC, 0x00),
    Rgb(0xFF, 0x99, 0x00), Rgb(0xFF, 0x66, 0x00), Rgb(0x66, 0x66, 0x99), Rgb(0x96, 0x96, 0x96),
    Rgb(0x00, 0x33, 0x66), Rgb(0x33, 0x99, 0x66), Rgb(0x00, 0x33, 0x00), Rgb(0x33, 0x33, 0x00),
    Rgb(0x99, 0x33, 0x00), Rgb(0x99, 0x33, 0x66), Rgb(0x33, 0x33, 0x99), Rgb(0x33, 0x33, 0x33),
];

/// 系统前景色索引（自动文字颜色）
pub const SYSTEM_FOREGROUND: u32 = 64;
/// 系统背景色索引
pub const SYSTEM_BACKGROUND: u32 = 65;

/// 工作簿索引色表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colours: Vec<Rgb>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colours: DEFAULT_PALETTE.to_vec(),
        }
    }
}

impl Palette {
    /// 用工作簿自带颜色覆盖索引 `first` 起的条目
    pub fn override_from(&mut self, first: usize, colours: &[Rgb]) {
        for (offset, colour) in colours.iter().enumerate() {
            let idx = first + offset;
            if idx < self.colours.len() {
                self.colours[idx] = *colour;
            } else {
                self.colours.push(*colour);
            }
        }
    }

    /// 按索引取色；系统色/自动色/越界返回 None
    pub fn get(&self, index: u32) -> Option<Rgb> {
        self.colours.get(index as usize).copied()
    }
}

// ==========================================
// 主题色
// ==========================================
// 主题色索引顺序: lt1, dk1, lt2, dk2, accent1..6, hlink, folHlink
pub const THEME_SLOTS: [&str; 12] = [
    "lt1", "dk1", "lt2", "dk2", "accent1", "accent2", "accent3", "accent4", "accent5", "accent6",
    "hlink", "folHlink",
];

/// 默认 Office 主题
pub fn default_theme_colours() -> Vec<Rgb> {
    vec![
        Rgb(0xFF, 0xFF, 0xFF),
        Rgb(0x00, 0x00, 0x00),
        Rgb(0xEE, 0xEC, 0xE1),
        Rgb(0x1F, 0x49, 0x7D),
        Rgb(0x4F, 0x81, 0xBD),
        Rgb(0xC0, 0x50, 0x4D),
        Rgb(0x9B, 0xBB, 0x59),
        Rgb(0x80, 0x64, 0xA2),
        Rgb(0x4B, 0xAC, 0xC6),
        Rgb(0xF7, 0x96, 0x46),
        Rgb(0x00, 0x00, 0xFF),
        Rgb(0x80, 0x00, 0x80),
    ]
}

/// 格式文件中的颜色描述
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColourSpec {
    Rgb(Rgb),
    Indexed(u32),
    Theme { index: u32, tint: f64 },
    Auto,
}

impl ColourSpec {
    /// 解析为具体颜色；无法解析时返回 `fallback`
    pub fn resolve(&self, palette: &Palette, theme: &[Rgb], fallback: Rgb) -> Rgb {
        match *self {
            ColourSpec::Rgb(rgb) => rgb,
            ColourSpec::Indexed(idx) => palette.get(idx).unwrap_or(fallback),
            ColourSpec::Theme { index, tint } => theme
                .get(index as usize)
                .map(|c| c.with_tint(tint))
                .unwrap_or(fallback),
            ColourSpec::Auto => fallback,
        }
    }
}
