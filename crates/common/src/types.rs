use serde::{Deserialize, Serialize};

/// One of the four block colors. Every simulated block and projectile carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockColor {
    Red,
    Blue,
    Green,
    Yellow,
}

impl BlockColor {
    /// All colors in palette order.
    pub const ALL: [BlockColor; 4] = [Self::Red, Self::Blue, Self::Green, Self::Yellow];

    /// Index into a 4-entry palette.
    pub fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Blue => 1,
            Self::Green => 2,
            Self::Yellow => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
        }
    }
}

impl std::fmt::Display for BlockColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Block tier: selects hit points and grid footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Tiny,
    Standard,
    Medium,
    Tank,
}

impl Tier {
    /// Hit points a freshly spawned block of this tier starts with.
    pub fn max_hp(self) -> u32 {
        match self {
            Self::Tiny => 1,
            Self::Standard => 20,
            Self::Medium => 60,
            Self::Tank => 120,
        }
    }

    /// Footprint size in grid cells (drives the rendered scale).
    pub fn footprint(self) -> u32 {
        match self {
            Self::Tiny | Self::Standard => 1,
            Self::Medium => 2,
            Self::Tank => 3,
        }
    }
}

/// Four-entry RGBA lookup table indexed by [`BlockColor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub red: [f32; 4],
    pub blue: [f32; 4],
    pub green: [f32; 4],
    pub yellow: [f32; 4],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            red: [0.95, 0.25, 0.3, 1.0],
            blue: [0.2, 0.5, 0.95, 1.0],
            green: [0.25, 0.9, 0.4, 1.0],
            yellow: [1.0, 0.85, 0.2, 1.0],
        }
    }
}

impl Palette {
    pub fn color(&self, color: BlockColor) -> [f32; 4] {
        match color {
            BlockColor::Red => self.red,
            BlockColor::Blue => self.blue,
            BlockColor::Green => self.green,
            BlockColor::Yellow => self.yellow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_table_matches_level_balance() {
        assert_eq!(Tier::Tiny.max_hp(), 1);
        assert_eq!(Tier::Standard.max_hp(), 20);
        assert_eq!(Tier::Medium.max_hp(), 60);
        assert_eq!(Tier::Tank.max_hp(), 120);
        assert_eq!(Tier::Standard.footprint(), 1);
        assert_eq!(Tier::Tank.footprint(), 3);
    }

    #[test]
    fn color_indices_are_dense() {
        for (i, c) in BlockColor::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }

    #[test]
    fn palette_lookup() {
        let p = Palette::default();
        assert_eq!(p.color(BlockColor::Blue), [0.2, 0.5, 0.95, 1.0]);
        assert_eq!(p.color(BlockColor::Yellow)[3], 1.0);
    }

    #[test]
    fn colors_parse_lowercase() {
        let c: BlockColor = serde_json::from_str("\"green\"").unwrap();
        assert_eq!(c, BlockColor::Green);
        let t: Tier = serde_json::from_str("\"tank\"").unwrap();
        assert_eq!(t, Tier::Tank);
    }
}
