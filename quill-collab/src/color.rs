//! Stable participant colors.
//!
//! Every participant gets a display color derived purely from their id, so
//! peers see the same color for the same user regardless of join order, and
//! colors survive a presence rebuild after reconnection. No network, no
//! storage, no shared seed — just a hash of the id bytes reduced modulo a
//! fixed palette.

/// Display color as a `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(&'static str);

impl Color {
    /// The hex string, e.g. `"#e06c75"`.
    pub fn as_hex(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Fixed cursor palette. Ten hues, spaced for contrast on a light editor
/// background.
pub const PALETTE: [Color; 10] = [
    Color("#e06c75"),
    Color("#d19a66"),
    Color("#e5c07b"),
    Color("#98c379"),
    Color("#56b6c2"),
    Color("#61afef"),
    Color("#c678dd"),
    Color("#be5046"),
    Color("#2e8b57"),
    Color("#d2691e"),
];

/// Deterministic color for a participant id.
///
/// FNV-1a over the id bytes, reduced modulo the palette size. Pure: the same
/// id always maps to the same color, within and across sessions.
pub fn color_for(id: &str) -> Color {
    PALETTE[(fnv1a(id.as_bytes()) % PALETTE.len() as u64) as usize]
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
