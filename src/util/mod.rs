/// A pad LED state, expressed as the note-on velocity the APC mini reads as a
/// colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LedColor(u8);

impl LedColor {
    pub const OFF: LedColor = LedColor(0);
    pub const GREEN: LedColor = LedColor(1);
    pub const GREEN_BLINK: LedColor = LedColor(2);
    pub const RED: LedColor = LedColor(3);
    pub const RED_BLINK: LedColor = LedColor(4);
    pub const YELLOW: LedColor = LedColor(5);
    pub const YELLOW_BLINK: LedColor = LedColor(6);

    pub const fn from_velocity(velocity: u8) -> Self {
        Self(velocity & 0x7f)
    }
    pub fn velocity(&self) -> u8 {
        self.0
    }
    pub fn is_lit(&self) -> bool {
        self.0 != 0
    }
    pub fn by_name(name: &str) -> Option<LedColor> {
        Some(match name.to_ascii_lowercase().as_str() {
            "off" => Self::OFF,
            "green" => Self::GREEN,
            "green-blink" => Self::GREEN_BLINK,
            "red" => Self::RED,
            "red-blink" => Self::RED_BLINK,
            "yellow" => Self::YELLOW,
            "yellow-blink" => Self::YELLOW_BLINK,
            _ => return None,
        })
    }
}
