use std::fmt;
use std::str::FromStr;

use crate::NULL_ID;

const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

/// Asset types the toolchain knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagClass {
    Bitmap,
    DamageEffect,
    Font,
    HudMessageText,
    LensFlare,
    Scenario,
    Scenery,
    Sound,
    StringList,
    UnicodeStringList,
    WeaponHudInterface,
}

impl TagClass {
    pub const ALL: [TagClass; 11] = [
        TagClass::Bitmap,
        TagClass::DamageEffect,
        TagClass::Font,
        TagClass::HudMessageText,
        TagClass::LensFlare,
        TagClass::Scenario,
        TagClass::Scenery,
        TagClass::Sound,
        TagClass::StringList,
        TagClass::UnicodeStringList,
        TagClass::WeaponHudInterface,
    ];

    pub fn fourcc(self) -> u32 {
        match self {
            TagClass::Bitmap => fourcc(b"bitm"),
            TagClass::DamageEffect => fourcc(b"jpt!"),
            TagClass::Font => fourcc(b"font"),
            TagClass::HudMessageText => fourcc(b"hmt "),
            TagClass::LensFlare => fourcc(b"lens"),
            TagClass::Scenario => fourcc(b"scnr"),
            TagClass::Scenery => fourcc(b"scen"),
            TagClass::Sound => fourcc(b"snd!"),
            TagClass::StringList => fourcc(b"str#"),
            TagClass::UnicodeStringList => fourcc(b"ustr"),
            TagClass::WeaponHudInterface => fourcc(b"wphi"),
        }
    }

    pub fn from_fourcc(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.fourcc() == value)
    }

    pub fn extension(self) -> &'static str {
        match self {
            TagClass::Bitmap => "bitmap",
            TagClass::DamageEffect => "damage_effect",
            TagClass::Font => "font",
            TagClass::HudMessageText => "hud_message_text",
            TagClass::LensFlare => "lens_flare",
            TagClass::Scenario => "scenario",
            TagClass::Scenery => "scenery",
            TagClass::Sound => "sound",
            TagClass::StringList => "string_list",
            TagClass::UnicodeStringList => "unicode_string_list",
            TagClass::WeaponHudInterface => "weapon_hud_interface",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|class| class.extension() == extension)
    }

    /// Source tag file version written by and accepted from the editing kit.
    pub fn version(self) -> u16 {
        match self {
            TagClass::Bitmap => 7,
            TagClass::DamageEffect => 6,
            TagClass::Font => 1,
            TagClass::HudMessageText => 1,
            TagClass::LensFlare => 2,
            TagClass::Scenario => 2,
            TagClass::Scenery => 2,
            TagClass::Sound => 4,
            TagClass::StringList => 1,
            TagClass::UnicodeStringList => 1,
            TagClass::WeaponHudInterface => 2,
        }
    }

    /// Secondary and tertiary class fourccs recorded in the cache tag array.
    pub fn parent_fourccs(self) -> (u32, u32) {
        match self {
            TagClass::Scenery => (fourcc(b"obje"), NULL_ID),
            _ => (NULL_ID, NULL_ID),
        }
    }
}

impl fmt::Display for TagClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TagClass {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TagClass::from_extension(value).ok_or_else(|| format!("unknown tag class '{}'", value))
    }
}

/// Renders a fourcc for messages, e.g. `'snd!'`.
pub fn fourcc_to_string(value: u32) -> String {
    if value == NULL_ID {
        return "NONE".to_string();
    }
    value
        .to_be_bytes()
        .iter()
        .map(|b| {
            if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '?'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_and_extension_lookup() {
        for class in TagClass::ALL {
            assert_eq!(TagClass::from_fourcc(class.fourcc()), Some(class));
            assert_eq!(TagClass::from_extension(class.extension()), Some(class));
        }
        assert_eq!(TagClass::Sound.fourcc(), 0x736E_6421);
        assert_eq!(TagClass::from_fourcc(NULL_ID), None);
    }

    #[test]
    fn parse_class_name_is_case_insensitive() {
        let class: TagClass = "Lens_Flare".parse().expect("class");
        assert_eq!(class, TagClass::LensFlare);
        assert!("model".parse::<TagClass>().is_err());
    }

    #[test]
    fn fourcc_display() {
        assert_eq!(fourcc_to_string(TagClass::HudMessageText.fourcc()), "hmt ");
        assert_eq!(fourcc_to_string(NULL_ID), "NONE");
    }
}
