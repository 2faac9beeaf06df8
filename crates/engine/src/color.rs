//! Color names and hex codes as RGBA.

const NAMED: &[(&str, [u8; 4])] = &[
    ("black", [0, 0, 0, 255]),
    ("white", [255, 255, 255, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 128, 0, 255]),
    ("lime", [0, 255, 0, 255]),
    ("blue", [0, 0, 255, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("orange", [255, 165, 0, 255]),
    ("purple", [128, 0, 128, 255]),
    ("pink", [255, 192, 203, 255]),
    ("cyan", [0, 255, 255, 255]),
    ("magenta", [255, 0, 255, 255]),
    ("gray", [128, 128, 128, 255]),
    ("grey", [128, 128, 128, 255]),
    ("lightgray", [211, 211, 211, 255]),
    ("lightgrey", [211, 211, 211, 255]),
    ("darkgray", [169, 169, 169, 255]),
    ("brown", [165, 42, 42, 255]),
    ("navy", [0, 0, 128, 255]),
    ("teal", [0, 128, 128, 255]),
    ("lightblue", [173, 216, 230, 255]),
    ("lightgreen", [144, 238, 144, 255]),
    ("lightyellow", [255, 255, 224, 255]),
];

/// Parse a color name or `#RRGGBB` / `#AARRGGBB` code.
///
/// `Ok(None)` means "no color" (`none`, `transparent`, `clear`).
pub fn parse_color(input: &str) -> Result<Option<[u8; 4]>, String> {
    let s = input.trim().trim_matches(|c| c == '"' || c == '\'');
    let lower = s.to_ascii_lowercase();

    if matches!(lower.as_str(), "none" | "transparent" | "clear" | "no fill") {
        return Ok(None);
    }

    let compact: String = lower.chars().filter(|c| !c.is_whitespace() && *c != '_').collect();
    if let Some((_, rgba)) = NAMED.iter().find(|(name, _)| *name == compact) {
        return Ok(Some(*rgba));
    }

    if let Some(hex) = lower.strip_prefix('#') {
        if let Some(rgba) = parse_hex(hex) {
            return Ok(Some(rgba));
        }
    }

    Err(format!("unknown color '{}'", s))
}

fn parse_hex(hex: &str) -> Option<[u8; 4]> {
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        // AARRGGBB, as stored in xlsx
        8 => Some([byte(2)?, byte(4)?, byte(6)?, byte(0)?]),
        _ => None,
    }
}

/// Render RGBA as `#rrggbb`.
pub fn to_hex(rgba: [u8; 4]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgba[0], rgba[1], rgba[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_colors() {
        assert_eq!(parse_color("yellow"), Ok(Some([255, 255, 0, 255])));
        assert_eq!(parse_color("Light Blue"), Ok(Some([173, 216, 230, 255])));
        assert_eq!(parse_color("none"), Ok(None));
    }

    #[test]
    fn test_hex_colors() {
        assert_eq!(parse_color("#FF0000"), Ok(Some([255, 0, 0, 255])));
        assert_eq!(parse_color("#80FF0000"), Ok(Some([255, 0, 0, 128])));
        assert!(parse_color("#FFF").is_err());
        assert!(parse_color("ultraviolet").is_err());
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex([255, 255, 0, 255]), "#ffff00");
    }
}
