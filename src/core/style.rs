// The default prompt matches the bundled demo script; style prompts stay in
// English because image models follow them better even when the script itself
// is in Chinese.
pub const DEFAULT_STYLE_PROMPT: &str = "\
Art Style: High-quality anime screenshot, Naruto Shippuden aesthetic, cel-shaded, vibrant colors, cinematic lighting.
Character consistency is key:
- Tsunade: Blonde hair, pigtails, green robe, diamond mark on forehead.
- Naruto: Spiky blonde hair, orange and black jumpsuit, whisker marks.
- Sakura: Pink hair, red top, headband.
- Hinata: Dark blue hair, lavender eyes (Byakugan), gentle expression.
Setting: Konoha (Leaf Village), mix of traditional ninja architecture and modern futuristic green energy tech overlays.";

pub const STYLE_PRESETS: [(&str, &str); 6] = [
    (
        "熱血少年漫畫",
        "Art Style: High-quality anime screenshot, typical Shonen Jump aesthetic, cel-shaded, vibrant colors, dynamic angles, expressive characters, cinematic lighting.",
    ),
    (
        "賽博龐克 (Cyberpunk)",
        "Art Style: Cyberpunk anime, Ghost in the Shell aesthetic, neon lights, futuristic city, rain, high contrast, technological overlays, purple and blue color palette.",
    ),
    (
        "吉卜力風格 (Ghibli)",
        "Art Style: Studio Ghibli style, Hayao Miyazaki aesthetic, hand-painted backgrounds, lush nature, soft natural lighting, whimsical details, watercolor textures, peaceful atmosphere.",
    ),
    (
        "黑白美漫 (Noir)",
        "Art Style: Noir comic style, Sin City aesthetic, high contrast black and white, heavy ink shadows, dramatic lighting, gritty texture, bold outlines.",
    ),
    (
        "像素藝術 (Pixel Art)",
        "Art Style: High quality pixel art, 16-bit game aesthetic, detailed sprites, vibrant colors, retro vibe, dithered shading.",
    ),
    (
        "水墨畫風",
        "Art Style: Traditional ink wash painting, Sumi-e style, artistic brush strokes, black and white with subtle color accents, atmospheric, negative space.",
    ),
];

pub fn preset_labels() -> Vec<&'static str> {
    STYLE_PRESETS.iter().map(|(label, _)| *label).collect()
}

// Unknown labels still yield a usable prompt so AI-written scripts are never
// stuck with the previous style.
pub fn resolve(label: &str) -> String {
    STYLE_PRESETS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, prompt)| (*prompt).to_string())
        .unwrap_or_else(|| format!("Art Style: {}, high quality detailed anime style.", label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_preset() {
        let prompt = resolve("賽博龐克 (Cyberpunk)");
        assert!(prompt.contains("Ghost in the Shell"));
    }

    #[test]
    fn test_resolve_unknown_label_formats_fallback() {
        assert_eq!(
            resolve("蒸汽龐克"),
            "Art Style: 蒸汽龐克, high quality detailed anime style."
        );
    }

    #[test]
    fn test_preset_labels_order() {
        let labels = preset_labels();
        assert_eq!(labels.len(), 6);
        assert_eq!(labels[0], "熱血少年漫畫");
    }

    #[test]
    fn test_default_style_is_not_a_preset() {
        assert!(DEFAULT_STYLE_PROMPT.contains("Naruto Shippuden"));
        assert!(preset_labels()
            .iter()
            .all(|l| resolve(l) != DEFAULT_STYLE_PROMPT));
    }
}
