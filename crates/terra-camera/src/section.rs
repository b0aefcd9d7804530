use terra_config::PresetName;

/// Map a page section id to its camera preset. The footer trigger zone and
/// the numbered section ids are aliases.
pub fn preset_for_section(section: &str) -> Option<PresetName> {
    match section {
        "site-footer" | "section4" => Some(PresetName::Contact),
        "section3" => Some(PresetName::About),
        other => PresetName::from_key(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(preset_for_section("site-footer"), Some(PresetName::Contact));
        assert_eq!(preset_for_section("section4"), Some(PresetName::Contact));
        assert_eq!(preset_for_section("section3"), Some(PresetName::About));
        assert_eq!(preset_for_section("features"), Some(PresetName::Features));
        assert_eq!(preset_for_section("hero"), Some(PresetName::Hero));
        assert_eq!(preset_for_section("imprint"), None);
    }
}
