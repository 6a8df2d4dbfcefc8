use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Language {
    pub name: &'static str,
    pub short: &'static str,
}

const fn lang(name: &'static str, short: &'static str) -> Language {
    Language { name, short }
}

/// Languages offered by the language selectors.
pub const LANGUAGES: &[Language] = &[
    lang("Arabic", "ar"),
    lang("Bulgarian", "bg"),
    lang("Chinese (Simplified)", "zh"),
    lang("Chinese (Traditional)", "zh-TW"),
    lang("Croatian", "hr"),
    lang("Czech", "cs"),
    lang("Danish", "da"),
    lang("Dutch", "nl"),
    lang("English", "en"),
    lang("Estonian", "et"),
    lang("Finnish", "fi"),
    lang("French", "fr"),
    lang("German", "de"),
    lang("Greek", "el"),
    lang("Hebrew", "he"),
    lang("Hindi", "hi"),
    lang("Hungarian", "hu"),
    lang("Indonesian", "id"),
    lang("Italian", "it"),
    lang("Japanese", "ja"),
    lang("Korean", "ko"),
    lang("Latvian", "lv"),
    lang("Lithuanian", "lt"),
    lang("Norwegian", "no"),
    lang("Polish", "pl"),
    lang("Portuguese", "pt"),
    lang("Romanian", "ro"),
    lang("Russian", "ru"),
    lang("Slovak", "sk"),
    lang("Slovenian", "sl"),
    lang("Spanish", "es"),
    lang("Swedish", "sv"),
    lang("Thai", "th"),
    lang("Turkish", "tr"),
    lang("Ukrainian", "uk"),
    lang("Vietnamese", "vi"),
];

pub fn find_language(short: &str) -> Option<&'static Language> {
    let short = short.trim();
    LANGUAGES.iter().find(|l| l.short.eq_ignore_ascii_case(short))
}

#[cfg(test)]
mod tests {
    use super::{find_language, LANGUAGES};

    #[test]
    fn short_codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for l in LANGUAGES {
            assert!(seen.insert(l.short), "duplicate code {}", l.short);
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(find_language("DE").map(|l| l.name), Some("German"));
        assert_eq!(find_language("zh-tw").map(|l| l.short), Some("zh-TW"));
        assert!(find_language("xx").is_none());
    }
}
