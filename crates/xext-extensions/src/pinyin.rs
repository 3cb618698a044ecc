//! Phonetic forms of display names for CJK search
//!
//! A display name written in Chinese characters is also searchable by its
//! full pinyin spelling and by the initial letters of each syllable.

use pinyin::ToPinyin;

/// Searchable phonetic forms of `text`, lowercase and deduplicated
///
/// Text without any CJK character yields just its lowercase form.
pub fn transliterate(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut full = String::new();
    let mut initials = String::new();
    let mut has_cjk = false;

    for ch in text.chars() {
        match ch.to_pinyin() {
            Some(syllable) => {
                has_cjk = true;
                full.push_str(syllable.plain());
                initials.push_str(syllable.first_letter());
            }
            None => {
                if ch.is_whitespace() {
                    continue;
                }
                for lower in ch.to_lowercase() {
                    full.push(lower);
                    initials.push(lower);
                }
            }
        }
    }

    if !has_cjk {
        return vec![text.to_lowercase()];
    }

    let mut forms = vec![full];
    if !forms.contains(&initials) {
        forms.push(initials);
    }
    forms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        assert_eq!(transliterate("Notes"), vec!["notes"]);
        assert!(transliterate("  ").is_empty());
    }

    #[test]
    fn test_cjk_text() {
        let forms = transliterate("主题");
        assert_eq!(forms, vec!["zhuti".to_string(), "zt".to_string()]);
    }

    #[test]
    fn test_mixed_text() {
        let forms = transliterate("Go 文件");
        assert_eq!(forms[0], "gowenjian");
        assert_eq!(forms[1], "gowj");
    }
}
