use std::collections::HashMap;

use crate::MtAdapter;

/// Tiny built-in word-substitution table for the MVP `es-en`/`en-es` pairs,
/// standing in for a real translation model so end-to-end scenarios are
/// exercisable without one.
fn substitution_table(src: &str, tgt: &str) -> Option<&'static [(&'static str, &'static str)]> {
    match (src, tgt) {
        ("es", "en") => Some(&[
            ("hola", "hello"),
            ("como", "how"),
            ("estas", "are you"),
            ("estás", "are you"),
            ("gracias", "thank you"),
            ("buenos", "good"),
            ("dias", "day"),
            ("días", "day"),
            ("si", "yes"),
            ("sí", "yes"),
            ("no", "no"),
            ("adios", "goodbye"),
            ("adiós", "goodbye"),
        ]),
        ("en", "es") => Some(&[
            ("hello", "hola"),
            ("how", "como"),
            ("are", "estas"),
            ("you", "tu"),
            ("thank", "gracias"),
            ("good", "buenos"),
            ("day", "dias"),
            ("yes", "si"),
            ("no", "no"),
            ("goodbye", "adios"),
        ]),
        _ => None,
    }
}

/// `MtAdapter` with a small built-in word-substitution table for the MVP
/// pairs and pass-through for anything else when no model is loaded for a
/// given pair.
pub struct PassthroughMt;

impl PassthroughMt {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PassthroughMt {
    fn default() -> Self {
        Self::new()
    }
}

impl MtAdapter for PassthroughMt {
    fn translate(&self, text: &str, src_lang: &str, tgt_lang: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let Some(table) = substitution_table(src_lang, tgt_lang) else {
            return text.to_string();
        };
        let lookup: HashMap<&str, &str> = table.iter().copied().collect();

        text.split_whitespace()
            .map(|word| {
                let stripped: String = word
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .collect::<String>()
                    .to_lowercase();
                lookup.get(stripped.as_str()).copied().unwrap_or(word)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_pair_passes_through_unchanged() {
        let mt = PassthroughMt::new();
        assert_eq!(mt.translate("bonjour le monde", "fr", "de"), "bonjour le monde");
    }

    #[test]
    fn empty_text_returns_empty() {
        let mt = PassthroughMt::new();
        assert_eq!(mt.translate("   ", "es", "en"), "");
    }

    #[test]
    fn es_en_substitutes_known_words() {
        let mt = PassthroughMt::new();
        assert_eq!(mt.translate("hola gracias", "es", "en"), "hello thank you");
    }

    #[test]
    fn unknown_words_in_known_pair_pass_through() {
        let mt = PassthroughMt::new();
        assert_eq!(mt.translate("hola mundo", "es", "en"), "hello mundo");
    }
}
