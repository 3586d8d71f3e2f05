//! Identity normalization.
//!
//! Two feeds reporting the same match rarely agree on how to spell the
//! participants: one writes "Спартак", another "Spartak ", a third
//! "SPARTAK". Every name goes through [`normalize_name`] and the pair is
//! sorted, so all of them collapse onto the same [`IdentityKey`].

use crate::errors::EventError;
use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Order-independent fingerprint of a match, built from two normalized participant names.
///
/// Invariant: `first <= second`, both non-empty and `[a-z0-9]` only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    first: String,
    second: String,
}

impl IdentityKey {
    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.first, self.second)
    }
}

/// Builds the identity key for a pair of participant names, in either order.
pub fn build_key(team1: &str, team2: &str) -> Result<IdentityKey, EventError> {
    let a = normalize_name(team1)?;
    let b = normalize_name(team2)?;
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    Ok(IdentityKey { first, second })
}

/// Lower-cases, transliterates Cyrillic, strips diacritics and keeps only `[a-z0-9]`.
pub fn normalize_name(raw: &str) -> Result<String, EventError> {
    // Compose first so "й" and "и" + U+0306 hit the same table entry.
    let mut transliterated = String::with_capacity(raw.len());
    for ch in raw.nfc().flat_map(char::to_lowercase) {
        match cyrillic_to_latin(ch).or_else(|| fold_latin(ch)) {
            Some(latin) => transliterated.push_str(latin),
            None => transliterated.push(ch),
        }
    }

    let normalized: String = transliterated
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    if normalized.is_empty() {
        return Err(EventError::InvalidIdentity(format!(
            "participant name {:?} is empty after normalization",
            raw
        )));
    }
    Ok(normalized)
}

fn cyrillic_to_latin(ch: char) -> Option<&'static str> {
    let latin = match ch {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        // Ukrainian and Belarusian letters that show up in team names.
        'і' => "i",
        'ї' => "yi",
        'є' => "ye",
        'ґ' => "g",
        'ў' => "u",
        _ => return None,
    };
    Some(latin)
}

/// Latin letters that carry no combining mark under NFD.
fn fold_latin(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'ß' => "ss",
        'ø' => "o",
        'ł' => "l",
        'æ' => "ae",
        'œ' => "oe",
        'đ' => "d",
        'þ' => "th",
        'ı' => "i",
        _ => return None,
    };
    Some(folded)
}
