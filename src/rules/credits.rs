//! Fuzzy comparison of guessed credits (artists and title) against a track.

use crate::state::game::{ArtistsMatchMode, CreditsGuess, GameSettings, TitleMatchMode, Track};

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "of", "feat", "ft", "featuring", "with", "le", "la", "les", "de",
    "du", "des", "et",
];

/// Credits comparison parameters, taken from the game settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditsMatcher {
    /// How many artists must match.
    pub artists_mode: ArtistsMatchMode,
    /// Which part of the title is compared.
    pub title_mode: TitleMatchMode,
    /// Minimum similarity, in `0.0..=1.0`.
    pub threshold: f64,
    /// Drop stop words before comparing.
    pub remove_stop_words: bool,
}

impl From<&GameSettings> for CreditsMatcher {
    fn from(settings: &GameSettings) -> Self {
        Self {
            artists_mode: settings.artists_match_mode,
            title_mode: settings.title_match_mode,
            threshold: settings.credits_similarity_threshold,
            remove_stop_words: settings.remove_stop_words,
        }
    }
}

impl CreditsMatcher {
    /// Whether both the artists and the title of the guess match the track.
    pub fn is_correct(&self, guess: &CreditsGuess, track: &Track) -> bool {
        self.artists_match(&guess.artists, &track.artists) && self.title_matches(&guess.title, &track.title)
    }

    /// Whether the guessed title is close enough to the actual one.
    pub fn title_matches(&self, guessed: &str, actual: &str) -> bool {
        let (guessed, actual) = match self.title_mode {
            TitleMatchMode::Full => (guessed, actual),
            TitleMatchMode::Main => (main_title(guessed), main_title(actual)),
        };
        self.values_match(guessed, actual)
    }

    /// Whether the guessed artists satisfy the configured artists mode.
    pub fn artists_match(&self, guessed: &[String], actual: &[String]) -> bool {
        let guessed: Vec<&String> = guessed.iter().filter(|name| !name.trim().is_empty()).collect();
        if guessed.is_empty() || actual.is_empty() {
            return false;
        }

        let matches = |a: &str, b: &str| self.values_match(a, b);
        match self.artists_mode {
            ArtistsMatchMode::One => guessed
                .iter()
                .any(|name| actual.iter().any(|credited| matches(name, credited))),
            ArtistsMatchMode::All => {
                actual
                    .iter()
                    .all(|credited| guessed.iter().any(|name| matches(name, credited)))
                    && guessed
                        .iter()
                        .all(|name| actual.iter().any(|credited| matches(name, credited)))
            }
        }
    }

    fn values_match(&self, guessed: &str, actual: &str) -> bool {
        let mut left = normalize(guessed, self.remove_stop_words);
        let mut right = normalize(actual, self.remove_stop_words);
        // A value made only of stop-words ("The The") is compared verbatim.
        if self.remove_stop_words && (left.is_empty() || right.is_empty()) {
            left = normalize(guessed, false);
            right = normalize(actual, false);
        }
        if left.is_empty() || right.is_empty() {
            return false;
        }
        similarity(&left, &right) >= self.threshold
    }
}

/// Lower-case, strip diacritics and punctuation, optionally drop stop-words and
/// collapse whitespace.
pub fn normalize(value: &str, remove_stop_words: bool) -> String {
    let folded: String = value
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritic)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded
        .split_whitespace()
        .filter(|word| !remove_stop_words || !STOP_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title without bracketed, parenthesised or dash-separated suffixes, e.g.
/// `"Song (Remastered 2011) - Live"` becomes `"Song"`.
pub fn main_title(title: &str) -> &str {
    let cut = [" - ", "(", "["]
        .iter()
        .filter_map(|marker| title.find(marker))
        .filter(|index| *index > 0)
        .min()
        .unwrap_or(title.len());
    let main = title[..cut].trim();
    if main.is_empty() { title.trim() } else { main }
}

/// `1 - levenshtein / max_len`, in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];
    for (i, a_char) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
        'ñ' | 'ń' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' => 'u',
        'ý' | 'ÿ' => 'y',
        'ś' | 'š' => 's',
        'ź' | 'ż' | 'ž' => 'z',
        'ł' => 'l',
        other => other,
    }
}
