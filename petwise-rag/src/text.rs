//! Query and field tokenization for match evidence.
//!
//! Tokens are lowercase, punctuation-free (intra-word hyphens survive),
//! stopword-free and folded to a singular lemma. A closed set of compound
//! phrases ("grain free", "hip and joint", ...) is recognised before stopword
//! removal and kept as one canonical token.

const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be", "been",
    "best", "but", "by", "can", "could", "do", "does", "for", "from", "get", "got", "had",
    "has", "have", "he", "her", "him", "his", "how", "i", "if", "in", "into", "is", "it",
    "its", "just", "like", "looking", "me", "more", "my", "need", "no", "not", "of", "on",
    "or", "our", "please", "recommend", "she", "should", "show", "so", "some", "something",
    "that", "the", "their", "them", "there", "these", "they", "this", "those", "to", "too",
    "very", "want", "was", "we", "what", "which", "who", "will", "with", "would", "you",
    "your",
];

/// Compound phrases as lemmatized word sequences and their canonical token.
const COMPOUNDS: &[(&[&str], &str)] = &[
    (&["hip", "and", "joint"], "hip and joint"),
    (&["hip", "joint"], "hip and joint"),
    (&["grain", "free"], "grain-free"),
    (&["limited", "ingredient"], "limited ingredient"),
    (&["large", "breed"], "large breed"),
    (&["small", "breed"], "small breed"),
    (&["weight", "management"], "weight management"),
    (&["weight", "control"], "weight management"),
    (&["sensitive", "stomach"], "sensitive stomach"),
    (&["sensitive", "skin"], "sensitive skin"),
    (&["freeze", "dried"], "freeze-dried"),
    (&["high", "protein"], "high protein"),
    (&["dental", "care"], "dental care"),
];

const IRREGULAR: &[(&str, &str)] = &[
    ("teeth", "tooth"),
    ("feet", "foot"),
    ("mice", "mouse"),
    ("geese", "goose"),
    ("children", "child"),
    ("leaves", "leaf"),
    ("knives", "knife"),
    ("wolves", "wolf"),
    ("calves", "calf"),
    ("shelves", "shelf"),
    ("halves", "half"),
    ("loaves", "loaf"),
    ("calories", "calorie"),
    ("cookies", "cookie"),
    ("veggies", "veggie"),
    ("brownies", "brownie"),
    ("movies", "movie"),
    ("shoes", "shoe"),
    ("toes", "toe"),
];

/// Words ending in `s` that are not plurals.
const INVARIANT: &[&str] = &[
    "species", "series", "diabetes", "analysis", "lens", "canvas", "bias", "iams", "plus",
    "always", "whiskas", "less", "grass", "glass", "asparagus", "hummus", "citrus",
];

pub fn is_stopword(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Fold a lowercase word to its singular form.
pub fn lemmatize(word: &str) -> String {
    if let Some((_, lemma)) = IRREGULAR.iter().find(|(plural, _)| *plural == word) {
        return (*lemma).to_string();
    }
    if word.len() <= 3 || word.contains('-') || INVARIANT.contains(&word) {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if word.ends_with("sses") || word.ends_with("shes") || word.ends_with("ches") {
        return word[..word.len() - 2].to_string();
    }
    if word.ends_with("xes") || word.ends_with("zes") || word.ends_with("oes") {
        return word[..word.len() - 2].to_string();
    }
    if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") && !word.ends_with("is") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Lowercase, drop apostrophes, and replace other punctuation with spaces.
/// Hyphens are kept only between word characters.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}'))
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .map(|w| w.trim_matches('-'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn lemmatized_words(text: &str) -> Vec<String> {
    normalize(text).split(' ').filter(|w| !w.is_empty()).map(lemmatize).collect()
}

fn match_compound(words: &[String]) -> Option<(usize, &'static str)> {
    COMPOUNDS.iter().find_map(|(pattern, canonical)| {
        let n = pattern.len();
        (words.len() >= n && words[..n].iter().zip(pattern.iter()).all(|(w, p)| w == p))
            .then_some((n, *canonical))
    })
}

/// Tokenize free text into lemmatized tokens with compounds merged and stopwords removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let words = lemmatized_words(text);
    let mut tokens = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        if let Some((len, canonical)) = match_compound(&words[i..]) {
            tokens.push(canonical.to_string());
            i += len;
            continue;
        }
        if !is_stopword(&words[i]) {
            tokens.push(words[i].clone());
        }
        i += 1;
    }
    tokens
}

/// The whole text as one normalized phrase (`"Hill's Science Diet"` → `"hill science diet"`).
pub fn phrase(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Tokens a field value contributes to matching.
///
/// Phrase-preserving fields yield only the whole phrase. Other fields yield
/// each token, and for compound tokens also their component words so a lone
/// "large" still meets "Large Breed".
pub fn field_tokens(text: &str, preserve_phrase: bool) -> Vec<String> {
    if preserve_phrase {
        let whole = phrase(text);
        return if whole.is_empty() { Vec::new() } else { vec![whole] };
    }
    let mut out = Vec::new();
    for token in tokenize(text) {
        if token.contains([' ', '-']) {
            for part in token.split([' ', '-']).filter(|p| !p.is_empty() && !is_stopword(p)) {
                out.push(part.to_string());
            }
        }
        out.push(token);
    }
    dedupe(out)
}

/// Remove repeats while keeping first-seen order.
pub fn dedupe(tokens: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokens.into_iter().filter(|t| seen.insert(t.clone())).collect()
}
