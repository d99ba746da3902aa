//! Chord symbol tokenizer
//!
//! Splits a chord symbol (C, Am7, F#m7b5, Bbmaj9, Gsus4, E7#9, C6/9, ...) into a
//! root and a typed list of quality tokens. Interval resolution lives in
//! `intervals`; this module never decides pitches.

use super::note::{letter_to_pitch_class, parse_note_name, PitchClass};

/// Tokens that can appear after the chord root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordToken {
    Major { word: bool }, // maj / Maj (word), M / Δ (symbol)
    Minor,          // m, min, -
    Diminished,     // dim, °, o
    HalfDiminished, // ø
    Augmented,      // aug, +
    Sus(u8),        // sus, sus2, sus4
    Add(u8),        // add9, add11, ...
    Number(u8),     // 5, 6, 7, 9, 11, 13
    SixNine,        // 69, 6/9
    Flat(u8),       // b5, b9, b13
    Sharp(u8),      // #5, #9, #11
    Slash(PitchClass), // /E
    Unknown(char),
}

/// Suspended-chord flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    Sus2,
    Sus4,
}

/// Explicit alteration applied after every other rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alteration {
    FlatFive,
    SharpFive,
    FlatNine,
    SharpNine,
    SharpEleven,
    FlatThirteen,
}

impl Alteration {
    fn from_token(token: ChordToken) -> Option<Self> {
        match token {
            ChordToken::Flat(5) => Some(Alteration::FlatFive),
            ChordToken::Sharp(5) => Some(Alteration::SharpFive),
            ChordToken::Flat(9) => Some(Alteration::FlatNine),
            ChordToken::Sharp(9) => Some(Alteration::SharpNine),
            ChordToken::Sharp(11) => Some(Alteration::SharpEleven),
            ChordToken::Flat(13) => Some(Alteration::FlatThirteen),
            _ => None,
        }
    }
}

/// Quality flags collected from the token stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityTags {
    pub minor: bool,
    /// Any major marker (maj, M, Δ); selects the major seventh
    pub major_marker: bool,
    /// The literal word "maj"; cancels a minor marker for the third
    pub maj_word: bool,
    pub diminished: bool,
    pub half_diminished: bool,
    pub augmented: bool,
    pub suspension: Option<Suspension>,
    /// Highest of 7 / 9 / 11 / 13 written in the symbol
    pub extension: Option<u8>,
    pub sixth: bool,
    pub six_nine: bool,
    pub power: bool,
    pub added: Vec<u8>,
    /// Set when the tokenizer met something it cannot classify
    pub unrecognized: bool,
}

/// A tokenized chord symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSymbol {
    pub text: String,
    pub root: PitchClass,
    pub root_name: String,
    /// Everything after the root, verbatim
    pub quality_text: String,
    pub quality: QualityTags,
    pub alterations: Vec<Alteration>,
    pub bass: Option<PitchClass>,
}

impl ChordSymbol {
    /// True when the quality is nothing but a basic triad marker ("", "m", "dim", "aug", ...)
    pub fn is_plain_triad(&self) -> bool {
        matches!(
            self.quality_text.as_str(),
            "" | "m" | "min" | "-" | "dim" | "°" | "o" | "aug" | "+" | "maj" | "M"
        )
    }

    /// Quality text with the leading triad marker removed, e.g. "m7b5" -> "7b5", "maj7" -> "maj7"
    pub fn extension_suffix(&self) -> &str {
        let q = self.quality_text.as_str();
        for marker in ["dim", "aug", "min", "°", "ø", "+", "-"] {
            if let Some(rest) = q.strip_prefix(marker) {
                return rest;
            }
        }
        if q.starts_with('m') && !q.starts_with("maj") {
            return &q[1..];
        }
        q
    }
}

/// Tokenizer over the quality part of a chord symbol
struct ChordLexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> ChordLexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Consume `word` if the input continues with it
    fn eat(&mut self, word: &str) -> bool {
        let ahead: String = self.chars.clone().take(word.chars().count()).collect();
        if ahead == word {
            for _ in word.chars() {
                self.chars.next();
            }
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> Option<u8> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.chars.next();
        }
        digits.parse().ok()
    }

    fn tokenize(mut self) -> Vec<ChordToken> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            match c {
                '(' | ')' | ',' | ' ' => {
                    self.chars.next();
                }
                'm' | 'M' if self.eat("maj") || self.eat("Maj") || self.eat("MAJ") => {
                    tokens.push(ChordToken::Major { word: true });
                }
                'm' if self.eat("min") => tokens.push(ChordToken::Minor),
                'm' | '-' => {
                    self.chars.next();
                    tokens.push(ChordToken::Minor);
                }
                'M' => {
                    self.chars.next();
                    tokens.push(ChordToken::Major { word: false });
                }
                'Δ' => {
                    self.chars.next();
                    tokens.push(ChordToken::Major { word: false });
                    // A bare triangle means maj7
                    if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        tokens.push(ChordToken::Number(7));
                    }
                }
                'd' if self.eat("dim") => tokens.push(ChordToken::Diminished),
                '°' | 'o' => {
                    self.chars.next();
                    tokens.push(ChordToken::Diminished);
                }
                'ø' => {
                    self.chars.next();
                    tokens.push(ChordToken::HalfDiminished);
                }
                'a' if self.eat("aug") => tokens.push(ChordToken::Augmented),
                'a' if self.eat("add") => match self.number() {
                    Some(n) => tokens.push(ChordToken::Add(n)),
                    None => tokens.push(ChordToken::Unknown('a')),
                },
                '+' => {
                    self.chars.next();
                    tokens.push(ChordToken::Augmented);
                }
                's' if self.eat("sus") => {
                    let n = self.number().unwrap_or(4);
                    tokens.push(ChordToken::Sus(n));
                }
                'b' | '#' => {
                    self.chars.next();
                    match self.number() {
                        Some(n) if c == 'b' => tokens.push(ChordToken::Flat(n)),
                        Some(n) => tokens.push(ChordToken::Sharp(n)),
                        None => tokens.push(ChordToken::Unknown(c)),
                    }
                }
                '0'..='9' => {
                    let n = self.number().unwrap_or(0);
                    if n == 69 {
                        tokens.push(ChordToken::SixNine);
                    } else if n == 6 && self.eat("/9") {
                        tokens.push(ChordToken::SixNine);
                    } else {
                        tokens.push(ChordToken::Number(n));
                    }
                }
                '/' => {
                    self.chars.next();
                    let rest: String = self.chars.by_ref().collect();
                    match parse_note_name(&rest) {
                        Some(pc) => tokens.push(ChordToken::Slash(pc)),
                        None => tokens.push(ChordToken::Unknown('/')),
                    }
                }
                other => {
                    self.chars.next();
                    tokens.push(ChordToken::Unknown(other));
                }
            }
        }

        tokens
    }
}

/// Split a symbol into its root spelling and the remaining quality text.
///
/// Returns `None` when the symbol does not start with `[A-G][#b]?`.
fn split_root(symbol: &str) -> Option<(PitchClass, &str, &str)> {
    let mut chars = symbol.char_indices();
    let (_, letter) = chars.next()?;
    let base = letter_to_pitch_class(letter)? as i8;
    let (root_end, accidental) = match chars.next() {
        Some((i, '#')) => (i + 1, 1),
        Some((i, 'b')) => (i + 1, -1),
        _ => (letter.len_utf8(), 0),
    };
    let root = (base + accidental).rem_euclid(12) as PitchClass;
    Some((root, &symbol[..root_end], &symbol[root_end..]))
}

/// Parse a chord symbol into its typed form
///
/// Returns `None` for anything without a recognizable root ("N.C.", "", "x"),
/// which callers treat as a rest.
///
/// # Examples
/// ```
/// use jam::theory::parse_chord_symbol;
///
/// let chord = parse_chord_symbol("F#m7b5").unwrap();
/// assert_eq!(chord.root, 6);
/// assert!(chord.quality.minor);
/// assert_eq!(chord.quality.extension, Some(7));
///
/// assert!(parse_chord_symbol("N.C.").is_none());
/// ```
pub fn parse_chord_symbol(symbol: &str) -> Option<ChordSymbol> {
    let trimmed = symbol.trim();
    let (root, root_name, quality_text) = split_root(trimmed)?;

    let mut quality = QualityTags::default();
    let mut alterations = Vec::new();
    let mut bass = None;

    for token in ChordLexer::new(quality_text).tokenize() {
        match token {
            ChordToken::Major { word } => {
                quality.major_marker = true;
                quality.maj_word |= word;
            }
            ChordToken::Minor => quality.minor = true,
            ChordToken::Diminished => quality.diminished = true,
            ChordToken::HalfDiminished => quality.half_diminished = true,
            ChordToken::Augmented => quality.augmented = true,
            ChordToken::Sus(2) => quality.suspension = Some(Suspension::Sus2),
            ChordToken::Sus(4) => quality.suspension = Some(Suspension::Sus4),
            ChordToken::Add(n @ (2 | 4 | 6 | 9 | 11 | 13)) => quality.added.push(n),
            ChordToken::Number(5) => quality.power = true,
            ChordToken::Number(6) => quality.sixth = true,
            ChordToken::Number(n @ (7 | 9 | 11 | 13)) => {
                quality.extension = Some(quality.extension.map_or(n, |e| e.max(n)));
            }
            ChordToken::SixNine => quality.six_nine = true,
            ChordToken::Flat(_) | ChordToken::Sharp(_) => match Alteration::from_token(token) {
                Some(alteration) => alterations.push(alteration),
                None => quality.unrecognized = true,
            },
            ChordToken::Slash(pc) => bass = Some(pc),
            _ => quality.unrecognized = true,
        }
    }

    Some(ChordSymbol {
        text: trimmed.to_string(),
        root,
        root_name: root_name.to_string(),
        quality_text: quality_text.to_string(),
        quality,
        alterations,
        bass,
    })
}
