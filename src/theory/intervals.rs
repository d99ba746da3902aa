//! Table-driven interval resolution
//!
//! Turns a tokenized [`ChordSymbol`] into an [`IntervalSet`]. The rules run in a
//! fixed order and each one only adds or overrides degrees, so the last rule to
//! touch a degree wins. Explicit alterations run last.

use std::collections::BTreeMap;

use super::chord_parser::{parse_chord_symbol, Alteration, ChordSymbol, QualityTags, Suspension};

/// Scale degree of a chord tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Degree {
    Root,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Seventh,
    Ninth,
    Eleventh,
    Thirteenth,
}

impl Degree {
    pub fn number(self) -> u8 {
        match self {
            Degree::Root => 1,
            Degree::Second => 2,
            Degree::Third => 3,
            Degree::Fourth => 4,
            Degree::Fifth => 5,
            Degree::Sixth => 6,
            Degree::Seventh => 7,
            Degree::Ninth => 9,
            Degree::Eleventh => 11,
            Degree::Thirteenth => 13,
        }
    }
}

// Major-scale offsets for the extensions
const NINTH: u8 = 14;
const ELEVENTH: u8 = 17;
const THIRTEENTH: u8 = 21;

/// Alteration table: degree and the semitone offset it forces
const ALTERATIONS: [(Alteration, Degree, u8); 6] = [
    (Alteration::FlatFive, Degree::Fifth, 6),
    (Alteration::SharpFive, Degree::Fifth, 8),
    (Alteration::FlatNine, Degree::Ninth, 13),
    (Alteration::SharpNine, Degree::Ninth, 15),
    (Alteration::SharpEleven, Degree::Eleventh, 18),
    (Alteration::FlatThirteen, Degree::Thirteenth, 20),
];

/// Added tones (`add9`, `add11`, ...) by written number
fn added_degree(n: u8) -> Option<(Degree, u8)> {
    match n {
        2 => Some((Degree::Second, 2)),
        4 => Some((Degree::Fourth, 5)),
        6 => Some((Degree::Sixth, 9)),
        9 => Some((Degree::Ninth, NINTH)),
        11 => Some((Degree::Eleventh, ELEVENTH)),
        13 => Some((Degree::Thirteenth, THIRTEENTH)),
        _ => None,
    }
}

/// Semitone offsets keyed by scale degree
///
/// Empty means "no chord" (a rest). A non-empty set always contains the root at 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    degrees: BTreeMap<Degree, u8>,
}

impl IntervalSet {
    fn root_only() -> Self {
        let mut degrees = BTreeMap::new();
        degrees.insert(Degree::Root, 0);
        Self { degrees }
    }

    fn set(&mut self, degree: Degree, offset: u8) {
        self.degrees.insert(degree, offset);
    }

    fn set_if_absent(&mut self, degree: Degree, offset: u8) {
        self.degrees.entry(degree).or_insert(offset);
    }

    pub fn is_empty(&self) -> bool {
        self.degrees.is_empty()
    }

    pub fn len(&self) -> usize {
        self.degrees.len()
    }

    pub fn get(&self, degree: Degree) -> Option<u8> {
        self.degrees.get(&degree).copied()
    }

    pub fn has_degree(&self, degree: Degree) -> bool {
        self.degrees.contains_key(&degree)
    }

    /// (degree, offset) pairs in degree order
    pub fn entries(&self) -> impl Iterator<Item = (Degree, u8)> + '_ {
        self.degrees.iter().map(|(d, o)| (*d, *o))
    }

    /// (degree, offset) pairs sorted by ascending offset
    pub fn sorted_entries(&self) -> Vec<(Degree, u8)> {
        let mut entries: Vec<_> = self.entries().collect();
        entries.sort_by_key(|(_, offset)| *offset);
        entries
    }

    /// Semitone offsets, ascending
    pub fn offsets(&self) -> Vec<u8> {
        self.sorted_entries().into_iter().map(|(_, o)| o).collect()
    }

    pub fn is_minor(&self) -> bool {
        self.get(Degree::Third) == Some(3)
    }

    pub fn is_diminished(&self) -> bool {
        self.is_minor() && self.get(Degree::Fifth) == Some(6)
    }

    pub fn is_augmented(&self) -> bool {
        self.get(Degree::Third) == Some(4) && self.get(Degree::Fifth) == Some(8)
    }

    pub fn is_suspended(&self) -> bool {
        !self.has_degree(Degree::Third) && (self.has_degree(Degree::Second) || self.has_degree(Degree::Fourth))
    }
}

fn seventh_offset(q: &QualityTags) -> u8 {
    if q.major_marker {
        11
    } else if q.diminished {
        9
    } else {
        10
    }
}

/// Resolve a tokenized chord into its interval set
pub fn resolve_chord(chord: &ChordSymbol) -> IntervalSet {
    let q = &chord.quality;
    let mut set = IntervalSet::root_only();

    if q.unrecognized {
        tracing::debug!("unsupported chord quality in '{}', using root only", chord.text);
        return set;
    }

    let has = |alteration: Alteration| chord.alterations.contains(&alteration);

    // Third
    let minor = q.diminished || q.half_diminished || (q.minor && !q.maj_word);
    set.set(Degree::Third, if minor { 3 } else { 4 });

    // Fifth
    let fifth = if q.diminished || q.half_diminished || has(Alteration::FlatFive) {
        6
    } else if q.augmented || has(Alteration::SharpFive) {
        8
    } else {
        7
    };
    set.set(Degree::Fifth, fifth);

    // Suspension / power chord
    match q.suspension {
        Some(Suspension::Sus4) => {
            set.degrees.remove(&Degree::Third);
            set.set(Degree::Fourth, 5);
        }
        Some(Suspension::Sus2) => {
            set.degrees.remove(&Degree::Third);
            set.set(Degree::Second, 2);
        }
        None => {}
    }
    if q.power && q.extension.is_none() {
        set.degrees.remove(&Degree::Third);
    }

    // Seventh and extensions
    let extension = q.extension.or(q.half_diminished.then_some(7));
    if let Some(ext) = extension {
        let seventh = seventh_offset(q);
        if ext == 7 {
            set.set(Degree::Seventh, seventh);
        }
        if ext >= 13 {
            set.set_if_absent(Degree::Thirteenth, THIRTEENTH);
        }
        if ext >= 11 {
            set.set_if_absent(Degree::Eleventh, ELEVENTH);
        }
        if ext >= 9 {
            set.set_if_absent(Degree::Ninth, NINTH);
        }
        set.set_if_absent(Degree::Seventh, seventh);
    }

    for &n in &q.added {
        if let Some((degree, offset)) = added_degree(n) {
            set.set_if_absent(degree, offset);
        }
    }

    // Sixth
    if (q.sixth || q.six_nine) && !set.has_degree(Degree::Thirteenth) {
        set.set(Degree::Sixth, 9);
    }
    if q.six_nine {
        set.set_if_absent(Degree::Ninth, NINTH);
    }

    // Explicit alterations, last one wins
    for alteration in &chord.alterations {
        if let Some((_, degree, offset)) = ALTERATIONS.iter().find(|(a, _, _)| a == alteration) {
            set.set(*degree, *offset);
        }
    }

    set
}

/// Resolve a chord symbol straight from text.
///
/// Unparseable symbols give an empty set (a rest), never an error.
///
/// # Examples
/// ```
/// use jam::theory::resolve;
///
/// assert_eq!(resolve("C").offsets(), vec![0, 4, 7]);
/// assert_eq!(resolve("Dm7").offsets(), vec![0, 3, 7, 10]);
/// assert_eq!(resolve("G13").offsets(), vec![0, 4, 7, 10, 14, 17, 21]);
/// assert!(resolve("N.C.").is_empty());
/// ```
pub fn resolve(symbol: &str) -> IntervalSet {
    parse_chord_symbol(symbol)
        .map(|chord| resolve_chord(&chord))
        .unwrap_or_default()
}
