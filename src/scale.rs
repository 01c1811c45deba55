//! Scales
//!
//! A scale is an ascending subset of the twelve tones with a selection
//! weight per tone. Tables are validated once, when a [`ScaleTable`] is
//! built, so the weighted draw never sees a zero-sum list at runtime.

use crate::error::Error;
use crate::note::{MAX_OCTAVE, MIN_OCTAVE};
use crate::rng::{weighted_index, RandomSource};

/// Named set of valid tones with per-tone selection weights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    name: &'static str,
    tones: &'static [u8],
    weights: &'static [u32],
}

impl Scale {
    /// Build a scale without checking it. Use [`Scale::new`] or a
    /// [`ScaleTable`] to validate.
    pub const fn new_unchecked(
        name: &'static str,
        tones: &'static [u8],
        weights: &'static [u32],
    ) -> Self {
        Self {
            name,
            tones,
            weights,
        }
    }

    /// Build and validate a scale
    pub fn new(
        name: &'static str,
        tones: &'static [u8],
        weights: &'static [u32],
    ) -> Result<Self, Error> {
        let scale = Self::new_unchecked(name, tones, weights);
        scale.validate()?;
        Ok(scale)
    }

    /// Check the tone list is non-empty, ascending and within 1..=12, and
    /// that the weights match it and do not sum to zero.
    pub fn validate(&self) -> Result<(), Error> {
        let name = self.name;
        if self.tones.is_empty() {
            return Err(Error::EmptyScale { name });
        }
        if self.tones.len() != self.weights.len() {
            return Err(Error::MismatchedWeights {
                name,
                tones: self.tones.len(),
                weights: self.weights.len(),
            });
        }
        if let Some(&tone) = self.tones.iter().find(|&&t| !(1..=12).contains(&t)) {
            return Err(Error::ToneOutOfRange { name, tone });
        }
        if self.tones.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::UnsortedTones { name });
        }
        if self.weights.iter().all(|&w| w == 0) {
            return Err(Error::ZeroWeightSum { name });
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tones(&self) -> &'static [u8] {
        self.tones
    }

    pub fn weights(&self) -> &'static [u32] {
        self.weights
    }

    /// Number of tones
    pub fn len(&self) -> usize {
        self.tones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }

    pub fn first_tone(&self) -> u8 {
        self.tones[0]
    }

    pub fn last_tone(&self) -> u8 {
        self.tones[self.tones.len() - 1]
    }

    /// Position of `tone` in the scale, if it is a member
    pub fn index_of(&self, tone: u8) -> Option<usize> {
        self.tones.iter().position(|&t| t == tone)
    }

    /// Position of the scale tone closest to `tone` around the pitch-class
    /// circle. Exact members map to themselves; ties resolve to the earlier
    /// scale tone.
    pub fn nearest_index(&self, tone: u8) -> usize {
        if let Some(index) = self.index_of(tone) {
            return index;
        }
        let mut best = 0;
        let mut best_distance = u8::MAX;
        for (index, &candidate) in self.tones.iter().enumerate() {
            let diff = candidate.abs_diff(tone) % 12;
            let distance = diff.min(12 - diff);
            if distance < best_distance {
                best = index;
                best_distance = distance;
            }
        }
        best
    }

    /// Move `degrees` scale steps from (`tone`, `octave`), wrapping into
    /// adjacent octaves at the scale boundaries. A tone that is not in the
    /// scale first snaps to its nearest member.
    pub fn step_degrees(&self, tone: u8, octave: i32, degrees: i32) -> (u8, i32) {
        let len = self.tones.len() as i32;
        let position = (self.nearest_index(tone) as i32).saturating_add(degrees);
        let octave = octave.saturating_add(position.div_euclid(len));
        let index = position.rem_euclid(len) as usize;
        (self.tones[index], octave)
    }

    /// [`step_degrees`](Self::step_degrees) held inside the editable
    /// octaves: a move below octave 2 lands on the first tone of octave 2,
    /// a move above octave 5 on the last tone of octave 5.
    pub fn step_degrees_bounded(&self, tone: u8, octave: i32, degrees: i32) -> (u8, i32) {
        match self.step_degrees(tone, octave, degrees) {
            (_, octave) if octave < MIN_OCTAVE => (self.first_tone(), MIN_OCTAVE),
            (_, octave) if octave > MAX_OCTAVE => (self.last_tone(), MAX_OCTAVE),
            moved => moved,
        }
    }

    /// Weighted draw of a tone index
    pub fn random_index<R: RandomSource + ?Sized>(&self, rng: &mut R) -> usize {
        // Weights are checked non-zero when the table is built
        weighted_index(rng, self.weights).unwrap_or(0)
    }
}

/// Built-in scale set. Index 0 is the reserved single-tone tuning
/// scale; 1.. are user selectable.
pub static BUILTIN_SCALES: [Scale; 10] = [
    Scale::new_unchecked("Tuning", &[1], &[1]),
    Scale::new_unchecked(
        "Major",
        &[1, 3, 5, 6, 8, 10, 12],
        &[3, 2, 3, 3, 3, 2, 1],
    ),
    Scale::new_unchecked(
        "Natural Minor",
        &[1, 3, 4, 6, 8, 9, 11],
        &[3, 2, 3, 3, 3, 2, 1],
    ),
    Scale::new_unchecked(
        "Harmonic Minor",
        &[1, 3, 4, 6, 8, 9, 12],
        &[3, 2, 3, 3, 3, 2, 1],
    ),
    Scale::new_unchecked("Major Pentatonic", &[1, 3, 5, 8, 10], &[2, 1, 1, 1, 1]),
    Scale::new_unchecked("Minor Pentatonic", &[1, 4, 6, 8, 11], &[1, 1, 1, 1, 1]),
    Scale::new_unchecked(
        "Dorian",
        &[1, 3, 4, 6, 8, 10, 11],
        &[3, 2, 3, 3, 3, 2, 1],
    ),
    Scale::new_unchecked(
        "Mixolydian",
        &[1, 3, 5, 6, 8, 10, 11],
        &[3, 2, 3, 3, 3, 2, 1],
    ),
    Scale::new_unchecked(
        "Bhairav",
        &[1, 2, 5, 6, 8, 10, 11],
        &[3, 1, 1, 1, 2, 1, 1],
    ),
    Scale::new_unchecked(
        "Chromatic",
        &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
        &[1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    ),
];

/// Scale selected at power-up
pub const DEFAULT_SCALE_INDEX: usize = 2;

/// Validated, indexable set of scales
#[derive(Debug, Clone, Copy)]
pub struct ScaleTable {
    scales: &'static [Scale],
}

impl ScaleTable {
    /// Validate every scale. The table needs the reserved entry at index 0
    /// plus at least one selectable scale.
    pub fn new(scales: &'static [Scale]) -> Result<Self, Error> {
        if scales.len() < 2 {
            return Err(Error::ScaleTableTooSmall { len: scales.len() });
        }
        for scale in scales {
            scale.validate()?;
        }
        Ok(Self { scales })
    }

    /// The built-in table
    pub fn builtin() -> Self {
        Self {
            scales: &BUILTIN_SCALES,
        }
    }

    /// Number of entries, including the reserved one
    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'static Scale> {
        self.scales.get(index)
    }

    /// Resolve a scale by name
    pub fn by_name(&self, name: &str) -> Option<(usize, &'static Scale)> {
        self.scales
            .iter()
            .enumerate()
            .find(|(_, scale)| scale.name == name)
    }

    /// Clamp an index into the selectable range `1..len`
    pub fn clamp_index(&self, index: i32) -> usize {
        index.clamp(1, self.scales.len() as i32 - 1) as usize
    }

    /// Selectable scale at `index`, or an error if it is reserved or past
    /// the end
    pub fn selectable(&self, index: usize) -> Result<&'static Scale, Error> {
        if index == 0 || index >= self.scales.len() {
            return Err(Error::ScaleIndexOutOfRange {
                index,
                len: self.scales.len(),
            });
        }
        Ok(&self.scales[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Scale> {
        self.scales.iter()
    }
}

impl Default for ScaleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    static BAD_WEIGHTS: [Scale; 2] = [
        Scale::new_unchecked("Tuning", &[1], &[1]),
        Scale::new_unchecked("Silent", &[1, 5, 8], &[0, 0, 0]),
    ];

    #[test]
    fn test_builtin_table_validates() {
        assert!(ScaleTable::new(&BUILTIN_SCALES).is_ok());
        assert_eq!(ScaleTable::builtin().len(), 10);
    }

    #[test]
    fn test_zero_weight_sum_rejected() {
        assert_eq!(
            ScaleTable::new(&BAD_WEIGHTS).unwrap_err(),
            Error::ZeroWeightSum { name: "Silent" }
        );
    }

    #[test]
    fn test_scale_validation_errors() {
        assert_eq!(
            Scale::new("Empty", &[], &[]).unwrap_err(),
            Error::EmptyScale { name: "Empty" }
        );
        assert!(matches!(
            Scale::new("Short", &[1, 3], &[1]),
            Err(Error::MismatchedWeights { .. })
        ));
        assert!(matches!(
            Scale::new("Wide", &[1, 13], &[1, 1]),
            Err(Error::ToneOutOfRange { tone: 13, .. })
        ));
        assert!(matches!(
            Scale::new("Backwards", &[5, 3], &[1, 1]),
            Err(Error::UnsortedTones { .. })
        ));
        assert!(ScaleTable::new(&BUILTIN_SCALES[..1]).is_err());
    }

    #[test]
    fn test_lookup_by_name() {
        let table = ScaleTable::builtin();
        let (index, scale) = table.by_name("Dorian").unwrap();
        assert_eq!(index, 6);
        assert_eq!(scale.tones(), &[1, 3, 4, 6, 8, 10, 11]);
        assert!(table.by_name("Lydian").is_none());
    }

    #[test]
    fn test_clamp_index_never_selects_reserved() {
        let table = ScaleTable::builtin();
        for delta in [-1000, -5, -1, 0, 1, 5, 9, 1000] {
            let index = table.clamp_index(DEFAULT_SCALE_INDEX as i32 + delta);
            assert!((1..table.len()).contains(&index));
        }
        assert!(table.selectable(0).is_err());
        assert!(table.selectable(10).is_err());
        assert_eq!(table.selectable(9).unwrap().name(), "Chromatic");
    }

    #[test]
    fn test_step_degrees_wraps_octaves() {
        let major = &BUILTIN_SCALES[1];
        // B up one degree is C of the next octave
        assert_eq!(major.step_degrees(12, 3, 1), (1, 4));
        // C down one degree is B of the previous octave
        assert_eq!(major.step_degrees(1, 4, -1), (12, 3));
        // Within the scale
        assert_eq!(major.step_degrees(5, 4, 2), (8, 4));
        // Two octaves in one move
        assert_eq!(major.step_degrees(1, 4, 14), (1, 6));
        assert_eq!(major.step_degrees(1, 4, -8), (12, 2));
    }

    #[test]
    fn test_bounded_step_saturates() {
        let major = &BUILTIN_SCALES[1];
        assert_eq!(major.step_degrees_bounded(1, 2, -1), (1, 2));
        assert_eq!(major.step_degrees_bounded(12, 5, 1), (12, 5));
        assert_eq!(major.step_degrees_bounded(3, 2, -1), (1, 2));
        assert_eq!(major.step_degrees_bounded(1, 4, i32::MIN), (1, 2));
        assert_eq!(major.step_degrees_bounded(12, 4, 1), (1, 5));
    }

    #[test]
    fn test_nearest_index_snaps_non_members() {
        let minor_penta = &BUILTIN_SCALES[5]; // 1, 4, 6, 8, 11
        assert_eq!(minor_penta.nearest_index(4), 1);
        // D (3) is one away from Eb (4), two from C (1)
        assert_eq!(minor_penta.nearest_index(3), 1);
        // B (12) is one away from C (1) across the octave, one from Bb (11): earlier wins
        assert_eq!(minor_penta.nearest_index(12), 0);
        // F# (7) sits between F (6) and G (8): earlier wins
        assert_eq!(minor_penta.nearest_index(7), 2);
    }

    #[test]
    fn test_random_index_respects_weights() {
        let bhairav = &BUILTIN_SCALES[8];
        let mut rng = Rng::from_seed(8);
        let mut counts = [0usize; 7];
        for _ in 0..10000 {
            counts[bhairav.random_index(&mut rng)] += 1;
        }
        // Weight 3 at the root versus 1 for the neighbours
        assert!(counts[0] > counts[1] * 2);
        assert!(counts.iter().all(|&c| c > 0));
    }
}
