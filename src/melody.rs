//! Melody Generation
//!
//! Builds whole sequences and mutates single steps, drawing tones from
//! the active scale by weight. A full melody is a walk: each slot repeats
//! the previous note, moves one scale degree up or down, or draws a fresh
//! note, chosen by a second weighted draw.

use crate::error::Error;
use crate::note::{Note, MAX_OCTAVE, MAX_VELOCITY, MIN_OCTAVE, MIN_VELOCITY};
use crate::rng::{weighted_index, RandomSource};
use crate::scale::Scale;
use crate::sequence::{Sequence, MAX_STEPS};
use serde::{Deserialize, Serialize};

/// How a slot relates to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    Repeat,
    Up,
    Down,
    New,
}

impl NoteKind {
    const ORDER: [NoteKind; 4] = [NoteKind::Repeat, NoteKind::Up, NoteKind::Down, NoteKind::New];
}

/// Relative weights of the four note kinds, in
/// REPEAT, UP, DOWN, NEW order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u32; 4]", into = "[u32; 4]")]
pub struct NoteKindWeights([u32; 4]);

impl NoteKindWeights {
    pub fn new(weights: [u32; 4]) -> Result<Self, Error> {
        if weights.iter().all(|&w| w == 0) {
            return Err(Error::ZeroWeightSum {
                name: "note kind weights",
            });
        }
        Ok(Self(weights))
    }

    /// Every slot a fresh draw
    pub fn all_new() -> Self {
        Self([0, 0, 0, 1])
    }

    pub fn as_array(&self) -> [u32; 4] {
        self.0
    }

    fn pick<R: RandomSource + ?Sized>(&self, rng: &mut R) -> NoteKind {
        // Construction rejects the all-zero case
        weighted_index(rng, &self.0)
            .map(|i| NoteKind::ORDER[i])
            .unwrap_or(NoteKind::New)
    }
}

/// Repeat 2, up 3, down 3, new 6: melodies that mostly walk the scale.
/// Panels that shipped with every step drawn fresh should use
/// [`NoteKindWeights::all_new`] to keep their character.
impl Default for NoteKindWeights {
    fn default() -> Self {
        Self([2, 3, 3, 6])
    }
}

impl TryFrom<[u32; 4]> for NoteKindWeights {
    type Error = Error;

    fn try_from(weights: [u32; 4]) -> Result<Self, Self::Error> {
        Self::new(weights)
    }
}

impl From<NoteKindWeights> for [u32; 4] {
    fn from(weights: NoteKindWeights) -> Self {
        weights.0
    }
}

/// Weighted-random melody generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodyGenerator {
    /// Octave fresh notes centre on
    pub base_octave: i32,
    /// Fresh notes land within `base_octave ± range`
    pub range: u8,
    /// Chance a slot is muted, percent
    pub rest_probability: f32,
    /// Chance a slot is accented, percent
    pub accent_probability: f32,
    pub note_kinds: NoteKindWeights,
}

impl MelodyGenerator {
    pub fn new() -> Self {
        Self {
            base_octave: 4,
            range: 1,
            rest_probability: 0.0,
            accent_probability: 10.0,
            note_kinds: NoteKindWeights::default(),
        }
    }

    pub fn with_note_kinds(mut self, weights: NoteKindWeights) -> Self {
        self.note_kinds = weights;
        self
    }

    pub fn with_base_octave(mut self, octave: i32) -> Self {
        self.base_octave = octave;
        self
    }

    pub fn with_range(mut self, range: u8) -> Self {
        self.range = range;
        self
    }

    pub fn set_rest_probability(&mut self, percent: f32) {
        self.rest_probability = percent.clamp(0.0, 100.0);
    }

    pub fn set_accent_probability(&mut self, percent: f32) {
        self.accent_probability = percent.clamp(0.0, 100.0);
    }

    /// Draw a fresh note from `scale`: tone by weight, octave uniform in
    /// `base_octave ± range` and held within octaves 2-5. Flags and
    /// velocity are left at their defaults.
    pub fn random_note<R: RandomSource + ?Sized>(
        &self,
        scale: &Scale,
        range: u8,
        rng: &mut R,
    ) -> Note {
        let tone = scale.tones()[scale.random_index(rng)];
        let octave = if range == 0 {
            self.base_octave
        } else {
            let span = 2 * range as u32 + 1;
            self.base_octave - range as i32 + rng.below(span) as i32
        };
        Note::from_tone(tone, octave.clamp(MIN_OCTAVE, MAX_OCTAVE))
    }

    /// Roll mute, accent and velocity for a slot
    fn roll_performance<R: RandomSource + ?Sized>(&self, note: &mut Note, rng: &mut R) {
        note.muted = rng.chance_percent(self.rest_probability);
        note.accent = rng.chance_percent(self.accent_probability);
        note.velocity = rng.range_f32(MIN_VELOCITY, MAX_VELOCITY);
    }

    /// Overwrite all 32 slots of `sequence` with a new melody. The active
    /// length is left alone.
    ///
    /// Up and down moves stop at the edges of octaves 2-5, so a long run
    /// in one direction flattens out instead of leaving the MIDI range.
    pub fn generate_full<R: RandomSource + ?Sized>(
        &self,
        sequence: &mut Sequence,
        scale: &Scale,
        rng: &mut R,
    ) {
        let mut previous = Note::default();
        for slot in 0..MAX_STEPS {
            let kind = if slot == 0 {
                NoteKind::New
            } else {
                self.note_kinds.pick(rng)
            };

            let mut note = match kind {
                NoteKind::Repeat => previous,
                NoteKind::Up | NoteKind::Down => {
                    let degrees = if kind == NoteKind::Up { 1 } else { -1 };
                    let (tone, octave) =
                        scale.step_degrees_bounded(previous.tone(), previous.octave(), degrees);
                    Note::from_tone(tone, octave)
                }
                NoteKind::New => self.random_note(scale, self.range, rng),
            };
            self.roll_performance(&mut note, rng);
            log::trace!("slot {}: {:?} -> {}", slot, kind, note);

            sequence.set(slot, note);
            previous = note;
        }
        log::debug!("new melody in {}", scale.name());
    }

    /// Replace one slot within the active length with a fresh note.
    /// Returns the slot changed.
    pub fn mutate_one<R: RandomSource + ?Sized>(
        &self,
        sequence: &mut Sequence,
        scale: &Scale,
        rng: &mut R,
    ) -> usize {
        let slot = rng.below(sequence.len() as u32) as usize;
        let mut note = self.random_note(scale, self.range, rng);
        self.roll_performance(&mut note, rng);
        log::debug!("mutated step {} to {}", slot, note);
        sequence.set(slot, note);
        slot
    }
}

impl Default for MelodyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;
    use crate::scale::BUILTIN_SCALES;

    fn natural_minor() -> &'static Scale {
        &BUILTIN_SCALES[2]
    }

    #[test]
    fn test_random_note_stays_in_scale_and_range() {
        let generator = MelodyGenerator::new();
        let mut rng = Rng::from_seed(11);
        for _ in 0..500 {
            let note = generator.random_note(natural_minor(), 1, &mut rng);
            assert!(natural_minor().index_of(note.tone()).is_some());
            assert!((3..=5).contains(&note.octave()));
        }
    }

    #[test]
    fn test_random_note_zero_range() {
        let generator = MelodyGenerator::new().with_base_octave(3);
        let mut rng = Rng::from_seed(12);
        for _ in 0..200 {
            assert_eq!(generator.random_note(natural_minor(), 0, &mut rng).octave(), 3);
        }
    }

    #[test]
    fn test_random_note_reaches_every_octave() {
        let generator = MelodyGenerator::new();
        let mut rng = Rng::from_seed(13);
        let mut seen = [false; 3];
        for _ in 0..300 {
            let octave = generator.random_note(natural_minor(), 1, &mut rng).octave();
            seen[(octave - 3) as usize] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn test_full_melody_reproducible() {
        let generator = MelodyGenerator::new();
        let mut a = Sequence::new();
        let mut b = Sequence::new();
        generator.generate_full(&mut a, natural_minor(), &mut Rng::from_seed(2024));
        generator.generate_full(&mut b, natural_minor(), &mut Rng::from_seed(2024));
        assert_eq!(a, b);

        let mut c = Sequence::new();
        generator.generate_full(&mut c, natural_minor(), &mut Rng::from_seed(2025));
        assert_ne!(a, c);
    }

    #[test]
    fn test_full_melody_fills_every_slot_in_scale() {
        let generator = MelodyGenerator::new();
        let mut sequence = Sequence::new();
        sequence.set_length(4);
        generator.generate_full(&mut sequence, natural_minor(), &mut Rng::from_seed(5));
        assert_eq!(sequence.len(), 4);
        for note in sequence.all() {
            assert!(natural_minor().index_of(note.tone()).is_some());
            assert!((MIN_VELOCITY..=MAX_VELOCITY).contains(&note.velocity));
        }
    }

    #[test]
    fn test_repeat_only_melody() {
        let generator =
            MelodyGenerator::new().with_note_kinds(NoteKindWeights::new([1, 0, 0, 0]).unwrap());
        let mut sequence = Sequence::new();
        generator.generate_full(&mut sequence, natural_minor(), &mut Rng::from_seed(9));
        let first = sequence.get(0).midi();
        assert!(sequence.all().iter().all(|n| n.midi() == first));
    }

    #[test]
    fn test_up_only_melody_climbs_scale() {
        let generator = MelodyGenerator::new()
            .with_range(0)
            .with_note_kinds(NoteKindWeights::new([0, 1, 0, 0]).unwrap());
        let mut sequence = Sequence::new();
        let scale = natural_minor();
        generator.generate_full(&mut sequence, scale, &mut Rng::from_seed(10));

        for pair in sequence.all().windows(2) {
            let expected = scale.step_degrees_bounded(pair[0].tone(), pair[0].octave(), 1);
            assert_eq!((pair[1].tone(), pair[1].octave()), expected);
            assert!(pair[1].midi() >= pair[0].midi());
        }
        // 31 degrees up from octave 4 runs into the ceiling
        let top = sequence.get(MAX_STEPS - 1);
        assert_eq!((top.tone(), top.octave()), (scale.last_tone(), MAX_OCTAVE));
    }

    #[test]
    fn test_down_wraps_to_previous_octave() {
        let generator = MelodyGenerator::new()
            .with_range(0)
            .with_note_kinds(NoteKindWeights::new([0, 0, 1, 0]).unwrap());
        let mut sequence = Sequence::new();
        let scale = &BUILTIN_SCALES[4]; // major pentatonic: 1, 3, 5, 8, 10
        generator.generate_full(&mut sequence, scale, &mut Rng::from_seed(3));

        for pair in sequence.all().windows(2) {
            if pair[0].octave() == MIN_OCTAVE && pair[0].tone() == scale.first_tone() {
                // Floor reached: the walk stays put
                assert_eq!(pair[1].midi(), pair[0].midi());
                continue;
            }
            assert!(pair[1].midi() < pair[0].midi());
            if pair[0].tone() == scale.first_tone() {
                assert_eq!(pair[1].tone(), scale.last_tone());
                assert_eq!(pair[1].octave(), pair[0].octave() - 1);
            }
        }
        assert_eq!(sequence.get(MAX_STEPS - 1).midi(), 36);
    }

    #[test]
    fn test_melody_stays_in_midi_range() {
        let generator = MelodyGenerator::new().with_base_octave(7).with_range(3);
        let mut sequence = Sequence::new();
        for seed in 0..20 {
            generator.generate_full(&mut sequence, natural_minor(), &mut Rng::from_seed(seed));
            assert!(sequence
                .all()
                .iter()
                .all(|n| (crate::note::MIDI_MIN..=crate::note::MIDI_MAX).contains(&n.midi())));
        }
    }

    #[test]
    fn test_rest_and_accent_probability() {
        let mut generator = MelodyGenerator::new();
        generator.set_rest_probability(100.0);
        generator.set_accent_probability(0.0);
        let mut sequence = Sequence::new();
        generator.generate_full(&mut sequence, natural_minor(), &mut Rng::from_seed(4));
        assert!(sequence.all().iter().all(|n| n.muted && !n.accent));

        generator.set_rest_probability(0.0);
        generator.set_accent_probability(250.0);
        assert_eq!(generator.accent_probability, 100.0);
        generator.generate_full(&mut sequence, natural_minor(), &mut Rng::from_seed(4));
        assert!(sequence.all().iter().all(|n| !n.muted && n.accent));
    }

    #[test]
    fn test_mutate_one_stays_within_length() {
        let generator = MelodyGenerator::new();
        let mut rng = Rng::from_seed(77);
        let mut sequence = Sequence::new();
        sequence.set_length(5);
        let before = sequence.clone();
        for _ in 0..200 {
            let slot = generator.mutate_one(&mut sequence, natural_minor(), &mut rng);
            assert!(slot < 5);
        }
        assert_eq!(&sequence.all()[5..], &before.all()[5..]);
    }

    #[test]
    fn test_zero_note_kind_weights_rejected() {
        assert!(NoteKindWeights::new([0, 0, 0, 0]).is_err());
    }
}
