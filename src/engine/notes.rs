use crate::io::midi::MidiEvent;

/// Set of MIDI note numbers, one bit per key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteSet(u128);

impl NoteSet {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Returns false if the note was already present.
    pub fn insert(&mut self, note: u8) -> bool {
        let mask = 1u128 << (note & 0x7F);
        let fresh = self.0 & mask == 0;
        self.0 |= mask;
        fresh
    }

    pub fn remove(&mut self, note: u8) -> bool {
        let mask = 1u128 << (note & 0x7F);
        let present = self.0 & mask != 0;
        self.0 &= !mask;
        present
    }

    pub fn contains(&self, note: u8) -> bool {
        self.0 & (1u128 << (note & 0x7F)) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Ascending note order; reverse for descending.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = u8> + Clone + '_ {
        (0..128u8).filter(move |&note| self.contains(note))
    }

    /// Track Note On/Off traffic.
    pub fn observe(&mut self, event: &MidiEvent) {
        if event.is_note_start() {
            self.insert(event.data1());
        } else if event.is_note_end() {
            self.remove(event.data1());
        }
    }

    /// Push a channel 0 Note Off for every member into `out` and empty the set.
    pub fn drain_offs(&mut self, out: &mut Vec<MidiEvent>) {
        out.extend(self.iter().map(|note| MidiEvent::note_off(0, note)));
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_held_notes_from_midi() {
        let mut held = NoteSet::new();
        held.observe(&MidiEvent::note_on(0, 64, 90));
        held.observe(&MidiEvent::note_on(0, 60, 90));
        held.observe(&MidiEvent::new(0x90, 64, 0));
        assert_eq!(held.iter().collect::<Vec<_>>(), vec![60]);

        held.insert(127);
        held.insert(0);
        assert_eq!(held.iter().rev().collect::<Vec<_>>(), vec![127, 60, 0]);
        assert_eq!(held.len(), 3);
    }

    #[test]
    fn drain_offs_empties_the_set() {
        let mut sounding = NoteSet::new();
        sounding.insert(48);
        sounding.insert(52);
        let mut out = Vec::new();
        sounding.drain_offs(&mut out);
        assert_eq!(out, vec![MidiEvent::note_off(0, 48), MidiEvent::note_off(0, 52)]);
        assert!(sounding.is_empty());
    }
}
