use super::notes::NoteSet;
use super::transport::StepClock;
use crate::io::midi::MidiEvent;

const ARP_VELOCITY: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArpMode {
    #[default]
    Up,
    Down,
    UpDown,
    Random,
    Chord,
}

impl ArpMode {
    /// Unknown names play upward.
    pub fn from_name(name: &str) -> Self {
        match name {
            "down" => ArpMode::Down,
            "up-down" | "updown" => ArpMode::UpDown,
            "random" => ArpMode::Random,
            "chord" => ArpMode::Chord,
            _ => ArpMode::Up,
        }
    }
}

/// Arpeggiator runtime: the held chord in, stepped notes out.
pub struct Arpeggiator {
    pub clock: StepClock,
    mode: ArpMode,
    octaves: u8,
    /// Keys currently held upstream.
    held: NoteSet,
    /// Notes this arpeggiator has turned on downstream.
    sounding: NoteSet,
    /// Up-down travel direction.
    ascending: bool,
    rng: fastrand::Rng,
}

impl Arpeggiator {
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(fastrand::Rng::with_seed(seed))
    }

    fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            clock: StepClock::new(),
            mode: ArpMode::Up,
            octaves: 1,
            held: NoteSet::new(),
            sounding: NoteSet::new(),
            ascending: true,
            rng,
        }
    }

    /// Update the pattern. A change flushes sounding notes into `out`.
    pub fn configure(&mut self, mode: ArpMode, octaves: u8, out: &mut Vec<MidiEvent>) {
        let octaves = octaves.clamp(1, 4);
        if mode != self.mode || octaves != self.octaves {
            self.sounding.drain_offs(out);
        }
        self.mode = mode;
        self.octaves = octaves;
    }

    /// Routed MIDI updates the held chord.
    pub fn note_input(&mut self, event: &MidiEvent) {
        self.held.observe(event);
    }

    /// Quantized start. Anything still sounding is released.
    pub fn start(&mut self, out: &mut Vec<MidiEvent>) {
        self.sounding.drain_offs(out);
    }

    pub fn stop(&mut self, out: &mut Vec<MidiEvent>) {
        self.clock.stop();
        self.sounding.drain_offs(out);
    }

    pub fn flush(&mut self, out: &mut Vec<MidiEvent>) {
        self.sounding.drain_offs(out);
    }

    /// Play one step. Returns the note when exactly one new note started.
    pub fn step(&mut self, out: &mut Vec<MidiEvent>) -> Option<u8> {
        if self.held.is_empty() {
            self.sounding.drain_offs(out);
            return None;
        }

        let pool = self.expanded();
        let next = match self.mode {
            ArpMode::Chord => pool,
            ArpMode::Random => {
                let pick = self.rng.usize(..pool.len());
                single(pool.iter().nth(pick))
            }
            ArpMode::Up => single(self.linear_next(pool.iter())),
            ArpMode::Down => single(self.linear_next(pool.iter().rev())),
            ArpMode::UpDown => single(self.bounce_next(&pool)),
        };
        self.apply(next, out)
    }

    /// Held notes plus their octave copies, capped at 127.
    fn expanded(&self) -> NoteSet {
        let mut pool = self.held;
        for octave in 1..self.octaves {
            for note in self.held.iter() {
                let shifted = note as u16 + 12 * octave as u16;
                if shifted <= 127 {
                    pool.insert(shifted as u8);
                }
            }
        }
        pool
    }

    fn current(&self) -> Option<u8> {
        if self.sounding.len() == 1 {
            self.sounding.iter().next()
        } else {
            None
        }
    }

    /// Note after the current one in `order`, wrapping to the start.
    fn linear_next(&self, order: impl Iterator<Item = u8> + Clone) -> Option<u8> {
        let mut first = order.clone();
        match self.current() {
            Some(current) => {
                let mut rest = order.skip_while(|&n| n != current);
                match (rest.next(), rest.next()) {
                    (Some(_), Some(next)) => Some(next),
                    _ => first.next(),
                }
            }
            None => first.next(),
        }
    }

    fn bounce_next(&mut self, pool: &NoteSet) -> Option<u8> {
        let mut order = [0u8; 128];
        let mut len = 0;
        for note in pool.iter() {
            order[len] = note;
            len += 1;
        }
        let order = &order[..len];

        let position = self
            .current()
            .and_then(|current| order.iter().position(|&n| n == current));
        let mut index = match position {
            Some(index) => index as isize,
            None if self.ascending => -1,
            None => len as isize,
        };
        index += if self.ascending { 1 } else { -1 };
        if index >= len as isize {
            self.ascending = false;
            index = len as isize - 2;
        } else if index < 0 {
            self.ascending = true;
            index = 1;
        }
        let index = index.clamp(0, len as isize - 1) as usize;
        order.get(index).copied()
    }

    /// Turn off what is no longer wanted, then turn on what is new.
    fn apply(&mut self, next: NoteSet, out: &mut Vec<MidiEvent>) -> Option<u8> {
        for note in self.sounding.iter().filter(|&n| !next.contains(n)) {
            out.push(MidiEvent::note_off(0, note));
        }
        let mut started = 0;
        let mut last = None;
        for note in next.iter().filter(|&n| !self.sounding.contains(n)) {
            out.push(MidiEvent::note_on(0, note, ARP_VELOCITY));
            started += 1;
            last = Some(note);
        }
        self.sounding = next;
        if started == 1 {
            last
        } else {
            None
        }
    }

    pub fn mode(&self) -> ArpMode {
        self.mode
    }

    pub fn held(&self) -> &NoteSet {
        &self.held
    }

    pub fn sounding(&self) -> &NoteSet {
        &self.sounding
    }
}

impl Default for Arpeggiator {
    fn default() -> Self {
        Self::new()
    }
}

fn single(note: Option<u8>) -> NoteSet {
    let mut set = NoteSet::new();
    if let Some(note) = note {
        set.insert(note);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hold(arp: &mut Arpeggiator, notes: &[u8]) {
        for &note in notes {
            arp.note_input(&MidiEvent::note_on(0, note, 100));
        }
    }

    fn run(arp: &mut Arpeggiator, steps: usize) -> Vec<Option<u8>> {
        let mut out = Vec::new();
        (0..steps).map(|_| arp.step(&mut out)).collect()
    }

    #[test]
    fn up_cycles_through_held_notes() {
        let mut arp = Arpeggiator::with_seed(1);
        hold(&mut arp, &[64, 60, 67]);
        assert_eq!(run(&mut arp, 4), vec![Some(60), Some(64), Some(67), Some(60)]);
    }

    #[test]
    fn down_with_octaves() {
        let mut arp = Arpeggiator::with_seed(1);
        let mut out = Vec::new();
        arp.configure(ArpMode::Down, 2, &mut out);
        hold(&mut arp, &[60, 64]);
        assert_eq!(run(&mut arp, 5), vec![Some(76), Some(72), Some(64), Some(60), Some(76)]);
    }

    #[test]
    fn up_down_bounces_without_repeating_ends() {
        let mut arp = Arpeggiator::with_seed(1);
        let mut out = Vec::new();
        arp.configure(ArpMode::UpDown, 1, &mut out);
        hold(&mut arp, &[60, 62, 64]);
        assert_eq!(
            run(&mut arp, 6),
            vec![Some(60), Some(62), Some(64), Some(62), Some(60), Some(62)]
        );
    }

    #[test]
    fn chord_sounds_everything_at_once() {
        let mut arp = Arpeggiator::with_seed(1);
        let mut out = Vec::new();
        arp.configure(ArpMode::Chord, 1, &mut out);
        hold(&mut arp, &[60, 64, 67]);

        assert_eq!(arp.step(&mut out), None);
        assert_eq!(out.iter().filter(|e| e.is_note_start()).count(), 3);

        // Same chord again: nothing new to send.
        out.clear();
        arp.step(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn releasing_every_key_silences_the_arp() {
        let mut arp = Arpeggiator::with_seed(1);
        let mut out = Vec::new();
        hold(&mut arp, &[60]);
        arp.step(&mut out);
        arp.note_input(&MidiEvent::note_off(0, 60));
        out.clear();

        assert_eq!(arp.step(&mut out), None);
        assert_eq!(out, vec![MidiEvent::note_off(0, 60)]);
        assert!(arp.sounding().is_empty());
    }

    #[test]
    fn random_stays_within_the_pool() {
        let mut arp = Arpeggiator::with_seed(7);
        let mut out = Vec::new();
        arp.configure(ArpMode::Random, 3, &mut out);
        hold(&mut arp, &[100, 110]);
        for _ in 0..50 {
            out.clear();
            arp.step(&mut out);
            assert_eq!(arp.sounding().len(), 1);
            let note = arp.sounding().iter().next().unwrap_or_default();
            assert!([100, 110, 112, 122, 124].contains(&note), "{note}");
        }
    }

    #[test]
    fn mode_change_flushes_sounding_notes() {
        let mut arp = Arpeggiator::with_seed(1);
        let mut out = Vec::new();
        hold(&mut arp, &[60]);
        arp.step(&mut out);
        out.clear();

        arp.configure(ArpMode::Up, 1, &mut out);
        assert!(out.is_empty());
        arp.configure(ArpMode::Chord, 1, &mut out);
        assert_eq!(out, vec![MidiEvent::note_off(0, 60)]);
    }

    #[test]
    fn names_parse_with_fallback() {
        assert_eq!(ArpMode::from_name("up-down"), ArpMode::UpDown);
        assert_eq!(ArpMode::from_name("chord"), ArpMode::Chord);
        assert_eq!(ArpMode::from_name("sideways"), ArpMode::Up);
    }
}
