//! Shared clock that steps a set of animatables with one time value.

use std::any::Any;
use std::fmt::Debug;
use std::time::Instant;

use crate::ids::{ClockId, IdAllocator};

/// Anything a [`WorldClock`] can step.
pub trait Animatable: Any + Debug {
    fn advance_time(&mut self, passed_time: f64);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Wall-clock source used when a clock is stepped with a negative time.
pub trait TimeSource: Debug {
    /// Seconds since an arbitrary fixed origin.
    fn now(&self) -> f64;
}

/// [`TimeSource`] backed by [`Instant`].
#[derive(Debug)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

#[derive(Debug)]
pub struct WorldClock {
    /// Accumulated stepped time in seconds.
    pub time: f64,
    pub time_scale: f64,
    system_time: f64,
    source: Option<Box<dyn TimeSource>>,
    entries: Vec<Option<(ClockId, Box<dyn Animatable>)>>,
    ids: IdAllocator,
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl WorldClock {
    /// A clock without a time source: negative steps are treated as zero.
    pub fn new(time: f64) -> Self {
        Self {
            time,
            time_scale: 1.0,
            system_time: 0.0,
            source: None,
            entries: Vec::new(),
            ids: IdAllocator::new(),
        }
    }

    /// A clock that measures elapsed wall time when stepped with a negative time.
    pub fn with_time_source(source: Box<dyn TimeSource>) -> Self {
        let system_time = source.now();
        Self {
            system_time,
            source: Some(source),
            ..Self::new(0.0)
        }
    }

    pub fn add(&mut self, animatable: Box<dyn Animatable>) -> ClockId {
        let id = self.ids.alloc_clock();
        self.entries.push(Some((id, animatable)));
        id
    }

    /// Detaches an entry. Its position is compacted on the next step.
    pub fn remove(&mut self, id: ClockId) -> Option<Box<dyn Animatable>> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.as_ref().is_some_and(|(eid, _)| *eid == id))?;
        entry.take().map(|(_, animatable)| animatable)
    }

    pub fn contains(&self, id: ClockId) -> bool {
        self.entries
            .iter()
            .flatten()
            .any(|(eid, _)| *eid == id)
    }

    pub fn get_mut<T: Animatable>(&mut self, id: ClockId) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .flatten()
            .find(|(eid, _)| *eid == id)
            .and_then(|(_, a)| a.as_any_mut().downcast_mut::<T>())
    }

    pub fn get<T: Animatable>(&self, id: ClockId) -> Option<&T> {
        self.entries
            .iter()
            .flatten()
            .find(|(eid, _)| *eid == id)
            .and_then(|(_, a)| a.as_any().downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Steps every entry by `passed_time * time_scale`, compacting removed
    /// entries in the same pass. A NaN step is ignored.
    pub fn advance_time(&mut self, passed_time: f64) {
        let mut passed_time = if passed_time.is_nan() { 0.0 } else { passed_time };
        match &self.source {
            Some(source) => {
                let now = source.now();
                if passed_time < 0.0 {
                    passed_time = now - self.system_time;
                }
                self.system_time = now;
            }
            None if passed_time < 0.0 => passed_time = 0.0,
            None => {}
        }

        if self.time_scale != 1.0 {
            passed_time *= self.time_scale;
        }
        if passed_time == 0.0 {
            return;
        }
        self.time += passed_time.abs();

        let mut removed = 0;
        for i in 0..self.entries.len() {
            match self.entries[i].take() {
                Some(mut entry) => {
                    entry.1.advance_time(passed_time);
                    self.entries[i - removed] = Some(entry);
                }
                None => removed += 1,
            }
        }
        if removed > 0 {
            let len = self.entries.len();
            self.entries.truncate(len - removed);
            log::trace!("world clock compacted {removed} entries");
        }
    }
}

impl Animatable for WorldClock {
    fn advance_time(&mut self, passed_time: f64) {
        WorldClock::advance_time(self, passed_time);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Counter {
        total: f64,
        calls: usize,
    }

    impl Animatable for Counter {
        fn advance_time(&mut self, passed_time: f64) {
            self.total += passed_time;
            self.calls += 1;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct FakeTime(Rc<Cell<f64>>);

    impl TimeSource for FakeTime {
        fn now(&self) -> f64 {
            self.0.get()
        }
    }

    #[test]
    fn scales_and_accumulates() {
        let mut clock = WorldClock::new(0.0);
        clock.time_scale = 2.0;
        let id = clock.add(Box::new(Counter::default()));
        clock.advance_time(0.25);
        assert_eq!(clock.time, 0.5);
        assert_eq!(clock.get::<Counter>(id).unwrap().total, 0.5);
    }

    #[test]
    fn removal_is_compacted_on_next_step() {
        let mut clock = WorldClock::default();
        let a = clock.add(Box::new(Counter::default()));
        let b = clock.add(Box::new(Counter::default()));
        let c = clock.add(Box::new(Counter::default()));
        assert!(clock.remove(b).is_some());
        assert!(!clock.contains(b));
        clock.advance_time(0.1);
        assert_eq!(clock.len(), 2);
        assert_eq!(clock.get::<Counter>(a).unwrap().calls, 1);
        assert_eq!(clock.get::<Counter>(c).unwrap().calls, 1);
    }

    #[test]
    fn negative_step_without_source_is_zero() {
        let mut clock = WorldClock::default();
        let id = clock.add(Box::new(Counter::default()));
        clock.advance_time(-1.0);
        clock.advance_time(f64::NAN);
        assert_eq!(clock.get::<Counter>(id).unwrap().calls, 0);
        assert_eq!(clock.time, 0.0);
    }

    #[test]
    fn negative_step_reads_time_source() {
        let now = Rc::new(Cell::new(10.0));
        let mut clock = WorldClock::with_time_source(Box::new(FakeTime(Rc::clone(&now))));
        let id = clock.add(Box::new(Counter::default()));
        now.set(10.25);
        clock.advance_time(-1.0);
        assert_eq!(clock.get::<Counter>(id).unwrap().total, 0.25);

        // Explicit steps still resync the reference point.
        now.set(11.0);
        clock.advance_time(0.5);
        now.set(11.5);
        clock.advance_time(-1.0);
        assert_eq!(clock.get::<Counter>(id).unwrap().total, 1.25);
    }
}
