use crate::bars::{Bar, Timeframe};
use crate::core::events::KlineTick;
use log::warn;
use std::collections::{HashMap, VecDeque};

/// What `ingest` did with a tick. Only `Confirmed` means the previous
/// forming bar became final; everything downstream (bar-close accounting,
/// signal evaluation) keys off that outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First tick of an empty buffer opened the forming bar.
    Opened,
    /// Same start as the forming bar: replaced in place (intrabar update
    /// or reconnect replay).
    Updated,
    /// Strictly newer start: the previous forming bar is now confirmed.
    Confirmed,
    /// Older start than the forming bar: out of order, dropped.
    Rejected,
}

/// Bounded, time-ordered bar sequence for one timeframe. The tail element
/// is always the forming bar; the oldest bar is evicted once capacity is
/// reached.
#[derive(Debug, Clone)]
pub struct BarBuffer {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl BarBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the buffer wholesale from REST history (ascending by
    /// start). Keeps only the newest `capacity` bars.
    pub fn seed(&mut self, mut history: Vec<Bar>) {
        if history.len() > self.capacity {
            history.drain(..history.len() - self.capacity);
        }
        self.bars = history.into();
    }

    pub fn ingest(&mut self, bar: Bar) -> IngestOutcome {
        let tail_start = self.bars.back().map(|b| b.start);
        match tail_start {
            None => {
                self.bars.push_back(bar);
                IngestOutcome::Opened
            }
            Some(start) if bar.start == start => {
                if let Some(tail) = self.bars.back_mut() {
                    *tail = bar;
                }
                IngestOutcome::Updated
            }
            Some(start) if bar.start > start => {
                if self.bars.len() >= self.capacity {
                    self.bars.pop_front();
                }
                self.bars.push_back(bar);
                IngestOutcome::Confirmed
            }
            Some(_) => IngestOutcome::Rejected,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// All bars, forming bar last.
    pub fn bars(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    /// Confirmed bars only: everything except the forming tail. This is
    /// the view handed to signal evaluation.
    pub fn confirmed(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter().take(self.bars.len().saturating_sub(1))
    }

    /// The most recently confirmed bar, if any.
    pub fn last_confirmed(&self) -> Option<&Bar> {
        if self.bars.len() < 2 {
            return None;
        }
        self.bars.get(self.bars.len() - 2)
    }

    /// The forming (unconfirmed) bar.
    pub fn forming(&self) -> Option<&Bar> {
        self.bars.back()
    }
}

/// Per-timeframe bar buffers fed by the live tick stream.
#[derive(Debug)]
pub struct BarAggregator {
    buffers: HashMap<Timeframe, BarBuffer>,
}

impl BarAggregator {
    pub fn new(capacity: usize) -> Self {
        let mut buffers = HashMap::new();
        for tf in Timeframe::ALL {
            buffers.insert(tf, BarBuffer::new(capacity));
        }
        Self { buffers }
    }

    /// Seed one timeframe from REST history. Called at startup and after
    /// every reconnect, before live ticks resume.
    pub fn seed(&mut self, timeframe: Timeframe, history: Vec<Bar>) {
        if let Some(buffer) = self.buffers.get_mut(&timeframe) {
            buffer.seed(history);
        }
    }

    /// Apply one live tick. Ticks carry the forming bar's current state;
    /// a new start timestamp is the only confirmation signal the exchange
    /// gives us.
    pub fn ingest(&mut self, timeframe: Timeframe, tick: KlineTick) -> IngestOutcome {
        let buffer = self
            .buffers
            .get_mut(&timeframe)
            .expect("all timeframes are initialized in new()");
        let start = tick.start;
        let outcome = buffer.ingest(Bar::from(tick));
        if outcome == IngestOutcome::Rejected {
            warn!(
                "ingest: dropped out-of-order {} tick start={} (forming bar start={})",
                timeframe,
                start,
                buffer.forming().map(|b| b.start).unwrap_or_default()
            );
        }
        outcome
    }

    pub fn buffer(&self, timeframe: Timeframe) -> &BarBuffer {
        self.buffers
            .get(&timeframe)
            .expect("all timeframes are initialized in new()")
    }

    /// True once every timeframe has at least one bar. Signal evaluation
    /// waits for this.
    pub fn all_seeded(&self) -> bool {
        self.buffers.values().all(|b| !b.is_empty())
    }
}
