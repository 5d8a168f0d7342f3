//! Interval bar consolidation.
//!
//! Ticks are folded into fixed-length bars aligned to midnight. A completed
//! bar is delivered when the first observation at or past its end arrives, or
//! when [`Consolidator::scan`] is called with a time past its end. Delivery is
//! an explicit subscription: registered callbacks run synchronously and every
//! [`Consolidator::subscribe`] receiver gets a copy over a tokio broadcast
//! channel. Nothing here owns a timer; the host decides when to scan.
//!
//! ```rust,ignore
//! let mut consolidator = TradeBarConsolidator::new(Duration::minutes(1))?;
//! consolidator.on_bar(|bar| writer_queue.push(bar.clone()));
//! for tick in ticks {
//!     consolidator.update(&tick);
//! }
//! consolidator.scan(session_close);
//! ```

use chrono::{Duration, NaiveDateTime, NaiveTime};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::domain::{
    Bar, PriceLevel, QuoteBar, QuoteSide, QuoteTick, Resolution, Tick, TradeBar,
};
use crate::error::StoreError;

/// Bars buffered per broadcast channel before slow receivers lag.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_000;

/// A bar type that can be built incrementally from ticks.
pub trait ConsolidatedBar: Clone + Send + 'static {
    /// Tick type folded into the bar.
    type Input;

    /// Timestamp of an input.
    fn input_time(input: &Self::Input) -> NaiveDateTime;

    /// Open a new bar starting at `start` with its first input.
    fn open(start: NaiveDateTime, input: &Self::Input) -> Self;

    /// Fold a further input into the bar.
    fn add(&mut self, input: &Self::Input);
}

impl ConsolidatedBar for TradeBar {
    type Input = Tick;

    fn input_time(input: &Tick) -> NaiveDateTime {
        input.time
    }

    fn open(start: NaiveDateTime, input: &Tick) -> Self {
        Self {
            time: start,
            bar: Bar::flat(input.price),
            volume: input.quantity,
        }
    }

    fn add(&mut self, input: &Tick) {
        self.bar.update(input.price);
        self.volume += input.quantity;
    }
}

impl ConsolidatedBar for QuoteBar {
    type Input = QuoteTick;

    fn input_time(input: &QuoteTick) -> NaiveDateTime {
        input.time
    }

    fn open(start: NaiveDateTime, input: &QuoteTick) -> Self {
        let mut bar = Self {
            time: start,
            bid: None,
            ask: None,
        };
        bar.add(input);
        bar
    }

    fn add(&mut self, input: &QuoteTick) {
        fold_side(&mut self.bid, input.bid);
        fold_side(&mut self.ask, input.ask);
    }
}

/// Size is the last quoted size, prices are OHLC.
fn fold_side(side: &mut Option<QuoteSide>, level: Option<PriceLevel>) {
    let Some(level) = level else {
        return;
    };
    match side {
        Some(s) => {
            s.bar.update(level.price);
            s.size = level.size;
        }
        None => {
            *side = Some(QuoteSide {
                bar: Bar::flat(level.price),
                size: level.size,
            });
        }
    }
}

type BarHandler<B> = Box<dyn FnMut(&B) + Send>;

/// Folds ticks into fixed-period bars and delivers completed bars.
pub struct Consolidator<B: ConsolidatedBar> {
    period: Duration,
    working: Option<WorkingBar<B>>,
    handlers: Vec<BarHandler<B>>,
    sender: broadcast::Sender<B>,
}

struct WorkingBar<B> {
    end: NaiveDateTime,
    bar: B,
}

/// Ticks to trade bars.
pub type TradeBarConsolidator = Consolidator<TradeBar>;

/// Quote ticks to quote bars.
pub type QuoteBarConsolidator = Consolidator<QuoteBar>;

impl<B: ConsolidatedBar> Consolidator<B> {
    /// Create a consolidator producing bars of `period`.
    ///
    /// # Errors
    ///
    /// `InvalidDescriptor` unless `period` is at least one millisecond and at
    /// most one day.
    pub fn new(period: Duration) -> Result<Self, StoreError> {
        if period < Duration::milliseconds(1) || period > Duration::days(1) {
            return Err(StoreError::invalid(
                "period",
                format!("Bar period must be between 1ms and 1 day, got {period}"),
            ));
        }
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Ok(Self {
            period,
            working: None,
            handlers: Vec::new(),
            sender,
        })
    }

    /// Create a consolidator for a bar resolution.
    ///
    /// # Errors
    ///
    /// `InvalidDescriptor` for [`Resolution::Tick`], which has no bar period.
    pub fn for_resolution(resolution: Resolution) -> Result<Self, StoreError> {
        let period = resolution.period().ok_or_else(|| {
            StoreError::invalid("resolution", "Tick resolution has no bar period")
        })?;
        Self::new(period)
    }

    /// Bar length.
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Bar currently being built, if any.
    pub fn working_bar(&self) -> Option<&B> {
        self.working.as_ref().map(|w| &w.bar)
    }

    /// Register a callback run synchronously for every completed bar.
    pub fn on_bar(&mut self, handler: impl FnMut(&B) + Send + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Receive completed bars over a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<B> {
        self.sender.subscribe()
    }

    /// Fold `input` in, returning the bar it completed, if any.
    ///
    /// Inputs are expected in time order.
    pub fn update(&mut self, input: &B::Input) -> Option<B> {
        let time = B::input_time(input);

        let rolled = self.working.as_ref().is_some_and(|w| time >= w.end);
        let completed = if rolled { self.flush() } else { None };

        match &mut self.working {
            Some(w) => w.bar.add(input),
            None => {
                let start = self.bar_start(time);
                trace!(%start, "Opening bar");
                self.working = Some(WorkingBar {
                    end: start + self.period,
                    bar: B::open(start, input),
                });
            }
        }

        completed
    }

    /// Deliver the working bar if its period ended at or before `now`.
    pub fn scan(&mut self, now: NaiveDateTime) -> Option<B> {
        let elapsed = self.working.as_ref().is_some_and(|w| now >= w.end);
        if elapsed { self.flush() } else { None }
    }

    fn flush(&mut self) -> Option<B> {
        let working = self.working.take()?;
        let bar = working.bar;

        for handler in &mut self.handlers {
            handler(&bar);
        }
        // Err only means nobody is subscribed.
        let receivers = self.sender.send(bar.clone()).unwrap_or(0);
        debug!(end = %working.end, receivers, "Bar completed");

        Some(bar)
    }

    fn bar_start(&self, time: NaiveDateTime) -> NaiveDateTime {
        let midnight = time.date().and_time(NaiveTime::MIN);
        let period_ms = self.period.num_milliseconds();
        let elapsed_ms = (time - midnight).num_milliseconds();
        midnight + Duration::milliseconds(elapsed_ms - elapsed_ms.rem_euclid(period_ms))
    }
}

impl<B: ConsolidatedBar> std::fmt::Debug for Consolidator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consolidator")
            .field("period", &self.period)
            .field("working_end", &self.working.as_ref().map(|w| w.end))
            .field("handlers", &self.handlers.len())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
