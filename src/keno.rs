//! Selection state for a single Keno board.
//!
//! A board holds the numbers a player has marked and the stake they chose.
//! Every interaction goes through [`SelectionController`], which applies it
//! as one synchronous transition and reports the outcome to an injected
//! [`Notifier`]. Diagnostics go to a separate [`EventSink`].

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::KenoError;

/// Cells on the board, numbered 1 through 80.
pub const BOARD_SIZE: u8 = 80;
pub const MAX_SELECTIONS: usize = 20;
pub const ALLOWED_BETS: [BetAmount; 4] = [
    BetAmount::Ten,
    BetAmount::Twenty,
    BetAmount::Fifty,
    BetAmount::Hundred,
];

/// One cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Number(u8);

impl Number {
    /// # Panics
    ///
    /// Panics if `n` is not in `1..=80`. Use `Number::try_from` for input
    /// that has not already been constrained.
    pub fn new(n: u8) -> Self {
        assert!(
            (1..=BOARD_SIZE).contains(&n),
            "keno number {} outside 1..={}",
            n,
            BOARD_SIZE
        );
        Number(n)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every cell in display order.
    pub fn all() -> impl Iterator<Item = Number> {
        (1..=BOARD_SIZE).map(Number)
    }
}

impl TryFrom<u8> for Number {
    type Error = KenoError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        if (1..=BOARD_SIZE).contains(&n) {
            Ok(Number(n))
        } else {
            Err(KenoError::NumberOutOfRange(n))
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed stake menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BetAmount {
    Ten,
    Twenty,
    Fifty,
    Hundred,
}

impl BetAmount {
    pub fn value(self) -> u32 {
        match self {
            BetAmount::Ten => 10,
            BetAmount::Twenty => 20,
            BetAmount::Fifty => 50,
            BetAmount::Hundred => 100,
        }
    }
}

impl TryFrom<u32> for BetAmount {
    type Error = KenoError;

    fn try_from(amount: u32) -> Result<Self, Self::Error> {
        ALLOWED_BETS
            .iter()
            .copied()
            .find(|bet| bet.value() == amount)
            .ok_or(KenoError::UnknownStake(amount))
    }
}

impl fmt::Display for BetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Marked numbers, iterated in ascending order. Never holds more than
/// [`MAX_SELECTIONS`] entries; only the controller can add to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    numbers: BTreeSet<Number>,
}

impl SelectionSet {
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.numbers.len() >= MAX_SELECTIONS
    }

    pub fn remaining(&self) -> usize {
        MAX_SELECTIONS.saturating_sub(self.numbers.len())
    }

    pub fn contains(&self, number: Number) -> bool {
        self.numbers.contains(&number)
    }

    pub fn iter(&self) -> impl Iterator<Item = Number> + '_ {
        self.numbers.iter().copied()
    }

    fn insert(&mut self, number: Number) {
        debug_assert!(!self.is_full());
        self.numbers.insert(number);
    }

    fn remove(&mut self, number: Number) -> bool {
        self.numbers.remove(&number)
    }

    fn clear(&mut self) {
        self.numbers.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    selections: SelectionSet,
    bet: Option<BetAmount>,
}

impl BoardState {
    pub fn selections(&self) -> &SelectionSet {
        &self.selections
    }

    pub fn bet(&self) -> Option<BetAmount> {
        self.bet
    }
}

/// Per-board policy. The gate decides whether a stake must be chosen before
/// any number can be marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardSettings {
    pub require_bet_before_selection: bool,
    pub opening_bet: Option<BetAmount>,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            require_bet_before_selection: true,
            opening_bet: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

/// A user-facing message about the outcome of an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub text: String,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
        }
    }
}

/// Why a selection attempt left the board unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    BetNotChosen,
    CapacityExceeded,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::BetNotChosen => write!(f, "Choose a bet amount first"),
            Rejection::CapacityExceeded => {
                write!(f, "Maximum {} numbers allowed", MAX_SELECTIONS)
            }
        }
    }
}

/// Result of `select_or_deselect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Selected,
    Deselected,
    Rejected(Rejection),
}

/// Diagnostic record of everything that happens on a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    Opened(BoardSettings),
    NumberClicked(Number),
    NumberSelected(Number),
    NumberDeselected(Number),
    SelectionRejected {
        number: Option<Number>,
        reason: Rejection,
    },
    BetPlaced(BetAmount),
    Cleared {
        dropped: usize,
    },
    QuickPicked(Vec<Number>),
}

/// Receives user-facing notifications. Fire and forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<F> Notifier for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Receives diagnostic events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &BoardEvent);
}

impl<F> EventSink for F
where
    F: Fn(&BoardEvent) + Send + Sync,
{
    fn record(&self, event: &BoardEvent) {
        self(event)
    }
}

/// Writes board events through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: &BoardEvent) {
        match event {
            BoardEvent::Opened(settings) => info!(
                "Keno board opened (bet gate: {}, opening bet: {:?})",
                settings.require_bet_before_selection, settings.opening_bet
            ),
            BoardEvent::NumberClicked(n) => debug!("Number clicked: {}", n),
            BoardEvent::NumberSelected(n) => debug!("Number selected: {}", n),
            BoardEvent::NumberDeselected(n) => debug!("Number deselected: {}", n),
            BoardEvent::SelectionRejected { number, reason } => {
                warn!("Selection rejected ({:?}): {}", number, reason)
            }
            BoardEvent::BetPlaced(amount) => info!("Bet placed: {}", amount),
            BoardEvent::Cleared { dropped } => {
                info!("Clearing selections ({} dropped)", dropped)
            }
            BoardEvent::QuickPicked(numbers) => debug!("Quick pick: {:?}", numbers),
        }
    }
}

type Listener = Box<dyn Fn(&BoardState) + Send + Sync>;

/// Owns one board and applies interactions to it.
pub struct SelectionController {
    state: BoardState,
    settings: BoardSettings,
    notifier: Box<dyn Notifier>,
    sink: Box<dyn EventSink>,
    listeners: Vec<Listener>,
}

impl SelectionController {
    pub fn new(settings: BoardSettings, notifier: impl Notifier + 'static) -> Self {
        Self::with_sink(settings, notifier, LogSink)
    }

    pub fn with_sink(
        settings: BoardSettings,
        notifier: impl Notifier + 'static,
        sink: impl EventSink + 'static,
    ) -> Self {
        sink.record(&BoardEvent::Opened(settings));
        Self {
            state: BoardState {
                selections: SelectionSet::default(),
                bet: settings.opening_bet,
            },
            settings,
            notifier: Box::new(notifier),
            sink: Box::new(sink),
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn settings(&self) -> &BoardSettings {
        &self.settings
    }

    /// Registers a callback that sees the board after every applied change.
    /// Rejected interactions do not trigger it.
    pub fn subscribe(&mut self, listener: impl Fn(&BoardState) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Marks `number`, or unmarks it if already marked. Unmarking always
    /// succeeds; marking is refused when the bet gate is closed or the board
    /// is full.
    pub fn select_or_deselect(&mut self, number: Number) -> Toggle {
        self.sink.record(&BoardEvent::NumberClicked(number));

        if let Some(reason) = self.bet_gate() {
            return self.reject(Some(number), reason);
        }

        let toggle = if self.state.selections.remove(number) {
            self.sink.record(&BoardEvent::NumberDeselected(number));
            Toggle::Deselected
        } else if self.state.selections.is_full() {
            return self.reject(Some(number), Rejection::CapacityExceeded);
        } else {
            self.state.selections.insert(number);
            self.sink.record(&BoardEvent::NumberSelected(number));
            Toggle::Selected
        };

        self.changed();
        toggle
    }

    pub fn set_bet(&mut self, amount: BetAmount) {
        self.state.bet = Some(amount);
        self.sink.record(&BoardEvent::BetPlaced(amount));
        self.notifier
            .notify(Notification::success(format!("Bet set to {}", amount)));
        self.changed();
    }

    /// Unmarks every number. The bet is kept.
    pub fn clear(&mut self) {
        self.sink.record(&BoardEvent::Cleared {
            dropped: self.state.selections.len(),
        });
        self.state.selections.clear();
        self.notifier
            .notify(Notification::success("Selections cleared"));
        self.changed();
    }

    /// Marks up to `count` random unmarked numbers, stopping at capacity.
    /// Returns the numbers added in ascending order. A count of zero does
    /// nothing and reports nothing.
    pub fn quick_pick<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Number>, Rejection> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if let Some(reason) = self.bet_gate() {
            self.reject(None, reason);
            return Err(reason);
        }
        if self.state.selections.is_full() {
            self.reject(None, Rejection::CapacityExceeded);
            return Err(Rejection::CapacityExceeded);
        }

        let open: Vec<Number> = Number::all()
            .filter(|n| !self.state.selections.contains(*n))
            .collect();
        let take = count.min(self.state.selections.remaining());
        let mut picked: Vec<Number> = open.choose_multiple(rng, take).copied().collect();
        picked.sort();

        for number in &picked {
            self.state.selections.insert(*number);
        }
        self.sink.record(&BoardEvent::QuickPicked(picked.clone()));
        let noun = if picked.len() == 1 { "number" } else { "numbers" };
        self.notifier.notify(Notification::success(format!(
            "Quick pick added {} {}",
            picked.len(),
            noun
        )));
        self.changed();
        Ok(picked)
    }

    fn bet_gate(&self) -> Option<Rejection> {
        (self.settings.require_bet_before_selection && self.state.bet.is_none())
            .then_some(Rejection::BetNotChosen)
    }

    fn reject(&self, number: Option<Number>, reason: Rejection) -> Toggle {
        self.sink
            .record(&BoardEvent::SelectionRejected { number, reason });
        self.notifier.notify(Notification::error(reason.to_string()));
        Toggle::Rejected(reason)
    }

    fn changed(&self) {
        for listener in &self.listeners {
            listener(&self.state);
        }
    }
}
