//! Preference Order
//!
//! Maintains a total order over items subject to pairwise "higher before lower"
//! preferences. The order always contains one unconstrained slot which stands in
//! for every item that has not been named by a preference yet.

use crate::error::OrderingError;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt::{Display, Write};
use std::hash::Hash;

/// A position in the order: `None` is the unconstrained slot.
pub type Slot<T> = Option<T>;

#[derive(Debug, Clone)]
struct OrderState<T> {
    order: Vec<Slot<T>>,
    preferences: Vec<(Slot<T>, Slot<T>)>,
    positions: HashMap<T, usize>,
    unconstrained: usize,
}

impl<T: Clone + Eq + Hash> OrderState<T> {
    fn new() -> Self {
        Self {
            order: vec![None],
            preferences: Vec::new(),
            positions: HashMap::new(),
            unconstrained: 0,
        }
    }

    fn priority_of(&self, item: &T) -> usize {
        self.positions
            .get(item)
            .copied()
            .unwrap_or(self.unconstrained)
    }

    fn commit(&mut self, order: Vec<Slot<T>>) {
        self.positions = order
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|item| (item.clone(), idx)))
            .collect();
        self.unconstrained = order.iter().position(Option::is_none).unwrap_or(order.len());
        self.order = order;
    }
}

/// Relax `order` against every preference until a full pass moves nothing.
///
/// Each pass that does not converge moves at least one item, and a consistent
/// order needs at most one pass per preference, so `preferences.len() + 1`
/// passes without convergence means the preferences are cyclic.
fn relax<T: Eq>(mut order: Vec<Slot<T>>, preferences: &[(Slot<T>, Slot<T>)]) -> Option<Vec<Slot<T>>> {
    for _ in 0..=preferences.len() {
        let mut moved = false;
        for (higher, lower) in preferences {
            let higher_idx = order.iter().position(|slot| slot == higher);
            let lower_idx = order.iter().position(|slot| slot == lower);
            if let (Some(higher_idx), Some(lower_idx)) = (higher_idx, lower_idx) {
                if higher_idx > lower_idx {
                    let item = order.remove(higher_idx);
                    order.insert(lower_idx, item);
                    moved = true;
                }
            }
        }
        if !moved {
            return Some(order);
        }
    }
    None
}

/// Ordering resolver with cycle detection.
///
/// Items are never removed. All reads and writes serialize on one lock.
#[derive(Debug)]
pub struct PreferenceOrder<T> {
    state: Mutex<OrderState<T>>,
}

impl<T: Clone + Eq + Hash> Default for PreferenceOrder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash> Clone for PreferenceOrder<T> {
    fn clone(&self) -> Self {
        Self {
            state: Mutex::new(self.state.lock().clone()),
        }
    }
}

impl<T: Clone + Eq + Hash> PreferenceOrder<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OrderState::new()),
        }
    }

    /// Declare that `higher` must sort before `lower`.
    ///
    /// `None` addresses the unconstrained slot (any item not otherwise known),
    /// but only one side may be `None`. Items seen for the first time are placed
    /// directly before the unconstrained slot.
    ///
    /// Returns `Ok(false)` without touching any state if the preference would
    /// make the order cyclic.
    pub fn try_declare_preference(
        &self,
        higher: Slot<T>,
        lower: Slot<T>,
    ) -> Result<bool, OrderingError> {
        if higher.is_none() && lower.is_none() {
            return Err(OrderingError::InvalidArgument(
                "only one side of a preference can be the unconstrained slot".to_string(),
            ));
        }
        if higher.is_some() && higher == lower {
            return Err(OrderingError::InvalidArgument(
                "an item cannot be preferred over itself".to_string(),
            ));
        }

        let mut state = self.state.lock();

        let mut trial = state.order.clone();
        for slot in [&higher, &lower] {
            if !trial.contains(slot) {
                let unconstrained = trial.iter().position(Option::is_none).unwrap_or(trial.len());
                trial.insert(unconstrained, slot.clone());
            }
        }

        let mut preferences = state.preferences.clone();
        preferences.push((higher, lower));

        match relax(trial, &preferences) {
            Some(order) => {
                state.commit(order);
                state.preferences = preferences;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Position of `item` in the current order; unknown items share the
    /// position of the unconstrained slot.
    pub fn priority_of(&self, item: &T) -> usize {
        self.state.lock().priority_of(item)
    }

    /// Position of the unconstrained slot.
    pub fn unconstrained_priority(&self) -> usize {
        self.state.lock().unconstrained
    }

    pub fn contains(&self, item: &T) -> bool {
        self.state.lock().positions.contains_key(item)
    }

    /// Current order, excluding the unconstrained slot.
    pub fn items_by_priority(&self) -> Vec<T> {
        self.state.lock().order.iter().flatten().cloned().collect()
    }

    /// Committed preferences in declaration order.
    pub fn preferences(&self) -> Vec<(Slot<T>, Slot<T>)> {
        self.state.lock().preferences.clone()
    }

    /// Stable sort of `items` by ascending priority.
    pub fn sort_by_priority<I>(&self, items: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let mut items: Vec<T> = items.into_iter().collect();
        self.sort_by_priority_key(&mut items, |item| item);
        items
    }

    /// Stable sort of `items` by descending priority.
    pub fn sort_by_priority_desc<I>(&self, items: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let mut items: Vec<T> = items.into_iter().collect();
        let state = self.state.lock();
        items.sort_by_key(|item| Reverse(state.priority_of(item)));
        items
    }

    /// Stable in-place sort of arbitrary records by the priority of a key.
    pub fn sort_by_priority_key<U, F>(&self, items: &mut [U], key: F)
    where
        F: Fn(&U) -> &T,
    {
        let state = self.state.lock();
        items.sort_by_key(|record| state.priority_of(key(record)));
    }
}

impl<T: Clone + Eq + Hash + Display> PreferenceOrder<T> {
    /// Diagnostic report of all rules and the resulting order.
    pub fn dump_preferences(&self) -> String {
        let state = self.state.lock();
        let mut report = String::from("RULES:\n");
        for (higher, lower) in &state.preferences {
            let _ = writeln!(
                report,
                "  >> prefer '{}' before '{}'",
                slot_label(higher),
                slot_label(lower)
            );
        }
        report.push_str("FINAL ORDER:");
        for slot in &state.order {
            let _ = write!(report, " '{}'", slot_label(slot));
        }
        report.push('\n');
        report
    }
}

fn slot_label<T: Display>(slot: &Slot<T>) -> String {
    match slot {
        Some(item) => item.to_string(),
        None => "<DEFAULT>".to_string(),
    }
}
