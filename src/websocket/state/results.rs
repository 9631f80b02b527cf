//! Local result set state management.
//!
//! Maintains the displayed offers for each category, merging pushed
//! updates into them by service name.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::shared::{Category, Offer};
use crate::websocket::subscriptions::Subscription;
use crate::websocket::types::{ContextLabel, PriceUpdate};

/// An offer as displayed, with its change marker from the latest merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOffer {
    pub offer: Offer,
    /// Price moved in the merge that produced this set
    pub changed: bool,
    /// Price before that merge, when `changed`
    pub previous_price: Option<Decimal>,
}

impl TrackedOffer {
    fn unchanged(offer: Offer) -> Self {
        Self {
            offer,
            changed: false,
            previous_price: None,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.offer.service_name
    }

    pub fn price(&self) -> Decimal {
        self.offer.price
    }

    /// Signed price difference against the previous price, if changed.
    pub fn price_delta(&self) -> Option<Decimal> {
        self.previous_price.map(|prev| self.offer.price - prev)
    }
}

/// Reconciled offers for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    /// Heading, fixed until the next fresh search
    context_label: ContextLabel,
    /// Offers sorted ascending by price
    offers: Vec<TrackedOffer>,
    /// service_name -> position in `offers`
    index: HashMap<String, usize>,
    /// Timestamp of the last merged push update
    updated_at: Option<DateTime<Utc>>,
    /// Route or location that push updates must carry to be merged
    expected_context: Option<String>,
}

impl ResultSet {
    /// Build a set from a fresh batch. Nothing is marked changed.
    pub fn fresh(context_label: ContextLabel, incoming: Vec<Offer>) -> Self {
        let mut set = Self {
            context_label,
            offers: Vec::with_capacity(incoming.len()),
            index: HashMap::with_capacity(incoming.len()),
            updated_at: None,
            expected_context: None,
        };
        for offer in incoming {
            match set.index.get(&offer.service_name) {
                Some(&i) => set.offers[i].offer = offer,
                None => set.insert(offer),
            }
        }
        set.reorder();
        set
    }

    /// Only accept push updates stamped with `context`.
    pub fn with_expected_context(mut self, context: impl Into<String>) -> Self {
        self.expected_context = Some(context.into());
        self
    }

    pub fn expected_context(&self) -> Option<&str> {
        self.expected_context.as_deref()
    }

    /// Whether `update` was computed for what this set displays.
    ///
    /// A set without an expected context accepts any update of its category.
    pub fn accepts(&self, update: &PriceUpdate) -> bool {
        match &self.expected_context {
            Some(expected) => update.context() == Some(expected.as_str()),
            None => true,
        }
    }

    /// Merge a partial batch. Offers missing from `incoming` are kept as-is.
    pub fn merge(&mut self, incoming: Vec<Offer>) {
        for tracked in &mut self.offers {
            tracked.changed = false;
            tracked.previous_price = None;
        }

        // Price each offer held before this merge; None for offers added by it
        let mut baseline: HashMap<String, Option<Decimal>> = HashMap::new();

        for offer in incoming {
            match self.index.get(&offer.service_name) {
                Some(&i) => {
                    let before = *baseline
                        .entry(offer.service_name.clone())
                        .or_insert(Some(self.offers[i].offer.price));
                    let tracked = &mut self.offers[i];
                    match before {
                        Some(prev) if prev != offer.price => {
                            tracked.changed = true;
                            tracked.previous_price = Some(prev);
                        }
                        _ => {
                            tracked.changed = false;
                            tracked.previous_price = None;
                        }
                    }
                    tracked.offer = offer;
                }
                None => {
                    baseline.insert(offer.service_name.clone(), None);
                    self.insert(offer);
                }
            }
        }
        self.reorder();
    }

    /// The minimum-price offer; ties go to the one seen first.
    pub fn cheapest(&self) -> Option<&TrackedOffer> {
        self.offers.first()
    }

    /// Whether `service_name` is priced at the best price in this set.
    pub fn is_best(&self, service_name: &str) -> bool {
        match (self.get(service_name), self.cheapest()) {
            (Some(offer), Some(best)) => offer.price() == best.price(),
            _ => false,
        }
    }

    pub fn get(&self, service_name: &str) -> Option<&TrackedOffer> {
        self.index.get(service_name).map(|&i| &self.offers[i])
    }

    pub fn offers(&self) -> &[TrackedOffer] {
        &self.offers
    }

    pub fn changed_offers(&self) -> impl Iterator<Item = &TrackedOffer> {
        self.offers.iter().filter(|o| o.changed)
    }

    pub fn context_label(&self) -> &ContextLabel {
        &self.context_label
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    /// "Prices updated at HH:MM:SS" (UTC), once a push update has been merged.
    pub fn update_notice(&self) -> Option<String> {
        self.updated_at
            .map(|at| format!("Prices updated at {}", at.format("%H:%M:%S")))
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    fn insert(&mut self, offer: Offer) {
        self.index
            .insert(offer.service_name.clone(), self.offers.len());
        self.offers.push(TrackedOffer::unchanged(offer));
    }

    fn reorder(&mut self) {
        // Stable: equal prices keep first-seen order
        self.offers.sort_by(|a, b| a.offer.price.cmp(&b.offer.price));
        self.index = self
            .offers
            .iter()
            .enumerate()
            .map(|(i, o)| (o.offer.service_name.clone(), i))
            .collect();
    }
}

/// Reconcile `incoming` into `existing`.
///
/// A fresh search (or no existing set) discards prior state and takes
/// `context` as the new heading. Otherwise the batch is merged and the
/// existing heading is kept.
pub fn merge_update(
    existing: Option<ResultSet>,
    incoming: Vec<Offer>,
    context: ContextLabel,
    is_fresh_search: bool,
) -> ResultSet {
    match existing {
        Some(mut set) if !is_fresh_search => {
            set.merge(incoming);
            set
        }
        _ => ResultSet::fresh(context, incoming),
    }
}

/// One [`ResultSet`] per category.
#[derive(Debug, Clone, Default)]
pub struct ResultReconciler {
    sets: HashMap<Category, ResultSet>,
}

impl ResultReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `category`'s set with the offers of a new search.
    pub fn apply_fresh(
        &mut self,
        category: Category,
        offers: Vec<Offer>,
        context: ContextLabel,
    ) -> &ResultSet {
        let set = merge_update(None, offers, context, true);
        self.sets.insert(category, set);
        &self.sets[&category]
    }

    /// Replace the set of `subscription`'s category with a fresh search,
    /// accepting only push updates computed for that subscription.
    pub fn apply_search(&mut self, subscription: &Subscription, offers: Vec<Offer>) -> &ResultSet {
        let category = subscription.category();
        let set = ResultSet::fresh(subscription.context_label(), offers)
            .with_expected_context(subscription.update_context());
        self.sets.insert(category, set);
        &self.sets[&category]
    }

    /// Merge a push update into the set of its category.
    ///
    /// Returns `None` when the update was computed for a different route or
    /// location than the one on display; the set is left untouched.
    pub fn apply_update(&mut self, update: &PriceUpdate) -> Option<&ResultSet> {
        if let Some(set) = self.sets.get(&update.category) {
            if !set.accepts(update) {
                tracing::debug!(
                    "Dropping {} update for {:?}, displaying {:?}",
                    update.category,
                    update.context(),
                    set.expected_context()
                );
                return None;
            }
        }

        let existing = self.sets.remove(&update.category);
        let first = existing.is_none();
        let mut set = merge_update(
            existing,
            update.offers.clone(),
            ContextLabel::for_update(update),
            false,
        );
        if first {
            set.expected_context = update.context().map(str::to_string);
        }
        set.set_updated_at(update.timestamp);
        self.sets.insert(update.category, set);
        self.sets.get(&update.category)
    }

    pub fn get(&self, category: Category) -> Option<&ResultSet> {
        self.sets.get(&category)
    }

    pub fn clear(&mut self, category: Category) -> Option<ResultSet> {
        self.sets.remove(&category)
    }
}
