//! Crop rotation restriction.
//!
//! Two planting events of the same plant family on the same field conflict when
//! their date spans overlap once each is widened by the restriction window:
//! `a.start <= b.end + window && b.start <= a.end + window`. A window of zero
//! only rejects genuinely overlapping spans (sharing a day counts).
//!
//! Plantings whose writes are still PENDING count as if they had landed, so a
//! store outage cannot let two conflicting plantings through.

use super::errors::{invalid_attribute, GuardError, GuardResult};
use super::{GuardContext, WriteGuard};
use crate::config::RotationConfig;
use crate::constants::attributes::{END_DATE, FIELD_ID, PLANT_FAMILY, START_DATE};
use crate::consistency::IntentOperation;
use crate::constants::entity_types::PLANTING_EVENT;
use crate::models::{Attributes, EntityId, EntityType};
use crate::stores::StoreFilter;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Inclusive date range of a planting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    fn end_plus(&self, days: i64) -> NaiveDate {
        self.end
            .checked_add_signed(Duration::days(days))
            .unwrap_or(NaiveDate::MAX)
    }
}

pub fn spans_conflict(a: &DateSpan, b: &DateSpan, window_days: i64) -> bool {
    let window = window_days.max(0);
    a.start <= b.end_plus(window) && b.start <= a.end_plus(window)
}

#[derive(Debug, Clone)]
pub struct RotationGuard {
    window_days: i64,
}

impl RotationGuard {
    pub fn new(window_days: i64) -> Self {
        Self {
            window_days: window_days.max(0),
        }
    }

    pub fn from_config(config: &RotationConfig) -> Self {
        Self::new(config.restriction_window_days)
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }
}

fn text<'a>(attributes: &'a Attributes, name: &str) -> GuardResult<&'a str> {
    attributes
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_attribute(name, "required string attribute is missing"))
}

fn date(attributes: &Attributes, name: &str) -> GuardResult<NaiveDate> {
    let raw = text(attributes, name)?;
    raw.parse::<NaiveDate>()
        .map_err(|e| invalid_attribute(name, format!("'{raw}' is not a date: {e}")))
}

fn span(attributes: &Attributes) -> GuardResult<DateSpan> {
    let span = DateSpan::new(date(attributes, START_DATE)?, date(attributes, END_DATE)?);
    if span.end < span.start {
        return Err(invalid_attribute(END_DATE, "end date precedes start date"));
    }
    Ok(span)
}

fn same_family(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl RotationGuard {
    /// Plantings on `field` as they will be once every PENDING intent lands:
    /// stored records overlaid with the attributes of pending puts.
    async fn plantings_on(
        &self,
        context: &GuardContext<'_>,
        field: &str,
    ) -> GuardResult<BTreeMap<EntityId, Attributes>> {
        let handle = context
            .router
            .route(context.entity_type, FIELD_ID)
            .map_err(|e| GuardError::Lookup(e.to_string()))?;
        let stored = handle
            .query(&StoreFilter::attribute_equals(
                context.entity_type.clone(),
                FIELD_ID,
                Value::String(field.to_string()),
            ))
            .await
            .map_err(|e| GuardError::Lookup(e.to_string()))?;
        let mut plantings: BTreeMap<EntityId, Attributes> = stored
            .into_iter()
            .map(|record| (record.entity_id, record.attributes))
            .collect();

        let in_flight = context
            .intent_log
            .pending()
            .await
            .map_err(|e| GuardError::Lookup(e.to_string()))?;
        for intent in in_flight
            .into_iter()
            .filter(|intent| &intent.entity_type == context.entity_type)
            .filter(|intent| intent.entity_id != context.entity_id)
        {
            match intent.operation {
                IntentOperation::Delete => {
                    plantings.remove(&intent.entity_id);
                }
                IntentOperation::Put => {
                    let attributes = match plantings.entry(intent.entity_id) {
                        Entry::Occupied(occupied) => occupied.into_mut(),
                        Entry::Vacant(vacant) => {
                            // Stored elsewhere or not yet stored at all
                            let base = handle
                                .get(intent.entity_id)
                                .await
                                .ok()
                                .flatten()
                                .map(|record| record.attributes)
                                .unwrap_or_default();
                            vacant.insert(base)
                        }
                    };
                    for target in &intent.targets {
                        for (name, value) in &target.attributes {
                            attributes.insert(name.clone(), value.clone());
                        }
                    }
                }
            }
        }

        plantings.retain(|_, attributes| attributes.get(FIELD_ID).and_then(Value::as_str) == Some(field));
        Ok(plantings)
    }
}

#[async_trait]
impl WriteGuard for RotationGuard {
    fn applies_to(&self, entity_type: &EntityType) -> bool {
        entity_type == PLANTING_EVENT
    }

    fn serialization_key(&self, context: &GuardContext<'_>) -> Option<String> {
        let field = context.proposed.get(FIELD_ID)?.as_str()?;
        let family = context.proposed.get(PLANT_FAMILY)?.as_str()?;
        Some(format!("rotation:{field}:{}", family.trim().to_lowercase()))
    }

    async fn check(&self, context: &GuardContext<'_>) -> GuardResult<()> {
        let proposed = context.proposed;
        let field_raw = text(proposed, FIELD_ID)?;
        let field_id: EntityId = field_raw
            .parse()
            .map_err(|e: String| invalid_attribute(FIELD_ID, e))?;
        let family = text(proposed, PLANT_FAMILY)?;
        let candidate = span(proposed)?;

        for (other_id, attributes) in self.plantings_on(context, field_raw).await? {
            if other_id == context.entity_id {
                continue;
            }
            let other_family = attributes
                .get(PLANT_FAMILY)
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !same_family(family, other_family) {
                continue;
            }
            let other = match span(&attributes) {
                Ok(span) => span,
                Err(e) => {
                    warn!(planting_event = %other_id, error = %e, "Skipping planting event with unreadable dates");
                    continue;
                }
            };
            if spans_conflict(&candidate, &other, self.window_days) {
                debug!(
                    entity_id = %context.entity_id,
                    conflicting = %other_id,
                    "Rotation conflict"
                );
                return Err(GuardError::RotationConflict {
                    field_id,
                    plant_family: family.to_string(),
                    conflicting: other_id,
                    existing_start: other.start,
                    existing_end: other.end,
                    window_days: self.window_days,
                });
            }
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Same plant family may not repeat on a field inside the rotation window"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_overlap_without_window() {
        let spring = DateSpan::new(d(2024, 3, 1), d(2024, 6, 30));
        let summer = DateSpan::new(d(2024, 6, 30), d(2024, 9, 1));
        let autumn = DateSpan::new(d(2024, 7, 1), d(2024, 10, 1));

        assert!(spans_conflict(&spring, &summer, 0));
        assert!(!spans_conflict(&spring, &autumn, 0));
    }

    #[test]
    fn test_window_extends_conflict_range() {
        let this_year = DateSpan::new(d(2024, 4, 1), d(2024, 8, 31));
        let next_year = DateSpan::new(d(2025, 4, 1), d(2025, 8, 31));

        assert!(!spans_conflict(&this_year, &next_year, 0));
        assert!(spans_conflict(&this_year, &next_year, 365));
        assert!(!spans_conflict(&this_year, &next_year, 200));
    }

    #[test]
    fn test_family_comparison_ignores_case() {
        assert!(same_family("Solanaceae", " solanaceae"));
        assert!(!same_family("Solanaceae", "Brassicaceae"));
    }

    fn arb_span() -> impl Strategy<Value = DateSpan> {
        (0i64..3_000, 0i64..400).prop_map(|(offset, length)| {
            let start = d(2020, 1, 1) + Duration::days(offset);
            DateSpan::new(start, start + Duration::days(length))
        })
    }

    proptest! {
        #[test]
        fn conflict_is_symmetric(a in arb_span(), b in arb_span(), window in 0i64..800) {
            prop_assert_eq!(spans_conflict(&a, &b, window), spans_conflict(&b, &a, window));
        }

        #[test]
        fn a_span_conflicts_with_itself(a in arb_span(), window in 0i64..800) {
            prop_assert!(spans_conflict(&a, &a, window));
        }

        #[test]
        fn widening_the_window_never_clears_a_conflict(
            a in arb_span(),
            b in arb_span(),
            window in 0i64..800,
            extra in 0i64..400,
        ) {
            if spans_conflict(&a, &b, window) {
                prop_assert!(spans_conflict(&a, &b, window + extra));
            }
        }
    }
}
