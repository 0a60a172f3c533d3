use crate::model::*;

/// Which schedule source decided a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySource {
    Override,
    Weekly,
    /// No override and no weekly template for that day of week.
    Unscheduled,
}

/// The time blocks that apply to one date, before any booking awareness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDay {
    pub blocks: Vec<TimeBlock>,
    pub enabled: bool,
    pub holiday: bool,
    pub source: DaySource,
}

impl ResolvedDay {
    fn closed(source: DaySource, holiday: bool) -> Self {
        Self {
            blocks: Vec::new(),
            enabled: false,
            holiday,
            source,
        }
    }
}

/// Pick the effective blocks for a date.
///
/// An override, when present, fully supersedes the weekly template. Blocks
/// are never merged across the two. A disabled or holiday override closes
/// the day whatever blocks it carries. Without an override the weekly
/// template for that day of week applies if it exists and is enabled.
pub fn resolve_blocks(
    override_day: Option<&DailyOverride>,
    weekly: Option<&WeeklyScheduleDay>,
) -> ResolvedDay {
    if let Some(o) = override_day {
        if !o.enabled || o.is_holiday {
            return ResolvedDay::closed(DaySource::Override, o.is_holiday);
        }
        return ResolvedDay {
            blocks: o.blocks.clone(),
            enabled: true,
            holiday: false,
            source: DaySource::Override,
        };
    }

    match weekly {
        Some(w) if w.enabled => ResolvedDay {
            blocks: w.blocks.clone(),
            enabled: true,
            holiday: false,
            source: DaySource::Weekly,
        },
        Some(_) => ResolvedDay::closed(DaySource::Weekly, false),
        None => ResolvedDay::closed(DaySource::Unscheduled, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn blocks(start_h: Secs, end_h: Secs) -> Vec<TimeBlock> {
        vec![TimeBlock {
            span: Span::new(start_h * 3600, end_h * 3600),
            slot_duration: Some(30),
        }]
    }

    fn weekly(enabled: bool) -> WeeklyScheduleDay {
        WeeklyScheduleDay {
            day_of_week: 3,
            enabled,
            blocks: blocks(9, 12),
        }
    }

    fn override_day(enabled: bool, is_holiday: bool) -> DailyOverride {
        DailyOverride {
            date: NaiveDate::from_ymd_opt(2026, 10, 21).unwrap(),
            enabled,
            is_holiday,
            blocks: blocks(14, 16),
        }
    }

    #[test]
    fn weekly_template_applies_without_override() {
        let r = resolve_blocks(None, Some(&weekly(true)));
        assert_eq!(r.source, DaySource::Weekly);
        assert!(r.enabled);
        assert_eq!(r.blocks, blocks(9, 12));
    }

    #[test]
    fn disabled_weekly_template_closes_day() {
        let r = resolve_blocks(None, Some(&weekly(false)));
        assert!(!r.enabled);
        assert!(r.blocks.is_empty());
    }

    #[test]
    fn no_source_closes_day() {
        let r = resolve_blocks(None, None);
        assert_eq!(r.source, DaySource::Unscheduled);
        assert!(r.blocks.is_empty());
        assert!(!r.enabled);
    }

    #[test]
    fn override_replaces_weekly_blocks() {
        let r = resolve_blocks(Some(&override_day(true, false)), Some(&weekly(true)));
        assert_eq!(r.source, DaySource::Override);
        assert_eq!(r.blocks, blocks(14, 16)); // no merge with 9-12
    }

    #[test]
    fn override_opens_day_the_weekly_template_closes() {
        let r = resolve_blocks(Some(&override_day(true, false)), Some(&weekly(false)));
        assert!(r.enabled);
        assert_eq!(r.blocks, blocks(14, 16));
    }

    #[test]
    fn disabled_override_ignores_its_blocks() {
        let r = resolve_blocks(Some(&override_day(false, false)), Some(&weekly(true)));
        assert!(!r.enabled);
        assert!(!r.holiday);
        assert!(r.blocks.is_empty());
    }

    #[test]
    fn holiday_override_closes_even_when_enabled() {
        let r = resolve_blocks(Some(&override_day(true, true)), Some(&weekly(true)));
        assert!(r.holiday);
        assert!(r.blocks.is_empty());
    }
}
