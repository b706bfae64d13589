use crate::schema::{MonthSlot, StatementPeriod};
use log::warn;

/// Defensive bound against malformed input. Hitting it is logged but not
/// an error; callers get whatever was generated.
const MAX_MONTHS: usize = 1000;

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// Expand a start/end month-year pair into an ordered month sequence.
///
/// Months are clamped to [1,12]. Years outside [1900,2100] cannot be
/// trusted, so the result collapses to a single entry anchored at the
/// start rather than iterating over a bogus span. A reversed range is a
/// data-entry inversion and gets swapped, not rejected.
pub fn expand_month_range(
    start_month: u32,
    start_year: i32,
    end_month: u32,
    end_year: i32,
) -> Vec<MonthSlot> {
    let start_month = start_month.clamp(1, 12);
    let end_month = end_month.clamp(1, 12);

    if !(MIN_YEAR..=MAX_YEAR).contains(&start_year) || !(MIN_YEAR..=MAX_YEAR).contains(&end_year) {
        warn!(
            "Year bounds out of range ({}..{}), anchoring to start month",
            start_year, end_year
        );
        return vec![MonthSlot {
            month: start_month,
            year: start_year,
        }];
    }

    let (mut month, mut year, end_month, end_year) =
        if (start_year, start_month) > (end_year, end_month) {
            (end_month, end_year, start_month, start_year)
        } else {
            (start_month, start_year, end_month, end_year)
        };

    let mut slots = Vec::new();
    loop {
        if slots.len() >= MAX_MONTHS {
            warn!("Month expansion hit the {} entry cap", MAX_MONTHS);
            break;
        }
        slots.push(MonthSlot { month, year });
        if year == end_year && month == end_month {
            break;
        }
        if month == 12 {
            month = 1;
            year += 1;
        } else {
            month += 1;
        }
    }
    slots
}

/// Convenience wrapper over a parsed period.
pub fn expand_period(period: &StatementPeriod) -> Vec<MonthSlot> {
    expand_month_range(
        period.start_month,
        period.start_year,
        period.end_month,
        period.end_year,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn slots(pairs: &[(u32, i32)]) -> Vec<MonthSlot> {
        pairs
            .iter()
            .map(|&(month, year)| MonthSlot { month, year })
            .collect()
    }

    #[test]
    fn test_simple_range() {
        assert_eq!(
            expand_month_range(1, 2024, 3, 2024),
            slots(&[(1, 2024), (2, 2024), (3, 2024)])
        );
    }

    #[test]
    fn test_range_crossing_year_boundary() {
        assert_eq!(
            expand_month_range(11, 2024, 2, 2025),
            slots(&[(11, 2024), (12, 2024), (1, 2025), (2, 2025)])
        );
    }

    #[test]
    fn test_reversed_range_is_swapped() {
        assert_eq!(
            expand_month_range(3, 2024, 1, 2024),
            expand_month_range(1, 2024, 3, 2024)
        );
    }

    #[test]
    fn test_single_month() {
        assert_eq!(expand_month_range(6, 2024, 6, 2024), slots(&[(6, 2024)]));
    }

    #[test]
    fn test_month_inputs_clamped() {
        assert_eq!(
            expand_month_range(0, 2024, 14, 2024),
            expand_month_range(1, 2024, 12, 2024)
        );
    }

    #[test]
    fn test_out_of_range_year_anchors_to_start() {
        let result = expand_month_range(5, 2024, 5, 9999);
        assert_eq!(result, slots(&[(5, 2024)]));
    }

    #[test]
    fn test_iteration_cap() {
        let result = expand_month_range(1, 1900, 12, 2100);
        assert_eq!(result.len(), 1000);
        assert_eq!(result[0], MonthSlot { month: 1, year: 1900 });
    }
}
