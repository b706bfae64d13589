//! Statement-period parsing.
//!
//! Bank statements state their covering period in wildly inconsistent ways
//! ("01/01/2024 - 31/03/2024", "January to March 2024", "Jan-Mar 2024",
//! "Statement for March 2024"). The parser runs an ordered list of
//! independent matchers over the raw text; the first matcher to produce a
//! structurally valid period wins. There is no scoring or backtracking
//! across matchers, and unparseable input yields `None`: the caller must
//! treat the period as unknown rather than assuming any months.

use crate::schema::StatementPeriod;
use regex::Regex;

const FULL_MONTH: &str = "january|february|march|april|may|june|july|august|september|october|november|december";
const ABBREV_MONTH: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

pub struct DateRangeParser {
    numeric_range: Regex,
    numeric_to_range: Regex,
    single_month: Regex,
    named_range_one_year: Regex,
    named_range_two_years: Regex,
    abbrev_range: Regex,
    date_like: Regex,
}

impl Default for DateRangeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DateRangeParser {
    pub fn new() -> Self {
        Self {
            // DD/MM/YYYY - DD/MM/YYYY with hyphen, en dash or em dash.
            numeric_range: Regex::new(
                r"(\d{1,2})/(\d{1,2})/(\d{4})\s*[-\u{2013}\u{2014}]\s*(\d{1,2})/(\d{1,2})/(\d{4})",
            )
            .unwrap(),
            // Numeric dates joined by "to", or using mixed / and - separators.
            numeric_to_range: Regex::new(
                r"(?i)(\d{1,2})[/.-](\d{1,2})[/.-](\d{4})\s*(?:to|[-\u{2013}\u{2014}])\s*(\d{1,2})[/.-](\d{1,2})[/.-](\d{4})",
            )
            .unwrap(),
            // "March 2024" / "Mar 2024" anywhere in the text, covering a
            // single month. Tried after the range matchers so a range's end
            // month cannot shadow it.
            single_month: Regex::new(&format!(
                r"(?i)\b({FULL_MONTH}|{ABBREV_MONTH})\.?,?\s+(\d{{4}})\b"
            ))
            .unwrap(),
            // "January - March 2024" / "January to March 2024".
            named_range_one_year: Regex::new(&format!(
                r"(?i)\b({FULL_MONTH})\s*(?:to|through|[-\u{{2013}}\u{{2014}}])\s*({FULL_MONTH})\s*,?\s*(\d{{4}})"
            ))
            .unwrap(),
            // "November 2024 - February 2025".
            named_range_two_years: Regex::new(&format!(
                r"(?i)\b({FULL_MONTH})\s*,?\s*(\d{{4}})\s*(?:to|through|[-\u{{2013}}\u{{2014}}])\s*({FULL_MONTH})\s*,?\s*(\d{{4}})"
            ))
            .unwrap(),
            // Abbreviated ranges: "Jan-Mar 2024", "Nov 2024 - Feb 2025".
            abbrev_range: Regex::new(&format!(
                r"(?i)\b({ABBREV_MONTH})\.?\s*(\d{{4}})?\s*(?:to|[-\u{{2013}}\u{{2014}}])\s*({ABBREV_MONTH})\.?\s*,?\s*(\d{{4}})"
            ))
            .unwrap(),
            // Any date-like substring, for the last-resort scan.
            date_like: Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})").unwrap(),
        }
    }

    /// Parse a free-text statement-period string. Never panics; returns
    /// `None` when no matcher produces a valid period.
    pub fn parse(&self, text: &str) -> Option<StatementPeriod> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.try_numeric_range(text)
            .or_else(|| self.try_numeric_to_range(text))
            .or_else(|| self.try_named_range_one_year(text))
            .or_else(|| self.try_named_range_two_years(text))
            .or_else(|| self.try_abbrev_range(text))
            .or_else(|| self.try_single_month(text))
            .or_else(|| self.try_date_scan(text))
    }

    fn try_numeric_range(&self, text: &str) -> Option<StatementPeriod> {
        let caps = self.numeric_range.captures(text)?;
        build_period(
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
            caps[5].parse().ok()?,
            caps[6].parse().ok()?,
        )
    }

    fn try_numeric_to_range(&self, text: &str) -> Option<StatementPeriod> {
        let caps = self.numeric_to_range.captures(text)?;
        build_period(
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
            caps[5].parse().ok()?,
            caps[6].parse().ok()?,
        )
    }

    fn try_single_month(&self, text: &str) -> Option<StatementPeriod> {
        let caps = self.single_month.captures(text)?;
        let month = month_from_name(&caps[1])?;
        let year: i32 = caps[2].parse().ok()?;
        build_period(month, year, month, year)
    }

    fn try_named_range_one_year(&self, text: &str) -> Option<StatementPeriod> {
        let caps = self.named_range_one_year.captures(text)?;
        let start = month_from_name(&caps[1])?;
        let end = month_from_name(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        build_period(start, year, end, year)
    }

    fn try_named_range_two_years(&self, text: &str) -> Option<StatementPeriod> {
        let caps = self.named_range_two_years.captures(text)?;
        let start = month_from_name(&caps[1])?;
        let start_year: i32 = caps[2].parse().ok()?;
        let end = month_from_name(&caps[3])?;
        let end_year: i32 = caps[4].parse().ok()?;
        build_period(start, start_year, end, end_year)
    }

    fn try_abbrev_range(&self, text: &str) -> Option<StatementPeriod> {
        let caps = self.abbrev_range.captures(text)?;
        let start = month_from_name(&caps[1])?;
        let end = month_from_name(&caps[3])?;
        let end_year: i32 = caps[4].parse().ok()?;
        let start_year: i32 = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => end_year,
        };
        build_period(start, start_year, end, end_year)
    }

    /// Last resort: scan for any two date-like substrings and take the
    /// first and last as the range boundaries.
    fn try_date_scan(&self, text: &str) -> Option<StatementPeriod> {
        let dates: Vec<(u32, i32)> = self
            .date_like
            .captures_iter(text)
            .filter_map(|caps| {
                let month: u32 = caps[2].parse().ok()?;
                let year = expand_year(caps[3].parse().ok()?);
                Some((month, year))
            })
            .collect();

        if dates.len() < 2 {
            return None;
        }

        let (start_month, start_year) = dates[0];
        let (end_month, end_year) = dates[dates.len() - 1];
        build_period(start_month, start_year, end_month, end_year)
    }
}

/// Two-digit years show up in scanned statements; 70+ reads as 19xx.
fn expand_year(year: i32) -> i32 {
    if year < 100 {
        if year >= 70 {
            1900 + year
        } else {
            2000 + year
        }
    } else {
        year
    }
}

fn build_period(
    start_month: u32,
    start_year: i32,
    end_month: u32,
    end_year: i32,
) -> Option<StatementPeriod> {
    if !valid_month_year(start_month, start_year) || !valid_month_year(end_month, end_year) {
        return None;
    }
    Some(StatementPeriod::new(
        start_month,
        start_year,
        end_month,
        end_year,
    ))
}

fn valid_month_year(month: u32, year: i32) -> bool {
    (1..=12).contains(&month) && year > 1900
}

fn month_from_name(name: &str) -> Option<u32> {
    let prefix: String = name.to_ascii_lowercase().chars().take(3).collect();
    match prefix.as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}
