//! Simulation timesteps and the monthly/yearly time axes written to rasters.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A row with more numeric fields than this is assumed to hold daily values.
pub const MAX_FIELDS_MONTHLY: usize = 3600;

/// ECOSSE simulates 365-day years.
pub const DAYS_PER_YEAR: usize = 365;

pub const MONTHS_PER_YEAR: usize = 12;

/// Timestep of a simulated series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timestep {
    Monthly,
    Daily,
}

impl Timestep {
    /// Deduce the timestep of a result-file row from its numeric field count.
    pub fn from_field_count(nfields: usize) -> Self {
        if nfields > MAX_FIELDS_MONTHLY {
            Timestep::Daily
        } else {
            Timestep::Monthly
        }
    }

    /// Deduce the timestep from the number of data rows in a SUMMARY.OUT file.
    ///
    /// Monthly takes precedence when both divide evenly. Returns `None` when
    /// neither does.
    pub fn from_summary_rows(nrows: usize) -> Option<Self> {
        if nrows == 0 {
            None
        } else if nrows % MONTHS_PER_YEAR == 0 {
            Some(Timestep::Monthly)
        } else if nrows % DAYS_PER_YEAR == 0 {
            Some(Timestep::Daily)
        } else {
            None
        }
    }

    pub fn steps_per_year(&self) -> usize {
        match self {
            Timestep::Monthly => MONTHS_PER_YEAR,
            Timestep::Daily => DAYS_PER_YEAR,
        }
    }

    /// Number of whole years covered by `nvalues` timesteps.
    pub fn num_years(&self, nvalues: usize) -> usize {
        nvalues / self.steps_per_year()
    }

    /// Number of months covered by `nvalues` timesteps.
    pub fn num_months(&self, nvalues: usize) -> usize {
        match self {
            Timestep::Monthly => nvalues,
            Timestep::Daily => MONTHS_PER_YEAR * nvalues / DAYS_PER_YEAR,
        }
    }
}

/// Days in a month of a non-leap year, `month` counted from 1.
pub fn days_in_month(month: u32) -> u32 {
    const DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    DAYS[((month.max(1) - 1) % 12) as usize]
}

/// `YYYY-MM` labels for every month from January of `start_year` to
/// December of `end_year`.
pub fn month_labels(start_year: i32, end_year: i32) -> Vec<String> {
    (start_year..=end_year)
        .flat_map(|year| (1..=12).map(move |month| format!("{}-{:0>2}", year, month)))
        .collect()
}

/// `YYYY-DDD` labels for every simulated day, 365 per year.
pub fn day_labels(start_year: i32, end_year: i32) -> Vec<String> {
    (start_year..=end_year)
        .flat_map(|year| (1..=DAYS_PER_YEAR).map(move |day| format!("{}-{:0>3}", year, day)))
        .collect()
}

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
}

fn days_since_reference(year: i32, month: u32) -> i64 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| (d - reference_date()).num_days())
        .unwrap_or_default()
}

/// Time coordinates in `days since 1900-01-01` with their cell bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeCoordinates {
    pub mid_points: Vec<f64>,
    pub starts: Vec<f64>,
    pub ends: Vec<f64>,
}

impl TimeCoordinates {
    pub fn len(&self) -> usize {
        self.mid_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mid_points.is_empty()
    }

    fn from_boundaries(boundaries: &[i64]) -> Self {
        let mut coords = Self {
            mid_points: Vec::with_capacity(boundaries.len().saturating_sub(1)),
            starts: Vec::with_capacity(boundaries.len().saturating_sub(1)),
            ends: Vec::with_capacity(boundaries.len().saturating_sub(1)),
        };
        for pair in boundaries.windows(2) {
            let (start, next) = (pair[0], pair[1]);
            coords.mid_points.push((start + (next - start) / 2) as f64);
            coords.starts.push(start as f64);
            coords.ends.push((next - 1) as f64);
        }
        coords
    }
}

/// A run of consecutive months starting in January of `start_year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTimeAxis {
    pub start_year: i32,
    pub num_months: usize,
}

impl MonthlyTimeAxis {
    pub fn new(start_year: i32, num_months: usize) -> Self {
        Self {
            start_year,
            num_months,
        }
    }

    /// Axis ending in December of `end_year`; the start year is back-dated
    /// from the number of whole years.
    pub fn ending_in(end_year: i32, num_months: usize) -> Self {
        let num_years = (num_months / MONTHS_PER_YEAR) as i32;
        Self::new(end_year - num_years + 1, num_months)
    }

    pub fn num_years(&self) -> usize {
        self.num_months / MONTHS_PER_YEAR
    }

    pub fn end_year(&self) -> i32 {
        self.start_year + self.num_years() as i32 - 1
    }

    /// Month of year, from 1, for a zero-based timestep index.
    pub fn month_of(&self, index: usize) -> u32 {
        (index % MONTHS_PER_YEAR) as u32 + 1
    }

    /// Mid-month coordinates with `[start, end]` day bounds for each month.
    pub fn monthly_coordinates(&self) -> TimeCoordinates {
        let boundaries: Vec<i64> = (0..=self.num_months)
            .map(|i| {
                let year = self.start_year + (i / MONTHS_PER_YEAR) as i32;
                days_since_reference(year, self.month_of(i))
            })
            .collect();
        TimeCoordinates::from_boundaries(&boundaries)
    }

    /// Mid-year coordinates with day bounds for each whole year.
    pub fn yearly_coordinates(&self) -> TimeCoordinates {
        let boundaries: Vec<i64> = (0..=self.num_years())
            .map(|i| days_since_reference(self.start_year + i as i32, 1))
            .collect();
        TimeCoordinates::from_boundaries(&boundaries)
    }

    pub fn time_units() -> &'static str {
        "days since 1900-01-01"
    }

    /// Calendar year of a zero-based timestep index.
    pub fn year_of(&self, index: usize) -> i32 {
        self.start_year + (index / MONTHS_PER_YEAR) as i32
    }
}
