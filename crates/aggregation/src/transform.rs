//! Unit conversions and derived quantities applied to metric series.
//!
//! ECOSSE reports values per hectare and per timestep. Gridded outputs are
//! per square metre, with fluxes annualised. All functions here are pure.

use ecosse_common::time::{days_in_month, DAYS_PER_YEAR, MONTHS_PER_YEAR};
use ecosse_common::{Metric, MetricKind, Timestep};

/// Hectare to square metre conversion.
pub const PER_HECTARE_TO_PER_M2: f64 = 1.0e-4;

/// Global warming potential of methane relative to CO2.
pub const GWP_CH4: f64 = 32.0;

/// Global warming potential of nitrous oxide relative to CO2.
pub const GWP_N2O: f64 = 273.0;

/// Mass of CO2 per mass of its carbon.
pub const CO2_PER_C: f64 = 44.01 / 12.01;

/// Mass of CH4 per mass of its carbon.
pub const CH4_PER_C: f64 = 16.04 / 12.01;

/// Mass of N2O per mass of its nitrogen.
pub const N2O_PER_N: f64 = 44.013 / (14.007 * 2.0);

/// Average daily values into calendar months of a 365-day year, starting
/// in January. Flux metrics are annualised; stocks are plain means.
///
/// Trailing days that do not fill a month are dropped.
pub fn daily_to_monthly(values: &[f64], metric: Metric) -> Vec<f64> {
    let scale = match metric.kind() {
        MetricKind::Stock => 1.0,
        MetricKind::Flux => DAYS_PER_YEAR as f64,
    };

    let mut monthly = Vec::with_capacity(values.len() / 30);
    let mut start = 0;
    for month in (1..=MONTHS_PER_YEAR as u32).cycle() {
        let end = start + days_in_month(month) as usize;
        let Some(days) = values.get(start..end) else {
            break;
        };
        monthly.push(scale * days.iter().sum::<f64>() / days.len() as f64);
        start = end;
    }
    monthly
}

/// Convert a per-hectare series to per square metre monthly values.
///
/// Daily input is first averaged into months. Monthly input converts stocks
/// directly, halves `npp` and annualises the other fluxes by the length of
/// their month. At most `num_months` values are returned.
pub fn rescale(values: &[f64], metric: Metric, timestep: Timestep, num_months: usize) -> Vec<f64> {
    let rescaled: Vec<f64> = match timestep {
        Timestep::Daily => daily_to_monthly(values, metric)
            .into_iter()
            .map(|v| PER_HECTARE_TO_PER_M2 * v)
            .collect(),
        Timestep::Monthly => values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let month = (i % MONTHS_PER_YEAR) as u32 + 1;
                match (metric, metric.kind()) {
                    (_, MetricKind::Stock) => PER_HECTARE_TO_PER_M2 * v,
                    (Metric::Npp, _) => PER_HECTARE_TO_PER_M2 * v / 2.0,
                    (_, MetricKind::Flux) => {
                        PER_HECTARE_TO_PER_M2 * DAYS_PER_YEAR as f64 * v
                            / days_in_month(month) as f64
                    }
                }
            })
            .collect(),
    };

    rescaled.into_iter().take(num_months).collect()
}

/// CO2 equivalent of one month given the previous month's stocks.
pub fn to_co2_equivalent(ch4: f64, n2o: f64, soc: f64, ch4_prev: f64, soc_prev: f64) -> f64 {
    let stock_change = (soc + ch4) - (soc_prev + ch4_prev);
    GWP_CH4 * ch4 * CH4_PER_C + GWP_N2O * n2o * N2O_PER_N - stock_change * CO2_PER_C
}

/// CO2 equivalent month by month; the first month has no predecessor and is 0.
///
/// The output is as long as the shortest input.
pub fn co2e_series(ch4: &[f64], n2o: &[f64], soc: &[f64]) -> Vec<f64> {
    let n = ch4.len().min(n2o.len()).min(soc.len());
    (0..n)
        .map(|t| {
            if t == 0 {
                0.0
            } else {
                to_co2_equivalent(ch4[t], n2o[t], soc[t], ch4[t - 1], soc[t - 1])
            }
        })
        .collect()
}

/// Yearly totals of a series with `steps_per_year` values per year: sums
/// for fluxes, means for stocks. A trailing partial year is dropped.
pub fn annual_rollup(values: &[f64], metric: Metric, steps_per_year: usize) -> Vec<f64> {
    if steps_per_year == 0 {
        return Vec::new();
    }
    values
        .chunks_exact(steps_per_year)
        .map(|year| {
            let total: f64 = year.iter().sum();
            match metric.kind() {
                MetricKind::Stock => total / steps_per_year as f64,
                MetricKind::Flux => total,
            }
        })
        .collect()
}

/// Change of a stock over the whole series.
pub fn stock_difference(values: &[f64]) -> Option<f64> {
    Some(values.last()? - values.first()?)
}

/// NPP is reported as dry matter; carbon is half its mass.
pub fn halve_npp(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v / 2.0).collect()
}
