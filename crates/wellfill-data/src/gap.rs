//! Synthetic test-holdout construction.
//!
//! To score a well's model against known-but-hidden truth, a contiguous
//! multi-year window of its (scaled) series is blanked before training and
//! kept aside as the test holdout. Window placement is seeded per entity and
//! bounded by a retry budget; when no valid window exists the entity simply
//! proceeds without test metrics.

use chrono::{Months, NaiveDate};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Holdout-window construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapConfig {
    /// Minimum observed points that must remain after blanking
    pub min_points: usize,
    /// Windows may not start before January 1 of this year
    pub cut_left_year: i32,
    /// Window length in years
    pub gap_years: u32,
    /// Candidate draws per window before giving up
    pub max_tries: u32,
    /// Maximum number of separate windows to place
    pub max_gaps: usize,
    /// Draw window starts uniformly instead of taking the most recent
    pub randomize: bool,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            min_points: 1,
            cut_left_year: 2000,
            gap_years: 5,
            max_tries: 15,
            max_gaps: 1,
            randomize: true,
        }
    }
}

/// True values removed from a series' holdout window, in scaled units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestHoldout {
    /// Dates that were blanked
    pub dates: Vec<NaiveDate>,
    /// The removed values, same order as `dates`
    pub values: Vec<f64>,
}

impl TestHoldout {
    /// Number of held-out observations.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Returns true if nothing was held out.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Carves synthetic holdout windows out of a single series.
#[derive(Debug, Clone)]
pub struct GapSplitter {
    config: GapConfig,
}

impl GapSplitter {
    /// Creates a splitter with the given configuration.
    pub fn new(config: GapConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GapConfig {
        &self.config
    }

    /// Attempts to blank up to `max_gaps` windows in `values`.
    ///
    /// Returns the blanked series plus the removed true values, or `None`
    /// when no valid window was found within the retry budget; callers then
    /// skip test-metric computation for the entity rather than failing it.
    pub fn split(
        &self,
        index: &[NaiveDate],
        values: &[Option<f64>],
        rng: &mut StdRng,
    ) -> Option<(Vec<Option<f64>>, TestHoldout)> {
        let eligible = self.eligible_starts(index);
        if eligible.is_empty() {
            debug!(
                cut_left_year = self.config.cut_left_year,
                "no eligible holdout window start"
            );
            return None;
        }

        let mut working = values.to_vec();
        let mut holdout_dates = Vec::new();
        let mut holdout_values = Vec::new();

        for _ in 0..self.config.max_gaps {
            match self.place_window(index, &working, &eligible, rng) {
                Some(window) => {
                    for &pos in &window {
                        if let Some(v) = working[pos].take() {
                            holdout_dates.push(index[pos]);
                            holdout_values.push(v);
                        }
                    }
                }
                None => break,
            }
        }

        if holdout_dates.is_empty() {
            debug!(
                max_tries = self.config.max_tries,
                "holdout construction exhausted its retry budget"
            );
            return None;
        }

        Some((
            working,
            TestHoldout {
                dates: holdout_dates,
                values: holdout_values,
            },
        ))
    }

    /// Start positions whose window lies inside the index span and not
    /// before the cut-left boundary.
    fn eligible_starts(&self, index: &[NaiveDate]) -> Vec<usize> {
        let cut = match NaiveDate::from_ymd_opt(self.config.cut_left_year, 1, 1) {
            Some(d) => d,
            None => return Vec::new(),
        };
        let last = match index.last() {
            Some(d) => *d,
            None => return Vec::new(),
        };
        index
            .iter()
            .enumerate()
            .filter(|(_, date)| {
                **date >= cut
                    && date
                        .checked_add_months(Months::new(12 * self.config.gap_years))
                        .map(|end| end <= last.succ_opt().unwrap_or(last))
                        .unwrap_or(false)
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Tries up to `max_tries` candidate windows; returns the accepted
    /// window's positions.
    fn place_window(
        &self,
        index: &[NaiveDate],
        working: &[Option<f64>],
        eligible: &[usize],
        rng: &mut StdRng,
    ) -> Option<Vec<usize>> {
        let total_observed = working.iter().filter(|v| v.is_some()).count();
        let tries = self.config.max_tries as usize;

        for attempt in 0..tries {
            let start = if self.config.randomize {
                eligible[rng.gen_range(0..eligible.len())]
            } else {
                // Most recent eligible window first, walking backwards.
                let pos = eligible.len().checked_sub(attempt + 1)?;
                eligible[pos]
            };

            let window = self.window_positions(index, start);
            let blanked = window.iter().filter(|&&p| working[p].is_some()).count();
            if blanked == 0 {
                continue;
            }
            if total_observed - blanked < self.config.min_points {
                continue;
            }
            return Some(window);
        }
        None
    }

    fn window_positions(&self, index: &[NaiveDate], start: usize) -> Vec<usize> {
        let start_date = index[start];
        let end_date = start_date
            .checked_add_months(Months::new(12 * self.config.gap_years))
            .unwrap_or(start_date);
        (start..index.len())
            .take_while(|&i| index[i] < end_date)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn monthly_index(start_year: i32, years: u32) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap();
        (0..years * 12)
            .map(|m| start.checked_add_months(Months::new(m)).unwrap())
            .collect()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_split_blanks_a_contiguous_window() {
        let index = monthly_index(1995, 20);
        let values: Vec<Option<f64>> = (0..index.len()).map(|i| Some(i as f64)).collect();
        let splitter = GapSplitter::new(GapConfig::default());

        let (blanked, holdout) = splitter.split(&index, &values, &mut rng()).unwrap();

        // Five years of monthly data
        assert_eq!(holdout.len(), 60);
        let missing: Vec<usize> = blanked
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(missing.len(), 60);
        // Contiguous positions
        assert!(missing.windows(2).all(|w| w[1] == w[0] + 1));
        // Window respects the cut-left boundary
        let cut = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert!(index[missing[0]] >= cut);
        // True values preserved in order
        for (date, value) in holdout.dates.iter().zip(&holdout.values) {
            let pos = index.iter().position(|d| d == date).unwrap();
            assert_eq!(values[pos], Some(*value));
        }
    }

    #[test]
    fn test_split_never_drops_below_min_points() {
        let index = monthly_index(1995, 20);
        let values: Vec<Option<f64>> = (0..index.len()).map(|i| Some(i as f64)).collect();
        let config = GapConfig {
            min_points: 150,
            ..GapConfig::default()
        };
        let splitter = GapSplitter::new(config);

        if let Some((blanked, _)) = splitter.split(&index, &values, &mut rng()) {
            let remaining = blanked.iter().filter(|v| v.is_some()).count();
            assert!(remaining >= 150);
        }
    }

    #[test]
    fn test_split_fails_gracefully_on_short_series() {
        // Series ends before the cut-left boundary
        let index = monthly_index(1980, 5);
        let values: Vec<Option<f64>> = (0..index.len()).map(|i| Some(i as f64)).collect();
        let splitter = GapSplitter::new(GapConfig::default());

        assert!(splitter.split(&index, &values, &mut rng()).is_none());
    }

    #[test]
    fn test_split_fails_when_constraint_unsatisfiable() {
        let index = monthly_index(1995, 20);
        // Only a handful of observations, all inside any candidate window
        let mut values: Vec<Option<f64>> = vec![None; index.len()];
        for i in 100..110 {
            values[i] = Some(1.0);
        }
        let config = GapConfig {
            min_points: 200,
            ..GapConfig::default()
        };
        let splitter = GapSplitter::new(config);
        assert!(splitter.split(&index, &values, &mut rng()).is_none());
    }

    #[test]
    fn test_deterministic_mode_takes_most_recent_window() {
        let index = monthly_index(1995, 20);
        let values: Vec<Option<f64>> = (0..index.len()).map(|i| Some(i as f64)).collect();
        let config = GapConfig {
            randomize: false,
            ..GapConfig::default()
        };
        let splitter = GapSplitter::new(config);

        let (blanked, holdout) = splitter.split(&index, &values, &mut rng()).unwrap();
        // Index runs 1995-01..2014-12, so the most recent full-length
        // window starts at 2009-12.
        assert_eq!(
            holdout.dates.first().copied(),
            NaiveDate::from_ymd_opt(2009, 12, 1)
        );
        assert_eq!(holdout.len(), 60);
        assert_eq!(blanked.iter().filter(|v| v.is_none()).count(), 60);
    }

    #[test]
    fn test_split_is_seed_reproducible() {
        let index = monthly_index(1995, 20);
        let values: Vec<Option<f64>> = (0..index.len()).map(|i| Some(i as f64)).collect();
        let splitter = GapSplitter::new(GapConfig::default());

        let a = splitter.split(&index, &values, &mut StdRng::seed_from_u64(9));
        let b = splitter.split(&index, &values, &mut StdRng::seed_from_u64(9));
        let (_, ha) = a.unwrap();
        let (_, hb) = b.unwrap();
        assert_eq!(ha.dates, hb.dates);
    }
}
