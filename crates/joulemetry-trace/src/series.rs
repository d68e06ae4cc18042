//! ---
//! jm_section: "03-trace-pipeline"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Trace wire format, streaming reader, and series statistics."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use joulemetry_sensors::Unit;
use parking_lot::RwLock;

use crate::Sample;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Rate statistics over a queried time window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateWindow {
    pub max_watts: f64,
    pub mean_watts: f64,
    pub min_watts: f64,
    pub sum_joules: f64,
}

#[derive(Debug, Default)]
struct SeriesData {
    start_ns: Vec<i64>,
    end_ns: Vec<i64>,
    joules: Vec<f64>,
    rate_min: f64,
    rate_max: f64,
    domain_min: i64,
    domain_max: i64,
    sum_joules: f64,
    initialized: bool,
}

/// One sensor's ordered samples, stored as energy quantities.
///
/// Joule samples are stored as-is and converted to rates on demand; watt
/// samples are integrated over their interval on insertion. Interior
/// locking lets a reader thread insert while a UI or benchmark queries.
#[derive(Debug)]
pub struct Series {
    name: String,
    inner: RwLock<SeriesData>,
}

impl Series {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(SeriesData::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initialized(&self) -> bool {
        self.inner.read().initialized
    }

    pub fn len(&self) -> usize {
        self.inner.read().start_ns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recorded time domain, `None` until the first insert.
    pub fn domain(&self) -> Option<(i64, i64)> {
        let data = self.inner.read();
        data.initialized.then_some((data.domain_min, data.domain_max))
    }

    /// Extremes of the per-sample rates seen so far, in watts.
    pub fn rate_range(&self) -> (f64, f64) {
        let data = self.inner.read();
        (data.rate_min, data.rate_max)
    }

    /// Total energy recorded, in joules.
    pub fn sum_joules(&self) -> f64 {
        self.inner.read().sum_joules
    }

    /// Add a sample. Returns false when the sample overlaps recorded data
    /// or carries a unit the series cannot integrate.
    pub fn insert(&self, sample: &Sample) -> bool {
        let duration_ns = (sample.end_ns - sample.start_ns) as f64;
        let (rate, quantity) = match sample.unit {
            Unit::Joules => (sample.value / (duration_ns / NANOS_PER_SEC), sample.value),
            Unit::Watts => (sample.value, sample.value * duration_ns / NANOS_PER_SEC),
            _ => return false,
        };

        let mut data = self.inner.write();
        if !data.initialized {
            data.domain_min = sample.start_ns;
            data.domain_max = sample.start_ns;
            data.initialized = true;
        }
        if let Some(&last_end) = data.end_ns.last() {
            if last_end > sample.start_ns {
                // Reject samples overlapping the existing data.
                return false;
            }
        }
        data.domain_min = data.domain_min.min(sample.start_ns);
        data.domain_max = data.domain_max.max(sample.end_ns);
        if data.start_ns.is_empty() {
            data.rate_max = rate;
            data.rate_min = rate;
        } else {
            data.rate_max = data.rate_max.max(rate);
            data.rate_min = data.rate_min.min(rate);
        }
        data.start_ns.push(sample.start_ns);
        data.end_ns.push(sample.end_ns);
        data.joules.push(quantity);
        data.sum_joules += quantity;
        true
    }

    /// Rate statistics over the half-open interval `[a, b)`.
    ///
    /// Reversed bounds are swapped. Boundary samples contribute in
    /// proportion to the share of them inside the window. Returns `None`
    /// when the series is empty or the window lies outside its domain.
    pub fn rates_between(&self, timestamp_a: i64, timestamp_b: i64) -> Option<RateWindow> {
        let data = self.inner.read();
        if data.start_ns.is_empty() {
            return None;
        }
        let (a, b) = if timestamp_b < timestamp_a {
            (timestamp_b, timestamp_a)
        } else {
            (timestamp_a, timestamp_b)
        };

        let index_a = data.end_ns.partition_point(|&end| end <= a);
        if index_a == data.start_ns.len() {
            return None;
        }
        let mut index_b = data.end_ns.partition_point(|&end| end <= b);
        if index_b == data.start_ns.len() {
            let last_end = data.end_ns[data.end_ns.len() - 1];
            if b > last_end {
                return None;
            }
            // The window ends exactly at the final sample boundary.
            index_b -= 1;
        }

        if index_a == index_b {
            let quantity = data.joules[index_a];
            let interval = (data.end_ns[index_a] - data.start_ns[index_a]) as f64;
            let query_interval = (b - a) as f64;
            let mean = quantity / (interval / NANOS_PER_SEC);
            return Some(RateWindow {
                max_watts: mean,
                mean_watts: mean,
                min_watts: mean,
                sum_joules: quantity * (query_interval / interval),
            });
        }

        let mut maximum = 0.0_f64;
        let mut minimum = 0.0_f64;
        let mut accumulated = 0.0_f64;
        let mut has_extrema = false;
        for index in index_a..=index_b {
            let mut quantity = data.joules[index];
            let mut interval = (data.end_ns[index] - data.start_ns[index]) as f64;
            if index == index_a || index == index_b {
                let in_window_ns = if index == index_a {
                    data.end_ns[index_a] - a
                } else {
                    b - data.start_ns[index_b]
                };
                if in_window_ns == 0 {
                    continue;
                }
                // Scale the boundary sample by the share of it inside the
                // window.
                let ratio = in_window_ns as f64 / interval;
                quantity *= ratio;
                interval = in_window_ns as f64;
            }
            accumulated += quantity;
            let rate = quantity / (interval / NANOS_PER_SEC);
            if has_extrema {
                maximum = maximum.max(rate);
                minimum = minimum.min(rate);
            } else {
                maximum = rate;
                minimum = rate;
                has_extrema = true;
            }
        }
        let mean = accumulated / ((b - a) as f64 / NANOS_PER_SEC);
        Some(RateWindow {
            max_watts: maximum,
            mean_watts: mean,
            min_watts: minimum,
            sum_joules: accumulated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joule_sample(start_ns: i64, end_ns: i64, value: f64) -> Sample {
        Sample {
            start_ns,
            end_ns,
            series: 1,
            value,
            unit: Unit::Joules,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn half_sample_windows_account_for_all_energy() {
        let series = Series::new("test");
        let interval = 1000_i64;
        let sample_count = 10_i64;
        let mut expected_sum = 0.0;
        for i in 0..sample_count {
            let sample = joule_sample(i * interval, (i + 1) * interval, i as f64);
            assert!(series.insert(&sample), "sample {i} should insert");
            expected_sum += i as f64;
        }

        let half = interval / 2;
        let mut sum = 0.0;
        for i in 0..sample_count * 2 {
            let window = series
                .rates_between(i * half, (i + 1) * half)
                .expect("window inside the domain");
            assert_eq!(window.min_watts, window.mean_watts);
            assert_eq!(window.mean_watts, window.max_watts);
            sum += window.mean_watts * (half as f64 / NANOS_PER_SEC);
        }
        assert!(close(sum, expected_sum), "expected {expected_sum}, got {sum}");
    }

    #[test]
    fn overlapping_samples_are_rejected() {
        let series = Series::new("test");
        assert!(series.insert(&joule_sample(0, 1000, 1.0)));
        assert!(!series.insert(&joule_sample(500, 1500, 1.0)));
        assert!(series.insert(&joule_sample(1000, 2000, 1.0)));
        assert_eq!(series.len(), 2);
        assert_eq!(series.domain(), Some((0, 2000)));
    }

    #[test]
    fn watt_samples_integrate_to_joules() {
        let series = Series::new("test");
        let sample = Sample {
            start_ns: 0,
            end_ns: 2_000_000_000,
            series: 1,
            value: 5.0,
            unit: Unit::Watts,
        };
        assert!(series.insert(&sample));
        assert!(close(series.sum_joules(), 10.0));
        let window = series.rates_between(0, 2_000_000_000).unwrap();
        assert!(close(window.mean_watts, 5.0));
        assert!(close(window.sum_joules, 10.0));
    }

    #[test]
    fn boundary_samples_scale_proportionally() {
        let series = Series::new("test");
        assert!(series.insert(&joule_sample(0, 1000, 1.0)));
        assert!(series.insert(&joule_sample(1000, 2000, 3.0)));

        let window = series.rates_between(500, 1500).unwrap();
        assert!(close(window.sum_joules, 2.0));
        assert!(close(window.mean_watts, 2.0 / (1000.0 / NANOS_PER_SEC)));
        assert!(close(window.min_watts, 0.5 / (500.0 / NANOS_PER_SEC)));
        assert!(close(window.max_watts, 1.5 / (500.0 / NANOS_PER_SEC)));
    }

    #[test]
    fn windows_outside_the_domain_return_none() {
        let series = Series::new("test");
        assert!(series.rates_between(0, 100).is_none());
        assert!(series.insert(&joule_sample(1000, 2000, 1.0)));
        assert!(series.rates_between(2001, 3000).is_none());
        assert!(series.rates_between(0, 2000).is_some());
    }

    #[test]
    fn reversed_bounds_behave_like_sorted_bounds() {
        let series = Series::new("test");
        for i in 0..4 {
            assert!(series.insert(&joule_sample(i * 1000, (i + 1) * 1000, 2.0)));
        }
        let forward = series.rates_between(500, 3500).unwrap();
        let reversed = series.rates_between(3500, 500).unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn unsupported_units_are_not_inserted() {
        let series = Series::new("test");
        let sample = Sample {
            start_ns: 0,
            end_ns: 1000,
            series: 1,
            value: 1.0,
            unit: Unit::Volts,
        };
        assert!(!series.insert(&sample));
        assert!(series.is_empty());
    }

    #[test]
    fn rate_range_tracks_extremes() {
        let series = Series::new("test");
        assert!(series.insert(&joule_sample(0, 1_000_000_000, 2.0)));
        assert!(series.insert(&joule_sample(1_000_000_000, 2_000_000_000, 6.0)));
        let (min, max) = series.rate_range();
        assert!(close(min, 2.0));
        assert!(close(max, 6.0));
    }
}
