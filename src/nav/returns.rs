//! Period and annualized returns on NAV

use serde::Serialize;

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_YEAR: f64 = 365.0;

/// Return between two NAV observations
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodReturn {
    pub start_nav: f64,
    pub end_nav: f64,
    pub absolute: f64,
    pub percent: f64,
    pub days: Option<f64>,
    pub annualized: Option<f64>,
}

impl PeriodReturn {
    /// Timestamps of 0 mean "unknown" and leave `days`/`annualized` empty
    pub fn between(start_nav: f64, start_ts: u64, end_nav: f64, end_ts: u64) -> Self {
        let absolute = end_nav - start_nav;
        let percent = if start_nav != 0.0 {
            absolute / start_nav * 100.0
        } else {
            0.0
        };

        let days = (start_ts > 0 && end_ts > 0)
            .then(|| (end_ts as f64 - start_ts as f64) / SECONDS_PER_DAY);
        let annualized = days.and_then(|d| annualize(start_nav, end_nav, d));

        Self {
            start_nav,
            end_nav,
            absolute,
            percent,
            days,
            annualized,
        }
    }
}

/// `((end/start)^(365/days) − 1)·100`; `None` when the ratio has no real
/// compounding (non-positive start, ratio or period)
pub fn annualize(start_nav: f64, end_nav: f64, days: f64) -> Option<f64> {
    if days <= 0.0 || start_nav <= 0.0 {
        return None;
    }
    let ratio = end_nav / start_nav;
    if ratio <= 0.0 || !ratio.is_finite() {
        return None;
    }
    let value = (ratio.powf(DAYS_PER_YEAR / days) - 1.0) * 100.0;
    value.is_finite().then_some(value)
}

/// Annualized lifetime return; periods shorter than a day count as one day
pub fn lifetime_apr(start_nav: f64, end_nav: f64, days: f64) -> f64 {
    if start_nav <= 0.0 || days <= 0.0 {
        return 0.0;
    }
    annualize(start_nav, end_nav, days.max(1.0)).unwrap_or(0.0)
}

/// NAV `days` ago implied by compounding backwards at `apr_percent`
pub fn implied_start_nav(end_nav: f64, apr_percent: f64, days: f64) -> f64 {
    end_nav / (1.0 + apr_percent / 100.0).powf(days / DAYS_PER_YEAR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_between_one_year() {
        let r = PeriodReturn::between(1_000.0, 1_700_000_000, 1_100.0, 1_700_000_000 + 365 * 86_400);
        assert!(close(r.absolute, 100.0));
        assert!(close(r.percent, 10.0));
        assert!(close(r.days.unwrap(), 365.0));
        assert!(close(r.annualized.unwrap(), 10.0));
    }

    #[test]
    fn test_between_without_timestamps() {
        let r = PeriodReturn::between(1_000.0, 0, 900.0, 1_700_000_000);
        assert!(close(r.percent, -10.0));
        assert!(r.days.is_none());
        assert!(r.annualized.is_none());

        let zero = PeriodReturn::between(0.0, 1, 50.0, 2);
        assert_eq!(zero.percent, 0.0);
        assert!(zero.annualized.is_none());
    }

    #[test]
    fn test_annualize_half_year() {
        // 5% in half a year compounds to 10.25%
        let a = annualize(100.0, 105.0, 182.5).unwrap();
        assert!(close(a, 10.25));
        assert!(annualize(100.0, -5.0, 30.0).is_none());
        assert!(annualize(-100.0, 50.0, 30.0).is_none());
        assert!(annualize(100.0, 105.0, 0.0).is_none());
    }

    #[test]
    fn test_lifetime_apr_clamps_short_periods() {
        assert_eq!(lifetime_apr(0.0, 100.0, 30.0), 0.0);
        assert_eq!(lifetime_apr(100.0, 110.0, 0.0), 0.0);
        assert!(close(
            lifetime_apr(100.0, 100.1, 0.25),
            annualize(100.0, 100.1, 1.0).unwrap()
        ));
    }

    #[test]
    fn test_implied_start_nav() {
        let start = implied_start_nav(110.0, 10.0, 365.0);
        assert!(close(start, 100.0));
        assert!(close(implied_start_nav(500.0, 0.0, 90.0), 500.0));
    }
}
