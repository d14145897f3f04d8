use tracing::debug;

use quakewatch_common::{Event, Fingerprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Changed,
    Unchanged,
}

/// Remembers the fingerprint of the last event seen. Only date, time and
/// coordinates feed the fingerprint, so a revised magnitude for an already
/// seen event is not a change.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_seen: Option<Fingerprint>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, latest: &Event) -> Detection {
        let fingerprint = latest.fingerprint();
        if self.last_seen.as_ref() == Some(&fingerprint) {
            return Detection::Unchanged;
        }
        debug!(
            previous = ?self.last_seen.as_ref().map(|f| f.0.as_str()),
            current = %fingerprint,
            "New event fingerprint"
        );
        self.last_seen = Some(fingerprint);
        Detection::Changed
    }

    pub fn last_seen(&self) -> Option<&Fingerprint> {
        self.last_seen.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(time: &str, magnitude: f64) -> Event {
        Event {
            event_date: "2024-01-01".into(),
            event_time: time.into(),
            coordinates: "1.0,99.0".into(),
            magnitude,
            depth_km: 10.0,
            area: String::new(),
            tsunami_potential: false,
            potential_text: String::new(),
            reported_by: 2,
        }
    }

    #[test]
    fn first_sighting_is_a_change() {
        let mut detector = ChangeDetector::new();
        assert!(detector.last_seen().is_none());
        assert_eq!(detector.check(&event("08:00:00", 5.0)), Detection::Changed);
    }

    #[test]
    fn same_then_different_fingerprint() {
        let mut detector = ChangeDetector::new();
        let f1 = event("08:00:00", 5.0);
        let f2 = event("09:30:00", 4.1);

        assert_eq!(detector.check(&f1), Detection::Changed);
        assert_eq!(detector.check(&f1), Detection::Unchanged);
        assert_eq!(detector.check(&f2), Detection::Changed);
        assert_eq!(detector.last_seen(), Some(&f2.fingerprint()));
    }

    #[test]
    fn revised_magnitude_is_not_a_change() {
        let mut detector = ChangeDetector::new();
        detector.check(&event("08:00:00", 5.0));
        assert_eq!(detector.check(&event("08:00:00", 5.6)), Detection::Unchanged);
    }
}
