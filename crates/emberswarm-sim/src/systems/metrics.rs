//! Metrics aggregation: per-tick counters folded into rolling aggregates
//! with bounded history.

use std::collections::VecDeque;

use emberswarm_core::state::MetricsView;

/// Counters accumulated during a single tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickCounters {
    pub transmissions: u64,
    pub triggers_suppressed: u64,
    pub fire_detections: u64,
    pub suppression_applications: u64,
    pub messages_offered: u64,
    pub messages_dropped: u64,
    pub messages_delivered: u64,
}

/// Folds tick counters into cumulative totals and keeps a bounded history
/// of per-tick views.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    history_limit: usize,
    history: VecDeque<MetricsView>,
    latest: MetricsView,
}

impl MetricsCollector {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit,
            history: VecDeque::with_capacity(history_limit),
            latest: MetricsView::default(),
        }
    }

    /// Fold one tick's counters into the aggregates.
    pub fn fold(
        &mut self,
        tick: u64,
        counters: TickCounters,
        average_battery_percent: f64,
        active_drones: usize,
        burning_cells: usize,
    ) -> MetricsView {
        let view = MetricsView {
            tick,
            transmissions_total: self.latest.transmissions_total + counters.transmissions,
            triggers_suppressed_total: self.latest.triggers_suppressed_total
                + counters.triggers_suppressed,
            messages_delivered_total: self.latest.messages_delivered_total
                + counters.messages_delivered,
            messages_dropped_total: self.latest.messages_dropped_total + counters.messages_dropped,
            fire_detections_total: self.latest.fire_detections_total + counters.fire_detections,
            suppression_applications_total: self.latest.suppression_applications_total
                + counters.suppression_applications,
            average_battery_percent,
            active_drones,
            burning_cells,
        };
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(view);
        self.latest = view;
        view
    }

    pub fn latest(&self) -> MetricsView {
        self.latest
    }

    pub fn history(&self) -> impl Iterator<Item = &MetricsView> {
        self.history.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_accumulates_totals() {
        let mut collector = MetricsCollector::new(10);
        let counters = TickCounters {
            transmissions: 3,
            messages_delivered: 2,
            ..Default::default()
        };
        collector.fold(1, counters, 100.0, 5, 0);
        let view = collector.fold(2, counters, 99.0, 5, 1);
        assert_eq!(view.transmissions_total, 6);
        assert_eq!(view.messages_delivered_total, 4);
        assert_eq!(view.burning_cells, 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut collector = MetricsCollector::new(4);
        for tick in 0..20 {
            collector.fold(tick, TickCounters::default(), 100.0, 1, 0);
        }
        assert_eq!(collector.history().count(), 4);
        assert_eq!(collector.history().next().unwrap().tick, 16);
        assert_eq!(collector.latest().tick, 19);
    }
}
