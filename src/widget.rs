//! Widgets and the reports consumers emit for them.

use std::fmt;
use std::time::{Duration, Instant};

/// Ordinal of the producer that built a widget, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProducerId(pub usize);

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Producer_{}", self.0)
    }
}

/// The unit of work flowing through the pipeline.
///
/// Widgets are immutable once built. The `id` is the issuer's grant number,
/// so it reflects production order rather than the order in which consumers
/// receive widgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Widget {
    id: u64,
    source: ProducerId,
    created_at: Instant,
    broken: bool,
}

impl Widget {
    /// Build a widget for an issued identifier.
    ///
    /// The widget is broken iff `id` equals `bad_ordinal`. Ordinals below 1
    /// never match since identifiers start at 1.
    pub fn new(id: u64, source: ProducerId, bad_ordinal: i64) -> Self {
        Self {
            id,
            source,
            created_at: Instant::now(),
            broken: is_bad(id, bad_ordinal),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> ProducerId {
        self.source
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Time since the widget was built
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl fmt::Display for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[id={} source={} broken={}]",
            self.id, self.source, self.broken
        )
    }
}

fn is_bad(id: u64, bad_ordinal: i64) -> bool {
    u64::try_from(bad_ordinal).is_ok_and(|k| k == id)
}

/// What a consumer emits for every widget it takes off the item channel.
#[derive(Debug, Clone)]
pub enum Report {
    /// A healthy widget and how long it waited between production and consumption
    Normal {
        consumer: usize,
        widget: Widget,
        elapsed: Duration,
    },
    /// The broken widget; production is being stopped
    Broken { consumer: usize, widget: Widget },
}

impl Report {
    pub fn consumer(&self) -> usize {
        match self {
            Report::Normal { consumer, .. } | Report::Broken { consumer, .. } => *consumer,
        }
    }

    pub fn widget(&self) -> &Widget {
        match self {
            Report::Normal { widget, .. } | Report::Broken { widget, .. } => widget,
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, Report::Broken { .. })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Normal {
                consumer,
                widget,
                elapsed,
            } => write!(
                f,
                "Consumer_{} consumed {} in {:?} time",
                consumer, widget, elapsed
            ),
            Report::Broken { consumer, widget } => write!(
                f,
                "Consumer_{} found a broken widget {} -- stopping production",
                consumer, widget
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_only_on_matching_ordinal() {
        assert!(!Widget::new(1, ProducerId(1), 2).is_broken());
        assert!(Widget::new(2, ProducerId(1), 2).is_broken());
        assert!(!Widget::new(1, ProducerId(1), -1).is_broken());
        assert!(!Widget::new(1, ProducerId(1), 0).is_broken());
    }

    #[test]
    fn age_is_measured_from_creation() {
        let before = Instant::now();
        let widget = Widget::new(1, ProducerId(1), -1);
        let after = Instant::now();

        assert!(widget.created_at() >= before && widget.created_at() <= after);
        assert!(widget.age() <= widget.created_at().elapsed());
    }

    #[test]
    fn widget_display() {
        let widget = Widget::new(7, ProducerId(3), 7);
        assert_eq!(widget.to_string(), "[id=7 source=Producer_3 broken=true]");
    }

    #[test]
    fn report_display_matches_cli_wording() {
        let widget = Widget::new(1, ProducerId(1), -1);
        let normal = Report::Normal {
            consumer: 2,
            widget: widget.clone(),
            elapsed: Duration::from_micros(15),
        };
        assert_eq!(
            normal.to_string(),
            "Consumer_2 consumed [id=1 source=Producer_1 broken=false] in 15µs time"
        );

        let broken = Report::Broken {
            consumer: 1,
            widget: Widget::new(4, ProducerId(2), 4),
        };
        assert!(broken.is_broken());
        assert_eq!(broken.consumer(), 1);
        assert_eq!(
            broken.to_string(),
            "Consumer_1 found a broken widget [id=4 source=Producer_2 broken=true] -- stopping production"
        );
    }
}
