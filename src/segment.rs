//! Constraint segmentation.
//!
//! Splits a stop list into ordering sub-problems bounded by anchors: the
//! origin always leads, a forced urgent stop comes right after it, and a
//! fixed destination closes the route.

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Role, Stop};

/// Positions (indices into the stop list) with a fixed place in the route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Anchors {
    pub origin: Option<usize>,
    /// Forced second stop. Only set when an origin exists.
    pub urgent: Option<usize>,
    /// Forced last stop. Only set when the destination is fixed.
    pub destination: Option<usize>,
}

impl Anchors {
    /// Resolves anchors and enforces role cardinality.
    ///
    /// Only the first urgent waypoint becomes an anchor; later urgent flags
    /// are left as plain waypoints.
    pub fn resolve(stops: &[Stop], fix_destination_at_end: bool) -> Result<Self> {
        let mut anchors = Anchors::default();
        let mut destination: Option<usize> = None;

        for (index, stop) in stops.iter().enumerate() {
            match stop.role {
                Role::Origin => {
                    if let Some(first) = anchors.origin {
                        return Err(Error::validation(format!(
                            "more than one origin: {} and {}",
                            stops[first].id, stop.id
                        )));
                    }
                    anchors.origin = Some(index);
                }
                Role::Destination => {
                    if let Some(first) = destination {
                        return Err(Error::validation(format!(
                            "more than one destination: {} and {}",
                            stops[first].id, stop.id
                        )));
                    }
                    destination = Some(index);
                }
                Role::Waypoint if stop.urgent => {
                    if anchors.urgent.is_none() {
                        anchors.urgent = Some(index);
                    } else {
                        debug!(stop = %stop.id, "additional urgent stop treated as regular waypoint");
                    }
                }
                Role::Waypoint => {}
            }
        }

        if anchors.origin.is_none() && anchors.urgent.take().is_some() {
            debug!("urgent flag ignored: no origin to anchor after");
        }
        if fix_destination_at_end {
            anchors.destination = destination;
        }

        Ok(anchors)
    }

    pub fn is_anchor(&self, index: usize) -> bool {
        [self.origin, self.urgent, self.destination].contains(&Some(index))
    }

    /// Indices of all non-anchor stops, in input order.
    pub fn free(&self, len: usize) -> Vec<usize> {
        (0..len).filter(|&index| !self.is_anchor(index)).collect()
    }

    /// Moves anchors into their fixed positions, keeping the relative order
    /// of every other index.
    pub fn pin(&self, order: &[usize]) -> Vec<usize> {
        let mut pinned = Vec::with_capacity(order.len());
        pinned.extend(self.origin);
        pinned.extend(self.urgent);
        pinned.extend(order.iter().copied().filter(|&index| !self.is_anchor(index)));
        pinned.extend(self.destination);
        pinned
    }

    /// Checks that a full order honors every anchor position.
    pub fn check(&self, order: &[usize]) -> std::result::Result<(), String> {
        let expectations = [
            (self.origin, Some(0), "origin"),
            (self.urgent, Some(1), "urgent stop"),
            (self.destination, order.len().checked_sub(1), "destination"),
        ];

        for (anchor, position, name) in expectations {
            if let Some(anchor) = anchor {
                if position.and_then(|p| order.get(p)) != Some(&anchor) {
                    return Err(format!("{name} is not in its fixed position"));
                }
            }
        }

        Ok(())
    }
}

/// One ordering sub-problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub lead: usize,
    pub free: Vec<usize>,
    /// Trailing anchor: part of the cost chain but never reordered.
    pub tail: Option<usize>,
}

impl Segment {
    pub(crate) fn len(&self) -> usize {
        1 + self.free.len() + usize::from(self.tail.is_some())
    }

    pub fn is_trivial(&self) -> bool {
        self.free.is_empty() && self.tail.is_none()
    }
}

/// Splits `len` stops into at most two segments, urgent before main.
///
/// The coordinate path needs an origin to lead the first segment.
pub fn segment(len: usize, anchors: &Anchors) -> Result<Vec<Segment>> {
    let origin = anchors
        .origin
        .ok_or_else(|| Error::validation("an origin stop is required to plan by coordinates"))?;

    let mut segments = Vec::with_capacity(2);
    let mut lead = origin;

    if let Some(urgent) = anchors.urgent {
        segments.push(Segment {
            lead: origin,
            free: vec![urgent],
            tail: None,
        });
        lead = urgent;
    }

    let main = Segment {
        lead,
        free: anchors.free(len),
        tail: anchors.destination,
    };
    if !main.is_trivial() {
        segments.push(main);
    }

    Ok(segments)
}

/// Concatenates segment tours, dropping the repeated boundary anchor.
pub fn merge(tours: &[Vec<usize>]) -> Vec<usize> {
    let mut order: Vec<usize> = Vec::new();
    for tour in tours {
        let skip = usize::from(order.last().is_some() && order.last() == tour.first());
        order.extend(tour.iter().skip(skip));
    }
    order
}
