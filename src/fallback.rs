//! Fallback sequencing through a free-text ordering oracle.
//!
//! Used when some stops have no coordinates. The oracle gets the stop list
//! and the positional rules in plain text and must answer with a JSON list
//! of ids. Anything that does not validate degrades to the input order with
//! anchors pinned, and the caller gets a warning instead of an error.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{Role, Stop};
use crate::segment::Anchors;
use crate::traits::OrderingOracle;

/// Result of the fallback path.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome {
    /// Indices into the stop list.
    pub order: Vec<usize>,
    /// Set when the oracle answer was unusable and the order degraded.
    pub warning: Option<String>,
}

/// Builds the ordering request text.
pub fn build_prompt(stops: &[Stop], anchors: &Anchors) -> String {
    let mut prompt = String::from(
        "You are a delivery route planner. Order the stops below so that the total \
         distance travelled is as small as possible.\n\nStops:\n",
    );

    for (position, stop) in stops.iter().enumerate() {
        let role = match stop.role {
            Role::Origin => "origin",
            Role::Waypoint => "stop",
            Role::Destination => "destination",
        };
        let coordinates = stop
            .coordinates
            .map(|c| format!("{:.6}, {:.6}", c.lat(), c.lng()))
            .unwrap_or_else(|| "unknown".to_string());
        let _ = writeln!(
            prompt,
            "{}. id: {} | address: {} | type: {}{} | coordinates: {}",
            position + 1,
            stop.id,
            stop.address,
            role,
            if stop.urgent { " (URGENT)" } else { "" },
            coordinates
        );
    }

    prompt.push_str("\nRules:\n");
    let mut rule = 1;
    let mut push_rule = |prompt: &mut String, text: String| {
        let _ = writeln!(prompt, "{rule}. {text}");
        rule += 1;
    };

    if let Some(origin) = anchors.origin {
        push_rule(
            &mut prompt,
            format!("The origin (id: {}) MUST be the first stop.", stops[origin].id),
        );
    }
    match anchors.urgent {
        Some(urgent) => push_rule(
            &mut prompt,
            format!(
                "The urgent stop (id: {}) MUST be the second stop, right after the origin.",
                stops[urgent].id
            ),
        ),
        None => push_rule(&mut prompt, "No stop is urgent.".to_string()),
    }
    match anchors.destination {
        Some(destination) => push_rule(
            &mut prompt,
            format!(
                "The destination (id: {}) MUST be the last stop.",
                stops[destination].id
            ),
        ),
        None if stops.iter().any(|s| s.role == Role::Destination) => push_rule(
            &mut prompt,
            "The destination may be placed anywhere if that shortens the route.".to_string(),
        ),
        None => {}
    }
    push_rule(
        &mut prompt,
        "Order every other stop by proximity between the fixed stops, using addresses \
         when coordinates are unknown."
            .to_string(),
    );
    push_rule(
        &mut prompt,
        "Use every id exactly once. Do not invent ids.".to_string(),
    );

    prompt.push_str(
        "\nAnswer with ONLY a JSON object of the form \
         {\"optimizedOrder\": [\"id\", ...]} and no other text.\n",
    );
    prompt
}

/// Parses and validates an oracle answer into stop indices.
pub fn parse_order(raw: &str, stops: &[Stop], anchors: &Anchors) -> Result<Vec<usize>> {
    let value: Value = serde_json::from_str(strip_fences(raw))
        .map_err(|err| Error::FallbackParse(format!("not JSON: {err}")))?;

    let ids = match &value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("optimizedOrder") {
            Some(Value::Array(items)) => items,
            _ => return Err(Error::FallbackParse("missing optimizedOrder list".to_string())),
        },
        _ => return Err(Error::FallbackParse("expected a list of ids".to_string())),
    };

    let index: HashMap<&str, usize> = stops
        .iter()
        .enumerate()
        .map(|(i, stop)| (stop.id.as_str(), i))
        .collect();

    let mut seen = HashSet::new();
    let mut order = Vec::with_capacity(ids.len());
    for item in ids {
        let id = item
            .as_str()
            .ok_or_else(|| Error::FallbackParse(format!("non-string id {item}")))?;
        let position = *index
            .get(id)
            .ok_or_else(|| Error::FallbackParse(format!("unknown id {id}")))?;
        if !seen.insert(position) {
            return Err(Error::FallbackParse(format!("duplicate id {id}")));
        }
        order.push(position);
    }

    if order.len() != stops.len() {
        return Err(Error::FallbackParse(format!(
            "expected {} ids, got {}",
            stops.len(),
            order.len()
        )));
    }
    anchors.check(&order).map_err(Error::FallbackParse)?;

    Ok(order)
}

/// Strips a surrounding markdown code fence, if any.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.trim_start_matches("json");
            body.strip_suffix("```").unwrap_or(body).trim()
        }
        None => trimmed,
    }
}

/// Orders stops through the oracle, degrading on any failure.
pub fn sequence(oracle: Option<&dyn OrderingOracle>, stops: &[Stop], anchors: &Anchors) -> FallbackOutcome {
    let attempt = match oracle {
        Some(oracle) => oracle
            .complete(&build_prompt(stops, anchors))
            .and_then(|raw| parse_order(&raw, stops, anchors)),
        None => Err(Error::FallbackParse("no ordering oracle configured".to_string())),
    };

    match attempt {
        Ok(order) => {
            info!(stops = order.len(), "stops ordered by oracle");
            FallbackOutcome {
                order,
                warning: None,
            }
        }
        Err(err) => {
            warn!(error = %err, "oracle ordering unusable; keeping input order");
            let input: Vec<usize> = (0..stops.len()).collect();
            FallbackOutcome {
                order: anchors.pin(&input),
                warning: Some(format!("route not optimized, input order kept: {err}")),
            }
        }
    }
}
