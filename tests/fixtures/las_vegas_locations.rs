//! Real Las Vegas / Henderson locations for realistic test fixtures.
//!
//! Coordinates sourced from OpenStreetMap. They are routable with the OSRM
//! Nevada extract used by the integration tests.

use route_sequencer::{Delivery, Role};

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    /// A located delivery named after this place.
    pub fn delivery(&self, id: &str, role: Role) -> Delivery {
        Delivery::new(id, self.name, role).at(self.lat, self.lng)
    }
}

/// Warehouse the van leaves from.
pub const DEPOT: Location = Location::new("Longhorn Casino", 36.1070664, -115.0591256);

/// Where the van parks at the end of the day.
pub const GARAGE: Location = Location::new("Budget Suites South", 36.0366259, -115.1713361);

pub const DROP_OFFS: &[Location] = &[
    Location::new("Wynn Las Vegas", 36.1263781, -115.1658180),
    Location::new("MGM Grand", 36.1023654, -115.1688720),
    Location::new("Bellagio", 36.1126, -115.1767),
    Location::new("Hard Rock Cafe", 36.1041592, -115.1722166),
    Location::new("Brooklyn Bowl", 36.1175388, -115.1695094),
    Location::new("Bootlegger Bistro", 36.0492047, -115.1715744),
    Location::new("Green Valley Ranch Area", 36.0308, -115.0825),
    Location::new("Sunset Station Area", 36.0614, -115.0631),
    Location::new("I Love Sushi Henderson", 35.9916660, -115.1028343),
    Location::new("Islander's Grill", 36.0335058, -114.9856162),
    Location::new("Pei Wei Town Square", 36.0810469, -115.1472694),
    Location::new("Hello Tokyo", 36.1161627, -115.0902096),
    Location::new("Tomo Sushi", 36.0992464, -115.1142123),
    Location::new("Sushi Twister", 36.1007300, -115.0526259),
    Location::new("Roma Pizza", 36.1012461, -115.0753039),
    Location::new("Rivas Mexican Grill North", 36.1450055, -115.0482587),
    Location::new("Beers and Bets", 36.1428945, -115.1573836),
    Location::new("Original Lindo Michoacan", 36.1294005, -115.1135106),
    Location::new("Wo Fat Chinese", 36.1298523, -115.0936239),
    Location::new("Denny's South", 36.0591086, -115.1717250),
];

/// Depot, `count` drop-offs (the first one urgent if asked), and the garage.
pub fn day_route(count: usize, urgent_first: bool) -> Vec<Delivery> {
    let mut deliveries = vec![DEPOT.delivery("depot", Role::Origin)];
    for (k, location) in DROP_OFFS.iter().take(count).enumerate() {
        let delivery = location.delivery(&format!("drop-{k}"), Role::Waypoint);
        deliveries.push(if urgent_first && k == 0 {
            delivery.urgent()
        } else {
            delivery
        });
    }
    deliveries.push(GARAGE.delivery("garage", Role::Destination));
    deliveries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_in_vegas_area() {
        for loc in DROP_OFFS.iter().chain([&DEPOT, &GARAGE]) {
            assert!(loc.lat > 35.9 && loc.lat < 36.3, "{} lat out of range: {}", loc.name, loc.lat);
            assert!(loc.lng > -115.4 && loc.lng < -114.8, "{} lng out of range: {}", loc.name, loc.lng);
        }
    }
}
