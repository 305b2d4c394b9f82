//! Query request types and their parameter rules.
//!
//! Optional, query-shaping parameters degrade to safe defaults instead of
//! failing a request: an unusable `limit` becomes the default ranking size and
//! an incomplete nearby search becomes an empty result.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::models::Spot;

/// Default page size for spot listings.
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Upper bound on the page size a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default number of spots returned by the rent ranking.
pub const DEFAULT_TOP_RENT_LIMIT: i64 = 10;

// =============================================================================
// ORDERING
// =============================================================================

/// Scalar attributes a listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpotField {
    SpotId,
    PublicId,
    SectorId,
    TypeId,
    Modality,
    Settlement,
    Municipality,
    State,
    Region,
    Corridor,
    Address,
    Title,
    Description,
    Latitude,
    Longitude,
    AreaInSqm,
    PriceSqmRent,
    PriceTotalRent,
    PriceSqmSale,
    PriceTotalSale,
    MaintenanceCost,
    UserId,
    CreatedDate,
    DataSource,
}

impl SpotField {
    pub const ALL: [SpotField; 24] = [
        SpotField::SpotId,
        SpotField::PublicId,
        SpotField::SectorId,
        SpotField::TypeId,
        SpotField::Modality,
        SpotField::Settlement,
        SpotField::Municipality,
        SpotField::State,
        SpotField::Region,
        SpotField::Corridor,
        SpotField::Address,
        SpotField::Title,
        SpotField::Description,
        SpotField::Latitude,
        SpotField::Longitude,
        SpotField::AreaInSqm,
        SpotField::PriceSqmRent,
        SpotField::PriceTotalRent,
        SpotField::PriceSqmSale,
        SpotField::PriceTotalSale,
        SpotField::MaintenanceCost,
        SpotField::UserId,
        SpotField::CreatedDate,
        SpotField::DataSource,
    ];

    /// Wire name, which is also the column name in the `spot` table.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotField::SpotId => "spot_id",
            SpotField::PublicId => "public_id",
            SpotField::SectorId => "spot_sector_id",
            SpotField::TypeId => "spot_type_id",
            SpotField::Modality => "spot_modality",
            SpotField::Settlement => "spot_settlement",
            SpotField::Municipality => "spot_municipality",
            SpotField::State => "spot_state",
            SpotField::Region => "spot_region",
            SpotField::Corridor => "spot_corridor",
            SpotField::Address => "spot_address",
            SpotField::Title => "spot_title",
            SpotField::Description => "spot_description",
            SpotField::Latitude => "spot_latitude",
            SpotField::Longitude => "spot_longitude",
            SpotField::AreaInSqm => "spot_area_in_sqm",
            SpotField::PriceSqmRent => "spot_price_sqm_mxn_rent",
            SpotField::PriceTotalRent => "spot_price_total_mxn_rent",
            SpotField::PriceSqmSale => "spot_price_sqm_mxn_sale",
            SpotField::PriceTotalSale => "spot_price_total_mxn_sale",
            SpotField::MaintenanceCost => "spot_maintenance_cost",
            SpotField::UserId => "user_id",
            SpotField::CreatedDate => "spot_created_date",
            SpotField::DataSource => "data_source",
        }
    }

    /// Value of this field on `spot`, or `None` when unknown.
    pub fn sort_key(&self, spot: &Spot) -> Option<SortKey> {
        fn text(v: &Option<String>) -> Option<SortKey> {
            v.clone().map(SortKey::Text)
        }
        fn int(v: Option<i32>) -> Option<SortKey> {
            v.map(|i| SortKey::Int(i64::from(i)))
        }
        fn float(v: Option<f64>) -> Option<SortKey> {
            v.map(SortKey::Float)
        }

        match self {
            SpotField::SpotId => Some(SortKey::Int(i64::from(spot.spot_id))),
            SpotField::PublicId => text(&spot.public_id),
            SpotField::SectorId => int(spot.spot_sector_id),
            SpotField::TypeId => int(spot.spot_type_id),
            SpotField::Modality => text(&spot.spot_modality),
            SpotField::Settlement => text(&spot.spot_settlement),
            SpotField::Municipality => text(&spot.spot_municipality),
            SpotField::State => text(&spot.spot_state),
            SpotField::Region => text(&spot.spot_region),
            SpotField::Corridor => text(&spot.spot_corridor),
            SpotField::Address => text(&spot.spot_address),
            SpotField::Title => text(&spot.spot_title),
            SpotField::Description => text(&spot.spot_description),
            SpotField::Latitude => float(spot.latitude()),
            SpotField::Longitude => float(spot.longitude()),
            SpotField::AreaInSqm => float(spot.spot_area_in_sqm),
            SpotField::PriceSqmRent => float(spot.spot_price_sqm_mxn_rent),
            SpotField::PriceTotalRent => float(spot.spot_price_total_mxn_rent),
            SpotField::PriceSqmSale => float(spot.spot_price_sqm_mxn_sale),
            SpotField::PriceTotalSale => float(spot.spot_price_total_mxn_sale),
            SpotField::MaintenanceCost => float(spot.spot_maintenance_cost),
            SpotField::UserId => int(spot.user_id),
            SpotField::CreatedDate => spot.spot_created_date.map(SortKey::Date),
            SpotField::DataSource => Some(SortKey::Text(spot.data_source.clone())),
        }
    }
}

impl FromStr for SpotField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpotField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("'{}' is not an orderable field", s))
    }
}

/// Comparable value extracted from a spot for in-process sorting.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl SortKey {
    /// Total order over keys of the same field.
    pub fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Int(a), SortKey::Int(b)) => a.cmp(b),
            (SortKey::Float(a), SortKey::Float(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// A single ordering key, written `field` or `-field` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotOrdering {
    pub field: SpotField,
    pub direction: SortDirection,
}

impl SpotOrdering {
    /// Parse an `ordering` parameter. Unknown fields yield `None` so the
    /// default order applies.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (direction, name) = match raw.strip_prefix('-') {
            Some(rest) => (SortDirection::Desc, rest),
            None => (SortDirection::Asc, raw),
        };
        let field = name.parse::<SpotField>().ok()?;
        Some(Self { field, direction })
    }

    /// Compare two spots: unknown values trail in both directions and ties
    /// fall back to `spot_id` ascending.
    pub fn compare(&self, a: &Spot, b: &Spot) -> Ordering {
        let primary = match (self.field.sort_key(a), self.field.sort_key(b)) {
            (Some(x), Some(y)) => {
                let ord = x.compare(&y);
                match self.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        primary.then_with(|| a.spot_id.cmp(&b.spot_id))
    }

    /// Wire form of the ordering.
    pub fn to_param(&self) -> String {
        match self.direction {
            SortDirection::Asc => self.field.as_str().to_string(),
            SortDirection::Desc => format!("-{}", self.field.as_str()),
        }
    }
}

// =============================================================================
// LIST / FILTER
// =============================================================================

/// Attribute filters for listing spots. All supplied predicates must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpotFilter {
    /// Exact match on `spot_sector_id`.
    pub sector_id: Option<i32>,
    /// Exact match on `spot_type_id`.
    pub type_id: Option<i32>,
    /// Case-insensitive substring of `spot_municipality`.
    pub municipality: Option<String>,
}

impl SpotFilter {
    pub fn matches(&self, spot: &Spot) -> bool {
        if let Some(sector) = self.sector_id {
            if spot.spot_sector_id != Some(sector) {
                return false;
            }
        }
        if let Some(type_id) = self.type_id {
            if spot.spot_type_id != Some(type_id) {
                return false;
            }
        }
        if let Some(needle) = &self.municipality {
            let needle = needle.to_lowercase();
            match &spot.spot_municipality {
                Some(m) if m.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Request for one page of spots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSpotsRequest {
    pub filter: SpotFilter,
    pub ordering: Option<SpotOrdering>,
    /// 1-based page number.
    pub page: i64,
    pub page_size: i64,
}

impl Default for ListSpotsRequest {
    fn default() -> Self {
        Self {
            filter: SpotFilter::default(),
            ordering: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListSpotsRequest {
    /// Rows to skip before this page. Saturates for page numbers past any
    /// possible listing.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.page_size)
    }
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn clamp_page_size(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE)
}

/// One page of spots plus the total number of matches.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSpotsResponse {
    pub spots: Vec<Spot>,
    pub total: i64,
}

// =============================================================================
// NEARBY
// =============================================================================

/// A radius search around a reference point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyRequest {
    pub longitude: f64,
    pub latitude: f64,
    pub radius_m: f64,
}

impl NearbyRequest {
    /// Build a request from raw query values.
    ///
    /// Returns `None` when any value is missing or is not a finite number,
    /// when the point lies outside WGS84 bounds, or when the radius is
    /// negative. Callers answer `None` with an empty result.
    pub fn parse(lat: Option<&str>, lng: Option<&str>, radius: Option<&str>) -> Option<Self> {
        fn number(raw: Option<&str>) -> Option<f64> {
            raw.map(str::trim)
                .filter(|s| !s.is_empty())
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        }

        let request = Self {
            latitude: number(lat)?,
            longitude: number(lng)?,
            radius_m: number(radius)?,
        };
        let in_bounds = (-90.0..=90.0).contains(&request.latitude)
            && (-180.0..=180.0).contains(&request.longitude);
        if !in_bounds || request.radius_m < 0.0 {
            return None;
        }
        Some(request)
    }
}

// =============================================================================
// TOP RENT
// =============================================================================

/// Resolve the ranking size. Missing, unparsable, or non-positive values fall
/// back to [`DEFAULT_TOP_RENT_LIMIT`].
pub fn top_rent_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_TOP_RENT_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot(id: i32, municipality: Option<&str>, area: Option<f64>) -> Spot {
        let mut s = Spot::new(id);
        s.spot_municipality = municipality.map(str::to_string);
        s.spot_area_in_sqm = area;
        s
    }

    #[test]
    fn every_field_round_trips_through_its_name() {
        for field in SpotField::ALL {
            assert_eq!(field.as_str().parse::<SpotField>(), Ok(field));
        }
    }

    #[test]
    fn ordering_parses_direction_prefix() {
        let asc = SpotOrdering::parse("spot_area_in_sqm").unwrap();
        assert_eq!(asc.field, SpotField::AreaInSqm);
        assert_eq!(asc.direction, SortDirection::Asc);

        let desc = SpotOrdering::parse("-spot_price_total_mxn_rent").unwrap();
        assert_eq!(desc.field, SpotField::PriceTotalRent);
        assert_eq!(desc.direction, SortDirection::Desc);
        assert_eq!(desc.to_param(), "-spot_price_total_mxn_rent");
    }

    #[test]
    fn ordering_ignores_unknown_fields() {
        assert!(SpotOrdering::parse("location").is_none());
        assert!(SpotOrdering::parse("-; DROP TABLE spot").is_none());
        assert!(SpotOrdering::parse("").is_none());
    }

    #[test]
    fn ordering_puts_unknown_values_last_in_both_directions() {
        let spots = vec![
            spot(1, None, Some(200.0)),
            spot(2, None, None),
            spot(3, None, Some(50.0)),
        ];

        let mut asc = spots.clone();
        let ordering = SpotOrdering::parse("spot_area_in_sqm").unwrap();
        asc.sort_by(|a, b| ordering.compare(a, b));
        assert_eq!(asc.iter().map(|s| s.spot_id).collect::<Vec<_>>(), [3, 1, 2]);

        let mut desc = spots;
        let ordering = SpotOrdering::parse("-spot_area_in_sqm").unwrap();
        desc.sort_by(|a, b| ordering.compare(a, b));
        assert_eq!(desc.iter().map(|s| s.spot_id).collect::<Vec<_>>(), [1, 3, 2]);
    }

    #[test]
    fn ordering_breaks_ties_by_spot_id() {
        let mut spots = vec![spot(9, None, Some(1.0)), spot(4, None, Some(1.0))];
        let ordering = SpotOrdering::parse("-spot_area_in_sqm").unwrap();
        spots.sort_by(|a, b| ordering.compare(a, b));
        assert_eq!(spots[0].spot_id, 4);
    }

    #[test]
    fn filter_matches_municipality_case_insensitively() {
        let filter = SpotFilter {
            municipality: Some("test a".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&spot(1, Some("Test A"), None)));
        assert!(filter.matches(&spot(2, Some("Big TEST Area"), None)));
        assert!(!filter.matches(&spot(3, Some("Test B"), None)));
        assert!(!filter.matches(&spot(4, None, None)));
    }

    #[test]
    fn filter_requires_every_predicate() {
        let mut s = Spot::new(1);
        s.spot_sector_id = Some(9);
        s.spot_type_id = Some(2);

        let filter = SpotFilter {
            sector_id: Some(9),
            type_id: Some(1),
            municipality: None,
        };
        assert!(!filter.matches(&s));

        let filter = SpotFilter {
            sector_id: Some(9),
            type_id: Some(2),
            municipality: None,
        };
        assert!(filter.matches(&s));
        assert!(SpotFilter::default().matches(&Spot::new(2)));
    }

    #[test]
    fn page_offset_and_size_clamp() {
        let req = ListSpotsRequest {
            page: 3,
            page_size: 10,
            ..Default::default()
        };
        assert_eq!(req.offset(), 20);
        assert_eq!(ListSpotsRequest::default().offset(), 0);
        let huge = ListSpotsRequest {
            page: i64::MAX,
            page_size: 25,
            ..Default::default()
        };
        assert_eq!(huge.offset(), i64::MAX);

        assert_eq!(clamp_page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(0)), 1);
        assert_eq!(clamp_page_size(Some(5000)), MAX_PAGE_SIZE);
    }

    #[test]
    fn nearby_requires_all_three_numeric_values() {
        let ok = NearbyRequest::parse(Some("19.151"), Some("-99.151"), Some("6000")).unwrap();
        assert_eq!(ok.latitude, 19.151);
        assert_eq!(ok.longitude, -99.151);
        assert_eq!(ok.radius_m, 6000.0);

        assert!(NearbyRequest::parse(None, Some("-99.1"), Some("100")).is_none());
        assert!(NearbyRequest::parse(Some("19.1"), None, Some("100")).is_none());
        assert!(NearbyRequest::parse(Some("19.1"), Some("-99.1"), None).is_none());
        assert!(NearbyRequest::parse(Some("abc"), Some("-99.1"), Some("100")).is_none());
        assert!(NearbyRequest::parse(Some("19.1"), Some("-99.1"), Some("")).is_none());
        assert!(NearbyRequest::parse(Some("NaN"), Some("-99.1"), Some("100")).is_none());
        assert!(NearbyRequest::parse(Some("19.1"), Some("-99.1"), Some("-5")).is_none());
        assert!(NearbyRequest::parse(Some("95"), Some("-99.1"), Some("10")).is_none());
        assert!(NearbyRequest::parse(Some("19.1"), Some("-181"), Some("10")).is_none());
        assert!(NearbyRequest::parse(Some("-90"), Some("180"), Some("10")).is_some());
    }

    #[test]
    fn top_rent_limit_falls_back_to_default() {
        assert_eq!(top_rent_limit(Some("2")), 2);
        assert_eq!(top_rent_limit(None), DEFAULT_TOP_RENT_LIMIT);
        assert_eq!(top_rent_limit(Some("0")), DEFAULT_TOP_RENT_LIMIT);
        assert_eq!(top_rent_limit(Some("-5")), DEFAULT_TOP_RENT_LIMIT);
        assert_eq!(top_rent_limit(Some("ten")), DEFAULT_TOP_RENT_LIMIT);
        assert_eq!(top_rent_limit(Some("2.5")), DEFAULT_TOP_RENT_LIMIT);
    }
}
