use anyhow::{Result, bail};
use courtside_models::NewCourt;
use serde::{Deserialize, Serialize};
use tracing::info;

const NEARBY_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
const DEFAULT_KEYWORD: &str = "basketball court";
const DEFAULT_RADIUS_METERS: u32 = 5_000;

// --- Google Places API response types ---

#[derive(Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<ApiPlace>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct ApiPlace {
    place_id: String,
    name: String,
    vicinity: Option<String>,
    geometry: Geometry,
    rating: Option<f64>,
    #[serde(default)]
    photos: Vec<Photo>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct Photo {
    photo_reference: String,
}

// --- Public types ---

/// A nearby place as returned to clients. Nothing is persisted until it is
/// turned into a court with find-or-create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: Option<f64>,
    pub photo_refs: Vec<String>,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbySearch {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: Option<u32>,
    pub keyword: Option<String>,
}

// --- Conversion ---

impl From<ApiPlace> for Place {
    fn from(p: ApiPlace) -> Self {
        Place {
            place_id: p.place_id,
            name: p.name,
            address: p.vicinity.unwrap_or_default(),
            latitude: p.geometry.location.lat,
            longitude: p.geometry.location.lng,
            rating: p.rating,
            photo_refs: p.photos.into_iter().map(|ph| ph.photo_reference).collect(),
            types: p.types,
        }
    }
}

impl From<Place> for NewCourt {
    fn from(p: Place) -> Self {
        let court_type = if p.types.iter().any(|t| t == "gym") { "indoor" } else { "outdoor" };
        NewCourt {
            place_id: Some(p.place_id),
            description: Some(p.name.clone()),
            name: Some(p.name),
            latitude: Some(p.latitude),
            longitude: Some(p.longitude),
            address: Some(p.address),
            court_type: Some(court_type.to_string()),
            images: p.photo_refs,
            rating: p.rating,
            ..Default::default()
        }
    }
}

// --- Public API ---

pub struct PlacesClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl PlacesClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, NEARBY_SEARCH_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub async fn nearby(&self, search: &NearbySearch) -> Result<Vec<Place>> {
        let radius = search.radius_meters.unwrap_or(DEFAULT_RADIUS_METERS);
        let keyword = search.keyword.as_deref().unwrap_or(DEFAULT_KEYWORD);
        info!(
            lat = search.latitude,
            lng = search.longitude,
            radius,
            keyword,
            "Searching nearby places"
        );

        let location = format!("{},{}", search.latitude, search.longitude);
        let radius = radius.to_string();
        let resp: NearbyResponse = self
            .http
            .get(&self.base_url)
            .query(&[
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("keyword", keyword),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let places = parse_response(resp)?;
        info!("Found {} places", places.len());
        Ok(places)
    }
}

fn parse_response(resp: NearbyResponse) -> Result<Vec<Place>> {
    match resp.status.as_str() {
        "OK" | "ZERO_RESULTS" => Ok(resp.results.into_iter().map(Place::from).collect()),
        status => bail!(
            "places search failed: {status}{}",
            resp.error_message.map(|m| format!(" ({m})")).unwrap_or_default()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "status": "OK",
        "results": [
            {
                "place_id": "ChIJ-mosswood",
                "name": "Mosswood Park",
                "vicinity": "3612 Webster St, Oakland",
                "geometry": { "location": { "lat": 37.8249, "lng": -122.2597 } },
                "rating": 4.4,
                "photos": [{ "photo_reference": "ref-a", "height": 100, "width": 100 }],
                "types": ["park", "point_of_interest"]
            },
            {
                "place_id": "ChIJ-ymca",
                "name": "Downtown YMCA",
                "geometry": { "location": { "lat": 37.80, "lng": -122.27 } },
                "types": ["gym"]
            }
        ]
    }"#;

    #[test]
    fn parses_nearby_results() {
        let resp: NearbyResponse = serde_json::from_str(SAMPLE).unwrap();
        let places = parse_response(resp).unwrap();

        assert_eq!(places.len(), 2);
        assert_eq!(places[0].address, "3612 Webster St, Oakland");
        assert_eq!(places[0].photo_refs, vec!["ref-a"]);
        assert_eq!(places[1].address, "");
        assert_eq!(places[1].rating, None);
    }

    #[test]
    fn place_becomes_court_input() {
        let resp: NearbyResponse = serde_json::from_str(SAMPLE).unwrap();
        let mut places = parse_response(resp).unwrap();

        let gym = NewCourt::from(places.pop().unwrap());
        assert_eq!(gym.court_type.as_deref(), Some("indoor"));

        let park = NewCourt::from(places.pop().unwrap());
        assert_eq!(park.place_id.as_deref(), Some("ChIJ-mosswood"));
        assert_eq!(park.description.as_deref(), Some("Mosswood Park"));
        assert_eq!(park.court_type.as_deref(), Some("outdoor"));
        assert_eq!(park.images, vec!["ref-a"]);
    }

    #[test]
    fn provider_errors_surface() {
        let resp: NearbyResponse = serde_json::from_str(
            r#"{"status": "REQUEST_DENIED", "results": [], "error_message": "bad key"}"#,
        )
        .unwrap();
        let err = parse_response(resp).unwrap_err();
        assert_eq!(err.to_string(), "places search failed: REQUEST_DENIED (bad key)");
    }
}
