//! Soil-property lookup for the soil carbon calculator.
//!
//! Queries organic carbon and bulk density for a coordinate and depth band.
//! The lookup never fails from the caller's point of view:
//! [`lookup_or_fallback`] substitutes reference defaults and returns a
//! warning whenever the provider errors or answers with missing fields.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use soc_core::{SoilSample, ValidationError};
use thiserror::Error;

/// Default request timeout for lookups.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// ISRIC SoilGrids v2 point query endpoint.
pub const SOILGRIDS_URL: &str = "https://rest.isric.org/soilgrids/v2.0/properties/query";

/// Organic carbon used when the lookup fails, percent.
pub const FALLBACK_ORGANIC_CARBON_PCT: f64 = 1.2;
/// Bulk density used when the lookup fails, g/cm³.
pub const FALLBACK_BULK_DENSITY: f64 = 1.3;

/// Standard SoilGrids depth bands, cm.
const STANDARD_BANDS: [(u32, u32); 6] = [(0, 5), (5, 15), (15, 30), (30, 60), (60, 100), (100, 200)];
const MAX_DEPTH_CM: u32 = 200;

const ORGANIC_CARBON_LAYER: &str = "soc";
const BULK_DENSITY_LAYER: &str = "bdod";

/// Lookup errors.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Coordinates or depth band out of range.
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Service returned a non-success status.
    #[error("soil service error: status {status}: {message}")]
    Api { status: u16, message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The response lacks a value for a requested layer.
    #[error("missing {property} value for {depth}")]
    MissingValue { property: &'static str, depth: String },
}

/// A depth band in whole centimetres, `top < bottom <= 200`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthRange {
    top_cm: u32,
    bottom_cm: u32,
}

impl DepthRange {
    /// The topsoil band used by default.
    pub const TOPSOIL: Self = Self {
        top_cm: 0,
        bottom_cm: 30,
    };

    pub fn new(top_cm: u32, bottom_cm: u32) -> Result<Self, LookupError> {
        if top_cm >= bottom_cm || bottom_cm > MAX_DEPTH_CM {
            return Err(LookupError::InvalidQuery {
                reason: format!("depth band {top_cm}-{bottom_cm}cm must satisfy top < bottom <= {MAX_DEPTH_CM}"),
            });
        }
        Ok(Self { top_cm, bottom_cm })
    }

    pub const fn top_cm(self) -> u32 {
        self.top_cm
    }

    pub const fn bottom_cm(self) -> u32 {
        self.bottom_cm
    }

    /// Thickness of the band, cm.
    pub fn thickness_cm(self) -> f64 {
        f64::from(self.bottom_cm - self.top_cm)
    }

    /// Centimetres shared with `[top, bottom)`.
    fn overlap(self, top: u32, bottom: u32) -> u32 {
        self.bottom_cm.min(bottom).saturating_sub(self.top_cm.max(top))
    }

    /// Labels of the standard bands intersecting this range.
    fn standard_labels(self) -> Vec<String> {
        STANDARD_BANDS
            .iter()
            .filter(|(top, bottom)| self.overlap(*top, *bottom) > 0)
            .map(|(top, bottom)| format!("{top}-{bottom}cm"))
            .collect()
    }
}

impl Default for DepthRange {
    fn default() -> Self {
        Self::TOPSOIL
    }
}

impl fmt::Display for DepthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}cm", self.top_cm, self.bottom_cm)
    }
}

/// A point query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub depth: DepthRange,
}

impl SoilQuery {
    pub fn new(latitude: f64, longitude: f64, depth: DepthRange) -> Result<Self, LookupError> {
        if latitude.is_nan() || !(-90.0..=90.0).contains(&latitude) {
            return Err(LookupError::InvalidQuery {
                reason: format!("latitude {latitude} must be within -90..=90"),
            });
        }
        if longitude.is_nan() || !(-180.0..=180.0).contains(&longitude) {
            return Err(LookupError::InvalidQuery {
                reason: format!("longitude {longitude} must be within -180..=180"),
            });
        }
        Ok(Self {
            latitude,
            longitude,
            depth,
        })
    }
}

/// Soil properties averaged over a depth band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilProperties {
    /// Organic carbon, percent of dry mass.
    pub organic_carbon_pct: f64,
    /// Bulk density, g/cm³.
    pub bulk_density_g_cm3: f64,
}

impl SoilProperties {
    /// Reference defaults used when no lookup is available.
    pub const FALLBACK: Self = Self {
        organic_carbon_pct: FALLBACK_ORGANIC_CARBON_PCT,
        bulk_density_g_cm3: FALLBACK_BULK_DENSITY,
    };

    /// Rejects values the stock estimate cannot use.
    fn checked(self) -> Result<Self, LookupError> {
        self.sample(DepthRange::TOPSOIL)
            .map_err(|err| LookupError::InvalidResponse(err.to_string()))?;
        Ok(self)
    }

    /// Builds a stock-estimate sample over the thickness of `depth`.
    pub fn sample(&self, depth: DepthRange) -> Result<SoilSample, ValidationError> {
        SoilSample::new(
            self.organic_carbon_pct,
            self.bulk_density_g_cm3,
            depth.thickness_cm(),
        )
    }
}

/// Outcome of a lookup with fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilLookup {
    pub properties: SoilProperties,
    /// Set when the fallback defaults were substituted.
    pub warning: Option<String>,
}

impl SoilLookup {
    pub const fn is_fallback(&self) -> bool {
        self.warning.is_some()
    }
}

/// Source of soil properties.
pub trait SoilPropertyProvider {
    fn fetch(
        &self,
        query: &SoilQuery,
    ) -> impl Future<Output = Result<SoilProperties, LookupError>> + Send;
}

/// Queries `provider`, substituting reference defaults on any failure.
pub async fn lookup_or_fallback<P: SoilPropertyProvider>(
    provider: &P,
    query: &SoilQuery,
) -> SoilLookup {
    match provider.fetch(query).await.and_then(SoilProperties::checked) {
        Ok(properties) => {
            tracing::debug!(
                organic_carbon_pct = properties.organic_carbon_pct,
                bulk_density = properties.bulk_density_g_cm3,
                "soil lookup succeeded"
            );
            SoilLookup {
                properties,
                warning: None,
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "soil lookup failed, using reference defaults");
            SoilLookup {
                properties: SoilProperties::FALLBACK,
                warning: Some(format!(
                    "soil lookup failed ({err}); using reference defaults \
                     (organic carbon {FALLBACK_ORGANIC_CARBON_PCT}%, bulk density {FALLBACK_BULK_DENSITY} g/cm³)"
                )),
            }
        }
    }
}

/// SoilGrids REST client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Debug, Clone)]
pub struct SoilGridsClient {
    http: reqwest::Client,
    base_url: String,
}

impl SoilGridsClient {
    /// Creates a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is blank or the HTTP client fails to build.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(LookupError::InvalidQuery {
                reason: "soil service URL cannot be empty".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LookupError::ClientBuild)?;

        Ok(Self { http, base_url })
    }

    fn query_params(query: &SoilQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("lon", query.longitude.to_string()),
            ("lat", query.latitude.to_string()),
            ("property", ORGANIC_CARBON_LAYER.to_string()),
            ("property", BULK_DENSITY_LAYER.to_string()),
        ];
        for label in query.depth.standard_labels() {
            params.push(("depth", label));
        }
        params.push(("value", "mean".to_string()));
        params
    }
}

impl SoilPropertyProvider for SoilGridsClient {
    async fn fetch(&self, query: &SoilQuery) -> Result<SoilProperties, LookupError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&Self::query_params(query))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LookupError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        parse_response(&body, query.depth)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    properties: ResponseProperties,
}

#[derive(Debug, Deserialize)]
struct ResponseProperties {
    layers: Vec<Layer>,
}

#[derive(Debug, Deserialize)]
struct Layer {
    name: String,
    unit_measure: UnitMeasure,
    depths: Vec<LayerDepth>,
}

#[derive(Debug, Deserialize)]
struct UnitMeasure {
    d_factor: f64,
}

#[derive(Debug, Deserialize)]
struct LayerDepth {
    label: String,
    range: DepthBounds,
    values: DepthValues,
}

#[derive(Debug, Deserialize)]
struct DepthBounds {
    top_depth: u32,
    bottom_depth: u32,
}

#[derive(Debug, Deserialize)]
struct DepthValues {
    mean: Option<f64>,
}

/// Parses a SoilGrids answer into properties averaged over `depth`.
fn parse_response(body: &str, depth: DepthRange) -> Result<SoilProperties, LookupError> {
    let payload: QueryResponse =
        serde_json::from_str(body).map_err(|err| LookupError::InvalidResponse(err.to_string()))?;
    let layers = payload.properties.layers;

    // soc is dg/kg after d_factor scaling to g/kg; percent = g/kg / 10
    let soc_g_per_kg = weighted_mean(&layers, ORGANIC_CARBON_LAYER, depth)?;
    // bdod is cg/cm³; after d_factor scaling it is kg/dm³ == g/cm³
    let bulk_density = weighted_mean(&layers, BULK_DENSITY_LAYER, depth)?;

    SoilProperties {
        organic_carbon_pct: soc_g_per_kg / 10.0,
        bulk_density_g_cm3: bulk_density,
    }
    .checked()
}

/// Thickness-weighted mean of a layer's values over `depth`.
fn weighted_mean(
    layers: &[Layer],
    property: &'static str,
    depth: DepthRange,
) -> Result<f64, LookupError> {
    let missing = || LookupError::MissingValue {
        property,
        depth: depth.to_string(),
    };
    let layer = layers
        .iter()
        .find(|layer| layer.name == property)
        .ok_or_else(missing)?;
    let d_factor = layer.unit_measure.d_factor;
    if !d_factor.is_finite() || d_factor <= 0.0 {
        return Err(LookupError::InvalidResponse(format!(
            "invalid d_factor {d_factor} for {property}"
        )));
    }

    let mut weighted = 0.0;
    let mut covered = 0_u32;
    for band in &layer.depths {
        let overlap = depth.overlap(band.range.top_depth, band.range.bottom_depth);
        if overlap == 0 {
            continue;
        }
        let value = band.values.mean.ok_or_else(|| LookupError::MissingValue {
            property,
            depth: band.label.clone(),
        })?;
        weighted += value / d_factor * f64::from(overlap);
        covered += overlap;
    }
    if covered == 0 {
        return Err(missing());
    }
    Ok(weighted / f64::from(covered))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [11.34, 44.49]},
        "properties": {
            "layers": [
                {
                    "name": "bdod",
                    "unit_measure": {"d_factor": 100, "mapped_units": "cg/cm³", "target_units": "kg/dm³"},
                    "depths": [
                        {"range": {"top_depth": 0, "bottom_depth": 5, "unit_depth": "cm"}, "label": "0-5cm", "values": {"mean": 125}},
                        {"range": {"top_depth": 5, "bottom_depth": 15, "unit_depth": "cm"}, "label": "5-15cm", "values": {"mean": 130}},
                        {"range": {"top_depth": 15, "bottom_depth": 30, "unit_depth": "cm"}, "label": "15-30cm", "values": {"mean": 135}}
                    ]
                },
                {
                    "name": "soc",
                    "unit_measure": {"d_factor": 10, "mapped_units": "dg/kg", "target_units": "g/kg"},
                    "depths": [
                        {"range": {"top_depth": 0, "bottom_depth": 5, "unit_depth": "cm"}, "label": "0-5cm", "values": {"mean": 150}},
                        {"range": {"top_depth": 5, "bottom_depth": 15, "unit_depth": "cm"}, "label": "5-15cm", "values": {"mean": 120}},
                        {"range": {"top_depth": 15, "bottom_depth": 30, "unit_depth": "cm"}, "label": "15-30cm", "values": {"mean": 100}}
                    ]
                }
            ]
        }
    }"#;

    struct Fixed(SoilProperties);

    impl SoilPropertyProvider for Fixed {
        async fn fetch(&self, _query: &SoilQuery) -> Result<SoilProperties, LookupError> {
            Ok(self.0)
        }
    }

    struct Failing;

    impl SoilPropertyProvider for Failing {
        async fn fetch(&self, _query: &SoilQuery) -> Result<SoilProperties, LookupError> {
            Err(LookupError::Api {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    fn query() -> SoilQuery {
        SoilQuery::new(44.49, 11.34, DepthRange::TOPSOIL).unwrap()
    }

    #[test]
    fn parse_response_weights_bands_by_thickness() {
        let props = parse_response(RESPONSE, DepthRange::TOPSOIL).unwrap();
        // (15*5 + 12*10 + 10*15) / 30 g/kg
        assert!((props.organic_carbon_pct - 1.15).abs() < 1e-12);
        // (1.25*5 + 1.30*10 + 1.35*15) / 30
        assert!((props.bulk_density_g_cm3 - 39.5 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn parse_response_handles_partial_band_overlap() {
        let props = parse_response(RESPONSE, DepthRange::new(10, 20).unwrap()).unwrap();
        assert!((props.organic_carbon_pct - 1.1).abs() < 1e-12);
    }

    #[test]
    fn parse_response_reports_missing_values() {
        let body = RESPONSE.replace(r#""mean": 120"#, r#""mean": null"#);
        assert!(matches!(
            parse_response(&body, DepthRange::TOPSOIL),
            Err(LookupError::MissingValue { property: "soc", .. })
        ));
    }

    #[test]
    fn parse_response_reports_uncovered_depth() {
        assert!(matches!(
            parse_response(RESPONSE, DepthRange::new(30, 60).unwrap()),
            Err(LookupError::MissingValue { .. })
        ));
    }

    #[test]
    fn parse_response_rejects_out_of_range_values() {
        // 3500 cg/cm³ is 35 g/cm³
        let body = RESPONSE.replace(r#""mean": 130"#, r#""mean": 3500"#);
        assert!(matches!(
            parse_response(&body, DepthRange::TOPSOIL),
            Err(LookupError::InvalidResponse(msg)) if msg.contains("bulk density")
        ));
    }

    #[tokio::test]
    async fn out_of_range_properties_fall_back() {
        let props = SoilProperties {
            organic_carbon_pct: 140.0,
            bulk_density_g_cm3: 1.4,
        };
        let lookup = lookup_or_fallback(&Fixed(props), &query()).await;
        assert_eq!(lookup.properties, SoilProperties::FALLBACK);
        assert!(lookup.warning.unwrap().contains("got 140"));
    }

    #[test]
    fn parse_response_rejects_invalid_json() {
        assert!(matches!(
            parse_response("not-json", DepthRange::TOPSOIL),
            Err(LookupError::InvalidResponse(_))
        ));
    }

    #[test]
    fn query_validates_coordinates() {
        assert!(SoilQuery::new(91.0, 0.0, DepthRange::TOPSOIL).is_err());
        assert!(SoilQuery::new(0.0, -181.0, DepthRange::TOPSOIL).is_err());
        assert!(SoilQuery::new(f64::NAN, 0.0, DepthRange::TOPSOIL).is_err());
    }

    #[test]
    fn depth_range_validates_and_labels() {
        assert!(DepthRange::new(30, 30).is_err());
        assert!(DepthRange::new(0, 250).is_err());
        let range = DepthRange::new(10, 40).unwrap();
        assert_eq!(range.to_string(), "10-40cm");
        assert_eq!(range.standard_labels(), ["5-15cm", "15-30cm", "30-60cm"]);
        assert_eq!(range.thickness_cm(), 30.0);
    }

    #[test]
    fn query_params_list_every_band() {
        let params = SoilGridsClient::query_params(&query());
        let depths: Vec<_> = params
            .iter()
            .filter(|(key, _)| *key == "depth")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(depths, ["0-5cm", "5-15cm", "15-30cm"]);
        assert!(params.contains(&("property", "soc".to_string())));
        assert!(params.contains(&("property", "bdod".to_string())));
    }

    #[test]
    fn client_rejects_blank_url() {
        assert!(matches!(
            SoilGridsClient::new("  ", DEFAULT_TIMEOUT),
            Err(LookupError::InvalidQuery { .. })
        ));
        assert!(SoilGridsClient::new(SOILGRIDS_URL, DEFAULT_TIMEOUT).is_ok());
    }

    #[test]
    fn fallback_properties_give_reference_stock() {
        let sample = SoilProperties::FALLBACK.sample(DepthRange::TOPSOIL).unwrap();
        let stock = soc_core::soil_stock(&sample, 1.0).unwrap();
        assert!((stock.stock_c_t_per_ha - 4.68).abs() < 1e-9);
    }

    #[tokio::test]
    async fn successful_lookup_has_no_warning() {
        let props = SoilProperties {
            organic_carbon_pct: 2.1,
            bulk_density_g_cm3: 1.4,
        };
        let lookup = lookup_or_fallback(&Fixed(props), &query()).await;
        assert_eq!(lookup.properties, props);
        assert!(!lookup.is_fallback());
    }

    #[tokio::test]
    async fn failed_lookup_falls_back_with_warning() {
        let lookup = lookup_or_fallback(&Failing, &query()).await;
        assert_eq!(lookup.properties, SoilProperties::FALLBACK);
        let warning = lookup.warning.unwrap();
        assert!(warning.contains("status 503"));
        assert!(warning.contains("1.2%"));
    }
}
