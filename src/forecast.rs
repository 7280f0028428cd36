use serde::{Deserialize, Serialize};

// Subset of the Yandex Weather `/v2/forecast` payload that the feed uses.
// Anything not listed here is ignored while decoding.
#[derive(Debug, Deserialize, Serialize)]
pub struct YandexForecastResponse {
    #[serde(default)]
    pub now: Option<i64>,
    pub now_dt: String,
    pub info: YandexInfo,
    pub fact: YandexFact,
    pub geo_object: YandexGeoObject,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct YandexInfo {
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct YandexFact {
    pub temp: i32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct YandexGeoObject {
    pub locality: YandexGeoItem,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct YandexGeoItem {
    pub id: u32,
    pub name: String,
}

/// Normalized forecast, one per successful upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastRecord {
    pub temperature: i32,
    pub observation_timestamp: String,
    pub source_url: String,
    pub locality_name: String,
    pub locality_id: u32,
}

impl From<YandexForecastResponse> for ForecastRecord {
    fn from(item: YandexForecastResponse) -> Self {
        ForecastRecord {
            temperature: item.fact.temp,
            observation_timestamp: item.now_dt,
            source_url: item.info.url,
            locality_name: item.geo_object.locality.name,
            locality_id: item.geo_object.locality.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let body = r#"{
            "now": 1704067200,
            "now_dt": "2024-01-01T00:00:00.000Z",
            "info": {"url": "https://yandex.ru/pogoda/moscow", "lat": 55.75, "lon": 37.62},
            "fact": {"temp": -7, "feels_like": -12, "condition": "snow"},
            "geo_object": {
                "district": null,
                "locality": {"id": 213, "name": "Moscow"},
                "country": {"id": 225, "name": "Russia"}
            },
            "forecasts": []
        }"#;

        let response: YandexForecastResponse = serde_json::from_str(body).unwrap();
        let record = ForecastRecord::from(response);

        assert_eq!(
            record,
            ForecastRecord {
                temperature: -7,
                observation_timestamp: "2024-01-01T00:00:00.000Z".to_string(),
                source_url: "https://yandex.ru/pogoda/moscow".to_string(),
                locality_name: "Moscow".to_string(),
                locality_id: 213,
            }
        );
    }

    #[test]
    fn test_decode_without_epoch_field() {
        let body = r#"{
            "now_dt": "2024-01-01T00:00",
            "info": {"url": "http://example/info"},
            "fact": {"temp": 5},
            "geo_object": {"locality": {"id": 1, "name": "Moscow"}}
        }"#;

        let response: YandexForecastResponse = serde_json::from_str(body).unwrap();
        assert!(response.now.is_none());
        assert_eq!(response.fact.temp, 5);
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let body = r#"{
            "now_dt": "2024-01-01T00:00",
            "info": {"url": "http://example/info"},
            "fact": {"temp": "warm"},
            "geo_object": {"locality": {"id": 1, "name": "Moscow"}}
        }"#;

        assert!(serde_json::from_str::<YandexForecastResponse>(body).is_err());
    }
}
