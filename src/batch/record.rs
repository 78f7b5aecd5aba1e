//! Reading coordinates and adcodes out of loosely-typed input records.

use geo::Coord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Names of the record fields that may carry a known adcode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFields {
    pub province: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
}

impl CodeFields {
    /// The most specific configured field that holds a non-empty code.
    pub fn known_code(&self, record: &Map<String, Value>) -> Option<String> {
        [
            &self.village,
            &self.town,
            &self.county,
            &self.city,
            &self.province,
        ]
        .into_iter()
        .flatten()
        .find_map(|field| code_value(record.get(field)?))
    }
}

fn code_value(value: &Value) -> Option<String> {
    let code = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!code.is_empty()).then_some(code)
}

/// Parse a coordinate field: either `"lng,lat"` or `[lng, lat]`.
pub fn parse_coordinate(value: &Value) -> Result<Coord<f64>> {
    let parts: Vec<f64> = match value {
        Value::String(s) => s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| Error::InvalidCoordinate(s.clone()))?,
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect::<Option<_>>()
            .ok_or_else(|| Error::InvalidCoordinate(value.to_string()))?,
        other => return Err(Error::InvalidCoordinate(other.to_string())),
    };

    match parts.as_slice() {
        [x, y] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
        _ => Err(Error::InvalidCoordinate(value.to_string())),
    }
}

/// A record's coordinate field is "absent" when missing, null, or empty.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        _ => false,
    }
}

/// GeoJSON point geometry for the output record.
pub fn point_geometry(c: Coord<f64>) -> Value {
    serde_json::json!({
        "type": "Point",
        "coordinates": [c.x, c.y],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_string_and_array() {
        let c = parse_coordinate(&json!("121.47, 31.23")).unwrap();
        assert_eq!((c.x, c.y), (121.47, 31.23));

        let c = parse_coordinate(&json!([116.3, 39.9])).unwrap();
        assert_eq!((c.x, c.y), (116.3, 39.9));

        let c = parse_coordinate(&json!(["116.3", "39.9"])).unwrap();
        assert_eq!((c.x, c.y), (116.3, 39.9));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        for bad in [json!("121.47"), json!("a,b"), json!([1.0, 2.0, 3.0]), json!({"x": 1}), json!(true)] {
            assert!(parse_coordinate(&bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_known_code_prefers_most_specific() {
        let fields = CodeFields {
            county: Some("county_code".to_string()),
            town: Some("town_code".to_string()),
            village: Some("village_code".to_string()),
            ..Default::default()
        };

        let record = json!({"county_code": "310101", "town_code": 310101001, "village_code": ""});
        let record = record.as_object().unwrap();
        assert_eq!(fields.known_code(record).as_deref(), Some("310101001"));

        let record = json!({"county_code": "310101"});
        assert_eq!(
            fields.known_code(record.as_object().unwrap()).as_deref(),
            Some("310101")
        );

        let record = json!({"other": "1"});
        assert_eq!(fields.known_code(record.as_object().unwrap()), None);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&json!(null))));
        assert!(is_blank(Some(&json!(" "))));
        assert!(!is_blank(Some(&json!("1,2"))));
    }
}
