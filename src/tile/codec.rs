//! Binary tile format.
//!
//! A tile is a four byte magic, a version byte, then a gzip stream holding a
//! bincode-encoded [`TileCollection`].

use std::collections::BTreeMap;
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use geo_types::Geometry;
use geojson::feature::Id;
use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const TILE_MAGIC: &[u8; 4] = b"RFTL";
pub const TILE_VERSION: u8 = 2;
pub const TILE_EXTENSION: &str = "tile";

const HEADER_LEN: usize = TILE_MAGIC.len() + 1;

/// A GeoJSON property value in a form bincode can carry.
///
/// Strings are kept as-is; every other JSON value is kept as its JSON text
/// and parsed back on export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Json(String),
}

impl PropertyValue {
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::String(s) => PropertyValue::String(s.clone()),
            other => PropertyValue::Json(other.to_string()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            PropertyValue::String(s) => JsonValue::String(s.clone()),
            PropertyValue::Json(text) => serde_json::from_str(text)
                .unwrap_or_else(|_| JsonValue::String(text.clone())),
        }
    }

    /// Text form used for lookups; `None` for JSON null.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            PropertyValue::Json(text) if text == "null" => None,
            PropertyValue::Json(text) => Some(text),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

/// One region polygon with its GeoJSON properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileFeature {
    pub id: Option<PropertyValue>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub geometry: Geometry<f64>,
    pub bbox: Option<Vec<f64>>,
    /// Foreign members as JSON object text
    pub foreign_members: Option<String>,
}

impl TileFeature {
    pub fn new(
        name: impl Into<String>,
        adcode: impl Into<String>,
        geometry: impl Into<Geometry<f64>>,
    ) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("name".to_string(), PropertyValue::String(name.into()));
        properties.insert("adcode".to_string(), PropertyValue::String(adcode.into()));
        Self {
            id: None,
            properties,
            geometry: geometry.into(),
            bbox: None,
            foreign_members: None,
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }

    pub fn name(&self) -> &str {
        self.property("name").unwrap_or_default()
    }

    pub fn adcode(&self) -> &str {
        self.property("adcode").unwrap_or_default()
    }

    fn from_geojson(index: usize, feature: geojson::Feature) -> Result<Self> {
        let geometry = feature.geometry.ok_or_else(|| Error::Geometry {
            index,
            reason: "missing geometry".to_string(),
        })?;
        let geometry = Geometry::<f64>::try_from(geometry).map_err(|e| Error::Geometry {
            index,
            reason: e.to_string(),
        })?;

        let properties = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, PropertyValue::from_json(&value)))
            .collect();

        let id = feature.id.map(|id| match id {
            Id::String(s) => PropertyValue::String(s),
            Id::Number(n) => PropertyValue::Json(n.to_string()),
        });
        let foreign_members = feature
            .foreign_members
            .map(|members| JsonValue::Object(members).to_string());

        Ok(Self {
            id,
            properties,
            geometry,
            bbox: feature.bbox,
            foreign_members,
        })
    }

    fn to_geojson(&self) -> geojson::Feature {
        let properties: JsonObject = self
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        let id = self.id.as_ref().map(|id| match id.to_json() {
            JsonValue::Number(n) => Id::Number(n),
            JsonValue::String(s) => Id::String(s),
            other => Id::String(other.to_string()),
        });
        let foreign_members = self
            .foreign_members
            .as_deref()
            .and_then(|text| serde_json::from_str::<JsonObject>(text).ok());

        geojson::Feature {
            bbox: self.bbox.clone(),
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&self.geometry))),
            id,
            properties: Some(properties),
            foreign_members,
        }
    }
}

/// The contents of one tile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileCollection {
    pub features: Vec<TileFeature>,
}

impl TileCollection {
    pub fn new(features: Vec<TileFeature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Convert parsed GeoJSON into a collection. Only FeatureCollections are
    /// accepted.
    pub fn from_geojson(geojson: GeoJson) -> Result<Self> {
        match geojson {
            GeoJson::FeatureCollection(fc) => fc
                .features
                .into_iter()
                .enumerate()
                .map(|(i, f)| TileFeature::from_geojson(i, f))
                .collect::<Result<Vec<_>>>()
                .map(Self::new),
            GeoJson::Feature(_) => Err(Error::NotFeatureCollection("Feature")),
            GeoJson::Geometry(_) => Err(Error::NotFeatureCollection("Geometry")),
        }
    }

    pub fn to_geojson(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.features.iter().map(TileFeature::to_geojson).collect(),
            foreign_members: None,
        }
    }
}

/// Encode a collection into tile bytes.
pub fn encode(collection: &TileCollection) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_LEN + 64 * collection.len());
    out.extend_from_slice(TILE_MAGIC);
    out.push(TILE_VERSION);

    let mut encoder = GzEncoder::new(out, Compression::default());
    bincode::serialize_into(&mut encoder, collection)?;
    encoder
        .finish()
        .map_err(|e| Error::Encode(bincode::Error::from(e)))
}

/// Decode tile bytes. `path` is only used for error reporting.
pub fn decode(path: &Path, bytes: &[u8]) -> Result<TileCollection> {
    if bytes.len() < HEADER_LEN || &bytes[..TILE_MAGIC.len()] != TILE_MAGIC {
        return Err(Error::BadTileHeader {
            path: path.to_path_buf(),
        });
    }
    let version = bytes[TILE_MAGIC.len()];
    if version != TILE_VERSION {
        return Err(Error::UnsupportedTileVersion {
            path: path.to_path_buf(),
            version,
        });
    }

    bincode::deserialize_from(GzDecoder::new(&bytes[HEADER_LEN..])).map_err(|source| {
        Error::Decode {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Read and decode a tile file.
pub async fn read_tile(path: &Path) -> Result<TileCollection> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || decode(&owned, &bytes))
        .await
        .map_err(|e| Error::io(path, std::io::Error::other(e)))?
}

/// Encode and write a tile file, replacing any existing file.
pub async fn write_tile(path: &Path, collection: &TileCollection) -> Result<()> {
    let bytes = encode(collection)?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn square(x: f64, y: f64) -> geo_types::Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + 1.0, y: y),
            (x: x + 1.0, y: y + 1.0),
            (x: x, y: y + 1.0),
            (x: x, y: y),
        ]
    }

    #[test]
    fn test_encode_decode() {
        let collection = TileCollection::new(vec![
            TileFeature::new("A", "310101", square(0.0, 0.0)),
            TileFeature::new("B", "310102", square(1.0, 0.0)),
        ]);
        let bytes = encode(&collection).unwrap();
        assert_eq!(&bytes[..4], TILE_MAGIC);

        let decoded = decode(Path::new("mem.tile"), &bytes).unwrap();
        assert_eq!(decoded, collection);
        assert_eq!(decoded.features[1].name(), "B");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode(Path::new("x.tile"), b"not a tile").unwrap_err();
        assert!(matches!(err, Error::BadTileHeader { .. }));

        let mut bytes = encode(&TileCollection::default()).unwrap();
        bytes[4] = 9;
        let err = decode(Path::new("x.tile"), &bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTileVersion { version: 9, .. }));

        let mut bytes = encode(&TileCollection::default()).unwrap();
        bytes.truncate(HEADER_LEN + 3);
        let err = decode(Path::new("x.tile"), &bytes).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_from_geojson_properties() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"name": "X", "adcode": 310101, "extra": null},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}
            }]
        }"#;
        let collection = TileCollection::from_geojson(raw.parse().unwrap()).unwrap();
        let feature = &collection.features[0];
        assert_eq!(feature.adcode(), "310101");
        assert_eq!(feature.name(), "X");
        assert!(feature.property("extra").is_none());

        let back = collection.to_geojson();
        assert_eq!(back.features.len(), 1);
    }

    #[test]
    fn test_geojson_survives_tile_encoding() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "id": 7,
                "bbox": [0.0, 0.0, 1.0, 1.0],
                "source": "survey",
                "properties": {
                    "name": "X",
                    "adcode": "310101",
                    "level": 1,
                    "area": 2.5,
                    "capital": false,
                    "meta": {"a": true, "tags": [1, "b"]},
                    "extra": null
                },
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}
            }, {
                "type": "Feature",
                "id": "y",
                "properties": {"name": "Y", "adcode": 310102},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}
            }]
        }"#;
        let original: GeoJson = raw.parse().unwrap();
        let GeoJson::FeatureCollection(expected) = original.clone() else {
            unreachable!()
        };

        let collection = TileCollection::from_geojson(original).unwrap();
        let bytes = encode(&collection).unwrap();
        let decoded = decode(Path::new("mem.tile"), &bytes).unwrap();
        assert_eq!(decoded.features[1].adcode(), "310102");

        let back = decoded.to_geojson();
        for (got, want) in back.features.iter().zip(&expected.features) {
            assert_eq!(got.properties, want.properties);
            assert_eq!(got.id, want.id);
            assert_eq!(got.bbox, want.bbox);
            assert_eq!(got.foreign_members, want.foreign_members);
        }
        let first = back.features[0].properties.as_ref().unwrap();
        assert_eq!(first["level"], serde_json::json!(1));
        assert_eq!(first["meta"]["a"], serde_json::json!(true));
        assert_eq!(back.features[0].id, Some(Id::Number(7.into())));
    }

    #[test]
    fn test_from_geojson_rejects_single_feature() {
        let raw = r#"{"type": "Feature", "properties": {}, "geometry": null}"#;
        let err = TileCollection::from_geojson(raw.parse().unwrap()).unwrap_err();
        assert!(matches!(err, Error::NotFeatureCollection("Feature")));
    }
}
