//! Build tiles from GeoJSON and resolve records against them.

use std::path::Path;
use std::sync::Arc;

use geojson::GeoJson;
use serde_json::{json, Value};

use regionfill::batch::CodeFields;
use regionfill::{
    AdminLevel, BatchOptions, BatchResolver, IncludeCode, SpatialResolver, TileBuilder,
    TileFeature, TileStore,
};

fn square(name: &str, adcode: &str, x0: f64, y0: f64, size: f64) -> Value {
    json!({
        "type": "Feature",
        "properties": {"name": name, "adcode": adcode, "level": 1},
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size], [x0, y0]
            ]]
        }
    })
}

fn collection(features: Vec<Value>) -> GeoJson {
    let value = json!({"type": "FeatureCollection", "features": features});
    GeoJson::from_json_value(value).unwrap()
}

fn parent_code(digits: usize) -> impl Fn(&TileFeature) -> String {
    move |f: &TileFeature| format!("{:0<6}", &f.adcode()[..digits])
}

async fn build_tiles(root: &Path) {
    let provinces = collection(vec![
        square("上海市", "310000", 0.0, 0.0, 10.0),
        square("江苏省", "320000", 10.0, 0.0, 10.0),
    ]);
    TileBuilder::new(root.join("province"), |_: &TileFeature| "000000".to_string())
        .split_geojson(provinces)
        .await
        .unwrap();

    let cities = collection(vec![
        square("上海市", "310100", 0.0, 0.0, 10.0),
        square("南京市", "320100", 10.0, 0.0, 10.0),
    ]);
    TileBuilder::new(root.join("city"), parent_code(2))
        .split_geojson(cities)
        .await
        .unwrap();

    let counties = collection(vec![
        square("X", "310101", 0.0, 0.0, 5.0),
        square("Y", "310104", 5.0, 0.0, 5.0),
        square("玄武区", "320102", 10.0, 0.0, 10.0),
    ]);
    let written = TileBuilder::new(root.join("county"), parent_code(4))
        .split_geojson(counties)
        .await
        .unwrap();
    assert_eq!(written.len(), 2);
}

fn batch(root: &Path, options: BatchOptions) -> BatchResolver {
    let resolver = SpatialResolver::new(root, Arc::new(TileStore::new(true))).unwrap();
    BatchResolver::new(Arc::new(resolver), options)
}

#[tokio::test]
async fn test_split_then_resolve() {
    let tmp = tempfile::tempdir().unwrap();
    build_tiles(tmp.path()).await;

    let options = BatchOptions {
        latlng_field: "loc".to_string(),
        center_point: true,
        concurrency: 3,
        ..Default::default()
    };
    let mut records = vec![
        json!({"id": "a", "loc": "1,1"}),
        json!({"id": "b", "loc": [12.0, 3.0]}),
        json!({"id": "c", "loc": [6.0, 3.0]}),
        json!({"id": "d"}),
    ];

    let summary = batch(tmp.path(), options).run(&mut records, |_| {}).await;

    assert_eq!(records[0]["countryName"], "中华人民共和国");
    assert_eq!(records[0]["provinceName"], "上海市");
    assert_eq!(records[0]["provinceAdcode"], "310000");
    assert_eq!(records[0]["cityAdcode"], "310100");
    assert_eq!(records[0]["countyName"], "X");
    assert_eq!(records[0]["countyAdcode"], "310101");
    assert_eq!(records[0]["countyCenterPoint"], json!([2.5, 2.5]));
    assert!(records[0].get("townName").is_none());

    assert_eq!(records[1]["provinceName"], "江苏省");
    assert_eq!(records[1]["countyName"], "玄武区");
    assert_eq!(records[2]["countyName"], "Y");
    assert_eq!(records[3], json!({"id": "d"}));

    assert_eq!(summary.resolved, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.deepest[&AdminLevel::County], 3);
}

#[tokio::test]
async fn test_known_county_code_takes_fast_path() {
    let tmp = tempfile::tempdir().unwrap();
    build_tiles(tmp.path()).await;

    let options = BatchOptions {
        code_fields: CodeFields {
            county: Some("county".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    // Coordinate lies in X; the record's own code says Y.
    let mut records = vec![json!({"latlng": "1,1", "county": "310104"})];
    batch(tmp.path(), options).run(&mut records, |_| {}).await;

    assert_eq!(records[0]["provinceAdcode"], "310000");
    assert_eq!(records[0]["countyName"], "Y");
}

#[tokio::test]
async fn test_include_pattern_narrows_candidates() {
    let tmp = tempfile::tempdir().unwrap();
    build_tiles(tmp.path()).await;

    let with_pattern = |re: &str| BatchOptions {
        include: IncludeCode::Pattern(regex::Regex::new(re).unwrap()),
        ..Default::default()
    };

    // Once the pattern matches a feature in a tile, only matching features
    // are searched.
    let mut records = vec![json!({"latlng": "1,1"}), json!({"latlng": "15,5"})];
    batch(tmp.path(), with_pattern("^31"))
        .run(&mut records, |_| {})
        .await;
    assert_eq!(records[0]["countyAdcode"], "310101");
    assert_eq!(records[1]["countryAdcode"], "000000");
    assert!(records[1].get("provinceName").is_none());

    // A pattern matching nothing is ignored.
    let mut records = vec![json!({"latlng": "15,5"})];
    batch(tmp.path(), with_pattern("^44"))
        .run(&mut records, |_| {})
        .await;
    assert_eq!(records[0]["countyAdcode"], "320102");
}

#[tokio::test]
async fn test_missing_tile_root_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope");
    let err = SpatialResolver::new(&missing, Arc::new(TileStore::new(true)))
        .err()
        .unwrap();
    assert!(matches!(err, regionfill::Error::MissingTileRoot(_)));
}
