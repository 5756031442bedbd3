#![allow(clippy::float_cmp)]

use super::*;

#[test]
fn default_matches_consts() {
    let c = EngineConfig::default();
    assert_eq!(c.min_zoom, 0.1);
    assert_eq!(c.max_zoom, 10.0);
    assert_eq!(c.tap_slop_px, 8.0);
    assert_eq!(c.tap_max_ms, 300.0);
    assert_eq!(c.min_shape_size, 5.0);
    assert_eq!(c.default_layer_opacity, 70.0);
    assert_eq!(c.image_base_path, "/data/drawings/");
    assert_eq!(c.site_map_id, "00");
}

#[test]
fn default_is_valid() {
    assert!(EngineConfig::default().validate().is_ok());
}

#[test]
fn from_json_empty_object_is_default() {
    let c = EngineConfig::from_json("{}");
    assert!(matches!(c, Ok(ref c) if *c == EngineConfig::default()));
}

#[test]
fn from_json_partial_overrides_only_given_fields() {
    let Ok(c) = EngineConfig::from_json(r#"{"maxZoom": 4, "siteMapId": "root"}"#) else {
        panic!("expected config to parse");
    };
    assert_eq!(c.max_zoom, 4.0);
    assert_eq!(c.site_map_id, "root");
    assert_eq!(c.min_zoom, 0.1);
}

#[test]
fn from_json_malformed_is_json_error() {
    assert!(matches!(EngineConfig::from_json("{not json"), Err(ConfigError::Json(_))));
}

#[test]
fn from_json_rejects_inverted_zoom_bounds() {
    let r = EngineConfig::from_json(r#"{"minZoom": 5, "maxZoom": 2}"#);
    assert!(matches!(r, Err(ConfigError::Invalid(_))));
}

#[test]
fn from_json_rejects_non_positive_min_zoom() {
    let r = EngineConfig::from_json(r#"{"minZoom": 0}"#);
    assert!(matches!(r, Err(ConfigError::Invalid(_))));
}

#[test]
fn from_json_rejects_out_of_range_opacity() {
    let r = EngineConfig::from_json(r#"{"defaultLayerOpacity": 140}"#);
    assert!(matches!(r, Err(ConfigError::Invalid(_))));
}
