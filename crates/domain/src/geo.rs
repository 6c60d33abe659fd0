//! 地理坐标与距离计算
//!
//! 坐标顺序沿用 GeoJSON 约定：`[longitude, latitude]`。

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// 地球平均半径（米）
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// 发现附近用户的默认最大距离
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 5.0;

/// 判定"擦肩而过"的固定半径
pub const CROSSING_RADIUS_METERS: f64 = 100.0;

/// 最近一次位置上报在该时长内的用户视为在线
pub const LIVE_WINDOW_MINUTES: i64 = 10;

/// 经纬度坐标点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "GeoJsonPoint", try_from = "GeoJsonPoint")]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, DomainError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::invalid_argument(
                "longitude",
                "must be between -180 and 180",
            ));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(DomainError::invalid_argument(
                "latitude",
                "must be between -90 and 90",
            ));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// 从 `[longitude, latitude]` 数组解析，必须恰好两个值
    pub fn from_coordinates(coordinates: &[f64]) -> Result<Self, DomainError> {
        match coordinates {
            [longitude, latitude] => Self::new(*longitude, *latitude),
            _ => Err(DomainError::invalid_argument(
                "coordinates",
                "expected exactly [longitude, latitude]",
            )),
        }
    }

    pub fn coordinates(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// 半正矢公式计算的大圆距离（米）
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lng = (other.longitude - self.longitude).to_radians();

        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
    }
}

/// GeoJSON `Point` 的序列化形式
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<f64>,
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: point.coordinates().to_vec(),
        }
    }
}

impl TryFrom<GeoJsonPoint> for GeoPoint {
    type Error = DomainError;

    fn try_from(value: GeoJsonPoint) -> Result<Self, Self::Error> {
        if value.kind != "Point" {
            return Err(DomainError::invalid_argument("type", "expected Point"));
        }
        GeoPoint::from_coordinates(&value.coordinates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_coordinate_count() {
        assert!(GeoPoint::from_coordinates(&[10.0]).is_err());
        assert!(GeoPoint::from_coordinates(&[10.0, 20.0, 30.0]).is_err());
        assert!(GeoPoint::from_coordinates(&[]).is_err());
        assert!(GeoPoint::from_coordinates(&[10.0, 20.0]).is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(GeoPoint::new(181.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -90.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn nearby_points_are_within_crossing_radius() {
        let a = GeoPoint::new(10.0, 20.0).unwrap();
        let b = GeoPoint::new(10.0005, 20.0005).unwrap();

        let distance = a.distance_meters(&b);
        assert!(distance > 50.0 && distance < CROSSING_RADIUS_METERS, "{distance}");
        assert!((distance - b.distance_meters(&a)).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = GeoPoint::new(0.0, 0.0).unwrap();
        let b = GeoPoint::new(0.0, 1.0).unwrap();
        let km = a.distance_meters(&b) / 1000.0;
        assert!((km - 111.19).abs() < 0.1, "{km}");
    }

    #[test]
    fn serializes_as_geojson_point() {
        let point = GeoPoint::new(10.5, -3.25).unwrap();
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["type"], "Point");
        assert_eq!(json["coordinates"], serde_json::json!([10.5, -3.25]));

        let back: GeoPoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, point);
    }
}
