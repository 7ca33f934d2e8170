//! WMO weather-code classification.

use crate::types::RainCategory;

/// Human-readable description and rain tier for a weather code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherClass {
    pub description: &'static str,
    pub rain_category: RainCategory,
}

const UNKNOWN: WeatherClass = WeatherClass {
    description: "Unknown",
    rain_category: RainCategory::None,
};

// Descriptions are in Indonesian, matching the condition labels.
const CODES: &[(i32, &str, RainCategory)] = &[
    (0, "Cerah", RainCategory::None),
    (1, "Cerah Sebagian", RainCategory::None),
    (2, "Berawan Sebagian", RainCategory::None),
    (3, "Mendung", RainCategory::None),
    (45, "Kabut", RainCategory::None),
    (48, "Kabut Tebal", RainCategory::None),
    (51, "Gerimis Ringan", RainCategory::Light),
    (53, "Gerimis Sedang", RainCategory::Light),
    (55, "Gerimis Lebat", RainCategory::Moderate),
    (61, "Hujan Ringan", RainCategory::Light),
    (63, "Hujan Sedang", RainCategory::Moderate),
    (65, "Hujan Lebat", RainCategory::Heavy),
    (66, "Hujan Es Ringan", RainCategory::Moderate),
    (67, "Hujan Es Lebat", RainCategory::Heavy),
    (71, "Salju Ringan", RainCategory::Light),
    (73, "Salju Sedang", RainCategory::Moderate),
    (75, "Salju Lebat", RainCategory::Heavy),
    (80, "Hujan Singkat", RainCategory::Light),
    (81, "Hujan Singkat Sedang", RainCategory::Moderate),
    (82, "Hujan Singkat Lebat", RainCategory::Heavy),
    (95, "Petir", RainCategory::Extreme),
    (96, "Petir + Es", RainCategory::Extreme),
    (99, "Petir + Es Lebat", RainCategory::Extreme),
];

/// Classify a weather code. Codes outside the table are "Unknown"/none.
pub fn classify(code: i32) -> WeatherClass {
    CODES
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|&(_, description, rain_category)| WeatherClass { description, rain_category })
        .unwrap_or(UNKNOWN)
}

/// A representative code for a rain tier, used when weather is
/// synthesized from a category rather than observed.
pub fn representative_code(category: RainCategory) -> i32 {
    match category {
        RainCategory::None => 0,
        RainCategory::Light => 61,
        RainCategory::Moderate => 63,
        RainCategory::Heavy => 65,
        RainCategory::Extreme => 95,
    }
}
