use serde::Serialize;

use crate::moment::Moment;

/// Display class of an upstream weather code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeatherCodeClass {
    Thunderstorm,
    Clear,
    CloudyFog,
    Cloudy,
    Fog,
    Rain,
    Snow,
}

/// Classification table. Order matters: the first class whose set holds the
/// code wins.
const CLASS_CODES: [(WeatherCodeClass, &[i32]); 7] = [
    (WeatherCodeClass::Thunderstorm, &[15, 16, 17, 18, 21, 22, 33, 34, 35, 36, 41]),
    (WeatherCodeClass::Clear, &[1]),
    (WeatherCodeClass::CloudyFog, &[25, 26, 27, 28]),
    (WeatherCodeClass::Cloudy, &[2, 3, 4, 5, 6, 7]),
    (WeatherCodeClass::Fog, &[24]),
    (
        WeatherCodeClass::Rain,
        &[8, 9, 10, 11, 12, 13, 14, 19, 20, 29, 30, 31, 32, 38, 39],
    ),
    (WeatherCodeClass::Snow, &[23, 37, 42]),
];

/// `None` means no icon exists for the code.
pub fn classify(code: i32) -> Option<WeatherCodeClass> {
    CLASS_CODES
        .iter()
        .find(|(_, codes)| codes.contains(&code))
        .map(|(class, _)| *class)
}

impl WeatherCodeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCodeClass::Thunderstorm => "thunderstorm",
            WeatherCodeClass::Clear => "clear",
            WeatherCodeClass::CloudyFog => "cloudy-fog",
            WeatherCodeClass::Cloudy => "cloudy",
            WeatherCodeClass::Fog => "fog",
            WeatherCodeClass::Rain => "rain",
            WeatherCodeClass::Snow => "snow",
        }
    }

    /// Asset name of the icon for this class at the given moment,
    /// e.g. `night-partially-clear-with-rain`.
    pub fn icon_name(&self, moment: Moment) -> String {
        let kind = match self {
            WeatherCodeClass::Rain => "partially-clear-with-rain",
            WeatherCodeClass::Snow => "snowing",
            other => other.as_str(),
        };
        format!("{}-{kind}", moment.as_str())
    }
}

impl std::fmt::Display for WeatherCodeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
