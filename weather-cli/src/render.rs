//! Plain-text rendering of the weather card and the city list.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset};
use weather_core::{Dashboard, Moment, WeatherRecord, available_locations};

pub fn weather_card(dashboard: &Dashboard, record: &WeatherRecord) -> String {
    let icon = dashboard.icon_name().unwrap_or_else(|| "no icon".to_string());

    card_lines(dashboard.location().city_name, dashboard.moment(), &icon, record)
}

fn card_lines(city_name: &str, moment: Moment, icon: &str, record: &WeatherRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{city_name}");
    let _ = writeln!(out, "{} {}", record.description, record.comfortability);
    let _ = writeln!(out, "{} °C  [{icon}]", record.temperature.round());
    let _ = writeln!(out, "風速 {} m/s", record.wind_speed);
    let _ = writeln!(out, "降雨機率 {} %", record.rain_possibility);
    let _ = writeln!(
        out,
        "最後觀測時間：{}{}",
        clock(&record.observation_time),
        if record.is_loading { " (更新中)" } else { "" }
    );
    let _ = writeln!(out, "theme: {}", moment.theme().name);
    out
}

fn clock(time: &DateTime<FixedOffset>) -> String {
    time.format("%H:%M").to_string()
}

pub fn city_list() -> String {
    let mut out = String::new();
    for location in available_locations() {
        let _ = writeln!(
            out,
            "{}\tstation: {}\tsun: {}",
            location.city_name, location.location_name, location.sunrise_city_name
        );
    }
    out
}
