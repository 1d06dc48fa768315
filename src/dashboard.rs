use crate::aggregate::QueryError;
use crate::model::{AirQualitySummary, BirdSummary, WeatherSummary};
use crate::WeatherHub;

/// Snapshot behind the landing page. Categories are gathered one by one; a
/// failed or empty one becomes `None` and renders as an unavailable panel
/// instead of taking the page down.
#[derive(Debug)]
pub struct DashboardView {
    pub weather: Option<WeatherSummary>,
    pub air: Option<AirQualitySummary>,
    pub birds: Option<BirdSummary>,
}

impl DashboardView {
    pub fn gather(hub: &WeatherHub) -> Self {
        Self {
            weather: collect("weather", hub.recent_weather()),
            air: collect("air", hub.recent_air_quality()),
            birds: collect("birds", hub.observed_birds()),
        }
    }

    pub fn render(&self) -> String {
        let mut page = String::with_capacity(2048);
        page.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
        page.push_str("<title>Stratus Station</title>");
        page.push_str(
            "<style>body{font-family:sans-serif;margin:2em;background:#f4f6f8}\
             .panel{background:#fff;border-radius:8px;padding:1em 1.5em;margin-bottom:1em;\
             box-shadow:0 1px 3px rgba(0,0,0,.15)}h2{margin-top:0}.empty{color:#888}\
             td{padding:.2em .8em .2em 0}</style>",
        );
        page.push_str("</head><body><h1>Stratus Station</h1>");
        page.push_str(&weather_panel(&self.weather));
        page.push_str(&air_panel(&self.air));
        page.push_str(&bird_panel(&self.birds));
        page.push_str("</body></html>");
        page
    }
}

fn collect<T>(category: &str, result: Result<T, QueryError>) -> Option<T> {
    match result {
        Ok(summary) => Some(summary),
        Err(QueryError::NoRecentReadings) => None,
        Err(e) => {
            tracing::warn!("dashboard: {} lookup failed: {}", category, e);
            None
        }
    }
}

fn weather_panel(summary: &Option<WeatherSummary>) -> String {
    let mut panel = String::from("<div class=\"panel\"><h2>Weather</h2>");
    match summary {
        Some(s) => {
            panel.push_str("<table>");
            panel.push_str(&metric_row("Temperature", s.temperature, "\u{b0}C"));
            panel.push_str(&metric_row("Humidity", s.humidity, "%"));
            panel.push_str(&metric_row("Pressure", s.pressure, "hPa"));
            panel.push_str("</table>");
            panel.push_str(&format!(
                "<p>averaged over {} readings</p>",
                s.num_readings
            ));
        }
        None => panel.push_str("<p class=\"empty\">unavailable</p>"),
    }
    panel.push_str("</div>");
    panel
}

fn air_panel(summary: &Option<AirQualitySummary>) -> String {
    let mut panel = String::from("<div class=\"panel\"><h2>Air Quality</h2>");
    match summary {
        Some(s) => {
            panel.push_str("<table>");
            panel.push_str(&metric_row("PM1", s.pm1, "\u{b5}g/m\u{b3}"));
            panel.push_str(&metric_row("PM2.5", s.pm2_5, "\u{b5}g/m\u{b3}"));
            panel.push_str(&metric_row("PM10", s.pm10, "\u{b5}g/m\u{b3}"));
            panel.push_str("</table>");
            panel.push_str(&format!(
                "<p>averaged over {} readings</p>",
                s.num_readings
            ));
        }
        None => panel.push_str("<p class=\"empty\">unavailable</p>"),
    }
    panel.push_str("</div>");
    panel
}

fn bird_panel(summary: &Option<BirdSummary>) -> String {
    let mut panel = String::from("<div class=\"panel\"><h2>Birds</h2>");
    match summary {
        Some(s) => {
            panel.push_str("<table>");
            for sighting in &s.sightings {
                panel.push_str(&format!(
                    "<tr><td>{}</td><td>{:.2}</td></tr>",
                    escape_html(&sighting.common_name),
                    sighting.confidence
                ));
            }
            panel.push_str("</table>");
            panel.push_str(&format!("<p>over {} calls</p>", s.num_readings));
        }
        None => panel.push_str("<p class=\"empty\">unavailable</p>"),
    }
    panel.push_str("</div>");
    panel
}

fn metric_row(label: &str, value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("<tr><td>{}</td><td>{:.1} {}</td></tr>", label, v, unit),
        None => format!("<tr><td>{}</td><td class=\"empty\">n/a</td></tr>", label),
    }
}

// Species names come off the wire; anything rendered into markup gets
// escaped.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
