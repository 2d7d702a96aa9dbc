use crate::weather::sample::hour_label;
use crate::weather::{
    Catalog, DailyForecast, FrontType, OutlookDay, TemperatureRange, Warning, WarningKind,
};

/// Build the advisory list for a generation cycle.
///
/// The front summary always comes first. Heat and freeze checks follow per
/// outlook day in ascending order, then at most one severe-weather warning
/// for today.
pub fn evaluate(
    outlook: &[OutlookDay],
    today: &DailyForecast,
    front: FrontType,
    range: TemperatureRange,
    catalog: &Catalog,
) -> Vec<Warning> {
    let mut warnings = vec![front_summary(front)];

    for day in outlook {
        if day.max_temp >= range.max - 1 {
            warnings.push(Warning {
                day_offset: day.day_offset,
                kind: WarningKind::Heat,
                message: format!(
                    "Heat advisory for {}: highs up to {}°C.",
                    day.label, day.max_temp
                ),
            });
        }
        if day.min_temp <= range.min + 1 {
            warnings.push(Warning {
                day_offset: day.day_offset,
                kind: WarningKind::Freeze,
                message: format!(
                    "Freeze warning for {}: lows down to {}°C.",
                    day.label, day.min_temp
                ),
            });
        }
    }

    if let Some(severe) = today
        .samples()
        .iter()
        .find(|s| catalog.is_severe(&s.condition))
    {
        warnings.push(Warning {
            day_offset: 0,
            kind: WarningKind::SevereWeather,
            message: format!(
                "Severe weather today: {} {} expected from {}.",
                severe.icon,
                severe.condition,
                hour_label(severe.hour)
            ),
        });
    }

    warnings
}

fn front_summary(front: FrontType) -> Warning {
    let outlook = match front {
        FrontType::Cold => "conditions are likely to turn more unsettled as the day goes on",
        FrontType::Warm => "expect persistent cloud with bands of rain",
    };
    Warning {
        day_offset: 0,
        kind: WarningKind::FrontSummary,
        message: format!("{} front today: {}.", front.name(), outlook),
    }
}
