use chrono::{Days, NaiveDate};
use rand::Rng;

use crate::weather::{DailyForecast, OutlookDay, TemperatureRange};

/// How many of today's most frequent conditions a future day may pick from.
const CANDIDATE_CONDITIONS: usize = 3;

/// Temperature jitter per day of horizon, in °C.
const JITTER_PER_DAY: i32 = 2;

/// A condition seen in today's samples, with how many hours it covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionCount {
    pub condition: String,
    pub icon: String,
    pub hours: usize,
}

/// Today's conditions, most frequent first. Ties keep the order of first
/// appearance.
pub fn rank_conditions(today: &DailyForecast) -> Vec<ConditionCount> {
    let mut counts: Vec<ConditionCount> = Vec::new();
    for s in today.samples() {
        match counts.iter_mut().find(|c| c.condition == s.condition) {
            Some(c) => c.hours += 1,
            None => counts.push(ConditionCount {
                condition: s.condition.clone(),
                icon: s.icon.clone(),
                hours: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.hours.cmp(&a.hours));
    counts
}

/// Derive a `day_count`-day outlook from today's samples.
///
/// Day 0 is today's actual high, low and dominant condition. Each later day
/// perturbs every hourly temperature by up to ±2°C per day of distance and
/// picks its condition among today's three most common.
pub fn extrapolate<R: Rng + ?Sized>(
    today: &DailyForecast,
    day_count: usize,
    range: TemperatureRange,
    start_date: NaiveDate,
    rng: &mut R,
) -> Vec<OutlookDay> {
    let ranked = rank_conditions(today);
    let (Some(dominant), Some(today_max), Some(today_min)) = (
        ranked.first(),
        today.max_temperature(),
        today.min_temperature(),
    ) else {
        return Vec::new();
    };
    let candidates = &ranked[..ranked.len().min(CANDIDATE_CONDITIONS)];

    let mut outlook = Vec::with_capacity(day_count);
    for offset in 0..day_count {
        let date = start_date + Days::new(offset as u64);

        let (max_temp, min_temp, pick) = if offset == 0 {
            (today_max, today_min, dominant)
        } else {
            let spread = JITTER_PER_DAY * offset as i32;
            let (max, min) = today
                .samples()
                .iter()
                .map(|s| s.temperature + rng.gen_range(-spread..=spread))
                .fold((i32::MIN, i32::MAX), |(hi, lo), t| (hi.max(t), lo.min(t)));
            let pick = &candidates[rng.gen_range(0..candidates.len())];
            (range.clamp(max), range.clamp(min), pick)
        };

        outlook.push(OutlookDay {
            day_offset: offset as u32,
            date,
            label: day_label(offset, date),
            max_temp,
            min_temp,
            condition: pick.condition.clone(),
            icon: pick.icon.clone(),
        });
    }
    outlook
}

fn day_label(offset: usize, date: NaiveDate) -> String {
    if offset == 0 {
        "Today".to_string()
    } else {
        date.format("%a").to_string()
    }
}
