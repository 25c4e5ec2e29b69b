//! Vital-sign extraction from free text.
//!
//! Values are matched leniently (label, optional `:`/`=`, number) on the
//! NFKC-folded text. A `120/78`-style pair is preferred for blood pressure;
//! explicit SBP/DBP labels are the fallback. Unparsable numbers stay
//! unknown rather than becoming zero.

use std::sync::LazyLock;

use regex::Regex;

use super::types::Vitals;
use crate::text::normalize::nfkc;

const NUM: &str = r"(\d+(?:\.\d+)?)";

static TEMPERATURE: LazyLock<Regex> = LazyLock::new(|| vital_pattern(r"(?:体温|kt|bt)"));
static HEART_RATE: LazyLock<Regex> = LazyLock::new(|| vital_pattern(r"(?:hr|心拍|脈拍)"));
static RESP_RATE: LazyLock<Regex> = LazyLock::new(|| vital_pattern(r"(?:rr|呼吸数)"));
static SPO2: LazyLock<Regex> = LazyLock::new(|| vital_pattern(r"(?:spo2|サチュ)"));
static SYSTOLIC: LazyLock<Regex> = LazyLock::new(|| vital_pattern(r"(?:sbp|収縮期|上の血圧)"));
static DIASTOLIC: LazyLock<Regex> = LazyLock::new(|| vital_pattern(r"(?:dbp|拡張期|下の血圧)"));
static BP_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2,3})\s*/\s*(\d{2,3})\b").expect("bp pair pattern"));
static PAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:nrs|疼痛(?:スケール)?)\D{{0,6}}{NUM}")).expect("pain pattern")
});

fn vital_pattern(label: &str) -> Regex {
    Regex::new(&format!(r"(?i){label}\s*[:=]?\s*{NUM}")).expect("vital pattern")
}

fn first_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

pub fn parse(text: &str) -> Vitals {
    let t = nfkc(text);

    let bp = BP_PAIR.captures(&t);
    let systolic = bp
        .as_ref()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .or_else(|| first_number(&SYSTOLIC, &t));
    let diastolic = bp
        .as_ref()
        .and_then(|c| c.get(2))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .or_else(|| first_number(&DIASTOLIC, &t));

    let mean_arterial_pressure = match (systolic, diastolic) {
        (Some(s), Some(d)) => Some((s + 2.0 * d) / 3.0),
        _ => None,
    };

    Vitals {
        temperature: first_number(&TEMPERATURE, &t),
        heart_rate: first_number(&HEART_RATE, &t),
        respiratory_rate: first_number(&RESP_RATE, &t),
        spo2: first_number(&SPO2, &t),
        systolic,
        diastolic,
        mean_arterial_pressure,
        pain_score: first_number(&PAIN, &t),
    }
}
