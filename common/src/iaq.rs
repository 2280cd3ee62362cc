//! Indoor air quality score from the climate sensor's humidity and gas
//! resistance. Higher is better; ideal air scores slightly above 100.

const IDEAL_HUMIDITY: f32 = 45.0;
const IDEAL_HUMIDITY_BAND: f32 = 5.0;

const WORST_RESISTANCE_OHMS: u32 = 5_000;
const BEST_RESISTANCE_OHMS: u32 = 50_000;

const RESISTANCE_WEIGHT: f32 = 0.75;
const HUMIDITY_WEIGHT: f32 = 1.0 - RESISTANCE_WEIGHT;

pub fn iaq_score(humidity: f32, gas_resistance_ohms: u32) -> f32 {
    let humidity_offset = (humidity - IDEAL_HUMIDITY).abs() - IDEAL_HUMIDITY_BAND;
    let humidity_quality = 100.0 - humidity_offset * 2.0;

    let resistance = gas_resistance_ohms.clamp(WORST_RESISTANCE_OHMS, BEST_RESISTANCE_OHMS) as f32;
    let gas_quality = (resistance.log10() - (WORST_RESISTANCE_OHMS as f32).log10()) * 100.0;

    RESISTANCE_WEIGHT * gas_quality + HUMIDITY_WEIGHT * humidity_quality
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ideal_air_scores_high() {
        assert!(iaq_score(45.0, 50_000) > 95.0);
    }

    #[test]
    fn score_is_not_clamped_to_hundred() {
        let ideal = iaq_score(45.0, 50_000);
        assert!((ideal - 102.5).abs() < 0.01);
    }

    #[test]
    fn polluted_air_scores_low() {
        assert!(iaq_score(45.0, 5_000) < 30.0);
    }

    #[test]
    fn dry_air_without_reading_scores_lowest() {
        assert!(iaq_score(0.0, 0) < 10.0);
    }

    #[test]
    fn resistance_is_bounded() {
        assert_eq!(iaq_score(45.0, 500_000), iaq_score(45.0, 50_000));
    }
}
