use crate::alert::AlertCategory;
use crate::stall::StallRule;
use std::fmt;

/// One of the three temperature channels fed by the smoker controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorStream {
    Smoker,
    FoodA,
    FoodB,
}

impl SensorStream {
    pub const ALL: [SensorStream; 3] = [SensorStream::Smoker, SensorStream::FoodA, SensorStream::FoodB];

    /// Name of the queue carrying this stream's readings.
    pub fn queue_name(self) -> &'static str {
        match self {
            SensorStream::Smoker => "01-smoker",
            SensorStream::FoodA => "02-food-A",
            SensorStream::FoodB => "03-food-B",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SensorStream::Smoker => "Smoker",
            SensorStream::FoodA => "Food A",
            SensorStream::FoodB => "Food B",
        }
    }

    pub fn category(self) -> AlertCategory {
        match self {
            SensorStream::Smoker => AlertCategory::SmokerStall,
            SensorStream::FoodA | SensorStream::FoodB => AlertCategory::FoodStall,
        }
    }

    /// Window shape used when nothing else is configured.
    pub fn default_profile(self) -> StreamProfile {
        match self {
            SensorStream::Smoker => StreamProfile::new(5, StallRule::DecreasingDelta { threshold: 15.0 }),
            SensorStream::FoodA | SensorStream::FoodB => {
                StreamProfile::new(20, StallRule::RangePlateau { threshold: 1.0 })
            }
        }
    }

    /// Builds the rule kind this stream always uses with the given threshold.
    pub fn rule_with_threshold(self, threshold: f64) -> StallRule {
        match self {
            SensorStream::Smoker => StallRule::DecreasingDelta { threshold },
            SensorStream::FoodA | SensorStream::FoodB => StallRule::RangePlateau { threshold },
        }
    }
}

impl fmt::Display for SensorStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.queue_name())
    }
}

/// Window capacity and stall rule applied to one stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamProfile {
    pub capacity: usize,
    pub rule: StallRule,
}

impl StreamProfile {
    pub fn new(capacity: usize, rule: StallRule) -> Self {
        Self { capacity, rule }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles() {
        let smoker = SensorStream::Smoker.default_profile();
        assert_eq!(smoker.capacity, 5);
        assert_eq!(smoker.rule, StallRule::DecreasingDelta { threshold: 15.0 });

        for stream in [SensorStream::FoodA, SensorStream::FoodB] {
            let food = stream.default_profile();
            assert_eq!(food.capacity, 20);
            assert_eq!(food.rule, StallRule::RangePlateau { threshold: 1.0 });
        }
    }

    #[test]
    fn test_food_streams_share_category() {
        assert_eq!(SensorStream::FoodA.category(), SensorStream::FoodB.category());
        assert_ne!(SensorStream::Smoker.category(), SensorStream::FoodA.category());
    }
}
