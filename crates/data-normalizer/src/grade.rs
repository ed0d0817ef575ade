use serde::{Deserialize, Serialize};

/// Letter grade for a 0-100 score, for display next to a composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreGrade {
    A,
    B,
    C,
    D,
    F,
}

impl ScoreGrade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 85.0 => ScoreGrade::A,
            s if s >= 70.0 => ScoreGrade::B,
            s if s >= 55.0 => ScoreGrade::C,
            s if s >= 40.0 => ScoreGrade::D,
            _ => ScoreGrade::F,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScoreGrade::A => "Excellent",
            ScoreGrade::B => "Good",
            ScoreGrade::C => "Fair",
            ScoreGrade::D => "Poor",
            ScoreGrade::F => "Very Poor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(ScoreGrade::from_score(85.0), ScoreGrade::A);
        assert_eq!(ScoreGrade::from_score(84.9), ScoreGrade::B);
        assert_eq!(ScoreGrade::from_score(70.0), ScoreGrade::B);
        assert_eq!(ScoreGrade::from_score(55.0), ScoreGrade::C);
        assert_eq!(ScoreGrade::from_score(40.0), ScoreGrade::D);
        assert_eq!(ScoreGrade::from_score(39.9), ScoreGrade::F);
        assert_eq!(ScoreGrade::from_score(f64::NAN), ScoreGrade::F);
        assert_eq!(ScoreGrade::C.description(), "Fair");
    }
}
