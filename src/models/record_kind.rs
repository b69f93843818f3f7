use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of a captured record. Each kind has its own table and its own
/// remote endpoint, and is synced independently of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Workout,
    NutritionLog,
}

impl RecordKind {
    /// All kinds, in the order passes are reported.
    pub const ALL: [RecordKind; 2] = [RecordKind::Workout, RecordKind::NutritionLog];

    /// Name of the SQLite table holding records of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Workout => "workouts",
            RecordKind::NutritionLog => "nutrition_logs",
        }
    }

    /// Path of the remote delivery endpoint, relative to the API base URL.
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            RecordKind::Workout => "/api/workouts",
            RecordKind::NutritionLog => "/api/nutrition-logs",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            RecordKind::Workout => 0,
            RecordKind::NutritionLog => 1,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Workout => write!(f, "workout"),
            RecordKind::NutritionLog => write!(f, "nutrition_log"),
        }
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "workout" | "workouts" => Ok(RecordKind::Workout),
            "nutrition" | "nutrition_log" | "nutrition-log" | "nutrition_logs"
            | "nutrition-logs" => Ok(RecordKind::NutritionLog),
            _ => Err(format!(
                "Invalid record kind '{}'. Valid options: workout, nutrition",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_display() {
        assert_eq!(format!("{}", RecordKind::Workout), "workout");
        assert_eq!(format!("{}", RecordKind::NutritionLog), "nutrition_log");
    }

    #[test]
    fn test_record_kind_from_str() {
        assert_eq!(RecordKind::from_str("workout").unwrap(), RecordKind::Workout);
        assert_eq!(RecordKind::from_str("WORKOUT").unwrap(), RecordKind::Workout);
        assert_eq!(
            RecordKind::from_str("nutrition").unwrap(),
            RecordKind::NutritionLog
        );
        assert_eq!(
            RecordKind::from_str("Nutrition-Log").unwrap(),
            RecordKind::NutritionLog
        );
    }

    #[test]
    fn test_record_kind_from_str_invalid() {
        assert!(RecordKind::from_str("sleep").is_err());
        assert!(RecordKind::from_str("").is_err());
    }

    #[test]
    fn test_tables_and_endpoints_are_distinct() {
        assert_ne!(RecordKind::Workout.table(), RecordKind::NutritionLog.table());
        assert_ne!(
            RecordKind::Workout.endpoint_path(),
            RecordKind::NutritionLog.endpoint_path()
        );
    }

    #[test]
    fn test_record_kind_serializes_snake_case() {
        let json = serde_json::to_string(&RecordKind::NutritionLog).unwrap();
        assert_eq!(json, "\"nutrition_log\"");
    }
}
