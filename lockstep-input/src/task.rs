//! Task part of the system description: time parameters, step discipline and
//! results settings.

use serde::{Deserialize, Serialize};

use crate::InputError;

/// Step discipline of the task.
///
/// Two historical spellings map to the multi-threaded discipline:
/// `parallel_one_step_size` and `parallel_sync_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepKind {
    #[default]
    #[serde(rename = "sequential")]
    Sequential,
    #[serde(rename = "parallel_single_thread")]
    ParallelSingleThread,
    #[serde(rename = "parallel_one_step_size", alias = "parallel_sync_all")]
    ParallelMultiThread,
}

impl std::str::FromStr for StepKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "parallel_single_thread" => Ok(Self::ParallelSingleThread),
            "parallel_one_step_size" | "parallel_sync_all" => Ok(Self::ParallelMultiThread),
            _ => Err(InputError::UnknownEnumValue {
                kind: "step type",
                value: s.into(),
            }),
        }
    }
}

/// Stop condition of the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndKind {
    #[default]
    #[serde(rename = "end_time")]
    Time,
    #[serde(rename = "first_component")]
    FirstComponent,
}

impl std::str::FromStr for EndKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "end_time" => Ok(Self::Time),
            "first_component" => Ok(Self::FirstComponent),
            _ => Err(InputError::UnknownEnumValue {
                kind: "end type",
                value: s.into(),
            }),
        }
    }
}

/// How densely results are stored.
///
/// `micro` falls back to `coupling` for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StoreLevelKind {
    #[serde(rename = "none")]
    None,
    #[default]
    #[serde(rename = "coupling", alias = "micro")]
    Coupling,
    #[serde(rename = "synchronization")]
    Synchronization,
}

impl std::str::FromStr for StoreLevelKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "micro" | "coupling" => Ok(Self::Coupling),
            "synchronization" => Ok(Self::Synchronization),
            _ => Err(InputError::UnknownEnumValue {
                kind: "store level",
                value: s.into(),
            }),
        }
    }
}

/// Results backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendKind {
    #[default]
    #[serde(rename = "csv")]
    Csv,
}

impl std::str::FromStr for BackendKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            _ => Err(InputError::UnknownEnumValue {
                kind: "results backend",
                value: s.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultsInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<std::path::PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_level: Option<StoreLevelKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskInput {
    /// Task start time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    /// Task end time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    /// Coupling step size in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_time: Option<f64>,

    /// Advance time by summation (`t += dt`) instead of `t = n * dt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum_time: Option<bool>,
    /// Evaluate inbound filters at the end of the coupling interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_at_end_time: Option<bool>,

    /// Relative tolerance for end-of-run detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_eps: Option<f64>,

    /// Log the wall-clock/simulated-time factor at the end of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_output: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_type: Option<EndKind>,

    #[serde(default)]
    pub step_type: StepKind,

    #[serde(default)]
    pub results: ResultsInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_type_text_mapping() {
        for (text, kind) in [
            ("sequential", StepKind::Sequential),
            ("parallel_single_thread", StepKind::ParallelSingleThread),
            ("parallel_one_step_size", StepKind::ParallelMultiThread),
            ("parallel_sync_all", StepKind::ParallelMultiThread),
        ] {
            assert_eq!(text.parse::<StepKind>().unwrap(), kind);
            assert_eq!(
                serde_json::from_str::<StepKind>(&format!("\"{text}\"")).unwrap(),
                kind
            );
        }
        assert!("parallel".parse::<StepKind>().is_err());
    }

    #[test]
    fn end_type_text_mapping() {
        assert_eq!("end_time".parse::<EndKind>().unwrap(), EndKind::Time);
        assert_eq!(
            "first_component".parse::<EndKind>().unwrap(),
            EndKind::FirstComponent
        );
    }

    #[test]
    fn micro_store_level_falls_back_to_coupling() {
        assert_eq!(
            "micro".parse::<StoreLevelKind>().unwrap(),
            StoreLevelKind::Coupling
        );
        assert_eq!(
            serde_json::from_str::<StoreLevelKind>("\"micro\"").unwrap(),
            StoreLevelKind::Coupling
        );
    }

    #[test]
    fn task_from_json_with_defaults() {
        let task: TaskInput = serde_json::from_str(
            r#"{
                "start_time": 0.0,
                "end_time": 1.0,
                "delta_time": 0.1,
                "step_type": "sequential"
            }"#,
        )
        .unwrap();
        assert_eq!(task.step_type, StepKind::Sequential);
        assert_eq!(task.end_type, None);
        assert_eq!(task.results.backend, None);
    }
}
