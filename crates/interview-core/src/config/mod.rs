pub mod settings;

pub use settings::{
    BackendSettings, InterviewConfig, InterviewSettings, StorageSettings, SurveyQuestion,
    SurveySettings,
};
