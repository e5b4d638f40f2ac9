//! Job-static configuration.

mod settings;

pub use settings::{
    AnalysisSettings, ChapterSettings, LoggingSettings, PathSettings, PostProcessSettings,
    SegmentSettings, Settings, SteppingSettings, SubtitleSettings,
};
