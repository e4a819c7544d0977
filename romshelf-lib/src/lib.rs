pub mod compress;
pub mod error;
pub mod gamelist;
pub mod library;
pub mod marks;
pub mod progress;
pub mod scanner;
pub mod settings;
pub mod translate;

pub use compress::{
    CompressOptions, CompressProgress, CompressSummary, FfProber, FfmpegEncoder, MediaProber,
    ProbeInfo, VideoEncoder,
};
pub use error::{CompressError, GamelistError, TranslateError};
pub use gamelist::GameRecord;
pub use library::{DeleteSummary, Library};
pub use marks::MarkSet;
pub use translate::{
    GoogleTranslator, TranslateOptions, TranslateProgress, TranslateSummary, Translator,
};
