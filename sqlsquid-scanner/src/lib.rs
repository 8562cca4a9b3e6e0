pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod forms;
pub mod normalize;
pub mod result;

pub use crawler::{Crawler, ProgressCallback, StopCallback};
pub use error::{Result, ScanError};
pub use fetcher::Fetcher;
pub use forms::{FormDescriptor, FormInput, FormMethod, extract_forms, parse_forms};
pub use normalize::{NormalizedUrl, normalize};
pub use result::FetchedPage;
