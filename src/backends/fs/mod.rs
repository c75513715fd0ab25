mod backend;
mod cache;
mod codecs;
mod day_file;
mod lookup;
mod merge;
mod record;

pub use backend::{
    FILEPATH_FORMAT_DEFAULT, FILEPATH_FORMAT_ENV, FileSystemBackend, QueryIter, ROOT_ENV,
};
pub use cache::PageCache;
pub use codecs::{DecimalWidth, FieldCodec};
pub use day_file::{DayFile, RecordScan};
pub use lookup::FileLookup;
pub use merge::{MergeTarget, merge_in_place};
pub use record::{RecordCodec, lead_timestamp};
