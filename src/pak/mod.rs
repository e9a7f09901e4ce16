mod entry;
mod format;
mod reader;
mod writer;

pub use entry::{read_entry, EntryHeader, EntryInfo, PakEntry};
pub use format::{
    read_footer, write_footer, PakHeader, Version, CONTENT_HASH_FIELD_OFFSET,
    CONTENT_LEN_FIELD_OFFSET, CONTENT_OFFSET, CONTENT_OFFSET_FIELD_OFFSET, FOOTER_MAGIC,
    FOOTER_SIZE, FORMAT_VERSION, HEADER_MAGIC, VERSION_FIELD_OFFSET,
};
pub use reader::{PakReader, ReaderState, Stage, VerifiedPak};
pub use writer::{PakSource, PakSummary, PakWriter, WriterOptions};
pub(crate) use writer::validate_entry_names;
