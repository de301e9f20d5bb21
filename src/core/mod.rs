pub mod batch;
pub mod collection;
pub mod error;
pub mod events;
pub mod ffmpeg;
pub mod filename;
pub mod hwaccel;
pub mod process;
pub mod scratch;
pub mod selector;
pub mod unit;
pub mod worklist;
pub mod ytdlp;

#[cfg(test)]
pub(crate) mod test_support;
