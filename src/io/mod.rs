pub mod audio_file;
pub mod catalog;
pub mod source;
pub mod wav_writer;

pub use audio_file::{AudioBuffer, AudioFile};
pub use catalog::{Catalog, StemRecord};
pub use source::{extension_hint, AudioSource, FileSource, MemorySource};
pub use wav_writer::encode_wav;
