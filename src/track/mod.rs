// Reference tracks of each circuit, locating samples on them and splitting laps into named
// sections

pub mod locator;
pub mod storage;
pub mod types;

pub use locator::{TrackLocator, section_times};
pub use storage::{FileBasedTrackStorage, ReferenceTrackStorage};
pub use types::{ReferenceTrack, TrackPoint, TrackSectionTable};
