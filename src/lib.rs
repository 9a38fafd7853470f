//! read-aloud: segmented text-to-speech playback.
//!
//! | Module       | Role                                                   |
//! |--------------|--------------------------------------------------------|
//! | [`platform`] | speech engine capability, per-class timing policy      |
//! | [`voice`]    | voice enumeration, ranking and selection               |
//! | [`text`]     | sentence / bounded-chunk segmentation                  |
//! | [`playback`] | segment player and the session state machine           |
//! | [`config`]   | `settings.toml` persistence                            |

pub mod config;
pub mod platform;
pub mod playback;
pub mod text;
pub mod voice;
