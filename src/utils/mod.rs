pub mod encoding;
pub mod feature_flags;
pub mod fs_atomic;
pub mod params;
pub mod paths;
pub mod redact;
pub mod suggest;
pub mod text;
