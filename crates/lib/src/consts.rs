pub const APP_NAME: &str = "rrmake";

/// Top-level output directory, relative to the project root.
pub const BUILD_DIR: &str = "build";

/// File name of the merged device definition inside a device-type directory.
pub const ARCH_MERGED_XML: &str = "arch.merged.xml";

/// Default directory (relative to the project root) holding `<ARCH>.json` rule extensions.
pub const RULES_DIR: &str = "rules";

pub const DEFAULT_ROUTE_CHAN_WIDTH: u32 = 6;

/// Upper bound on dependency expansion depth before reporting a cycle.
pub const MAX_EXPANSION_DEPTH: usize = 64;

/// Target built when no target is requested.
pub const DEFAULT_TARGET: &str = "all";
