//! Shared constants.

/// Default HTTP port for `whis serve`.
pub const DEFAULT_PORT: u16 = 8000;

/// Default bind address for `whis serve`.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Header the fronting auth gateway uses to pass the authenticated owner id.
pub const DEFAULT_OWNER_HEADER: &str = "x-owner-id";

/// Default SQLite database file name (relative to the data directory).
pub const DEFAULT_DATABASE_FILE: &str = "whis.db";

/// Default live image-asset directory name (relative to the data directory).
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Default backup artifact directory name (relative to the data directory).
pub const DEFAULT_BACKUPS_DIR: &str = "backups";

/// Default configuration file name.
pub const CONFIG_FILE: &str = "whis.toml";

/// Archive format version written to, and required in, every manifest.
pub const ARCHIVE_FORMAT_VERSION: &str = "1.0";

/// Name of the manifest entry inside an archive.
pub const MANIFEST_ENTRY: &str = "data.json";

/// Name of the image directory inside an archive.
pub const IMAGES_DIR: &str = "images";

/// Content type of backup artifacts.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Minimum gateway API key length before `validate()` warns.
pub const MIN_API_KEY_LEN: usize = 16;
