/// Record layout and remote lookup constants shared across the pipeline

// Field delimiter used by both input files and the output file
pub const FIELD_DELIMITER: char = ':';

// Primary records carry exactly three trailing fields after the skin tokens (ea, el, tag)
pub const PRIMARY_TRAILING_FIELDS: usize = 3;
pub const PRIMARY_MIN_FIELDS: usize = 1 + PRIMARY_TRAILING_FIELDS;

// user, password, server, email, birth date, creation date, country
pub const SECONDARY_FIELDS: usize = 7;

// Appended to primary records that have no account data
pub const FALLBACK_COUNTRY_SUFFIX: &str = ":Brasil";

// Embedded rental codes look like CHAMPION_SKIN_RENTAL_1234
pub const SKIN_CODE_PREFIX: &str = "CHAMPION_SKIN_RENTAL_";
pub const SKIN_CODE_PATTERN: &str = r"CHAMPION_SKIN_RENTAL_([0-9]+)";

pub const DEFAULT_SKIN_DATA_URL: &str =
    "https://raw.communitydragon.org/latest/plugins/rcp-be-lol-game-data/global/en_gb/v1/skins.json";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_THREADS: usize = 1;
pub const DEFAULT_OUTPUT_DIR: &str = ".";
pub const DEFAULT_OUTPUT_PREFIX: &str = "output";
pub const DEFAULT_CONFIG_PATH: &str = "skin_merge.toml";

// Environment overrides
pub const ENV_SKIN_DATA_URL: &str = "SKIN_MERGE_SKIN_DATA_URL";
pub const ENV_METRICS_PORT: &str = "SKIN_MERGE_METRICS_PORT";

/// Build the literal token for a numeric skin code
pub fn skin_code_token(code: &str) -> String {
    format!("{}{}", SKIN_CODE_PREFIX, code)
}
