pub const API_ROOT: &str = "api";

pub const PRICE_MAX_DIGITS: u32 = 5;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

/// Seconds between two database readiness probes.
pub const DB_WAIT_PERIOD: u64 = 1;

pub const RECIPE_IMAGE_DIR: &str = "upload/recipe";
pub const RECIPE_IMAGE_FIELD: &str = "image";

pub const JSON_BODY_LIMIT: u64 = 1024 * 64;

/// Prefix of stored passwords that can never be verified.
pub const UNUSABLE_PASSWORD_PREFIX: &str = "!";
pub const UNUSABLE_PASSWORD_SUFFIX_LENGTH: usize = 40;

pub const TOKEN_SCHEMES: &[&str] = &["Bearer", "Token"];

// Messages rendered in field errors

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_BLANK: &str = "This field may not be blank.";
pub const MSG_EMAIL_TAKEN: &str = "user with this email already exists.";
pub const MSG_NO_EMAIL: &str = "Users must have an email address.";
pub const MSG_BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";
pub const MSG_NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
pub const MSG_INVALID_TOKEN: &str = "Invalid token.";
pub const MSG_NOT_FOUND: &str = "Not found.";
pub const MSG_NO_FILE: &str = "No file was submitted.";
pub const MSG_INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
