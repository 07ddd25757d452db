// Constants for the apjsign host utility

// ============================================================================
// Output
// ============================================================================

/// File extension for packaged firmware
pub const APJ_EXTENSION: &str = "apj";

/// Git identity written when the source revision cannot be determined
pub const UNKNOWN_GIT_IDENTITY: &str = "unknown";

/// Abbreviated commit hash length used for `git_identity`
pub const GIT_IDENTITY_LEN: usize = 8;

// ============================================================================
// Theme Colors
// ============================================================================

/// Accent color for title bars (RGB)
pub const ORANGE: (u8, u8, u8) = (255, 175, 0);
