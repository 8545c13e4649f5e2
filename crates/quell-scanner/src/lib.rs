/// The Quell in-page scanner.
/// Injected into browser contexts by backends; installs `window.Quell`.
pub const SCANNER_JS: &str = include_str!("scanner.js");

/// Expression that is `true` once the scanner is installed in the current document.
pub const SCANNER_PROBE: &str = "typeof window.Quell !== 'undefined'";
