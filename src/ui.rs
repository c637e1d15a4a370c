//! Terminal output helpers for the CLI.

/// Width of error box separators.
const ERROR_BOX_WIDTH: usize = 60;

/// Print an error box with a title and the full cause chain of `error`.
///
/// Outputs:
/// ```text
/// ============================================================
/// whis failed
/// ============================================================
///
/// <error>
///   caused by: <source>
/// ```
pub fn print_error_box(title: &str, error: &anyhow::Error) {
    eprintln!("\n{}", "=".repeat(ERROR_BOX_WIDTH));
    eprintln!("{title}");
    eprintln!("{}", "=".repeat(ERROR_BOX_WIDTH));

    eprintln!("\n{error}");
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}
