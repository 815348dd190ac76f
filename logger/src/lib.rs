//! Default logging setup for tools and tests built on `serialized_map`
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

use std::sync::{Mutex, OnceLock};

/// Environment variable holding the `env_logger` filter directives.
pub const FILTER_ENV: &str = "SERIALIZED_MAP_LOG";
/// Environment variable selecting when to emit ANSI styles (`auto`, `always`, `never`).
pub const STYLE_ENV: &str = "SERIALIZED_MAP_LOG_STYLE";

const TIMESTAMP_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightBlack)));

const TARGET_STYLE: anstyle::Style =
    anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Magenta)));

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Perform the default logging setup.
///
/// Log lines are prefixed with the time elapsed since setup. Whenever the log target changes a
/// header line naming the new target is written first, so consecutive records from the same
/// module are not repeatedly tagged.
///
/// Calling this more than once is fine, only the first call installs the logger. Returns whether
/// a logger owned by this crate is active, which is `false` when some other logger was installed
/// first.
pub fn setup() -> bool {
    *INSTALLED.get_or_init(install)
}

fn install() -> bool {
    let start_time = std::time::Instant::now();

    let last_target = Mutex::new(String::new());

    env_logger::Builder::from_env(
        env_logger::Env::new()
            .filter_or(FILTER_ENV, "info")
            .write_style(STYLE_ENV),
    )
    .format(move |buf, record| {
        use std::io::Write;

        let timestamp = start_time.elapsed();
        let level = record.level();
        let target = record.target();

        // a poisoned lock only means another thread panicked mid-format, the string is still usable
        let mut last_target = last_target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if target != *last_target {
            last_target.clear();
            last_target.push_str(target);

            writeln!(
                buf,
                "{} {}",
                format_args!("{style}{timestamp:>9.2?}{style:#}", style = TIMESTAMP_STYLE),
                format_args!("{style}{target}{style:#}", style = TARGET_STYLE)
            )?;
        }
        writeln!(
            buf,
            "{} {} {}",
            format_args!("{style}{timestamp:>9.2?}{style:#}", style = TIMESTAMP_STYLE),
            format_args!(
                "{style}{level}{style:#}",
                style = buf.default_level_style(level),
            ),
            record.args(),
        )
    })
    .is_test(cfg!(test))
    .try_init()
    .is_ok()
}

#[cfg(test)]
mod tests {
    #[test]
    fn setup_is_idempotent() {
        let first = super::setup();
        assert_eq!(super::setup(), first);
        log::info!("logger installed: {first}");
    }
}
