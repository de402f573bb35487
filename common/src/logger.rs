use redox_log::{OutputBuilder, RedoxLogger};

/// Stderr filter for a tool run with `verbosity` `-v` flags.
pub fn output_level(verbosity: u64) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

pub fn file_level() -> log::LevelFilter {
    log::LevelFilter::Debug
}

/// Installs the global logger: coloured stderr output, plus log files in the logging
/// scheme when running on Redox.
#[cfg_attr(not(target_os = "redox"), allow(unused_variables, unused_mut))]
pub fn setup_logging(
    category: &str,
    subcategory: &str,
    logfile_base: &str,
    output_level: log::LevelFilter,
    file_level: log::LevelFilter,
) -> Result<(), log::SetLoggerError> {
    let mut logger = RedoxLogger::new().with_output(
        OutputBuilder::stderr()
            .with_filter(output_level)
            .with_ansi_escape_codes()
            .flush_on_newline(true)
            .build(),
    );

    #[cfg(target_os = "redox")]
    match OutputBuilder::in_redox_logging_scheme(
        category,
        subcategory,
        format!("{logfile_base}.log"),
    ) {
        Ok(b) => {
            logger = logger.with_output(b.with_filter(file_level).flush_on_newline(true).build())
        }
        Err(error) => eprintln!("Failed to create {logfile_base}.log: {}", error),
    }

    logger.enable().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(output_level(0), log::LevelFilter::Info);
        assert_eq!(output_level(1), log::LevelFilter::Debug);
        assert_eq!(output_level(5), log::LevelFilter::Trace);
    }
}
