use color_eyre::eyre;
use termcolor::ColorChoice;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum LogFormat {
    Json,
    PrettyCompact,
    Pretty,
}

/// Builds the filter from a `RUST_LOG` style directive, falling back to
/// `default_level` when there is none or it does not parse.
fn env_filter(default_level: tracing::Level, directive: Option<&str>) -> eyre::Result<EnvFilter> {
    let default_env_filter = EnvFilter::builder()
        .with_regex(true)
        .with_default_directive(LevelFilter::from_level(default_level).into())
        .parse(default_level.to_string().to_ascii_lowercase())?;

    let Some(directive) = directive else {
        return Ok(default_env_filter);
    };
    match EnvFilter::builder().with_regex(true).parse(directive) {
        Ok(env_filter) => Ok(env_filter),
        Err(err) => {
            eprintln!("invalid log filter {directive:?}: {err}");
            eprintln!("falling back to default logging");
            Ok(default_env_filter)
        }
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr so stdout stays free for piping.
///
/// # Errors
///
/// Returns an error if the default filter cannot be built or a global
/// subscriber is already installed.
pub fn setup_logging(
    log_level: Option<tracing::Level>,
    log_format: Option<LogFormat>,
    color_choice: ColorChoice,
) -> eyre::Result<(LogFormat, bool)> {
    let directive = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = env_filter(
        log_level.unwrap_or(tracing::Level::INFO),
        directive.as_deref(),
    )?;

    let log_format = log_format.unwrap_or(LogFormat::PrettyCompact);
    let use_color = match color_choice {
        ColorChoice::Always | ColorChoice::AlwaysAnsi => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
    };

    let fmt_layer_pretty = tracing_subscriber::fmt::Layer::new()
        .pretty()
        .without_time()
        .with_ansi(use_color)
        .with_writer(std::io::stderr);
    let fmt_layer_pretty_compact = tracing_subscriber::fmt::Layer::new()
        .compact()
        .without_time()
        .with_target(false)
        .with_ansi(use_color)
        .with_writer(std::io::stderr);
    let fmt_layer_json = tracing_subscriber::fmt::Layer::new()
        .json()
        .without_time()
        .with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with((log_format == LogFormat::Json).then_some(fmt_layer_json))
        .with((log_format == LogFormat::PrettyCompact).then_some(fmt_layer_pretty_compact))
        .with((log_format == LogFormat::Pretty).then_some(fmt_layer_pretty))
        .with(env_filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok((log_format, use_color))
}

#[cfg(test)]
mod tests {
    use super::env_filter;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn default_filter_uses_requested_level() -> color_eyre::eyre::Result<()> {
        let filter = env_filter(tracing::Level::WARN, None)?;
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
        Ok(())
    }

    #[test]
    fn directive_overrides_default_level() -> color_eyre::eyre::Result<()> {
        let filter = env_filter(tracing::Level::WARN, Some("trace"))?;
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
        Ok(())
    }
}
