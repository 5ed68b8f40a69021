use log::LevelFilter;
use std::io::Write;

/// Installs the process-wide logger. `RUST_LOG` overrides the `info` default.
pub fn init(prefix: &'static str) {
    let result = env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format(move |buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                buf.timestamp(),
                record.level(),
                prefix,
                record.args()
            )
        })
        .try_init();

    if result.is_err() {
        log::debug!("logger already initialised");
    }
}
