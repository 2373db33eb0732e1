use std::io::Write;

/// Install the global logger. Safe to call more than once; only the first
/// call wins, so tests may call it from every entry point.
pub fn init() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{:<5}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .is_test(cfg!(test))
        .try_init();
}
