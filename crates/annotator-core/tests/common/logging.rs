/// Route `tracing` output through the test harness. Safe to call from
/// every test.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
