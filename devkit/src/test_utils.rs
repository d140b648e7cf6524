/*!
Helpers shared by the integration tests.
*/

use vcd_exporter::assembler::MetricSample;

/// Routes `tracing` output through the test harness. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vcd_exporter=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn samples_of<'a>(samples: &'a [MetricSample], family: &str) -> Vec<&'a MetricSample> {
    samples.iter().filter(|s| s.family.name == family).collect()
}

/// Samples per inventory level, as `(org, vdc, vapp, vm)`.
pub fn count_by_level(samples: &[MetricSample]) -> (usize, usize, usize, usize) {
    use vcd_exporter::error::Level;

    let count = |level: Level| samples.iter().filter(|s| s.family.level == level).count();
    (
        count(Level::Org),
        count(Level::Vdc),
        count(Level::AppGroup),
        count(Level::Vm),
    )
}
